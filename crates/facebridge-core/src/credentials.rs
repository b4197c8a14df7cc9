use crate::error::FaceError;
use std::fmt;

/// Prefix of the template values shipped in sample configuration.
const PLACEHOLDER_PREFIX: &str = "YOUR_";

/// Licensing credentials handed to the engine's activation step.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    pub sdk_key: String,
    /// May be empty: engines fall back to online activation.
    pub active_key: String,
}

impl Credentials {
    pub fn new(
        app_id: impl Into<String>,
        sdk_key: impl Into<String>,
        active_key: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            sdk_key: sdk_key.into(),
            active_key: active_key.into(),
        }
    }

    /// Reject missing or placeholder values before any activation attempt.
    pub fn validate(&self) -> Result<(), FaceError> {
        check_field("APP_ID", &self.app_id)?;
        check_field("SDK_KEY", &self.sdk_key)?;
        Ok(())
    }
}

fn check_field(field: &'static str, value: &str) -> Result<(), FaceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FaceError::Credential {
            field,
            reason: "value is empty",
        });
    }
    if value.starts_with(PLACEHOLDER_PREFIX) {
        return Err(FaceError::Credential {
            field,
            reason: "value is a configuration placeholder",
        });
    }
    Ok(())
}

/// Log-safe form of a secret: first 8 characters followed by `...`.
pub fn redact(value: &str) -> String {
    if value.is_empty() {
        return "(empty)".to_string();
    }
    let prefix: String = value.chars().take(8).collect();
    format!("{prefix}...")
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &redact(&self.app_id))
            .field("sdk_key", &redact(&self.sdk_key))
            .field("active_key", &redact(&self.active_key))
            .finish()
    }
}
