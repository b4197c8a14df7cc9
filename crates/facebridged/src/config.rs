use facebridge_core::{Capabilities, Capability, Credentials, EngineConfig};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Default number of faces the engine reports per image.
const DEFAULT_MAX_FACES: u32 = 2;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Which D-Bus bus the service registers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    Session,
    System,
}

impl std::str::FromStr for BusKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "system" => Ok(Self::System),
            other => Err(ConfigError::Invalid {
                key: "FACEBRIDGE_BUS",
                reason: format!("expected session or system, got {other:?}"),
            }),
        }
    }
}

/// On-disk configuration. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    model_dir: Option<PathBuf>,
    max_faces: Option<u32>,
    capabilities: Option<Vec<String>>,
    bus: Option<BusKind>,
    app_id: Option<String>,
    sdk_key: Option<String>,
    active_key: Option<String>,
    auto_init: Option<bool>,
}

/// Daemon configuration.
#[derive(Debug)]
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Maximum faces reported per image.
    pub max_faces: u32,
    /// Engine capabilities enabled at initialization.
    pub capabilities: Capabilities,
    pub bus: BusKind,
    /// Credentials for initializing at startup, if configured.
    pub credentials: Option<Credentials>,
    /// Initialize the engine at startup when credentials are present.
    pub auto_init: bool,
}

impl Config {
    /// Load configuration from `FACEBRIDGE_*` environment variables, layered
    /// over the TOML file named by `FACEBRIDGE_CONFIG` when set.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    fn from_source(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let file = match var("FACEBRIDGE_CONFIG") {
            Some(path) => read_file(PathBuf::from(path))?,
            None => FileConfig::default(),
        };

        let model_dir = var("FACEBRIDGE_MODEL_DIR")
            .map(PathBuf::from)
            .or(file.model_dir)
            .unwrap_or_else(facebridge_onnx::default_model_dir);

        let max_faces = match var("FACEBRIDGE_MAX_FACES") {
            Some(v) => v.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "FACEBRIDGE_MAX_FACES",
                reason: format!("{v:?}: {e}"),
            })?,
            None => file.max_faces.unwrap_or(DEFAULT_MAX_FACES),
        };
        if max_faces == 0 {
            return Err(ConfigError::Invalid {
                key: "FACEBRIDGE_MAX_FACES",
                reason: "must be at least 1".into(),
            });
        }

        let capability_list = var("FACEBRIDGE_CAPABILITIES").or(file.capabilities.map(|c| c.join(",")));
        let capabilities = match capability_list {
            Some(list) => Capabilities::parse_list(&list).map_err(|e| ConfigError::Invalid {
                key: "FACEBRIDGE_CAPABILITIES",
                reason: e.to_string(),
            })?,
            None => Capabilities::all(),
        };
        if !capabilities.contains(Capability::Detect) {
            return Err(ConfigError::Invalid {
                key: "FACEBRIDGE_CAPABILITIES",
                reason: "every engine needs detect".into(),
            });
        }

        let bus = match var("FACEBRIDGE_BUS") {
            Some(v) => v.parse()?,
            None => file.bus.unwrap_or(BusKind::Session),
        };

        let app_id = var("FACEBRIDGE_APP_ID").or(file.app_id);
        let sdk_key = var("FACEBRIDGE_SDK_KEY").or(file.sdk_key);
        let active_key = var("FACEBRIDGE_ACTIVE_KEY")
            .or(file.active_key)
            .unwrap_or_default();
        let credentials = match (app_id, sdk_key) {
            (Some(app_id), Some(sdk_key)) => Some(Credentials::new(app_id, sdk_key, active_key)),
            _ => None,
        };

        let auto_init = var("FACEBRIDGE_AUTO_INIT")
            .map(|v| v != "0")
            .or(file.auto_init)
            .unwrap_or(true);

        Ok(Self {
            model_dir,
            max_faces,
            capabilities,
            bus,
            credentials,
            auto_init,
        })
    }

    /// Engine setup derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_faces: self.max_faces,
            capabilities: self.capabilities,
            ..EngineConfig::default()
        }
    }
}

fn read_file(path: PathBuf) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let file = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(file)
}
