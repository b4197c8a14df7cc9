//! Engine result codes and the lookup tables that classify them.
//!
//! Engines speak in numeric codes. The facade never surfaces a bare number:
//! every code is classified here into a category and a readable message,
//! and unrecognized codes fall through to a catch-all that still carries
//! the number.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric result code returned by an engine entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCode(pub i32);

impl ResultCode {
    pub const OK: Self = Self(0);
    pub const UNKNOWN: Self = Self(1);
    pub const INVALID_PARAM: Self = Self(2);
    pub const UNSUPPORTED: Self = Self(3);
    pub const NO_MEMORY: Self = Self(4);
    pub const BAD_STATE: Self = Self(5);

    pub const MODEL_NOT_FOUND: Self = Self(0x7001);
    pub const INVALID_FEATURE: Self = Self(0x7002);
    pub const IMAGE_FORMAT: Self = Self(0x7003);

    pub const ACTIVATION_FAIL: Self = Self(0x16001);
    pub const ALREADY_ACTIVATED: Self = Self(0x16002);
    pub const NOT_ACTIVATED: Self = Self(0x16003);

    pub const NETWORK_COULDNT_RESOLVE_HOST: Self = Self(0x17001);
    pub const NETWORK_COULDNT_CONNECT_SERVER: Self = Self(0x17002);
    pub const NETWORK_CONNECT_TIMEOUT: Self = Self(0x17003);
    pub const NETWORK_UNKNOWN: Self = Self(0x17004);

    pub const ACTIVE_KEY_IN_USE: Self = Self(0x19001);

    /// Generic description, independent of which call produced the code.
    pub fn describe(self) -> &'static str {
        match self {
            Self::OK => "success",
            Self::UNKNOWN => "unknown engine error",
            Self::INVALID_PARAM => "invalid parameter",
            Self::UNSUPPORTED => "operation not supported by engine configuration",
            Self::NO_MEMORY => "engine out of memory",
            Self::BAD_STATE => "engine in bad state",
            Self::MODEL_NOT_FOUND => "engine model files missing",
            Self::INVALID_FEATURE => "malformed feature vector",
            Self::IMAGE_FORMAT => "unsupported pixel format",
            Self::ACTIVATION_FAIL => "activation failed",
            Self::ALREADY_ACTIVATED => "already activated",
            Self::NOT_ACTIVATED => "engine not activated",
            Self::NETWORK_COULDNT_RESOLVE_HOST => "could not resolve activation host",
            Self::NETWORK_COULDNT_CONNECT_SERVER => "could not connect to activation server",
            Self::NETWORK_CONNECT_TIMEOUT => "activation server timed out",
            Self::NETWORK_UNKNOWN => "unknown network error",
            Self::ACTIVE_KEY_IN_USE => "activation key already used on another device",
            _ => "unrecognized engine code",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.describe(), self.0)
    }
}

/// Category of a failed activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFailure {
    Network,
    BadCredentials,
    QuotaExceeded,
    KeyInUse,
    PackageMismatch,
    DeviceNotAuthorized,
    LicenseExpired,
    LicenseFormat,
    Unknown,
}

impl ActivationFailure {
    /// Classify an activation code. Small codes are read in their
    /// activation-specific sense, not their generic one.
    pub fn from_code(code: ResultCode) -> Self {
        match code {
            ResultCode::NETWORK_COULDNT_RESOLVE_HOST
            | ResultCode::NETWORK_COULDNT_CONNECT_SERVER
            | ResultCode::NETWORK_CONNECT_TIMEOUT
            | ResultCode::NETWORK_UNKNOWN => Self::Network,
            ResultCode::ACTIVE_KEY_IN_USE => Self::KeyInUse,
            ResultCode(2) => Self::BadCredentials,
            ResultCode(3) => Self::QuotaExceeded,
            ResultCode(4) => Self::Network,
            ResultCode(5) => Self::PackageMismatch,
            ResultCode(6) => Self::DeviceNotAuthorized,
            ResultCode(7) => Self::LicenseExpired,
            ResultCode(8) => Self::LicenseFormat,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ActivationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Network => "network failure",
            Self::BadCredentials => "bad credentials",
            Self::QuotaExceeded => "quota exceeded",
            Self::KeyInUse => "key in use",
            Self::PackageMismatch => "package mismatch",
            Self::DeviceNotAuthorized => "device not authorized",
            Self::LicenseExpired => "license expired",
            Self::LicenseFormat => "license format",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Readable message for an activation code.
pub fn activation_message(code: ResultCode) -> String {
    let msg = match code {
        ResultCode::OK => "success",
        ResultCode::ALREADY_ACTIVATED => "already activated",
        ResultCode::NETWORK_COULDNT_RESOLVE_HOST => "network error - could not resolve host",
        ResultCode::NETWORK_COULDNT_CONNECT_SERVER => "network error - could not connect to server",
        ResultCode::NETWORK_CONNECT_TIMEOUT => "network timeout",
        ResultCode::NETWORK_UNKNOWN => "network error",
        ResultCode::ACTIVE_KEY_IN_USE => "key already activated on another device",
        ResultCode(2) => "invalid APP_ID or SDK_KEY - please check your credentials",
        ResultCode(3) => "activation quota exceeded",
        ResultCode(4) => "network connection failed",
        ResultCode(5) => "invalid package name - must match the registered application",
        ResultCode(6) => "device not authorized",
        ResultCode(7) => "license expired",
        ResultCode(8) => "invalid license format",
        other => {
            return format!(
                "activation failed (code: {}) - please check credentials and network",
                other.0
            )
        }
    };
    format!("{msg} (code {})", code.0)
}

/// Readable message for an engine initialization code.
pub fn init_message(code: ResultCode) -> String {
    match code {
        ResultCode::ACTIVATION_FAIL | ResultCode::NOT_ACTIVATED => {
            format!("activation required (code {})", code.0)
        }
        ResultCode::MODEL_NOT_FOUND
        | ResultCode::INVALID_PARAM
        | ResultCode::UNSUPPORTED
        | ResultCode::NO_MEMORY => code.to_string(),
        other => format!("unknown initialization error (code {})", other.0),
    }
}
