use crate::codes::{self, ActivationFailure, ResultCode};
use crate::image::PixelFormat;
use crate::types::Capability;
use std::path::PathBuf;
use thiserror::Error;

/// Every way a facade operation can fail.
///
/// Variants that originate in the engine keep the [`ResultCode`] for
/// diagnostics; `code: None` marks a failure that never reached the engine
/// or a fault caught at the operation boundary.
#[derive(Error, Debug)]
pub enum FaceError {
    #[error("{field} is invalid or not configured: {reason}")]
    Credential {
        field: &'static str,
        reason: &'static str,
    },
    #[error("engine activation failed ({kind}): {message}")]
    Activation {
        code: ResultCode,
        kind: ActivationFailure,
        message: String,
    },
    #[error("engine init failed: {message}")]
    Init {
        code: Option<ResultCode>,
        message: String,
    },
    #[error("engine uninit failed: {message}")]
    Uninit {
        code: Option<ResultCode>,
        message: String,
    },
    #[error("face engine not initialized, call initialize() first")]
    NotInitialized,
    #[error("failed to load image {}: {reason}", .path.display())]
    ImageLoad { path: PathBuf, reason: String },
    #[error("failed to convert image to {format}: {reason}")]
    FormatConversion { format: PixelFormat, reason: String },
    #[error("face detection failed: {message}")]
    Detection {
        code: Option<ResultCode>,
        message: String,
    },
    #[error("no face detected in image")]
    NoFaceDetected,
    #[error("feature extraction failed: {message}")]
    Extraction {
        code: Option<ResultCode>,
        message: String,
    },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("face comparison failed: {message}")]
    Comparison {
        code: Option<ResultCode>,
        message: String,
    },
    #[error("{capability} analysis failed: {message}")]
    Processing {
        capability: Capability,
        code: Option<ResultCode>,
        message: String,
    },
}

impl FaceError {
    pub fn activation(code: ResultCode) -> Self {
        Self::Activation {
            code,
            kind: ActivationFailure::from_code(code),
            message: codes::activation_message(code),
        }
    }

    pub fn init(code: ResultCode) -> Self {
        Self::Init {
            code: Some(code),
            message: codes::init_message(code),
        }
    }

    pub fn uninit(code: ResultCode) -> Self {
        Self::Uninit {
            code: Some(code),
            message: code.to_string(),
        }
    }

    pub fn detection(code: ResultCode) -> Self {
        Self::Detection {
            code: Some(code),
            message: code.to_string(),
        }
    }

    pub fn extraction(code: ResultCode) -> Self {
        Self::Extraction {
            code: Some(code),
            message: code.to_string(),
        }
    }

    pub fn comparison(code: ResultCode) -> Self {
        Self::Comparison {
            code: Some(code),
            message: code.to_string(),
        }
    }

    pub fn processing(capability: Capability, code: ResultCode) -> Self {
        Self::Processing {
            capability,
            code: Some(code),
            message: code.to_string(),
        }
    }

    /// Stable tag used when the error crosses the host boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Credential { .. } => "INVALID_CREDENTIALS",
            Self::Activation { .. } => "ACTIVE_ERROR",
            Self::Init { .. } => "INIT_ERROR",
            Self::Uninit { .. } => "UNINIT_ERROR",
            Self::NotInitialized => "ENGINE_NOT_INIT",
            Self::ImageLoad { .. } => "IMAGE_LOAD_ERROR",
            Self::FormatConversion { .. } => "TRANSFORM_ERROR",
            Self::Detection { .. } => "DETECT_ERROR",
            Self::NoFaceDetected => "NO_FACE",
            Self::Extraction { .. } => "EXTRACT_ERROR",
            Self::InvalidParameter(_) => "INVALID_PARAMETER",
            Self::Comparison { .. } => "COMPARE_ERROR",
            Self::Processing { .. } => "PROCESS_ERROR",
        }
    }

    /// Engine code behind this error, if any.
    pub fn result_code(&self) -> Option<ResultCode> {
        match self {
            Self::Activation { code, .. } => Some(*code),
            Self::Init { code, .. }
            | Self::Uninit { code, .. }
            | Self::Detection { code, .. }
            | Self::Extraction { code, .. }
            | Self::Comparison { code, .. }
            | Self::Processing { code, .. } => *code,
            _ => None,
        }
    }
}
