//! facebridge-core: Engine facade for pluggable face-processing engines.
//!
//! Marshals image files into the engine's pixel format, drives detection,
//! feature extraction, comparison and per-face analysis through the
//! [`engine`] traits, and maps every engine result code into [`FaceError`].

pub mod codes;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod facade;
pub mod feature;
pub mod image;
pub mod types;

pub use codes::{ActivationFailure, ResultCode};
pub use credentials::Credentials;
pub use engine::{EngineProvider, EngineResult, FaceEngine};
pub use error::FaceError;
pub use facade::{FaceFacade, FacadeStatus};
pub use feature::FeatureVector;
pub use crate::image::{DecodedImage, FileImageLoader, ImageLoader, PixelBuffer, PixelFormat};
pub use types::{
    Capabilities, Capability, DetectMode, DetectedFace, EngineConfig, ExtractPurpose, Gender,
    Liveness, OrientPriority,
};
