//! The engine boundary.
//!
//! A face engine is reached through two traits: [`EngineProvider`] for the
//! process-wide licensing step and for creating engine instances, and
//! [`FaceEngine`] for one initialized instance. Implementations report
//! failures as [`ResultCode`]s and never see facade concerns such as file
//! paths or Base64.

use crate::codes::ResultCode;
use crate::credentials::Credentials;
use crate::feature::FeatureVector;
use crate::image::PixelBuffer;
use crate::types::{Capabilities, DetectedFace, EngineConfig, ExtractPurpose, Gender, Liveness};

/// Engine call outcome. `Err` never holds [`ResultCode::OK`].
pub type EngineResult<T> = Result<T, ResultCode>;

/// Entry points that exist before any engine instance does.
pub trait EngineProvider: Send + Sync {
    /// One-time licensing handshake. Return `Err(ResultCode::ALREADY_ACTIVATED)`
    /// when the credentials were activated earlier; the facade treats that
    /// as success.
    fn activate(&self, credentials: &Credentials) -> EngineResult<()>;

    /// Create and initialize an engine instance with a fixed configuration.
    fn create(&self, config: &EngineConfig) -> EngineResult<Box<dyn FaceEngine>>;
}

/// One initialized engine instance. Not reentrant: callers serialize access.
pub trait FaceEngine: Send {
    /// Find faces in `image`. An empty list is a valid outcome.
    fn detect_faces(&mut self, image: &PixelBuffer) -> EngineResult<Vec<DetectedFace>>;

    /// Produce a feature vector for one detected face.
    fn extract_feature(
        &mut self,
        image: &PixelBuffer,
        face: &DetectedFace,
        purpose: ExtractPurpose,
    ) -> EngineResult<FeatureVector>;

    /// Similarity of two feature vectors; range is engine-defined.
    fn compare_features(&mut self, a: &FeatureVector, b: &FeatureVector) -> EngineResult<f32>;

    /// Run the analysis passes in `capabilities` over `faces`, replacing the
    /// engine's per-face result buffers.
    fn process(
        &mut self,
        image: &PixelBuffer,
        faces: &[DetectedFace],
        capabilities: Capabilities,
    ) -> EngineResult<()>;

    /// Liveness results from the most recent [`process`](Self::process) call.
    fn liveness(&mut self) -> EngineResult<Vec<Liveness>>;

    /// Age results from the most recent [`process`](Self::process) call.
    fn ages(&mut self) -> EngineResult<Vec<i32>>;

    /// Gender results from the most recent [`process`](Self::process) call.
    fn genders(&mut self) -> EngineResult<Vec<Gender>>;

    /// Release engine resources. The instance is dropped afterwards.
    fn uninit(&mut self) -> EngineResult<()>;
}
