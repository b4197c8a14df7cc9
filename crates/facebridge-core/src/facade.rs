//! The engine facade.
//!
//! [`FaceFacade`] owns at most one engine handle behind a mutex. The handle
//! is created by the first successful [`initialize`](FaceFacade::initialize)
//! and released by [`shutdown`](FaceFacade::shutdown); every processing
//! operation holds the lock for its full duration, so engine calls never
//! overlap.

use crate::codes::ResultCode;
use crate::credentials::{redact, Credentials};
use crate::engine::{EngineProvider, EngineResult, FaceEngine};
use crate::error::FaceError;
use crate::feature::FeatureVector;
use crate::image::{FileImageLoader, ImageLoader, PixelBuffer, PixelFormat};
use crate::types::{
    Capabilities, Capability, DetectedFace, EngineConfig, ExtractPurpose, Gender, Liveness,
};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Snapshot of the facade state for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct FacadeStatus {
    pub initialized: bool,
    pub capabilities: Capabilities,
    pub max_faces: u32,
}

#[derive(Default)]
struct EngineState {
    engine: Option<Box<dyn FaceEngine>>,
    /// APP_ID that produced the live handle.
    app_id: Option<String>,
}

/// Operation boundaries, used to classify faults caught at entry points.
#[derive(Debug, Clone, Copy)]
enum Operation {
    Initialize,
    Shutdown,
    Detect,
    Extract,
    Compare,
    Analyze(Capability),
}

impl Operation {
    fn fault(self, message: String) -> FaceError {
        let message = format!("unexpected fault: {message}");
        match self {
            Operation::Initialize => FaceError::Init { code: None, message },
            Operation::Shutdown => FaceError::Uninit { code: None, message },
            Operation::Detect => FaceError::Detection { code: None, message },
            Operation::Extract => FaceError::Extraction { code: None, message },
            Operation::Compare => FaceError::Comparison { code: None, message },
            Operation::Analyze(capability) => FaceError::Processing {
                capability,
                code: None,
                message,
            },
        }
    }
}

/// Single point of contact between callers and a face engine.
pub struct FaceFacade {
    provider: Box<dyn EngineProvider>,
    loader: Box<dyn ImageLoader>,
    config: EngineConfig,
    state: Mutex<EngineState>,
}

impl FaceFacade {
    /// Create an uninitialized facade that decodes images from disk.
    pub fn new(provider: impl EngineProvider + 'static, config: EngineConfig) -> Self {
        Self {
            provider: Box::new(provider),
            loader: Box::new(FileImageLoader),
            config,
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Replace the image loader.
    pub fn with_loader(mut self, loader: impl ImageLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn status(&self) -> FacadeStatus {
        let state = self.lock();
        FacadeStatus {
            initialized: state.engine.is_some(),
            capabilities: self.config.capabilities,
            max_faces: self.config.max_faces,
        }
    }

    /// Activate and initialize the engine.
    ///
    /// Idempotent: "already activated" counts as success. While an engine
    /// handle is live, repeat calls only validate the credentials and keep
    /// that handle; activation is not attempted again.
    pub fn initialize(&self, credentials: &Credentials) -> Result<(), FaceError> {
        self.guarded(Operation::Initialize, || self.run_initialize(credentials))
    }

    /// Release the engine handle. Succeeds trivially when none exists.
    pub fn shutdown(&self) -> Result<(), FaceError> {
        self.guarded(Operation::Shutdown, || self.run_shutdown())
    }

    /// Detect all faces in the image at `path`.
    pub fn detect_faces(&self, path: impl AsRef<Path>) -> Result<Vec<DetectedFace>, FaceError> {
        let path = path.as_ref();
        self.guarded(Operation::Detect, || {
            self.with_pixels(path, |engine, pixels| {
                let faces = engine.detect_faces(pixels).map_err(FaceError::detection)?;
                tracing::debug!(path = %path.display(), faces = faces.len(), "faces detected");
                Ok(faces)
            })
        })
    }

    /// Extract the feature of the first detected face, Base64-encoded.
    pub fn extract_feature(
        &self,
        path: impl AsRef<Path>,
        purpose: ExtractPurpose,
    ) -> Result<String, FaceError> {
        let path = path.as_ref();
        self.guarded(Operation::Extract, || {
            self.with_pixels(path, |engine, pixels| {
                let faces = detect_required(engine, pixels)?;
                let feature = engine
                    .extract_feature(pixels, &faces[0], purpose)
                    .map_err(FaceError::extraction)?;
                tracing::debug!(
                    path = %path.display(),
                    ?purpose,
                    len = feature.len(),
                    "feature extracted"
                );
                Ok(feature.to_base64())
            })
        })
    }

    /// Compare two Base64-encoded features and return the engine's score.
    pub fn compare_features(&self, first: &str, second: &str) -> Result<f32, FaceError> {
        self.guarded(Operation::Compare, || {
            let mut state = self.lock();
            let engine = state
                .engine
                .as_deref_mut()
                .ok_or(FaceError::NotInitialized)?;

            let a = decode_feature("first", first)?;
            let b = decode_feature("second", second)?;
            tracing::debug!(first_len = a.len(), second_len = b.len(), "comparing features");

            engine.compare_features(&a, &b).map_err(FaceError::comparison)
        })
    }

    /// Whether the first detected face is a live subject.
    pub fn check_liveness(&self, path: impl AsRef<Path>) -> Result<bool, FaceError> {
        let result = self.analyze(path.as_ref(), Capability::Liveness, |e| e.liveness())?;
        Ok(result == Some(Liveness::Alive))
    }

    /// Estimated age of the first detected face, `0` when the engine has none.
    pub fn estimate_age(&self, path: impl AsRef<Path>) -> Result<i32, FaceError> {
        let result = self.analyze(path.as_ref(), Capability::Age, |e| e.ages())?;
        Ok(result.unwrap_or(0))
    }

    /// Estimated gender of the first detected face.
    pub fn estimate_gender(&self, path: impl AsRef<Path>) -> Result<Gender, FaceError> {
        let result = self.analyze(path.as_ref(), Capability::Gender, |e| e.genders())?;
        Ok(result.unwrap_or(Gender::Unknown))
    }

    fn run_initialize(&self, credentials: &Credentials) -> Result<(), FaceError> {
        credentials.validate()?;

        tracing::info!(
            app_id = %redact(&credentials.app_id),
            sdk_key = %redact(&credentials.sdk_key),
            active_key = %redact(&credentials.active_key),
            "initializing face engine"
        );

        let mut state = self.lock();

        if state.engine.is_some() {
            if let Some(active) = state.app_id.as_deref() {
                if active != credentials.app_id {
                    tracing::warn!(
                        active = %redact(active),
                        requested = %redact(&credentials.app_id),
                        "engine already running under a different APP_ID; keeping the existing license"
                    );
                }
            }
            tracing::info!("engine already initialized; keeping existing handle");
            return Ok(());
        }

        match self.provider.activate(credentials) {
            Ok(()) => tracing::info!("engine activated"),
            Err(ResultCode::ALREADY_ACTIVATED) => tracing::info!("engine already activated"),
            Err(code) => {
                let err = FaceError::activation(code);
                tracing::error!(code = code.0, error = %err, "engine activation failed");
                return Err(err);
            }
        }

        let engine = self.provider.create(&self.config).map_err(|code| {
            let err = FaceError::init(code);
            tracing::error!(code = code.0, error = %err, "engine init failed");
            err
        })?;

        state.engine = Some(engine);
        state.app_id = Some(credentials.app_id.clone());

        tracing::info!(
            max_faces = self.config.max_faces,
            capabilities = ?self.config.capabilities.iter().collect::<Vec<_>>(),
            "face engine initialized"
        );
        Ok(())
    }

    fn run_shutdown(&self) -> Result<(), FaceError> {
        let mut state = self.lock();
        state.app_id = None;
        let Some(mut engine) = state.engine.take() else {
            tracing::debug!("shutdown without an engine; nothing to release");
            return Ok(());
        };

        let result = engine.uninit();
        drop(engine);

        match result {
            Ok(()) => {
                tracing::info!("face engine released");
                Ok(())
            }
            Err(code) => {
                tracing::warn!(code = code.0, "engine uninit reported failure; handle dropped");
                Err(FaceError::uninit(code))
            }
        }
    }

    /// Shared pipeline for the single-capability analysis operations.
    fn analyze<T>(
        &self,
        path: &Path,
        capability: Capability,
        fetch: impl FnOnce(&mut dyn FaceEngine) -> EngineResult<Vec<T>>,
    ) -> Result<Option<T>, FaceError> {
        self.guarded(Operation::Analyze(capability), || {
            self.with_pixels(path, |engine, pixels| {
                let faces = detect_required(engine, pixels)?;
                engine
                    .process(pixels, &faces, Capabilities::from(capability))
                    .map_err(|code| FaceError::processing(capability, code))?;

                match fetch(engine) {
                    Ok(results) => {
                        if results.is_empty() {
                            tracing::debug!(%capability, "engine returned no per-face results");
                        }
                        Ok(results.into_iter().next())
                    }
                    Err(code) => {
                        tracing::warn!(
                            %capability,
                            code = code.0,
                            "fetching per-face results failed; using default"
                        );
                        Ok(None)
                    }
                }
            })
        })
    }

    /// Lock the engine, decode `path`, convert it, and run `f`.
    ///
    /// The initialization check happens before any decoding. The decoded
    /// image is dropped as soon as the pixel buffer exists.
    fn with_pixels<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&mut dyn FaceEngine, &PixelBuffer) -> Result<T, FaceError>,
    ) -> Result<T, FaceError> {
        let mut state = self.lock();
        let engine = state
            .engine
            .as_deref_mut()
            .ok_or(FaceError::NotInitialized)?;

        let pixels = {
            let decoded = self.loader.load(path)?;
            decoded.to_pixel_buffer(PixelFormat::Bgr24)?
        };

        f(engine, &pixels)
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("engine lock poisoned by an earlier fault; recovering");
            poisoned.into_inner()
        })
    }

    /// Run `body`, turning a panic into the operation's error category.
    fn guarded<T>(
        &self,
        operation: Operation,
        body: impl FnOnce() -> Result<T, FaceError>,
    ) -> Result<T, FaceError> {
        match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(?operation, panic = %message, "engine call panicked");
                Err(operation.fault(message))
            }
        }
    }
}

/// Detection step of the per-face pipelines. A failed detect call counts
/// as finding no face; only [`FaceFacade::detect_faces`] reports it.
fn detect_required(
    engine: &mut dyn FaceEngine,
    pixels: &PixelBuffer,
) -> Result<Vec<DetectedFace>, FaceError> {
    let faces = engine.detect_faces(pixels).map_err(|code| {
        tracing::warn!(code = code.0, "face detection failed; treating as no face");
        FaceError::NoFaceDetected
    })?;
    if faces.is_empty() {
        return Err(FaceError::NoFaceDetected);
    }
    Ok(faces)
}

fn decode_feature(side: &str, text: &str) -> Result<FeatureVector, FaceError> {
    if text.trim().is_empty() {
        return Err(FaceError::InvalidParameter(format!(
            "{side} feature is null or empty"
        )));
    }
    FeatureVector::from_base64(text).map_err(|e| FaceError::Comparison {
        code: None,
        message: format!("{side} feature is not valid Base64: {e}"),
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
