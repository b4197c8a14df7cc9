use crate::engine::{EngineHandle, Rejection};
use facebridge_core::{Credentials, DetectedFace, ExtractPurpose};
use std::path::PathBuf;
use zbus::interface;

pub const BUS_NAME: &str = "org.facebridge.Face1";
pub const OBJECT_PATH: &str = "/org/facebridge/Face1";

/// D-Bus interface for the facebridge daemon.
///
/// Bus name: org.facebridge.Face1
/// Object path: /org/facebridge/Face1
pub struct FaceService {
    engine: EngineHandle,
}

impl FaceService {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

/// Map a rejection onto a D-Bus error carrying `"<CODE>: <message>"`.
fn to_fdo(rejection: Rejection) -> zbus::fdo::Error {
    match rejection.code {
        "INVALID_CREDENTIALS" | "INVALID_PARAMETER" => {
            zbus::fdo::Error::InvalidArgs(rejection.to_string())
        }
        _ => zbus::fdo::Error::Failed(rejection.to_string()),
    }
}

fn faces_json(faces: &[DetectedFace]) -> zbus::fdo::Result<String> {
    serde_json::to_string(faces).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
}

#[interface(name = "org.facebridge.Face1")]
impl FaceService {
    /// Activate and initialize the engine. Repeated calls succeed.
    async fn initialize(
        &self,
        app_id: String,
        sdk_key: String,
        active_key: String,
    ) -> zbus::fdo::Result<bool> {
        tracing::info!("initialize requested");
        let credentials = Credentials::new(app_id, sdk_key, active_key);
        self.engine.initialize(credentials).await.map_err(to_fdo)
    }

    /// Release the engine.
    async fn shutdown(&self) -> zbus::fdo::Result<bool> {
        tracing::info!("shutdown requested");
        self.engine.shutdown().await.map_err(to_fdo)
    }

    /// Faces in the image, as a JSON array of `{left, top, right, bottom, orient}`.
    async fn detect_faces(&self, path: String) -> zbus::fdo::Result<String> {
        tracing::info!(path = %path, "detect_faces requested");
        let faces = self
            .engine
            .detect_faces(PathBuf::from(path))
            .await
            .map_err(to_fdo)?;
        faces_json(&faces)
    }

    /// Base64 feature of the first face. `purpose`: 0 register, 1 recognize.
    async fn extract_feature(&self, path: String, purpose: i32) -> zbus::fdo::Result<String> {
        tracing::info!(path = %path, purpose, "extract_feature requested");
        let purpose = ExtractPurpose::try_from(purpose).map_err(|e| to_fdo(e.into()))?;
        self.engine
            .extract_feature(PathBuf::from(path), purpose)
            .await
            .map_err(to_fdo)
    }

    async fn compare_features(&self, first: String, second: String) -> zbus::fdo::Result<f64> {
        tracing::info!(
            first_len = first.len(),
            second_len = second.len(),
            "compare_features requested"
        );
        let score = self
            .engine
            .compare_features(first, second)
            .await
            .map_err(to_fdo)?;
        Ok(f64::from(score))
    }

    async fn check_liveness(&self, path: String) -> zbus::fdo::Result<bool> {
        tracing::info!(path = %path, "check_liveness requested");
        self.engine
            .check_liveness(PathBuf::from(path))
            .await
            .map_err(to_fdo)
    }

    async fn estimate_age(&self, path: String) -> zbus::fdo::Result<i32> {
        tracing::info!(path = %path, "estimate_age requested");
        self.engine
            .estimate_age(PathBuf::from(path))
            .await
            .map_err(to_fdo)
    }

    /// `"male"`, `"female"` or `"unknown"`.
    async fn estimate_gender(&self, path: String) -> zbus::fdo::Result<String> {
        tracing::info!(path = %path, "estimate_gender requested");
        let gender = self
            .engine
            .estimate_gender(PathBuf::from(path))
            .await
            .map_err(to_fdo)?;
        Ok(gender.as_str().to_string())
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = self.engine.status().await.map_err(to_fdo)?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "initialized": status.initialized,
            "capabilities": status.capabilities,
            "max_faces": status.max_faces,
        })
        .to_string())
    }
}
