//! ArcFace face recognizer via ONNX Runtime.
//!
//! Extracts 512-dimensional face embeddings from aligned face crops,
//! using the w600k_r50 ArcFace model.

use crate::alignment::{self, ALIGNED_SIZE};
use crate::types::{BoundingBox, Embedding};
use facebridge_core::{PixelBuffer, ResultCode};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (different from SCRFD!) ---
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // NOT 128.0: ArcFace uses symmetric normalization
const ARCFACE_EMBEDDING_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

impl RecognizerError {
    pub fn code(&self) -> ResultCode {
        match self {
            Self::ModelNotFound(_) => ResultCode::MODEL_NOT_FOUND,
            Self::InferenceFailed(_) | Self::Ort(_) => ResultCode::UNKNOWN,
        }
    }
}

/// ArcFace-based face recognizer.
pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    /// Extract an embedding for `face`.
    ///
    /// The face is aligned on its landmarks, or on landmarks estimated from
    /// the box when the detector supplied none. With `with_mirror`, the
    /// embedding of the horizontally flipped crop is averaged in.
    pub fn extract(
        &mut self,
        image: &PixelBuffer,
        face: &BoundingBox,
        with_mirror: bool,
    ) -> Result<Embedding, RecognizerError> {
        let landmarks = face
            .landmarks
            .unwrap_or_else(|| alignment::landmarks_from_box(face));

        let aligned = alignment::align_face(image, &landmarks);
        let embedding = self.embed(&aligned)?;

        if !with_mirror {
            return Ok(embedding);
        }
        let flipped = self.embed(&alignment::mirror(&aligned, ALIGNED_SIZE))?;
        Ok(embedding.averaged(&flipped))
    }

    fn embed(&mut self, aligned: &[u8]) -> Result<Embedding, RecognizerError> {
        let input = preprocess(aligned);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding::normalized(raw.to_vec()))
    }
}

/// Preprocess a 112x112 BGR aligned crop into a NCHW RGB float tensor.
fn preprocess(aligned_face: &[u8]) -> Array4<f32> {
    let size = ALIGNED_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for y in 0..size {
        for x in 0..size {
            let offset = (y * size + x) * 3;
            for c in 0..3 {
                let pixel = aligned_face.get(offset + 2 - c).copied().unwrap_or(0) as f32;
                tensor[[0, c, y, x]] = (pixel - ARCFACE_MEAN) / ARCFACE_STD;
            }
        }
    }

    tensor
}
