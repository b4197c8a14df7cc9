//! Per-face attribute models: InsightFace gender/age and MiniFASNet anti-spoofing.

use crate::alignment;
use crate::types::BoundingBox;
use facebridge_core::{Gender, Liveness, PixelBuffer, ResultCode};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const GENDERAGE_INPUT_SIZE: usize = 96;
const GENDERAGE_BOX_SCALE: f32 = 1.5;
// The exported genderage graph normalizes internally.
const GENDERAGE_MEAN: f32 = 0.0;
const GENDERAGE_STD: f32 = 1.0;
const GENDERAGE_AGE_SCALE: f32 = 100.0;

const LIVENESS_INPUT_SIZE: usize = 80;
const LIVENESS_BOX_SCALE: f32 = 2.7;
const LIVENESS_LIVE_CLASS: usize = 1;
const LIVENESS_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum AttributeError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

impl AttributeError {
    pub fn code(&self) -> ResultCode {
        match self {
            Self::ModelNotFound(_) => ResultCode::MODEL_NOT_FOUND,
            Self::InferenceFailed(_) | Self::Ort(_) => ResultCode::UNKNOWN,
        }
    }
}

/// Age and gender for one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenderAge {
    pub gender: Gender,
    pub age: i32,
}

fn load_session(model_path: &Path, kind: &str) -> Result<Session, AttributeError> {
    if !model_path.exists() {
        return Err(AttributeError::ModelNotFound(
            model_path.display().to_string(),
        ));
    }

    let session = Session::builder()?
        .with_intra_threads(1)?
        .commit_from_file(model_path)?;

    tracing::info!(
        path = %model_path.display(),
        model = kind,
        outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
        "loaded attribute model"
    );
    Ok(session)
}

fn run_single_output(session: &mut Session, input: Array4<f32>) -> Result<Vec<f32>, AttributeError> {
    let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
    let (_, data) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| AttributeError::InferenceFailed(e.to_string()))?;
    Ok(data.to_vec())
}

/// InsightFace `genderage` model.
pub struct GenderAgeModel {
    session: Session,
}

impl GenderAgeModel {
    pub fn load(model_path: &Path) -> Result<Self, AttributeError> {
        Ok(Self {
            session: load_session(model_path, "genderage")?,
        })
    }

    pub fn estimate(&mut self, image: &PixelBuffer, face: &BoundingBox) -> Result<GenderAge, AttributeError> {
        let crop = alignment::crop_scaled(image, face, GENDERAGE_BOX_SCALE, GENDERAGE_INPUT_SIZE);
        let input = to_tensor(&crop, GENDERAGE_INPUT_SIZE, true, GENDERAGE_MEAN, GENDERAGE_STD);
        let output = run_single_output(&mut self.session, input)?;
        parse_genderage(&output)
    }
}

/// Output layout: `[female_score, male_score, age / 100]`.
fn parse_genderage(output: &[f32]) -> Result<GenderAge, AttributeError> {
    let [female, male, age_scale] = output else {
        return Err(AttributeError::InferenceFailed(format!(
            "genderage: expected 3 outputs, got {}",
            output.len()
        )));
    };

    let gender = if male > female {
        Gender::Male
    } else {
        Gender::Female
    };
    let age = (age_scale * GENDERAGE_AGE_SCALE).round().max(0.0) as i32;

    tracing::debug!(female, male, age, "genderage estimate");
    Ok(GenderAge { gender, age })
}

/// MiniFASNetV2 passive anti-spoofing model.
pub struct LivenessModel {
    session: Session,
}

impl LivenessModel {
    pub fn load(model_path: &Path) -> Result<Self, AttributeError> {
        Ok(Self {
            session: load_session(model_path, "minifasnet")?,
        })
    }

    pub fn classify(&mut self, image: &PixelBuffer, face: &BoundingBox) -> Result<Liveness, AttributeError> {
        let crop = alignment::crop_scaled(image, face, LIVENESS_BOX_SCALE, LIVENESS_INPUT_SIZE);
        // MiniFASNet takes BGR in raw 0-255 range.
        let input = to_tensor(&crop, LIVENESS_INPUT_SIZE, false, 0.0, 1.0);
        let logits = run_single_output(&mut self.session, input)?;
        classify_liveness(&logits)
    }
}

fn classify_liveness(logits: &[f32]) -> Result<Liveness, AttributeError> {
    if logits.len() <= LIVENESS_LIVE_CLASS {
        return Err(AttributeError::InferenceFailed(format!(
            "liveness: expected at least {} logits, got {}",
            LIVENESS_LIVE_CLASS + 1,
            logits.len()
        )));
    }

    let probs = softmax(logits);
    let live = probs[LIVENESS_LIVE_CLASS];
    tracing::debug!(live, "liveness score");

    Ok(if live > LIVENESS_THRESHOLD {
        Liveness::Alive
    } else {
        Liveness::NotAlive
    })
}

/// Pack a square BGR crop into NCHW, optionally swapping to RGB.
fn to_tensor(crop: &[u8], size: usize, rgb: bool, mean: f32, std: f32) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let offset = (y * size + x) * 3;
            for c in 0..3 {
                let src = if rgb { 2 - c } else { c };
                let pixel = crop.get(offset + src).copied().unwrap_or(0) as f32;
                tensor[[0, c, y, x]] = (pixel - mean) / std;
            }
        }
    }
    tensor
}

fn softmax(x: &[f32]) -> Vec<f32> {
    let max_val = x.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp_vals: Vec<f32> = x.iter().map(|v| (v - max_val).exp()).collect();
    let sum: f32 = exp_vals.iter().sum();
    exp_vals.iter().map(|v| v / sum).collect()
}
