//! [`EngineProvider`] and [`FaceEngine`] implementations over the ONNX models.

use crate::attributes::{GenderAgeModel, LivenessModel};
use crate::detector::{iou, FaceDetector};
use crate::recognizer::FaceRecognizer;
use crate::types::{BoundingBox, Embedding};
use facebridge_core::{
    Capabilities, Capability, Credentials, DetectMode, DetectedFace, EngineConfig,
    EngineProvider, EngineResult, ExtractPurpose, FaceEngine, FeatureVector, Gender, Liveness,
    PixelBuffer, PixelFormat, ResultCode,
};
use std::path::PathBuf;
use std::sync::Mutex;

pub const DETECTOR_MODEL: &str = "det_10g.onnx";
pub const RECOGNIZER_MODEL: &str = "w600k_r50.onnx";
pub const GENDERAGE_MODEL: &str = "genderage.onnx";
pub const LIVENESS_MODEL: &str = "2.7_80x80_MiniFASNetV2.onnx";

/// A cached detection is reused for a caller-supplied rectangle when their
/// overlap exceeds this.
const LANDMARK_REUSE_IOU: f32 = 0.9;

/// Default model directory: `$XDG_DATA_HOME/facebridge/models`, falling back
/// to `~/.local/share/facebridge/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facebridge/models")
}

/// Creates [`OnnxEngine`]s from a model directory.
///
/// Activation is local: no licence server is contacted. The first call
/// succeeds and later calls report [`ResultCode::ALREADY_ACTIVATED`].
pub struct OnnxProvider {
    model_dir: PathBuf,
    activated_by: Mutex<Option<String>>,
}

impl OnnxProvider {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            activated_by: Mutex::new(None),
        }
    }

    fn model_path(&self, name: &str) -> PathBuf {
        self.model_dir.join(name)
    }
}

impl EngineProvider for OnnxProvider {
    fn activate(&self, credentials: &Credentials) -> EngineResult<()> {
        let mut activated = self
            .activated_by
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if activated.is_some() {
            return Err(ResultCode::ALREADY_ACTIVATED);
        }
        *activated = Some(credentials.app_id.clone());
        tracing::debug!(model_dir = %self.model_dir.display(), "local activation recorded");
        Ok(())
    }

    fn create(&self, config: &EngineConfig) -> EngineResult<Box<dyn FaceEngine>> {
        if config.max_faces == 0 || !config.capabilities.contains(Capability::Detect) {
            return Err(ResultCode::INVALID_PARAM);
        }
        if config.detect_mode != DetectMode::Image {
            return Err(ResultCode::UNSUPPORTED);
        }

        let caps = config.capabilities;
        let detector = FaceDetector::load(&self.model_path(DETECTOR_MODEL)).map_err(|e| {
            tracing::error!(error = %e, "detector load failed");
            e.code()
        })?;

        let recognizer = caps
            .contains(Capability::Recognition)
            .then(|| FaceRecognizer::load(&self.model_path(RECOGNIZER_MODEL)))
            .transpose()
            .map_err(|e| {
                tracing::error!(error = %e, "recognizer load failed");
                e.code()
            })?;

        let genderage = (caps.contains(Capability::Age) || caps.contains(Capability::Gender))
            .then(|| GenderAgeModel::load(&self.model_path(GENDERAGE_MODEL)))
            .transpose()
            .map_err(|e| {
                tracing::error!(error = %e, "genderage load failed");
                e.code()
            })?;

        let liveness = caps
            .contains(Capability::Liveness)
            .then(|| LivenessModel::load(&self.model_path(LIVENESS_MODEL)))
            .transpose()
            .map_err(|e| {
                tracing::error!(error = %e, "liveness load failed");
                e.code()
            })?;

        tracing::info!(
            model_dir = %self.model_dir.display(),
            max_faces = config.max_faces,
            "ONNX engine created"
        );

        Ok(Box::new(OnnxEngine {
            detector,
            recognizer,
            genderage,
            liveness,
            capabilities: caps,
            max_faces: config.max_faces as usize,
            last_detections: Vec::new(),
            results: AnalysisResults::default(),
        }))
    }
}

#[derive(Debug, Default)]
struct AnalysisResults {
    liveness: Vec<Liveness>,
    ages: Vec<i32>,
    genders: Vec<Gender>,
}

/// One engine instance with the models its capabilities need.
pub struct OnnxEngine {
    detector: FaceDetector,
    recognizer: Option<FaceRecognizer>,
    genderage: Option<GenderAgeModel>,
    liveness: Option<LivenessModel>,
    capabilities: Capabilities,
    max_faces: usize,
    /// Boxes from the last detection, for landmark lookup.
    last_detections: Vec<BoundingBox>,
    results: AnalysisResults,
}

impl OnnxEngine {
    /// Best known box for a caller rectangle: the cached detection with
    /// landmarks when one overlaps closely, else the bare rectangle.
    fn resolve(&self, face: &DetectedFace) -> BoundingBox {
        resolve_face(&self.last_detections, face)
    }
}

fn resolve_face(cached: &[BoundingBox], face: &DetectedFace) -> BoundingBox {
    let rect = BoundingBox::from_detected_face(face);
    cached
        .iter()
        .map(|b| (iou(b, &rect), b))
        .filter(|(overlap, _)| *overlap > LANDMARK_REUSE_IOU)
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, b)| b.clone())
        .unwrap_or(rect)
}

fn check_format(image: &PixelBuffer) -> EngineResult<()> {
    if image.format() != PixelFormat::Bgr24 {
        return Err(ResultCode::IMAGE_FORMAT);
    }
    Ok(())
}

impl FaceEngine for OnnxEngine {
    fn detect_faces(&mut self, image: &PixelBuffer) -> EngineResult<Vec<DetectedFace>> {
        check_format(image)?;
        let mut boxes = self.detector.detect(image).map_err(|e| {
            tracing::warn!(error = %e, "detection failed");
            e.code()
        })?;
        boxes.truncate(self.max_faces);

        let faces = boxes
            .iter()
            .map(|b| b.to_detected_face(image.width(), image.height()))
            .collect();
        self.last_detections = boxes;
        Ok(faces)
    }

    fn extract_feature(
        &mut self,
        image: &PixelBuffer,
        face: &DetectedFace,
        purpose: ExtractPurpose,
    ) -> EngineResult<FeatureVector> {
        check_format(image)?;
        let bbox = self.resolve(face);
        let recognizer = self.recognizer.as_mut().ok_or(ResultCode::UNSUPPORTED)?;

        let with_mirror = purpose == ExtractPurpose::Register;
        let embedding = recognizer.extract(image, &bbox, with_mirror).map_err(|e| {
            tracing::warn!(error = %e, "feature extraction failed");
            e.code()
        })?;
        Ok(embedding.to_feature())
    }

    fn compare_features(&mut self, a: &FeatureVector, b: &FeatureVector) -> EngineResult<f32> {
        compare(a, b)
    }

    fn process(
        &mut self,
        image: &PixelBuffer,
        faces: &[DetectedFace],
        capabilities: Capabilities,
    ) -> EngineResult<()> {
        check_format(image)?;
        self.results = AnalysisResults::default();
        if !self.capabilities.covers(capabilities) {
            return Err(ResultCode::UNSUPPORTED);
        }

        let boxes: Vec<BoundingBox> = faces.iter().map(|f| self.resolve(f)).collect();
        let mut results = AnalysisResults::default();

        if capabilities.contains(Capability::Liveness) {
            let model = self.liveness.as_mut().ok_or(ResultCode::UNSUPPORTED)?;
            for bbox in &boxes {
                let verdict = model.classify(image, bbox).map_err(|e| {
                    tracing::warn!(error = %e, "liveness inference failed");
                    e.code()
                })?;
                results.liveness.push(verdict);
            }
        }

        let want_age = capabilities.contains(Capability::Age);
        let want_gender = capabilities.contains(Capability::Gender);
        if want_age || want_gender {
            let model = self.genderage.as_mut().ok_or(ResultCode::UNSUPPORTED)?;
            for bbox in &boxes {
                let estimate = model.estimate(image, bbox).map_err(|e| {
                    tracing::warn!(error = %e, "genderage inference failed");
                    e.code()
                })?;
                if want_age {
                    results.ages.push(estimate.age);
                }
                if want_gender {
                    results.genders.push(estimate.gender);
                }
            }
        }

        self.results = results;
        Ok(())
    }

    fn liveness(&mut self) -> EngineResult<Vec<Liveness>> {
        Ok(self.results.liveness.clone())
    }

    fn ages(&mut self) -> EngineResult<Vec<i32>> {
        Ok(self.results.ages.clone())
    }

    fn genders(&mut self) -> EngineResult<Vec<Gender>> {
        Ok(self.results.genders.clone())
    }

    fn uninit(&mut self) -> EngineResult<()> {
        self.last_detections.clear();
        self.results = AnalysisResults::default();
        tracing::debug!("ONNX engine released");
        Ok(())
    }
}

/// Cosine similarity of two serialized embeddings, clamped to [0, 1].
fn compare(a: &FeatureVector, b: &FeatureVector) -> EngineResult<f32> {
    let (Some(a), Some(b)) = (Embedding::from_feature(a), Embedding::from_feature(b)) else {
        return Err(ResultCode::INVALID_FEATURE);
    };
    if a.values.len() != b.values.len() {
        return Err(ResultCode::INVALID_FEATURE);
    }
    Ok(a.similarity(&b).clamp(0.0, 1.0))
}
