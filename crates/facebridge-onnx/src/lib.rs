//! facebridge-onnx: Face engine built on open ONNX models.
//!
//! SCRFD for detection, ArcFace for features, InsightFace genderage for age
//! and gender, and MiniFASNetV2 for liveness, all through ONNX Runtime on CPU.

pub mod alignment;
pub mod attributes;
pub mod detector;
pub mod engine;
pub mod recognizer;
pub mod types;

pub use engine::{default_model_dir, OnnxEngine, OnnxProvider};
pub use types::{BoundingBox, Embedding};
