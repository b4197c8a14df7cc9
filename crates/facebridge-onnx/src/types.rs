use facebridge_core::{DetectedFace, FeatureVector};

/// Bytes per serialized embedding component (`f32`, little-endian).
const COMPONENT_BYTES: usize = 4;

/// Orientation value reported for upright faces.
pub const ORIENT_UP: i32 = 1;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// Integer rectangle clamped to an image of `width`×`height`.
    pub fn to_detected_face(&self, width: u32, height: u32) -> DetectedFace {
        let clamp_x = |v: f32| (v.round() as i32).clamp(0, width as i32);
        let clamp_y = |v: f32| (v.round() as i32).clamp(0, height as i32);
        DetectedFace {
            left: clamp_x(self.x),
            top: clamp_y(self.y),
            right: clamp_x(self.x + self.width),
            bottom: clamp_y(self.y + self.height),
            orient: ORIENT_UP,
        }
    }

    /// Box without landmarks covering a caller-supplied rectangle.
    pub fn from_detected_face(face: &DetectedFace) -> Self {
        Self {
            x: face.left as f32,
            y: face.top as f32,
            width: face.width() as f32,
            height: face.height() as f32,
            confidence: 1.0,
            landmarks: None,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// L2-normalized ArcFace embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Normalize `raw` to unit length. A zero vector is kept as is.
    pub fn normalized(raw: Vec<f32>) -> Self {
        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            raw.iter().map(|x| x / norm).collect()
        } else {
            raw
        };
        Self { values }
    }

    /// Component-wise mean of two embeddings, renormalized.
    pub fn averaged(&self, other: &Embedding) -> Self {
        let raw = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a + b) / 2.0)
            .collect();
        Self::normalized(raw)
    }

    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }

    pub fn to_feature(&self) -> FeatureVector {
        let bytes = self
            .values
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        FeatureVector::new(bytes)
    }

    /// Parse a feature produced by [`to_feature`](Self::to_feature).
    /// Returns `None` for empty input or a length that is not a whole
    /// number of components.
    pub fn from_feature(feature: &FeatureVector) -> Option<Self> {
        let bytes = feature.as_bytes();
        if bytes.is_empty() || bytes.len() % COMPONENT_BYTES != 0 {
            return None;
        }
        let values = bytes
            .chunks_exact(COMPONENT_BYTES)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Some(Self { values })
    }
}
