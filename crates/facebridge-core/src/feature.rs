use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Opaque engine-produced face signature.
///
/// The bytes are never interpreted here. The text form is standard Base64
/// with padding and no line wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureVector(Vec<u8>);

impl FeatureVector {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    /// Decode the transport form. Surrounding whitespace is ignored.
    pub fn from_base64(text: &str) -> Result<Self, base64::DecodeError> {
        BASE64.decode(text.trim()).map(Self)
    }
}

impl From<Vec<u8>> for FeatureVector {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
