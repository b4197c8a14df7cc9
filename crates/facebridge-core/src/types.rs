use crate::error::FaceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A face found by the engine: pixel rectangle plus engine-defined orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub orient: i32,
}

impl DetectedFace {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Extraction mode. Both sides of a comparison must use the same purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractPurpose {
    Register,
    Recognize,
}

impl TryFrom<i32> for ExtractPurpose {
    type Error = FaceError;

    /// Host integer encoding: `0` = register, `1` = recognize.
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Register),
            1 => Ok(Self::Recognize),
            other => Err(FaceError::InvalidParameter(format!(
                "extract purpose must be 0 (register) or 1 (recognize), got {other}"
            ))),
        }
    }
}

impl FromStr for ExtractPurpose {
    type Err = FaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "register" | "0" => Ok(Self::Register),
            "recognize" | "1" => Ok(Self::Recognize),
            other => Err(FaceError::InvalidParameter(format!(
                "unknown extract purpose: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Alive,
    NotAlive,
    Unknown,
}

/// One engine capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Detect,
    Recognition,
    Liveness,
    Age,
    Gender,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Detect,
        Capability::Recognition,
        Capability::Liveness,
        Capability::Age,
        Capability::Gender,
    ];

    fn bit(self) -> u32 {
        match self {
            Capability::Detect => 1 << 0,
            Capability::Recognition => 1 << 2,
            Capability::Liveness => 1 << 3,
            Capability::Age => 1 << 4,
            Capability::Gender => 1 << 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Detect => "detect",
            Capability::Recognition => "recognition",
            Capability::Liveness => "liveness",
            Capability::Age => "age",
            Capability::Gender => "gender",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = FaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FaceError::InvalidParameter(format!("unknown capability: {s}")))
    }
}

/// Set of capabilities the engine prepares at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const NONE: Self = Self(0);

    pub fn all() -> Self {
        Capability::ALL.into_iter().collect()
    }

    pub fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// True when every capability in `other` is also in `self`.
    pub fn covers(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }

    /// Parse a comma-separated list such as `"detect,recognition,age"`.
    pub fn parse_list(list: &str) -> Result<Self, FaceError> {
        list.split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<Capability>)
            .collect()
    }
}

impl From<Capability> for Capabilities {
    fn from(capability: Capability) -> Self {
        Self(capability.bit())
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Capabilities::with)
    }
}

impl Serialize for Capabilities {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(|c| c.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectMode {
    /// Still images; each call is independent.
    Image,
    /// Frame streams with tracking between calls.
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrientPriority {
    /// Upright faces only. No engine here searches rotated orientations.
    Up,
}

/// Fixed engine setup. Changing any field requires reinitializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub detect_mode: DetectMode,
    pub orient_priority: OrientPriority,
    pub max_faces: u32,
    pub capabilities: Capabilities,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detect_mode: DetectMode::Image,
            orient_priority: OrientPriority::Up,
            max_faces: 2,
            capabilities: Capabilities::all(),
        }
    }
}
