/// Volume level
///
/// A channel's preferred volume, the level fades in to.

use serde::{Deserialize, Serialize};

/// Volume multiplier in 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct VolumeLevel(f32);

impl VolumeLevel {
    pub const SILENT: VolumeLevel = VolumeLevel(0.0);
    pub const FULL: VolumeLevel = VolumeLevel(1.0);

    /// Create a new level, clamped into range (NaN becomes silence)
    pub fn new(level: f32) -> Self {
        if level.is_nan() {
            return Self::SILENT;
        }
        Self(level.clamp(0.0, 1.0))
    }

    /// Get the level
    pub fn get(&self) -> f32 {
        self.0
    }

    /// Check if muted
    pub fn is_muted(&self) -> bool {
        self.0 == 0.0
    }
}

impl Default for VolumeLevel {
    fn default() -> Self {
        Self::FULL
    }
}

impl From<f32> for VolumeLevel {
    fn from(level: f32) -> Self {
        Self::new(level)
    }
}

impl From<VolumeLevel> for f32 {
    fn from(level: VolumeLevel) -> Self {
        level.0
    }
}
