/// Audio effects module
///
/// Fade curves, the per-channel fade controller, and volume levels.

pub mod curve;
pub mod fade;
pub mod volume;

use std::time::Duration;

pub use curve::FadeCurve;
pub use fade::{FadeController, FadeDirection, FadeOutcome};
pub use volume::VolumeLevel;

use crate::error::ConfigError;

/// Default step rate for fades (steps per second of fade duration)
pub const DEFAULT_STEPS_PER_SECOND: u32 = 50;

/// Fade configuration shared by every channel of a mixer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeSettings {
    /// Duration of a user-initiated fade in
    pub fade_in: Duration,

    /// Duration of a user-initiated fade out
    pub fade_out: Duration,

    /// Curve used for every step
    pub curve: FadeCurve,

    /// Volume writes per second of fade duration
    pub steps_per_second: u32,
}

impl Default for FadeSettings {
    fn default() -> Self {
        Self {
            fade_in: Duration::from_secs(2),
            fade_out: Duration::from_secs(1),
            curve: FadeCurve::default(),
            steps_per_second: DEFAULT_STEPS_PER_SECOND,
        }
    }
}

impl FadeSettings {
    /// Build settings from durations in seconds, rejecting values a fade cannot honour
    pub fn from_secs(
        fade_in_secs: f64,
        fade_out_secs: f64,
        curve: FadeCurve,
        steps_per_second: u32,
    ) -> Result<Self, ConfigError> {
        if steps_per_second == 0 {
            return Err(ConfigError::Invalid(
                "steps_per_second must be positive".to_string(),
            ));
        }

        Ok(Self {
            fade_in: duration_from_secs("fade_in_secs", fade_in_secs)?,
            fade_out: duration_from_secs("fade_out_secs", fade_out_secs)?,
            curve,
            steps_per_second,
        })
    }

    /// Set fade in duration
    pub fn with_fade_in(mut self, duration: Duration) -> Self {
        self.fade_in = duration;
        self
    }

    /// Set fade out duration
    pub fn with_fade_out(mut self, duration: Duration) -> Self {
        self.fade_out = duration;
        self
    }

    /// Set curve
    pub fn with_curve(mut self, curve: FadeCurve) -> Self {
        self.curve = curve;
        self
    }

    /// Set step rate (zero is raised to one)
    pub fn with_steps_per_second(mut self, steps: u32) -> Self {
        self.steps_per_second = steps.max(1);
        self
    }

    /// Number of volume writes for a fade of `duration`.
    ///
    /// Zero for an instantaneous fade, otherwise at least one.
    pub fn step_count(&self, duration: Duration) -> u32 {
        if duration.is_zero() {
            return 0;
        }
        let steps = (duration.as_secs_f64() * f64::from(self.steps_per_second)).ceil();
        (steps as u32).max(1)
    }
}

/// Convert a user-supplied seconds value into a `Duration`.
///
/// Non-finite and negative values are configuration errors.
pub fn duration_from_secs(field: &str, secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() {
        return Err(ConfigError::Invalid(format!(
            "{} must be a finite number of seconds (got {})",
            field, secs
        )));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| {
        ConfigError::Invalid(format!(
            "{} must be a non-negative number of seconds (got {})",
            field, secs
        ))
    })
}
