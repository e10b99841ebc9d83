/// Sleep timer modes
///
/// The durations offered to the user, plus "off".
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    #[default]
    Off,
    FiveMinutes,
    TenMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    SixtyMinutes,
    TwoHours,
    ThreeHours,
    FourHours,
    FiveHours,
    SixHours,
    SevenHours,
    EightHours,
    /// Any other positive duration
    Custom { seconds: u64 },
}

impl TimerMode {
    /// Presets in menu order
    pub fn presets() -> &'static [TimerMode] {
        &[
            TimerMode::Off,
            TimerMode::FiveMinutes,
            TimerMode::TenMinutes,
            TimerMode::FifteenMinutes,
            TimerMode::ThirtyMinutes,
            TimerMode::SixtyMinutes,
            TimerMode::TwoHours,
            TimerMode::ThreeHours,
            TimerMode::FourHours,
            TimerMode::FiveHours,
            TimerMode::SixHours,
            TimerMode::SevenHours,
            TimerMode::EightHours,
        ]
    }

    /// Countdown length, `None` for off
    pub fn duration(&self) -> Option<Duration> {
        let minutes = match self {
            TimerMode::Off => return None,
            TimerMode::FiveMinutes => 5,
            TimerMode::TenMinutes => 10,
            TimerMode::FifteenMinutes => 15,
            TimerMode::ThirtyMinutes => 30,
            TimerMode::SixtyMinutes => 60,
            TimerMode::TwoHours => 120,
            TimerMode::ThreeHours => 180,
            TimerMode::FourHours => 240,
            TimerMode::FiveHours => 300,
            TimerMode::SixHours => 360,
            TimerMode::SevenHours => 420,
            TimerMode::EightHours => 480,
            TimerMode::Custom { seconds } => return Some(Duration::from_secs(*seconds)),
        };
        Some(Duration::from_secs(minutes * 60))
    }

    pub fn is_off(&self) -> bool {
        matches!(self, TimerMode::Off)
    }

    /// The only check the timer needs: off, or a positive duration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.duration() {
            Some(duration) if duration.is_zero() => Err(ConfigError::Invalid(
                "sleep timer duration must be positive".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Mode for an exact duration, preferring a preset when one matches
    pub fn from_duration(duration: Duration) -> Self {
        Self::presets()
            .iter()
            .copied()
            .find(|mode| mode.duration() == Some(duration))
            .unwrap_or(TimerMode::Custom {
                seconds: duration.as_secs(),
            })
    }

    /// Parse `off`, a bare number of minutes, or a number with an `s`, `m` or `h` suffix
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim().to_lowercase();
        if input == "off" {
            return Some(TimerMode::Off);
        }

        let (digits, unit_secs) = match input.chars().last()? {
            's' => (&input[..input.len() - 1], 1),
            'm' => (&input[..input.len() - 1], 60),
            'h' => (&input[..input.len() - 1], 3600),
            _ => (input.as_str(), 60),
        };
        let amount: u64 = digits.trim().parse().ok()?;
        Some(Self::from_duration(Duration::from_secs(
            amount.checked_mul(unit_secs)?,
        )))
    }

    /// Human-readable label
    pub fn label(&self) -> String {
        match self {
            TimerMode::Off => "Off".to_string(),
            TimerMode::FiveMinutes => "5 minutes".to_string(),
            TimerMode::TenMinutes => "10 minutes".to_string(),
            TimerMode::FifteenMinutes => "15 minutes".to_string(),
            TimerMode::ThirtyMinutes => "30 minutes".to_string(),
            TimerMode::SixtyMinutes => "60 minutes".to_string(),
            TimerMode::TwoHours => "2 hours".to_string(),
            TimerMode::ThreeHours => "3 hours".to_string(),
            TimerMode::FourHours => "4 hours".to_string(),
            TimerMode::FiveHours => "5 hours".to_string(),
            TimerMode::SixHours => "6 hours".to_string(),
            TimerMode::SevenHours => "7 hours".to_string(),
            TimerMode::EightHours => "8 hours".to_string(),
            TimerMode::Custom { seconds } => format!("{} seconds", seconds),
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
