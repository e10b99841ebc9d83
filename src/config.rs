use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio_system::effects::{duration_from_secs, FadeCurve, FadeSettings};
use crate::error::ConfigError;
use crate::timer::TimerMode;

/// Directory name under the platform config dir
pub const APP_DIR_NAME: &str = "AmbientMixer";

/// Platform config directory for the mixer (`<config_dir>/AmbientMixer`)
pub fn app_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Seconds a channel takes to fade in after play
    pub fade_in_secs: f64,

    /// Seconds a channel takes to fade out after pause
    pub fade_out_secs: f64,

    /// Seconds the sleep timer's group fade-out lasts
    pub timer_fade_out_secs: f64,

    /// Volume steps per second of fade
    pub steps_per_second: u32,

    pub curve: FadeCurve,

    /// Undo history length
    pub history_limit: usize,

    /// Timer armed at startup
    pub default_timer: TimerMode,

    /// Sound catalog used when none is given on the command line
    pub catalog_path: Option<String>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            fade_in_secs: 2.0,
            fade_out_secs: 1.0,
            timer_fade_out_secs: 3.0,
            steps_per_second: 50,
            curve: FadeCurve::SCurve,
            history_limit: 50,
            default_timer: TimerMode::Off,
            catalog_path: None,
        }
    }
}

impl MixerConfig {
    /// Load configuration from the platform-specific config directory.
    /// Creates default config if file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from an explicit path, writing defaults there if it is missing
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
            let config: MixerConfig =
                serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.display().to_string(),
                    source: Box::new(e),
                })?;
            config.validate()?;

            tracing::info!("Loaded config from: {}", path.display());
            Ok(config)
        } else {
            let config = MixerConfig::default();
            config.save_to(path)?;
            tracing::info!("Created default config at: {}", path.display());
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(app_config_dir()?.join("config.json"))
    }

    /// Reject durations and step rates the fade engine cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fade_settings()?;
        self.timer_fade_out()?;
        self.default_timer.validate()?;
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "history_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fade_settings(&self) -> Result<FadeSettings, ConfigError> {
        FadeSettings::from_secs(
            self.fade_in_secs,
            self.fade_out_secs,
            self.curve,
            self.steps_per_second,
        )
    }

    pub fn timer_fade_out(&self) -> Result<Duration, ConfigError> {
        duration_from_secs("timer_fade_out_secs", self.timer_fade_out_secs)
    }
}
