//! Ambient sound mixer core.
//!
//! Per-channel cancellable fades, a sleep timer that fades everything out
//! on expiry, and an undoable intent layer on top of a channel registry.

pub mod audio_system;
pub mod catalog;
pub mod config;
pub mod error;
pub mod messaging;
pub mod persistence;
pub mod timer;

pub use audio_system::{AudioChannel, ChannelId, FadeController, FadeCurve, FadeOutcome, Mixer};
pub use catalog::SoundCatalog;
pub use config::MixerConfig;
pub use error::{AppResult, AudioError, ConfigError, MixerError};
pub use messaging::{CommandInvoker, EventBus, Intent, MixerEvent};
pub use timer::{SleepTimer, TimerCoordinator, TimerMode};
