/// Audio system module
///
/// Several looping channels play at once, each with its own fade controller.
///
/// ## Architecture
///
/// ```text
/// Mixer
///   ├── ChannelHandle (rain)  ─┐
///   ├── ChannelHandle (wind)  ─┤ Simultaneous
///   └── ChannelHandle (fire)  ─┘ Playback
///
/// Each ChannelHandle has:
///   ├── FadeController (one cancellable fade at a time)
///   ├── preferred volume
///   └── AudioChannel (RodioChannel, or MemoryChannel when headless)
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// use ambient_mixer::audio_system::{Mixer, MemoryChannel};
///
/// let mixer = Mixer::new(FadeSettings::default(), EventBus::new());
/// mixer.add_channel("rain", "Rain", Arc::new(MemoryChannel::new()), 0.7)?;
///
/// // Fades in over the configured duration
/// mixer.play(&ChannelId::new("rain"))?;
///
/// // Later: fade it back out and pause
/// mixer.fade_out(&ChannelId::new("rain"), Duration::from_secs(3))?.await?;
/// ```
pub mod channel;
pub mod effects;
pub mod manager;
pub mod player;

// Re-export commonly used types
pub use channel::{AudioChannel, ChannelId, MemoryChannel};
pub use effects::{FadeController, FadeCurve, FadeDirection, FadeOutcome, FadeSettings, VolumeLevel};
pub use manager::{ChannelHandle, Mixer};
pub use player::RodioChannel;
