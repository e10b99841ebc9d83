/// Channel primitive
///
/// The boundary between the mixer and whatever actually produces sound.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Stable identifier of a mixer channel (the sound's catalog id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A looping audio output with a play state and a volume.
///
/// Every call takes effect synchronously from the caller's point of view.
/// Implementations must be cheap to call from inside a fade step.
pub trait AudioChannel: Send + Sync {
    /// Start or resume playback. Returns false if the sound cannot be played.
    fn play(&self) -> bool;

    /// Pause playback, keeping the position
    fn pause(&self);

    /// Whether the channel is currently producing sound
    fn is_playing(&self) -> bool;

    /// Current volume (0.0-1.0)
    fn volume(&self) -> f32;

    /// Set volume (0.0-1.0)
    fn set_volume(&self, volume: f32);
}

#[derive(Debug, Default)]
struct MemoryState {
    playing: bool,
    volume: f32,
    fail_play: bool,
    play_calls: usize,
    pause_calls: usize,
    volume_writes: usize,
}

/// In-process channel that only records its state.
///
/// Used for headless runs and tests. It can be told to refuse playback, and
/// to stop as if the platform had paused it behind the mixer's back.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    state: Mutex<MemoryState>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose `play()` always fails
    pub fn failing() -> Self {
        let channel = Self::default();
        channel.set_fail_play(true);
        channel
    }

    pub fn set_fail_play(&self, fail: bool) {
        self.state.lock().fail_play = fail;
    }

    /// Stop playback without going through the mixer
    pub fn stop_externally(&self) {
        self.state.lock().playing = false;
    }

    pub fn play_calls(&self) -> usize {
        self.state.lock().play_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.state.lock().pause_calls
    }

    pub fn volume_writes(&self) -> usize {
        self.state.lock().volume_writes
    }
}

impl AudioChannel for MemoryChannel {
    fn play(&self) -> bool {
        let mut state = self.state.lock();
        state.play_calls += 1;
        if state.fail_play {
            state.playing = false;
            return false;
        }
        state.playing = true;
        true
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        state.pause_calls += 1;
        state.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn set_volume(&self, volume: f32) {
        let mut state = self.state.lock();
        state.volume_writes += 1;
        state.volume = volume.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_display() {
        let id = ChannelId::new("rain");
        assert_eq!(id.to_string(), "rain");
        assert_eq!(id.as_str(), "rain");
        assert_eq!(ChannelId::from("rain"), id);
    }

    #[test]
    fn test_memory_channel_play_pause() {
        let channel = MemoryChannel::new();
        assert!(!channel.is_playing());
        assert!(channel.play());
        assert!(channel.is_playing());
        channel.pause();
        assert!(!channel.is_playing());
        assert_eq!(channel.play_calls(), 1);
        assert_eq!(channel.pause_calls(), 1);
    }

    #[test]
    fn test_memory_channel_volume_clamped() {
        let channel = MemoryChannel::new();
        channel.set_volume(1.4);
        assert_eq!(channel.volume(), 1.0);
        channel.set_volume(-0.2);
        assert_eq!(channel.volume(), 0.0);
        assert_eq!(channel.volume_writes(), 2);
    }

    #[test]
    fn test_failing_channel_never_plays() {
        let channel = MemoryChannel::failing();
        assert!(!channel.play());
        assert!(!channel.is_playing());
    }

    #[test]
    fn test_external_stop() {
        let channel = MemoryChannel::new();
        channel.play();
        channel.stop_externally();
        assert!(!channel.is_playing());
        assert_eq!(channel.pause_calls(), 0);
    }
}
