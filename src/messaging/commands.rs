/// Channel intents and their undo history
///
/// Intents are requests to change one channel (imperative). Recorded intents
/// carry a snapshot of the channel taken just before they ran, which is all
/// undo needs to put the channel back.
use std::time::Duration;

use crate::audio_system::channel::ChannelId;

/// Who asked for an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntentOrigin {
    /// A tap or drag in a UI
    #[default]
    User,

    /// Lock-screen / media-key remote control
    Remote,

    /// The platform audio session
    Session,

    /// The sleep timer
    Timer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntentKind {
    /// Fade in to the channel's preferred volume
    Play,

    /// Fade out, then pause
    Pause,

    /// Pause and silence immediately
    Stop,

    /// Set the preferred volume (and the live volume if playing)
    SetVolume(f32),

    /// Fade out over an explicit duration
    FadeOut(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub channel: ChannelId,
    pub kind: IntentKind,
    pub origin: IntentOrigin,
}

impl Intent {
    pub fn new(channel: impl Into<ChannelId>, kind: IntentKind) -> Self {
        Self {
            channel: channel.into(),
            kind,
            origin: IntentOrigin::User,
        }
    }

    pub fn play(channel: impl Into<ChannelId>) -> Self {
        Self::new(channel, IntentKind::Play)
    }

    pub fn pause(channel: impl Into<ChannelId>) -> Self {
        Self::new(channel, IntentKind::Pause)
    }

    pub fn stop(channel: impl Into<ChannelId>) -> Self {
        Self::new(channel, IntentKind::Stop)
    }

    pub fn set_volume(channel: impl Into<ChannelId>, volume: f32) -> Self {
        Self::new(channel, IntentKind::SetVolume(volume))
    }

    pub fn fade_out(channel: impl Into<ChannelId>, duration: Duration) -> Self {
        Self::new(channel, IntentKind::FadeOut(duration))
    }

    pub fn from_origin(mut self, origin: IntentOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Get a human-readable description of the intent
    pub fn description(&self) -> String {
        match self.kind {
            IntentKind::Play => format!("Play {}", self.channel),
            IntentKind::Pause => format!("Pause {}", self.channel),
            IntentKind::Stop => format!("Stop {}", self.channel),
            IntentKind::SetVolume(volume) => format!("Set {} volume to {:.2}", self.channel, volume),
            IntentKind::FadeOut(duration) => {
                format!("Fade out {} over {:.1}s", self.channel, duration.as_secs_f32())
            }
        }
    }
}

/// Channel state captured before an intent runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSnapshot {
    pub was_playing: bool,
    pub previous_volume: f32,
    pub preferred_volume: f32,
    pub was_selected: bool,
}

/// An executed intent and the state it replaced
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelCommand {
    pub intent: Intent,
    pub snapshot: ChannelSnapshot,
}

/// Bounded linear undo history.
///
/// `cursor` counts the commands that are currently applied; entries past it
/// form the redo tail.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    entries: Vec<ChannelCommand>,
    cursor: usize,
    max_len: usize,
}

impl CommandHistory {
    pub fn new(max_len: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            max_len: max_len.max(1),
        }
    }

    /// Record a newly executed command, discarding the redo tail
    pub fn push(&mut self, command: ChannelCommand) {
        self.entries.truncate(self.cursor);
        self.entries.push(command);
        self.cursor += 1;

        if self.entries.len() > self.max_len {
            self.entries.remove(0);
            self.cursor -= 1;
        }
    }

    /// Command that `undo` would revert
    pub fn peek_undo(&self) -> Option<&ChannelCommand> {
        self.cursor.checked_sub(1).and_then(|index| self.entries.get(index))
    }

    /// Command that `redo` would re-run
    pub fn peek_redo(&self) -> Option<&ChannelCommand> {
        self.entries.get(self.cursor)
    }

    pub fn step_back(&mut self) {
        if self.can_undo() {
            self.cursor -= 1;
        }
    }

    pub fn step_forward(&mut self) {
        if self.can_redo() {
            self.cursor += 1;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}
