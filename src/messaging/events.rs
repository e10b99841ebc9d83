/// Event types for the mixer
///
/// Events represent things that have happened (past tense).
/// They are broadcast to all subscribers.
use std::time::Duration;

use crate::audio_system::channel::ChannelId;
use crate::audio_system::effects::{FadeDirection, FadeOutcome};

/// Mixer events
#[derive(Debug, Clone)]
pub enum MixerEvent {
    /// A fade was requested on a channel
    FadeStarted {
        channel: ChannelId,
        direction: FadeDirection,
        target: f32,
        duration: Duration,
    },

    /// A fade finished, one way or another
    FadeSettled {
        channel: ChannelId,
        direction: FadeDirection,
        outcome: FadeOutcome,
    },

    /// The sleep timer started counting down
    TimerStarted { duration: Duration },

    /// One second of the countdown elapsed
    TimerTick { remaining: Duration },

    /// The countdown reached zero and fired its action
    TimerExpired,

    /// The countdown was stopped before expiry
    TimerCancelled,

    /// The platform interrupted audio; these channels were suspended
    SessionInterrupted { channels: Vec<ChannelId> },

    /// The interruption ended; these channels are fading back in
    SessionResumed { channels: Vec<ChannelId> },

    /// The output route changed
    RouteChanged { reason: String },

    /// A settled volume was handed to the volume store
    VolumePersisted { channel: ChannelId, volume: f32 },
}

impl MixerEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            MixerEvent::FadeStarted {
                channel,
                direction,
                target,
                duration,
            } => format!(
                "{} started on {} (target {:.2}, {:.1}s)",
                direction,
                channel,
                target,
                duration.as_secs_f32()
            ),
            MixerEvent::FadeSettled {
                channel,
                direction,
                outcome,
            } => format!("{} on {} settled: {:?}", direction, channel, outcome),
            MixerEvent::TimerStarted { duration } => {
                format!("Sleep timer started: {}", format_remaining(*duration))
            }
            MixerEvent::TimerTick { remaining } => {
                format!("Sleep timer: {} left", format_remaining(*remaining))
            }
            MixerEvent::TimerExpired => "Sleep timer expired".to_string(),
            MixerEvent::TimerCancelled => "Sleep timer cancelled".to_string(),
            MixerEvent::SessionInterrupted { channels } => {
                format!("Audio interrupted ({} channels suspended)", channels.len())
            }
            MixerEvent::SessionResumed { channels } => {
                format!("Audio resumed ({} channels)", channels.len())
            }
            MixerEvent::RouteChanged { reason } => format!("Audio route changed: {}", reason),
            MixerEvent::VolumePersisted { channel, volume } => {
                format!("Saved volume {:.2} for {}", volume, channel)
            }
        }
    }
}

/// Format a countdown as `H:MM:SS` or `M:SS`
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
