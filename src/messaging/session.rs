/// Signals from outside the app that drive playback
///
/// The platform audio session and the remote control (media keys, lock
/// screen) produce these; the command invoker consumes them.

/// Audio session notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSessionEvent {
    /// Another app or the system took the output; playing channels are suspended
    InterruptionBegan,

    /// The interruption is over. `should_resume` is the platform's hint.
    InterruptionEnded { should_resume: bool },

    /// Headphones unplugged, output device switched, and so on
    RouteChanged { reason: String },
}

/// Remote transport commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Play,
    Pause,
    Toggle,
}

impl RemoteCommand {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "play" => Some(RemoteCommand::Play),
            "pause" => Some(RemoteCommand::Pause),
            "toggle" | "play-pause" => Some(RemoteCommand::Toggle),
            _ => None,
        }
    }
}
