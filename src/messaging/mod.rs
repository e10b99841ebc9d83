/// Messaging module for Event/Command architecture
///
/// - **Events**: Notifications of things that happened (past tense, broadcast)
/// - **Intents**: Requests to change one channel (imperative, recorded for undo)
/// - **Signals**: Audio session and remote control input from the platform
///
/// ## Architecture
///
/// ```text
/// ┌──────────┐    Intent     ┌─────────────────┐           ┌─────────┐
/// │ UI/Remote│ ────────────> │ CommandInvoker  │ ────────> │  Mixer  │
/// └──────────┘               │ (history, undo) │           └─────────┘
///                            └─────────────────┘                │
///                                                               │ FadeStarted,
///                                                               ▼ FadeSettled, ...
///                                                         ┌───────────┐
///                                                         │ Event Bus │
///                                                         └───────────┘
/// ```
pub mod bus;
pub mod commands;
pub mod events;
pub mod executor;
pub mod session;

// Re-export commonly used types
pub use bus::{EventBus, SubscriberId};
pub use commands::{
    ChannelCommand, ChannelSnapshot, CommandHistory, Intent, IntentKind, IntentOrigin,
};
pub use events::{format_remaining, MixerEvent};
pub use executor::CommandInvoker;
pub use session::{AudioSessionEvent, RemoteCommand};
