/// Sleep timer
///
/// ```text
/// TimerCoordinator::set_timer(mode, fade_out)
///   ├── stops the previous countdown, drops its callback
///   ├── SleepTimer::set_on_expired(fade everything out)
///   └── SleepTimer::start(mode duration)
///                     │ one tick per second
///                     ▼
///               callback ─► FadeOutGroup::fade_out_group(fade_out)
///                           (CommandInvoker: one Timer fade-out intent per playing channel)
/// ```
pub mod coordinator;
pub mod mode;
pub mod sleep_timer;

pub use coordinator::{FadeOutGroup, TimerBinding, TimerCoordinator};
pub use mode::TimerMode;
pub use sleep_timer::{ExpiryCallback, SleepTimer, TimerPhase};
