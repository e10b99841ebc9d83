/// Sleep timer
///
/// Counts down in one-second ticks and fires a single registered callback
/// when it reaches zero. The timer stays `Running` while the callback runs
/// and goes back to `Idle` once it returns.
///
/// ```text
///          start()                 countdown hits zero
///  Idle ────────────► Running ───────────────────────► (callback) ─► Idle
///   ▲                    │
///   └──── stop() ────────┘   (no callback)
/// ```
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::messaging::{EventBus, MixerEvent};

/// Countdown granularity
pub const TICK: Duration = Duration::from_secs(1);

/// Action run when the countdown expires
pub type ExpiryCallback = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle of a countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerPhase {
    /// No countdown
    #[default]
    Idle,

    /// Counting down
    Running,
}

#[derive(Default)]
struct TimerState {
    phase: TimerPhase,
    duration: Duration,
    remaining: Duration,
    generation: u64,
    task: Option<JoinHandle<()>>,
    on_expired: Option<ExpiryCallback>,
}

impl TimerState {
    /// Invalidate the running countdown, if any
    fn halt(&mut self) -> bool {
        let was_running = self.phase == TimerPhase::Running;
        self.generation = self.generation.wrapping_add(1);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.phase = TimerPhase::Idle;
        self.remaining = Duration::ZERO;
        was_running
    }
}

struct TimerShared {
    state: Mutex<TimerState>,
    events: Option<EventBus>,
}

impl TimerShared {
    fn publish(&self, event: MixerEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

enum Tick {
    Continue(Duration),
    Expired(Option<ExpiryCallback>),
}

/// Restartable countdown with a single-slot expiry callback.
///
/// Clones share the same countdown. Must be started from within a tokio
/// runtime.
#[derive(Clone)]
pub struct SleepTimer {
    shared: Arc<TimerShared>,
}

impl Default for SleepTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl SleepTimer {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Timer that publishes start, tick, expiry and cancellation events
    pub fn with_events(events: EventBus) -> Self {
        Self::build(Some(events))
    }

    fn build(events: Option<EventBus>) -> Self {
        Self {
            shared: Arc::new(TimerShared {
                state: Mutex::new(TimerState::default()),
                events,
            }),
        }
    }

    /// Register the expiry callback, discarding any previous one
    pub fn set_on_expired(&self, callback: ExpiryCallback) {
        let replaced = self.shared.state.lock().on_expired.replace(callback);
        if replaced.is_some() {
            tracing::debug!("Replaced sleep timer expiry callback");
        }
    }

    /// Drop the expiry callback without firing it
    pub fn clear_on_expired(&self) {
        self.shared.state.lock().on_expired = None;
    }

    pub fn has_callback(&self) -> bool {
        self.shared.state.lock().on_expired.is_some()
    }

    /// Start counting down from `duration`, replacing any running countdown.
    ///
    /// The previous countdown is stopped before the new one is spawned, so
    /// two countdown loops never run for the same timer.
    pub fn start(&self, duration: Duration) {
        {
            let mut state = self.shared.state.lock();
            state.halt();
            state.phase = TimerPhase::Running;
            state.duration = duration;
            state.remaining = duration;

            let generation = state.generation;
            let shared = Arc::clone(&self.shared);
            let started_at = Instant::now();
            state.task = Some(tokio::spawn(countdown(shared, generation, started_at)));
        }

        tracing::info!("Sleep timer started for {:?}", duration);
        self.shared.publish(MixerEvent::TimerStarted { duration });
    }

    /// Stop the countdown without firing the callback.
    ///
    /// Returns true if a countdown was running.
    pub fn stop(&self) -> bool {
        let was_running = self.shared.state.lock().halt();
        if was_running {
            tracing::info!("Sleep timer stopped");
            self.shared.publish(MixerEvent::TimerCancelled);
        }
        was_running
    }

    pub fn phase(&self) -> TimerPhase {
        self.shared.state.lock().phase
    }

    pub fn is_active(&self) -> bool {
        self.phase() == TimerPhase::Running
    }

    /// Time left, updated once per tick; zero when idle
    pub fn remaining(&self) -> Duration {
        self.shared.state.lock().remaining
    }

    /// Length of the current (or last) countdown
    pub fn duration(&self) -> Duration {
        self.shared.state.lock().duration
    }
}

async fn countdown(shared: Arc<TimerShared>, generation: u64, started_at: Instant) {
    let mut deadline = started_at;

    loop {
        let step = {
            let state = shared.state.lock();
            if state.generation != generation {
                return;
            }
            state.remaining.min(TICK)
        };

        deadline += step;
        tokio::time::sleep_until(deadline).await;

        let tick = {
            let mut state = shared.state.lock();
            if state.generation != generation {
                return;
            }
            state.remaining = state.remaining.saturating_sub(step);
            if state.remaining.is_zero() {
                Tick::Expired(state.on_expired.take())
            } else {
                Tick::Continue(state.remaining)
            }
        };

        match tick {
            Tick::Continue(remaining) => {
                shared.publish(MixerEvent::TimerTick { remaining });
            }
            Tick::Expired(callback) => {
                tracing::info!("Sleep timer expired");
                shared.publish(MixerEvent::TimerExpired);
                match callback {
                    Some(callback) => callback(),
                    None => tracing::debug!("Sleep timer expired with no callback registered"),
                }

                // The callback may have restarted or stopped the timer
                let mut state = shared.state.lock();
                if state.generation == generation {
                    state.phase = TimerPhase::Idle;
                    state.task = None;
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback(counter: &Arc<AtomicUsize>) -> ExpiryCallback {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_once_and_returns_to_idle() {
        let timer = SleepTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        timer.set_on_expired(counting_callback(&fired));

        timer.start(Duration::from_secs(5));
        assert!(timer.is_active());

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timer.phase(), TimerPhase::Idle);
        assert_eq!(timer.remaining(), Duration::ZERO);
        assert!(!timer.has_callback());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_expiry_never_fires() {
        let timer = SleepTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        timer.set_on_expired(counting_callback(&fired));

        timer.start(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(timer.stop());

        assert!(!timer.is_active());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timer.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down_per_tick() {
        let timer = SleepTimer::new();
        timer.start(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(timer.remaining(), Duration::from_secs(3));
        assert_eq!(timer.duration(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_supersedes_previous_countdown() {
        let timer = SleepTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        timer.set_on_expired(counting_callback(&fired));

        timer.start(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(3)).await;
        timer.start(Duration::from_secs(5));

        // The first countdown would have expired at 5s
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(timer.is_active());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_callback_discards_old() {
        let timer = SleepTimer::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        timer.set_on_expired(counting_callback(&first));
        timer.set_on_expired(counting_callback(&second));

        timer.start(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fractional_duration_expires_on_time() {
        let timer = SleepTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        timer.set_on_expired(counting_callback(&fired));

        timer.start(Duration::from_millis(2500));
        tokio::time::sleep(Duration::from_millis(2400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_published() {
        let bus = EventBus::new();
        let (rx, _id) = bus.subscribe();
        let timer = SleepTimer::with_events(bus);

        timer.start(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_secs(3)).await;

        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(events[0], MixerEvent::TimerStarted { .. }));
        assert!(matches!(events[1], MixerEvent::TimerTick { remaining } if remaining == Duration::from_secs(1)));
        assert!(matches!(events[2], MixerEvent::TimerExpired));
        assert_eq!(events.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_only_after_callback_returns() {
        let timer = SleepTimer::new();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let observer = timer.clone();
        let slot = Arc::clone(&seen);
        timer.set_on_expired(Box::new(move || {
            *slot.lock() = Some((observer.phase(), observer.remaining()));
        }));

        timer.start(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(*seen.lock(), Some((TimerPhase::Running, Duration::ZERO)));
        assert_eq!(timer.phase(), TimerPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_can_restart_timer() {
        let timer = SleepTimer::new();
        let restarter = timer.clone();
        timer.set_on_expired(Box::new(move || restarter.start(Duration::from_secs(5))));

        timer.start(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(timer.is_active());
        assert_eq!(timer.duration(), Duration::from_secs(5));
        assert!(!timer.has_callback());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!timer.is_active());
    }
}
