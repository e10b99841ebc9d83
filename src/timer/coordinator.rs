/// Timer command coordinator
///
/// Binds a sleep timer countdown to a group fade-out. Only one binding is
/// ever armed: configuring a new mode tears the previous binding down
/// (timer stopped, callback discarded) before anything new is registered.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::mode::TimerMode;
use super::sleep_timer::SleepTimer;
use crate::error::ConfigError;

/// Something that can fade all of its active channels to silence
pub trait FadeOutGroup: Send + Sync {
    /// Start a fade-out of `duration` on every active channel.
    ///
    /// Returns how many fades were started. Must not wait for them.
    fn fade_out_group(&self, duration: Duration) -> usize;
}

/// The currently armed timer configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerBinding {
    pub id: u64,
    pub mode: TimerMode,
    pub fade_out: Duration,
}

/// Owns the sleep timer's callback slot and the active binding
pub struct TimerCoordinator {
    timer: SleepTimer,
    target: Arc<dyn FadeOutGroup>,
    binding: Arc<Mutex<Option<TimerBinding>>>,
    next_id: AtomicU64,
}

impl TimerCoordinator {
    pub fn new(timer: SleepTimer, target: Arc<dyn FadeOutGroup>) -> Self {
        Self {
            timer,
            target,
            binding: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Arm the sleep timer for `mode`, fading everything out over `fade_out` on expiry.
    ///
    /// Any previous binding is cancelled first. `TimerMode::Off` leaves nothing armed.
    pub fn set_timer(&self, mode: TimerMode, fade_out: Duration) -> Result<(), ConfigError> {
        mode.validate()?;

        let mut binding = self.binding.lock();
        if let Some(previous) = binding.take() {
            tracing::debug!("Replacing sleep timer binding {} ({})", previous.id, previous.mode);
        }
        self.timer.stop();
        self.timer.clear_on_expired();

        let Some(duration) = mode.duration() else {
            tracing::info!("Sleep timer off");
            return Ok(());
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *binding = Some(TimerBinding { id, mode, fade_out });

        let slot = Arc::clone(&self.binding);
        let target = Arc::clone(&self.target);
        self.timer.set_on_expired(Box::new(move || {
            let armed = {
                let mut current = slot.lock();
                match *current {
                    Some(active) if active.id == id => {
                        *current = None;
                        true
                    }
                    _ => false,
                }
            };

            if armed {
                let started = target.fade_out_group(fade_out);
                tracing::info!(
                    "Sleep timer fired: fading out {} channels over {:?}",
                    started,
                    fade_out
                );
            } else {
                tracing::debug!("Ignoring expiry of superseded timer binding {}", id);
            }
        }));
        self.timer.start(duration);

        tracing::info!("Sleep timer set to {} (fade out {:?})", mode, fade_out);
        Ok(())
    }

    /// Stop the countdown and drop the binding. Returns true if one was armed.
    pub fn cancel_timer(&self) -> bool {
        let mut binding = self.binding.lock();
        self.timer.stop();
        self.timer.clear_on_expired();
        binding.take().is_some()
    }

    /// True only while a binding exists and its countdown is running
    pub fn has_active_timer(&self) -> bool {
        let binding = self.binding.lock();
        binding.is_some() && self.timer.is_active()
    }

    /// Mode of the armed binding, `Off` when nothing is armed
    pub fn mode(&self) -> TimerMode {
        self.binding
            .lock()
            .map(|binding| binding.mode)
            .unwrap_or(TimerMode::Off)
    }

    pub fn binding(&self) -> Option<TimerBinding> {
        *self.binding.lock()
    }

    pub fn remaining(&self) -> Duration {
        self.timer.remaining()
    }

    pub fn timer(&self) -> &SleepTimer {
        &self.timer
    }
}
