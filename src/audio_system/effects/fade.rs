/// Per-channel fade controller
///
/// Drives one channel's volume over time. Each `fade_in` / `fade_out` call is a
/// transaction: prior work is cancelled synchronously when the call is made,
/// the returned future steps the volume, and the final play-state/volume
/// reconciliation only happens if no newer request has been issued since.
///
/// ```text
///  fade_in() ──► supersede (generation += 1, signal old op)
///                   │
///                   ▼
///            step loop: sleep ─► check generation ─► write volume
///                   │
///                   ▼
///            reconcile (only if generation unchanged)
/// ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::volume::VolumeLevel;
use super::FadeSettings;
use crate::audio_system::channel::{AudioChannel, ChannelId};
use crate::messaging::{EventBus, MixerEvent};

/// Which way a fade moves the volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FadeDirection {
    In,
    Out,
}

impl std::fmt::Display for FadeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FadeDirection::In => write!(f, "fade-in"),
            FadeDirection::Out => write!(f, "fade-out"),
        }
    }
}

/// How a fade ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    /// Ran its full step count and reconciled the channel
    Completed,

    /// Superseded by a newer request or stopped by `cancel()`
    Cancelled,

    /// The channel refused to play; volume left at 0 and playback off
    PlaybackFailed,

    /// Playback stopped underneath the fade; settled silent
    ExternallyStopped,
}

/// One in-flight fade, owned by the future that runs it
struct FadeOperation {
    generation: u64,
    direction: FadeDirection,
    start: f32,
    end: f32,
    duration: Duration,
    cancelled: watch::Receiver<bool>,
}

struct InFlight {
    generation: u64,
    direction: FadeDirection,
    cancel: watch::Sender<bool>,
}

#[derive(Default)]
struct FadeState {
    generation: u64,
    in_flight: Option<InFlight>,
}

impl FadeState {
    /// Invalidate whatever is running and return the new generation
    fn supersede(&mut self) -> (u64, bool) {
        self.generation = self.generation.wrapping_add(1);
        let had_in_flight = match self.in_flight.take() {
            Some(previous) => {
                let _ = previous.cancel.send(true);
                true
            }
            None => false,
        };
        (self.generation, had_in_flight)
    }

    fn begin(&mut self, generation: u64, direction: FadeDirection) -> watch::Receiver<bool> {
        let (cancel, cancelled) = watch::channel(false);
        self.in_flight = Some(InFlight {
            generation,
            direction,
            cancel,
        });
        cancelled
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    fn retire(&mut self, generation: u64) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|op| op.generation == generation)
        {
            self.in_flight = None;
        }
    }
}

struct Shared {
    id: ChannelId,
    channel: Arc<dyn AudioChannel>,
    settings: FadeSettings,
    events: Option<EventBus>,
    state: Mutex<FadeState>,
}

/// Owns the single cancellable fade of one channel.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct FadeController {
    shared: Arc<Shared>,
}

impl FadeController {
    /// Create a controller for `channel`
    pub fn new(id: ChannelId, channel: Arc<dyn AudioChannel>, settings: FadeSettings) -> Self {
        Self::build(id, channel, settings, None)
    }

    /// Create a controller that reports fade starts and settles on `events`
    pub fn with_events(
        id: ChannelId,
        channel: Arc<dyn AudioChannel>,
        settings: FadeSettings,
        events: EventBus,
    ) -> Self {
        Self::build(id, channel, settings, Some(events))
    }

    fn build(
        id: ChannelId,
        channel: Arc<dyn AudioChannel>,
        settings: FadeSettings,
        events: Option<EventBus>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                channel,
                settings,
                events,
                state: Mutex::new(FadeState::default()),
            }),
        }
    }

    pub fn id(&self) -> &ChannelId {
        &self.shared.id
    }

    pub fn channel(&self) -> &Arc<dyn AudioChannel> {
        &self.shared.channel
    }

    pub fn settings(&self) -> &FadeSettings {
        &self.shared.settings
    }

    /// Current generation; bumped by every fade request, cancel and direct write
    pub fn generation(&self) -> u64 {
        self.shared.state.lock().generation
    }

    /// Direction of the in-flight fade, if any
    pub fn in_flight(&self) -> Option<FadeDirection> {
        self.shared.state.lock().in_flight.as_ref().map(|op| op.direction)
    }

    pub fn is_fading(&self) -> bool {
        self.in_flight().is_some()
    }

    /// Fade from silence up to `target` over `duration`.
    ///
    /// Cancellation of the previous fade, the reset to 0 and the start of
    /// playback happen when this is called, not when the future is first
    /// polled. The returned future runs the step loop.
    pub fn fade_in(
        &self,
        target: f32,
        duration: Duration,
    ) -> impl Future<Output = FadeOutcome> + Send + 'static {
        let shared = Arc::clone(&self.shared);
        let target = VolumeLevel::new(target).get();

        let prepared = {
            let mut state = shared.state.lock();
            let (generation, _) = state.supersede();
            shared.channel.set_volume(0.0);
            if shared.channel.play() {
                let cancelled = state.begin(generation, FadeDirection::In);
                Ok(FadeOperation {
                    generation,
                    direction: FadeDirection::In,
                    start: 0.0,
                    end: target,
                    duration,
                    cancelled,
                })
            } else {
                Err(FadeOutcome::PlaybackFailed)
            }
        };

        shared.announce(FadeDirection::In, target, duration);

        async move {
            match prepared {
                Ok(op) => shared.run(op).await,
                Err(outcome) => {
                    tracing::warn!("Channel {} refused to play; leaving it silent", shared.id);
                    shared.settled(FadeDirection::In, outcome)
                }
            }
        }
    }

    /// Fade from the current volume down to silence over `duration`, then pause.
    ///
    /// A channel that is not playing is pinned to 0 immediately.
    pub fn fade_out(&self, duration: Duration) -> impl Future<Output = FadeOutcome> + Send + 'static {
        let shared = Arc::clone(&self.shared);

        let prepared = {
            let mut state = shared.state.lock();
            let (generation, _) = state.supersede();
            if shared.channel.is_playing() {
                let cancelled = state.begin(generation, FadeDirection::Out);
                Some(FadeOperation {
                    generation,
                    direction: FadeDirection::Out,
                    start: shared.channel.volume(),
                    end: 0.0,
                    duration,
                    cancelled,
                })
            } else {
                shared.channel.set_volume(0.0);
                None
            }
        };

        shared.announce(FadeDirection::Out, 0.0, duration);

        async move {
            match prepared {
                Some(op) => shared.run(op).await,
                None => shared.settled(FadeDirection::Out, FadeOutcome::Completed),
            }
        }
    }

    /// `fade_in` on the current runtime
    pub fn spawn_fade_in(&self, target: f32, duration: Duration) -> JoinHandle<FadeOutcome> {
        tokio::spawn(self.fade_in(target, duration))
    }

    /// `fade_out` on the current runtime
    pub fn spawn_fade_out(&self, duration: Duration) -> JoinHandle<FadeOutcome> {
        tokio::spawn(self.fade_out(duration))
    }

    /// Cancel the in-flight fade, if any.
    ///
    /// Leaves the channel's volume and play state untouched; a pending
    /// reconciliation of the cancelled fade will no longer apply.
    pub fn cancel(&self) {
        let (generation, had_in_flight) = self.shared.state.lock().supersede();
        if had_in_flight {
            tracing::debug!("Cancelled fade on {} (generation {})", self.shared.id, generation);
        }
    }

    /// Set the volume directly, superseding any fade
    pub fn set_volume(&self, volume: f32) {
        let mut state = self.shared.state.lock();
        state.supersede();
        self.shared.channel.set_volume(VolumeLevel::new(volume).get());
    }

    /// Set the volume directly, but only on a playing channel with no fade-out running.
    ///
    /// The check and the write happen under the fade lock, so a fade-out that
    /// starts concurrently either lands first (and wins) or supersedes this
    /// write. Returns true if the volume was written.
    pub fn set_volume_unless_fading_out(&self, volume: f32) -> bool {
        let mut state = self.shared.state.lock();
        let fading_out = state
            .in_flight
            .as_ref()
            .is_some_and(|op| op.direction == FadeDirection::Out);
        if fading_out || !self.shared.channel.is_playing() {
            return false;
        }

        state.supersede();
        self.shared.channel.set_volume(VolumeLevel::new(volume).get());
        true
    }

    /// Pause and silence the channel immediately, superseding any fade
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        state.supersede();
        self.shared.channel.pause();
        self.shared.channel.set_volume(0.0);
    }

    /// Put the channel back into an exact play state and volume, without a fade.
    ///
    /// Returns false if playback was requested and the channel refused it.
    pub fn restore(&self, playing: bool, volume: f32) -> bool {
        let mut state = self.shared.state.lock();
        state.supersede();
        let channel = &self.shared.channel;

        if playing {
            if !channel.is_playing() && !channel.play() {
                channel.set_volume(0.0);
                return false;
            }
            channel.set_volume(VolumeLevel::new(volume).get());
        } else {
            channel.pause();
            channel.set_volume(VolumeLevel::new(volume).get());
        }
        true
    }
}

impl Shared {
    async fn run(&self, mut op: FadeOperation) -> FadeOutcome {
        let steps = self.settings.step_count(op.duration);

        if steps > 0 {
            let step_delay = op.duration / steps;
            for step in 1..=steps {
                let cancelled = tokio::select! {
                    biased;
                    _ = op.cancelled.changed() => true,
                    _ = tokio::time::sleep(step_delay) => false,
                };
                if cancelled {
                    return self.settled(op.direction, FadeOutcome::Cancelled);
                }

                let progress = step as f32 / steps as f32;
                let volume = self.settings.curve.volume(progress, op.start, op.end);
                if let Err(outcome) = self.write_step(&op, volume) {
                    return self.settled(op.direction, outcome);
                }
            }
        }

        let outcome = self.reconcile(&op);
        self.settled(op.direction, outcome)
    }

    fn write_step(&self, op: &FadeOperation, volume: f32) -> Result<(), FadeOutcome> {
        let mut state = self.state.lock();
        if !state.is_current(op.generation) || *op.cancelled.borrow() {
            return Err(FadeOutcome::Cancelled);
        }

        if !self.channel.is_playing() {
            state.retire(op.generation);
            self.channel.set_volume(0.0);
            return Err(FadeOutcome::ExternallyStopped);
        }

        self.channel.set_volume(volume);
        Ok(())
    }

    /// Pin the final state, but only for the current generation
    fn reconcile(&self, op: &FadeOperation) -> FadeOutcome {
        let mut state = self.state.lock();
        if !state.is_current(op.generation) {
            return FadeOutcome::Cancelled;
        }
        state.retire(op.generation);

        match op.direction {
            FadeDirection::In => {
                if !self.channel.is_playing() && !self.channel.play() {
                    self.channel.set_volume(0.0);
                    return FadeOutcome::PlaybackFailed;
                }
                self.channel.set_volume(op.end);
            }
            FadeDirection::Out => {
                self.channel.pause();
                self.channel.set_volume(0.0);
            }
        }
        FadeOutcome::Completed
    }

    fn announce(&self, direction: FadeDirection, target: f32, duration: Duration) {
        tracing::debug!(
            "Starting {} on {} to {:.2} over {:?}",
            direction,
            self.id,
            target,
            duration
        );
        if let Some(events) = &self.events {
            events.publish(MixerEvent::FadeStarted {
                channel: self.id.clone(),
                direction,
                target,
                duration,
            });
        }
    }

    fn settled(&self, direction: FadeDirection, outcome: FadeOutcome) -> FadeOutcome {
        tracing::debug!("{} on {} settled: {:?}", direction, self.id, outcome);
        if let Some(events) = &self.events {
            events.publish(MixerEvent::FadeSettled {
                channel: self.id.clone(),
                direction,
                outcome,
            });
        }
        outcome
    }
}
