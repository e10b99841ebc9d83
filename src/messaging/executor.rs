/// Command invoker
///
/// Every trigger source goes through here: user taps, remote transport
/// commands, audio session signals and the sleep timer. Intents are
/// dispatched one at a time; user intents are recorded with the channel
/// snapshot taken just before they ran so they can be undone.
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::commands::{ChannelCommand, CommandHistory, Intent, IntentKind, IntentOrigin};
use super::events::MixerEvent;
use super::session::{AudioSessionEvent, RemoteCommand};
use crate::audio_system::channel::ChannelId;
use crate::audio_system::effects::{FadeDirection, FadeOutcome};
use crate::audio_system::manager::Mixer;
use crate::error::MixerError;
use crate::timer::FadeOutGroup;

/// Default number of undoable intents
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Serializes intents and owns the undo history
pub struct CommandInvoker {
    mixer: Mixer,
    history: Mutex<CommandHistory>,
    interrupted: Mutex<Vec<ChannelId>>,
}

impl CommandInvoker {
    pub fn new(mixer: Mixer, history_limit: usize) -> Self {
        Self {
            mixer,
            history: Mutex::new(CommandHistory::new(history_limit)),
            interrupted: Mutex::new(Vec::new()),
        }
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// Run an intent and record it for undo.
    ///
    /// Returns the fade task when the intent animates.
    pub fn execute(&self, intent: Intent) -> Result<Option<JoinHandle<FadeOutcome>>, MixerError> {
        let mut history = self.history.lock();
        let snapshot = self.mixer.channel(&intent.channel)?.snapshot();

        tracing::info!("Executing: {}", intent.description());
        let fade = self.dispatch(&intent)?;
        history.push(ChannelCommand { intent, snapshot });
        Ok(fade)
    }

    /// Run an intent without recording it
    pub fn apply(&self, intent: Intent) -> Result<Option<JoinHandle<FadeOutcome>>, MixerError> {
        let _serialized = self.history.lock();
        self.dispatch_unrecorded(intent)
    }

    /// Put the channel touched by the last applied command back, without a fade.
    ///
    /// Entries for channels that have since been removed are dropped on the
    /// way. Returns false when there is nothing left to undo.
    pub fn undo(&self) -> Result<bool, MixerError> {
        let mut history = self.history.lock();
        while let Some(command) = history.peek_undo().cloned() {
            match self.mixer.restore(&command.intent.channel, command.snapshot) {
                Ok(_) => {
                    tracing::info!("Undo: {}", command.intent.description());
                    history.step_back();
                    return Ok(true);
                }
                Err(MixerError::UnknownChannel(id)) => {
                    tracing::warn!(
                        "Skipping undo of '{}': channel {} is gone",
                        command.intent.description(),
                        id
                    );
                    history.step_back();
                }
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    /// Re-run the most recently undone command.
    ///
    /// Returns `Ok(None)` when there is nothing to redo, otherwise the
    /// command's fade task if it animates. Like undo, commands whose channel
    /// has been removed are skipped.
    pub fn redo(&self) -> Result<Option<Option<JoinHandle<FadeOutcome>>>, MixerError> {
        let mut history = self.history.lock();
        while let Some(command) = history.peek_redo().cloned() {
            match self.dispatch(&command.intent) {
                Ok(fade) => {
                    tracing::info!("Redo: {}", command.intent.description());
                    history.step_forward();
                    return Ok(Some(fade));
                }
                Err(MixerError::UnknownChannel(id)) => {
                    tracing::warn!(
                        "Skipping redo of '{}': channel {} is gone",
                        command.intent.description(),
                        id
                    );
                    history.step_forward();
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    pub fn can_undo(&self) -> bool {
        self.history.lock().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.lock().can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    /// Map a remote transport command onto unrecorded play / pause intents.
    ///
    /// Play resumes selected channels that are silent; pause fades out
    /// whatever is playing but keeps it selected; toggle picks one of the two
    /// depending on whether anything is playing.
    pub fn handle_remote(
        &self,
        command: RemoteCommand,
    ) -> Result<Vec<JoinHandle<FadeOutcome>>, MixerError> {
        let _serialized = self.history.lock();

        let command = match command {
            RemoteCommand::Toggle if self.mixer.playing_channels().is_empty() => RemoteCommand::Play,
            RemoteCommand::Toggle => RemoteCommand::Pause,
            other => other,
        };

        let intents: Vec<Intent> = match command {
            RemoteCommand::Play => self
                .mixer
                .channels()
                .into_iter()
                .filter(|handle| handle.is_selected() && !handle.is_playing())
                .map(|handle| Intent::play(handle.id().clone()))
                .collect(),
            _ => self
                .mixer
                .playing_channels()
                .into_iter()
                .map(Intent::pause)
                .collect(),
        };

        tracing::info!("Remote {:?} affects {} channels", command, intents.len());
        let mut fades = Vec::with_capacity(intents.len());
        for intent in intents {
            if let Some(fade) = self.dispatch_unrecorded(intent.from_origin(IntentOrigin::Remote))? {
                fades.push(fade);
            }
        }
        Ok(fades)
    }

    /// React to the platform audio session.
    ///
    /// An interruption stops every audible channel that is not already fading
    /// out and remembers it. When the interruption ends with resume, the
    /// remembered channels that are still selected and silent fade back in;
    /// those fade-ins are returned.
    pub fn handle_session_event(&self, event: AudioSessionEvent) -> Vec<JoinHandle<FadeOutcome>> {
        let _serialized = self.history.lock();
        let events = self.mixer.events();

        match event {
            AudioSessionEvent::InterruptionBegan => {
                let targets: Vec<ChannelId> = self
                    .mixer
                    .channels()
                    .into_iter()
                    .filter(|handle| {
                        handle.is_playing() && handle.fader().in_flight() != Some(FadeDirection::Out)
                    })
                    .map(|handle| handle.id().clone())
                    .collect();

                let mut suspended = Vec::with_capacity(targets.len());
                for id in targets {
                    let intent = Intent::stop(id.clone()).from_origin(IntentOrigin::Session);
                    match self.dispatch_unrecorded(intent) {
                        Ok(_) => suspended.push(id),
                        Err(e) => tracing::warn!("Could not suspend {}: {}", id, e),
                    }
                }

                {
                    let mut interrupted = self.interrupted.lock();
                    for id in &suspended {
                        if !interrupted.contains(id) {
                            interrupted.push(id.clone());
                        }
                    }
                }

                tracing::info!("Audio interruption began; suspended {} channels", suspended.len());
                events.publish(MixerEvent::SessionInterrupted { channels: suspended });
                Vec::new()
            }

            AudioSessionEvent::InterruptionEnded { should_resume } => {
                let interrupted = std::mem::take(&mut *self.interrupted.lock());
                if !should_resume {
                    tracing::info!(
                        "Audio interruption ended without resume; {} channels stay paused",
                        interrupted.len()
                    );
                    return Vec::new();
                }

                let mut resumed = Vec::new();
                let mut fades = Vec::new();
                for id in interrupted {
                    let Ok(handle) = self.mixer.channel(&id) else {
                        continue;
                    };
                    if !handle.is_selected() || handle.is_playing() {
                        continue;
                    }
                    let intent = Intent::play(id.clone()).from_origin(IntentOrigin::Session);
                    match self.dispatch_unrecorded(intent) {
                        Ok(fade) => {
                            fades.extend(fade);
                            resumed.push(id);
                        }
                        Err(e) => tracing::warn!("Could not resume {}: {}", id, e),
                    }
                }

                tracing::info!("Audio interruption ended; resuming {} channels", resumed.len());
                events.publish(MixerEvent::SessionResumed { channels: resumed });
                fades
            }

            AudioSessionEvent::RouteChanged { reason } => {
                tracing::info!("Audio route changed: {}", reason);
                events.publish(MixerEvent::RouteChanged { reason });
                Vec::new()
            }
        }
    }

    /// Fade out every playing channel over `duration` as unrecorded intents.
    ///
    /// Returns the fade tasks; dropping them lets the fades run on their own.
    pub fn fade_out_playing(
        &self,
        duration: Duration,
        origin: IntentOrigin,
    ) -> Vec<JoinHandle<FadeOutcome>> {
        let _serialized = self.history.lock();

        let mut fades = Vec::new();
        for id in self.mixer.playing_channels() {
            let intent = Intent::fade_out(id.clone(), duration).from_origin(origin);
            match self.dispatch_unrecorded(intent) {
                Ok(fade) => fades.extend(fade),
                Err(e) => tracing::warn!("Could not fade out {}: {}", id, e),
            }
        }
        tracing::info!("Fading out {} channels over {:?}", fades.len(), duration);
        fades
    }

    fn dispatch_unrecorded(
        &self,
        intent: Intent,
    ) -> Result<Option<JoinHandle<FadeOutcome>>, MixerError> {
        tracing::debug!("Applying ({:?}): {}", intent.origin, intent.description());
        self.dispatch(&intent)
    }

    fn dispatch(&self, intent: &Intent) -> Result<Option<JoinHandle<FadeOutcome>>, MixerError> {
        let id = &intent.channel;
        // Only the user takes a channel out of the mix
        let deselect = intent.origin == IntentOrigin::User;
        match intent.kind {
            IntentKind::Play => self.mixer.play(id).map(Some),
            IntentKind::Pause => {
                let fade = self.mixer.pause(id)?;
                if deselect {
                    self.mixer.channel(id)?.set_selected(false);
                }
                Ok(Some(fade))
            }
            IntentKind::Stop => {
                self.mixer.stop(id)?;
                if deselect {
                    self.mixer.channel(id)?.set_selected(false);
                }
                Ok(None)
            }
            IntentKind::SetVolume(volume) => self.mixer.set_volume(id, volume).map(|_| None),
            IntentKind::FadeOut(duration) => self.mixer.fade_out(id, duration).map(Some),
        }
    }
}

impl FadeOutGroup for CommandInvoker {
    fn fade_out_group(&self, duration: Duration) -> usize {
        self.fade_out_playing(duration, IntentOrigin::Timer).len()
    }
}
