/// Mixer
///
/// Owns every channel, its fade controller and the user's preferred volume
/// for it. Channels play simultaneously; each one serializes its own fades.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use super::channel::{AudioChannel, ChannelId};
use super::effects::{FadeController, FadeOutcome, FadeSettings, VolumeLevel};
use crate::error::MixerError;
use crate::messaging::{ChannelSnapshot, EventBus};
use crate::persistence::{persist_in_background, VolumeStore};

/// One registered channel
pub struct ChannelHandle {
    id: ChannelId,
    name: String,
    fader: FadeController,
    preferred: Mutex<VolumeLevel>,
    selected: AtomicBool,
}

impl ChannelHandle {
    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fader(&self) -> &FadeController {
        &self.fader
    }

    pub fn channel(&self) -> &Arc<dyn AudioChannel> {
        self.fader.channel()
    }

    /// Volume a fade-in aims for
    pub fn preferred_volume(&self) -> f32 {
        self.preferred.lock().get()
    }

    /// Part of the current mix; remote play resumes selected channels
    pub fn is_selected(&self) -> bool {
        self.selected.load(Ordering::Acquire)
    }

    pub fn set_selected(&self, selected: bool) {
        self.selected.store(selected, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.channel().is_playing()
    }

    pub fn volume(&self) -> f32 {
        self.channel().volume()
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            was_playing: self.is_playing(),
            previous_volume: self.volume(),
            preferred_volume: self.preferred_volume(),
            was_selected: self.is_selected(),
        }
    }

    fn set_preferred(&self, volume: f32) -> f32 {
        let level = VolumeLevel::new(volume);
        *self.preferred.lock() = level;
        level.get()
    }
}

struct MixerInner {
    channels: RwLock<BTreeMap<ChannelId, Arc<ChannelHandle>>>,
    settings: FadeSettings,
    events: EventBus,
    store: Option<Arc<dyn VolumeStore>>,
}

/// Channel registry and group operations.
///
/// Cloning yields another handle to the same mixer.
#[derive(Clone)]
pub struct Mixer {
    inner: Arc<MixerInner>,
}

impl Mixer {
    pub fn new(settings: FadeSettings, events: EventBus) -> Self {
        Self::build(settings, events, None)
    }

    /// Mixer that seeds preferred volumes from `store` and saves settled volumes to it
    pub fn with_store(settings: FadeSettings, events: EventBus, store: Arc<dyn VolumeStore>) -> Self {
        Self::build(settings, events, Some(store))
    }

    fn build(settings: FadeSettings, events: EventBus, store: Option<Arc<dyn VolumeStore>>) -> Self {
        Self {
            inner: Arc::new(MixerInner {
                channels: RwLock::new(BTreeMap::new()),
                settings,
                events,
                store,
            }),
        }
    }

    pub fn settings(&self) -> &FadeSettings {
        &self.inner.settings
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Register a channel. A stored volume wins over `default_volume`.
    pub fn add_channel(
        &self,
        id: impl Into<ChannelId>,
        name: impl Into<String>,
        channel: Arc<dyn AudioChannel>,
        default_volume: f32,
    ) -> Result<Arc<ChannelHandle>, MixerError> {
        let id = id.into();
        let mut channels = self.inner.channels.write();
        if channels.contains_key(&id) {
            return Err(MixerError::DuplicateChannel(id.to_string()));
        }

        let preferred = self
            .inner
            .store
            .as_ref()
            .and_then(|store| store.load(&id))
            .unwrap_or(default_volume);

        let fader = FadeController::with_events(
            id.clone(),
            channel,
            self.inner.settings,
            self.inner.events.clone(),
        );
        let handle = Arc::new(ChannelHandle {
            id: id.clone(),
            name: name.into(),
            fader,
            preferred: Mutex::new(VolumeLevel::new(preferred)),
            selected: AtomicBool::new(false),
        });

        tracing::debug!("Registered channel {} (preferred volume {:.2})", id, handle.preferred_volume());
        channels.insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    /// Unregister a channel, silencing it first
    pub fn remove_channel(&self, id: &ChannelId) -> Result<Arc<ChannelHandle>, MixerError> {
        let handle = self
            .inner
            .channels
            .write()
            .remove(id)
            .ok_or_else(|| MixerError::UnknownChannel(id.to_string()))?;
        handle.fader().stop();
        tracing::debug!("Removed channel {}", id);
        Ok(handle)
    }

    pub fn channel(&self, id: &ChannelId) -> Result<Arc<ChannelHandle>, MixerError> {
        self.inner
            .channels
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| MixerError::UnknownChannel(id.to_string()))
    }

    pub fn channels(&self) -> Vec<Arc<ChannelHandle>> {
        self.inner.channels.read().values().cloned().collect()
    }

    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.inner.channels.read().keys().cloned().collect()
    }

    pub fn playing_channels(&self) -> Vec<ChannelId> {
        self.collect_ids(|handle| handle.is_playing())
    }

    pub fn selected_channels(&self) -> Vec<ChannelId> {
        self.collect_ids(|handle| handle.is_selected())
    }

    fn collect_ids(&self, keep: impl Fn(&ChannelHandle) -> bool) -> Vec<ChannelId> {
        self.inner
            .channels
            .read()
            .values()
            .filter(|handle| keep(handle))
            .map(|handle| handle.id().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.channels.read().is_empty()
    }

    /// Select the channel and fade it in to its preferred volume
    pub fn play(&self, id: &ChannelId) -> Result<JoinHandle<FadeOutcome>, MixerError> {
        let handle = self.channel(id)?;
        handle.set_selected(true);
        Ok(handle
            .fader()
            .spawn_fade_in(handle.preferred_volume(), self.inner.settings.fade_in))
    }

    /// Fade the channel out and pause it; selection is left alone
    pub fn pause(&self, id: &ChannelId) -> Result<JoinHandle<FadeOutcome>, MixerError> {
        self.fade_out(id, self.inner.settings.fade_out)
    }

    pub fn fade_out(
        &self,
        id: &ChannelId,
        duration: Duration,
    ) -> Result<JoinHandle<FadeOutcome>, MixerError> {
        let handle = self.channel(id)?;
        Ok(handle.fader().spawn_fade_out(duration))
    }

    /// Pause and silence immediately; selection is left alone
    pub fn stop(&self, id: &ChannelId) -> Result<(), MixerError> {
        let handle = self.channel(id)?;
        handle.fader().stop();
        Ok(())
    }

    /// Change the preferred volume.
    ///
    /// A playing channel takes the new volume at once (superseding a fade-in);
    /// a channel that is paused or fading out only remembers it.
    pub fn set_volume(&self, id: &ChannelId, volume: f32) -> Result<(), MixerError> {
        let handle = self.channel(id)?;
        let volume = handle.set_preferred(volume);
        handle.fader().set_volume_unless_fading_out(volume);

        self.persist(id, volume);
        Ok(())
    }

    /// Put a channel back to a snapshot without fading.
    ///
    /// Returns false if the snapshot was playing and the channel refused to play.
    pub fn restore(&self, id: &ChannelId, snapshot: ChannelSnapshot) -> Result<bool, MixerError> {
        let handle = self.channel(id)?;
        let previous_preferred = handle.preferred_volume();
        let preferred = handle.set_preferred(snapshot.preferred_volume);
        handle.set_selected(snapshot.was_selected);

        let restored = handle
            .fader()
            .restore(snapshot.was_playing, snapshot.previous_volume);
        if !restored {
            tracing::warn!("Channel {} refused to resume while restoring", id);
        }

        if preferred != previous_preferred {
            self.persist(id, preferred);
        }
        Ok(restored)
    }

    fn persist(&self, id: &ChannelId, volume: f32) {
        if let Some(store) = &self.inner.store {
            persist_in_background(
                Arc::clone(store),
                id.clone(),
                volume,
                Some(self.inner.events.clone()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::channel::MemoryChannel;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::mpsc;
    use std::sync::OnceLock;

    fn mixer_with(ids: &[&str]) -> (Mixer, Vec<Arc<MemoryChannel>>) {
        let mixer = Mixer::new(FadeSettings::default(), EventBus::new());
        let channels = ids
            .iter()
            .map(|id| {
                let channel = Arc::new(MemoryChannel::new());
                mixer.add_channel(*id, *id, channel.clone(), 0.8).unwrap();
                channel
            })
            .collect();
        (mixer, channels)
    }

    type PendingFade = Pin<Box<dyn Future<Output = FadeOutcome> + Send>>;

    /// Starts a fade-out from another thread the first time the mixer asks
    /// whether it is playing, once armed
    struct ContendedChannel {
        inner: MemoryChannel,
        fader: OnceLock<FadeController>,
        fired: AtomicBool,
        started: Mutex<Option<mpsc::Sender<PendingFade>>>,
    }

    impl AudioChannel for ContendedChannel {
        fn play(&self) -> bool {
            self.inner.play()
        }

        fn pause(&self) {
            self.inner.pause()
        }

        fn is_playing(&self) -> bool {
            if let Some(fader) = self.fader.get() {
                if !self.fired.swap(true, Ordering::SeqCst) {
                    let fader = fader.clone();
                    let started = self.started.lock().take();
                    let (done_tx, done_rx) = mpsc::channel();
                    std::thread::spawn(move || {
                        let fade: PendingFade = Box::pin(fader.fade_out(Duration::from_secs(3)));
                        if let Some(started) = started {
                            let _ = started.send(fade);
                        }
                        let _ = done_tx.send(());
                    });
                    // Blocks for the whole window if the fade lock is held
                    let _ = done_rx.recv_timeout(Duration::from_millis(100));
                }
            }
            self.inner.is_playing()
        }

        fn volume(&self) -> f32 {
            self.inner.volume()
        }

        fn set_volume(&self, volume: f32) {
            self.inner.set_volume(volume)
        }
    }

    #[test]
    fn test_mixer_creation() {
        let mixer = Mixer::new(FadeSettings::default(), EventBus::new());
        assert!(mixer.is_empty());
        assert_eq!(mixer.len(), 0);
    }

    #[test]
    fn test_duplicate_and_unknown_channels() {
        let (mixer, _channels) = mixer_with(&["rain"]);
        let again = mixer.add_channel("rain", "Rain", Arc::new(MemoryChannel::new()), 0.5);
        assert!(matches!(again, Err(MixerError::DuplicateChannel(_))));

        let missing = mixer.channel(&ChannelId::new("wind"));
        assert!(matches!(missing, Err(MixerError::UnknownChannel(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_and_pause() {
        let (mixer, channels) = mixer_with(&["rain"]);
        let rain = ChannelId::new("rain");

        let outcome = mixer.play(&rain).unwrap().await.unwrap();
        assert_eq!(outcome, FadeOutcome::Completed);
        assert!(channels[0].is_playing());
        assert_eq!(channels[0].volume(), 0.8);
        assert_eq!(mixer.playing_channels(), vec![rain.clone()]);

        let outcome = mixer.pause(&rain).unwrap().await.unwrap();
        assert_eq!(outcome, FadeOutcome::Completed);
        assert!(!channels[0].is_playing());
        assert_eq!(channels[0].volume(), 0.0);
        assert_eq!(mixer.selected_channels(), vec![rain]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_volume_while_paused_is_remembered() {
        let (mixer, channels) = mixer_with(&["rain"]);
        let rain = ChannelId::new("rain");

        mixer.set_volume(&rain, 0.3).unwrap();
        assert_eq!(channels[0].volume(), 0.0);

        mixer.play(&rain).unwrap().await.unwrap();
        assert_eq!(channels[0].volume(), 0.3);

        mixer.set_volume(&rain, 0.6).unwrap();
        assert_eq!(channels[0].volume(), 0.6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_volume_during_fade_out_only_remembers() {
        let (mixer, channels) = mixer_with(&["rain"]);
        let rain = ChannelId::new("rain");
        mixer.play(&rain).unwrap().await.unwrap();

        let fade = mixer.fade_out(&rain, Duration::from_secs(3)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        mixer.set_volume(&rain, 0.5).unwrap();

        assert_eq!(fade.await.unwrap(), FadeOutcome::Completed);
        assert!(!channels[0].is_playing());
        assert_eq!(channels[0].volume(), 0.0);
        assert_eq!(mixer.channel(&rain).unwrap().preferred_volume(), 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_out_started_during_set_volume_still_wins() {
        let mixer = Mixer::new(FadeSettings::default(), EventBus::new());
        let (started_tx, started_rx) = mpsc::channel();
        let channel = Arc::new(ContendedChannel {
            inner: MemoryChannel::new(),
            fader: OnceLock::new(),
            fired: AtomicBool::new(false),
            started: Mutex::new(Some(started_tx)),
        });
        let handle = mixer.add_channel("rain", "Rain", channel.clone(), 0.8).unwrap();
        let rain = ChannelId::new("rain");
        mixer.play(&rain).unwrap().await.unwrap();

        let _ = channel.fader.set(handle.fader().clone());
        mixer.set_volume(&rain, 0.5).unwrap();

        let fade_out = started_rx.recv().unwrap();
        assert_eq!(fade_out.await, FadeOutcome::Completed);
        assert!(!channel.inner.is_playing());
        assert_eq!(channel.inner.volume(), 0.0);
        assert_eq!(handle.preferred_volume(), 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_silences_and_keeps_selection() {
        let (mixer, channels) = mixer_with(&["rain"]);
        let rain = ChannelId::new("rain");
        let fade = mixer.play(&rain).unwrap();

        mixer.stop(&rain).unwrap();
        assert_eq!(fade.await.unwrap(), FadeOutcome::Cancelled);
        assert!(!channels[0].is_playing());
        assert_eq!(channels[0].volume(), 0.0);
        assert_eq!(mixer.selected_channels(), vec![rain]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_puts_snapshot_back() {
        let (mixer, channels) = mixer_with(&["rain"]);
        let rain = ChannelId::new("rain");
        let before = mixer.channel(&rain).unwrap().snapshot();

        mixer.play(&rain).unwrap().await.unwrap();
        mixer.set_volume(&rain, 0.4).unwrap();

        assert!(mixer.restore(&rain, before).unwrap());
        assert_eq!(mixer.channel(&rain).unwrap().snapshot(), before);
        assert!(!channels[0].is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_channel_silences() {
        let (mixer, channels) = mixer_with(&["rain"]);
        let rain = ChannelId::new("rain");
        mixer.play(&rain).unwrap().await.unwrap();

        mixer.remove_channel(&rain).unwrap();
        assert!(!channels[0].is_playing());
        assert!(mixer.is_empty());
        assert!(mixer.remove_channel(&rain).is_err());
    }
}
