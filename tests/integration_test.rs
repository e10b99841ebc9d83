// Integration tests for Ambient Mixer
// Fades, the sleep timer and the intent layer running together on virtual time

use std::sync::Arc;
use std::time::Duration;

use ambient_mixer::audio_system::{
    AudioChannel, ChannelId, FadeController, FadeDirection, FadeOutcome, FadeSettings,
    MemoryChannel, Mixer,
};
use ambient_mixer::messaging::{
    AudioSessionEvent, CommandInvoker, EventBus, Intent, MixerEvent, RemoteCommand,
};
use ambient_mixer::timer::{FadeOutGroup, SleepTimer, TimerCoordinator, TimerMode};

struct Rig {
    mixer: Mixer,
    invoker: Arc<CommandInvoker>,
    events: EventBus,
    channels: Vec<Arc<MemoryChannel>>,
}

fn rig(ids: &[&str]) -> Rig {
    let events = EventBus::new();
    let mixer = Mixer::new(FadeSettings::default(), events.clone());
    let channels = ids
        .iter()
        .map(|id| {
            let channel = Arc::new(MemoryChannel::new());
            mixer.add_channel(*id, *id, channel.clone(), 0.8).unwrap();
            channel
        })
        .collect();
    Rig {
        invoker: Arc::new(CommandInvoker::new(mixer.clone(), 50)),
        mixer,
        events,
        channels,
    }
}

fn timer_target(rig: &Rig) -> Arc<dyn FadeOutGroup> {
    rig.invoker.clone()
}

fn fade_outs_by_channel(events: &[MixerEvent], duration: Duration) -> Vec<ChannelId> {
    let mut ids: Vec<ChannelId> = events
        .iter()
        .filter_map(|event| match event {
            MixerEvent::FadeStarted {
                channel,
                direction: FadeDirection::Out,
                duration: started,
                ..
            } if *started == duration => Some(channel.clone()),
            _ => None,
        })
        .collect();
    ids.sort();
    ids
}

#[tokio::test(start_paused = true)]
async fn test_fade_in_runs_to_target() {
    let channel = Arc::new(MemoryChannel::new());
    let fader = FadeController::new(ChannelId::new("rain"), channel.clone(), FadeSettings::default());

    let outcome = fader.fade_in(0.8, Duration::from_secs(2)).await;

    assert_eq!(outcome, FadeOutcome::Completed);
    assert_eq!(channel.volume(), 0.8);
    assert!(channel.is_playing());
    assert!(!fader.is_fading());
}

#[tokio::test(start_paused = true)]
async fn test_fade_out_supersedes_fade_in() {
    let channel = Arc::new(MemoryChannel::new());
    let fader = FadeController::new(ChannelId::new("rain"), channel.clone(), FadeSettings::default());

    let fade_in = fader.spawn_fade_in(0.8, Duration::from_secs(2));
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(channel.volume() > 0.0);

    let outcome = fader.fade_out(Duration::from_secs(1)).await;
    assert_eq!(outcome, FadeOutcome::Completed);
    assert_eq!(fade_in.await.unwrap(), FadeOutcome::Cancelled);

    // Well past where the fade-in would have finished
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(channel.volume(), 0.0);
    assert!(!channel.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_fade_out_right_after_fade_in() {
    let channel = Arc::new(MemoryChannel::new());
    let fader = FadeController::new(ChannelId::new("rain"), channel.clone(), FadeSettings::default());

    // The fade-in task has not been polled when the fade-out arrives
    let fade_in = fader.spawn_fade_in(0.8, Duration::from_secs(2));
    let fade_out = fader.spawn_fade_out(Duration::from_secs(1));

    assert_eq!(fade_in.await.unwrap(), FadeOutcome::Cancelled);
    assert_eq!(fade_out.await.unwrap(), FadeOutcome::Completed);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(channel.volume(), 0.0);
    assert!(!channel.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_with_nothing_in_flight_changes_nothing() {
    let channel = Arc::new(MemoryChannel::new());
    let fader = FadeController::new(ChannelId::new("rain"), channel.clone(), FadeSettings::default());
    fader.fade_in(0.6, Duration::from_secs(1)).await;

    let writes = channel.volume_writes();
    fader.cancel();

    assert_eq!(channel.volume_writes(), writes);
    assert_eq!(channel.volume(), 0.6);
    assert!(channel.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_timer_stopped_early_never_fades() {
    let rig = rig(&["rain"]);
    rig.mixer.play(&ChannelId::new("rain")).unwrap().await.unwrap();

    let coordinator = TimerCoordinator::new(SleepTimer::new(), timer_target(&rig));
    coordinator
        .set_timer(TimerMode::Custom { seconds: 5 }, Duration::from_secs(3))
        .unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(coordinator.cancel_timer());
    assert!(!coordinator.has_active_timer());

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(rig.channels[0].is_playing());
    assert_eq!(rig.channels[0].volume(), 0.8);
}

#[tokio::test(start_paused = true)]
async fn test_timer_expiry_fades_each_playing_channel_once() {
    let rig = rig(&["fire", "rain", "wind"]);
    rig.mixer.play(&ChannelId::new("rain")).unwrap().await.unwrap();
    rig.mixer.play(&ChannelId::new("wind")).unwrap().await.unwrap();

    let (rx, _id) = rig.events.subscribe();
    let coordinator = TimerCoordinator::new(
        SleepTimer::with_events(rig.events.clone()),
        timer_target(&rig),
    );
    coordinator
        .set_timer(TimerMode::FiveMinutes, Duration::from_secs(3))
        .unwrap();

    tokio::time::sleep(Duration::from_secs(305)).await;

    let events: Vec<MixerEvent> = rx.try_iter().collect();
    assert_eq!(
        fade_outs_by_channel(&events, Duration::from_secs(3)),
        vec![ChannelId::new("rain"), ChannelId::new("wind")]
    );
    assert!(events.iter().any(|event| matches!(event, MixerEvent::TimerExpired)));
    assert!(rig.channels.iter().all(|channel| !channel.is_playing()));
    assert!(rig.channels.iter().all(|channel| channel.volume() == 0.0));
    assert!(!coordinator.has_active_timer());
}

#[tokio::test(start_paused = true)]
async fn test_second_timer_replaces_first_binding() {
    let rig = rig(&["rain"]);
    rig.mixer.play(&ChannelId::new("rain")).unwrap().await.unwrap();

    let (rx, _id) = rig.events.subscribe();
    let coordinator = TimerCoordinator::new(SleepTimer::new(), timer_target(&rig));
    coordinator
        .set_timer(TimerMode::FiveMinutes, Duration::from_secs(3))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;
    coordinator
        .set_timer(TimerMode::TenMinutes, Duration::from_secs(7))
        .unwrap();

    // First binding would have fired at 300s
    tokio::time::sleep(Duration::from_secs(200)).await;
    assert!(rig.channels[0].is_playing());

    tokio::time::sleep(Duration::from_secs(420)).await;
    let events: Vec<MixerEvent> = rx.try_iter().collect();
    assert!(fade_outs_by_channel(&events, Duration::from_secs(3)).is_empty());
    assert_eq!(
        fade_outs_by_channel(&events, Duration::from_secs(7)),
        vec![ChannelId::new("rain")]
    );
    assert!(!rig.channels[0].is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_undo_volume_changes_without_fade() {
    let rig = rig(&["rain"]);
    let invoker = &rig.invoker;
    let rain = ChannelId::new("rain");

    if let Some(fade) = invoker.execute(Intent::play("rain")).unwrap() {
        fade.await.unwrap();
    }
    let before = rig.mixer.channel(&rain).unwrap().snapshot();

    invoker.execute(Intent::set_volume("rain", 0.5)).unwrap();
    invoker.execute(Intent::set_volume("rain", 0.9)).unwrap();
    assert!(invoker.undo().unwrap());
    assert!(invoker.undo().unwrap());

    assert!(!rig.mixer.channel(&rain).unwrap().fader().is_fading());
    assert_eq!(rig.mixer.channel(&rain).unwrap().snapshot(), before);
    assert!(invoker.can_redo());
}

#[tokio::test(start_paused = true)]
async fn test_interruption_during_fade_in_then_resume() {
    let rig = rig(&["rain"]);
    let fade = rig.mixer.play(&ChannelId::new("rain")).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    rig.invoker.handle_session_event(AudioSessionEvent::InterruptionBegan);
    assert_eq!(fade.await.unwrap(), FadeOutcome::Cancelled);
    assert!(!rig.channels[0].is_playing());

    let resumed = rig
        .invoker
        .handle_session_event(AudioSessionEvent::InterruptionEnded { should_resume: true });
    for fade in resumed {
        assert_eq!(fade.await.unwrap(), FadeOutcome::Completed);
    }
    assert!(rig.channels[0].is_playing());
    assert_eq!(rig.channels[0].volume(), 0.8);
}

#[tokio::test(start_paused = true)]
async fn test_remote_toggle_round_trip_keeps_mix() {
    let rig = rig(&["rain", "wind"]);
    let invoker = &rig.invoker;
    if let Some(fade) = invoker.execute(Intent::play("wind")).unwrap() {
        fade.await.unwrap();
    }

    for fade in invoker.handle_remote(RemoteCommand::Toggle).unwrap() {
        fade.await.unwrap();
    }
    assert!(rig.mixer.playing_channels().is_empty());

    for fade in invoker.handle_remote(RemoteCommand::Toggle).unwrap() {
        fade.await.unwrap();
    }
    assert_eq!(rig.mixer.playing_channels(), vec![ChannelId::new("wind")]);
    assert!(!rig.channels[0].is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_failed_playback_leaves_channel_silent() {
    let events = EventBus::new();
    let mixer = Mixer::new(FadeSettings::default(), events);
    let channel = Arc::new(MemoryChannel::failing());
    mixer.add_channel("rain", "Rain", channel.clone(), 0.8).unwrap();

    let outcome = mixer.play(&ChannelId::new("rain")).unwrap().await.unwrap();
    assert_eq!(outcome, FadeOutcome::PlaybackFailed);
    assert!(!channel.is_playing());
    assert_eq!(channel.volume(), 0.0);
    assert_eq!(channel.play_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_volume_change_during_timer_fade_out_is_only_remembered() {
    let rig = rig(&["rain"]);
    let rain = ChannelId::new("rain");
    if let Some(fade) = rig.invoker.execute(Intent::play("rain")).unwrap() {
        fade.await.unwrap();
    }

    let coordinator = TimerCoordinator::new(SleepTimer::new(), timer_target(&rig));
    coordinator
        .set_timer(TimerMode::Custom { seconds: 5 }, Duration::from_secs(3))
        .unwrap();

    // One second into the timer's fade-out
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(rig.channels[0].is_playing());
    rig.invoker.execute(Intent::set_volume("rain", 0.4)).unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!rig.channels[0].is_playing());
    assert_eq!(rig.channels[0].volume(), 0.0);
    assert_eq!(rig.mixer.channel(&rain).unwrap().preferred_volume(), 0.4);
    assert!(rig.invoker.can_undo());
}

#[tokio::test(start_paused = true)]
async fn test_undo_survives_removed_channel() {
    let rig = rig(&["rain", "wind"]);
    rig.invoker.execute(Intent::set_volume("wind", 0.3)).unwrap();
    rig.invoker.execute(Intent::set_volume("rain", 0.4)).unwrap();
    rig.mixer.remove_channel(&ChannelId::new("rain")).unwrap();

    assert!(rig.invoker.undo().unwrap());
    assert_eq!(
        rig.mixer.channel(&ChannelId::new("wind")).unwrap().preferred_volume(),
        0.8
    );
    assert!(!rig.invoker.can_undo());
}
