use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ambient_mixer::audio_system::{AudioChannel, ChannelId, MemoryChannel, Mixer, RodioChannel};
use ambient_mixer::catalog::SoundCatalog;
use ambient_mixer::config::{app_config_dir, MixerConfig};
use ambient_mixer::error::AppResult;
use ambient_mixer::messaging::{
    format_remaining, AudioSessionEvent, CommandInvoker, EventBus, Intent, IntentOrigin,
    RemoteCommand,
};
use ambient_mixer::persistence::{JsonVolumeStore, VolumeStore};
use ambient_mixer::timer::{FadeOutGroup, SleepTimer, TimerCoordinator, TimerMode};
use anyhow::{bail, Context};
use rodio::{OutputStream, OutputStreamHandle};
use sysinfo::System;
use tokio::io::{AsyncBufReadExt, BufReader};

const LOG_TARGET_STARTUP: &str = "ambient_mixer::startup";

/// Initialize tracing with file rotation
///
/// Logs are written to:
/// - macOS: ~/Library/Application Support/AmbientMixer/logs/
/// - Windows: %APPDATA%/AmbientMixer/logs/
/// - Linux: ~/.config/AmbientMixer/logs/
///
/// Log output:
/// - Debug builds: Console + File
/// - Release builds: File only
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = app_config_dir()
        .map(|dir| dir.join("logs"))
        .unwrap_or_else(|_| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    // Daily rotation: ambient-mixer.log.YYYY-MM-DD
    let file_appender = rolling::daily(&log_dir, "ambient-mixer.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn log_runtime_environment() {
    let mut system = System::new_all();
    system.refresh_all();

    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting Ambient Mixer v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);
    tracing::debug!(target: LOG_TARGET_STARTUP, "Logical CPUs: {}", system.cpus().len());
}

/// A line typed on stdin
#[derive(Debug, Clone, PartialEq)]
enum CliCommand {
    Play(ChannelId),
    Pause(ChannelId),
    Stop(ChannelId),
    Volume(ChannelId, f32),
    Timer(TimerMode),
    CancelTimer,
    Undo,
    Redo,
    Remote(RemoteCommand),
    Session(AudioSessionEvent),
    Status,
    Help,
    Quit,
}

impl CliCommand {
    fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| "empty command".to_string())?;
        let mut channel = || {
            words
                .next()
                .map(ChannelId::from)
                .ok_or_else(|| format!("usage: {} <sound id>", verb))
        };

        let command = match verb {
            "play" => CliCommand::Play(channel()?),
            "pause" => CliCommand::Pause(channel()?),
            "stop" => CliCommand::Stop(channel()?),
            "volume" => {
                let id = channel()?;
                let volume = words
                    .next()
                    .and_then(|value| value.parse::<f32>().ok())
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| "usage: volume <sound id> <0..1>".to_string())?;
                CliCommand::Volume(id, volume)
            }
            "timer" => {
                let mode = words
                    .next()
                    .and_then(TimerMode::parse)
                    .ok_or_else(|| "usage: timer <off|minutes|30s|45m|2h>".to_string())?;
                CliCommand::Timer(mode)
            }
            "cancel-timer" => CliCommand::CancelTimer,
            "undo" => CliCommand::Undo,
            "redo" => CliCommand::Redo,
            "remote" => {
                let command = words
                    .next()
                    .and_then(RemoteCommand::parse)
                    .ok_or_else(|| "usage: remote <play|pause|toggle>".to_string())?;
                CliCommand::Remote(command)
            }
            "interrupt" => CliCommand::Session(AudioSessionEvent::InterruptionBegan),
            "resume" => CliCommand::Session(AudioSessionEvent::InterruptionEnded {
                should_resume: words.next() != Some("--no-resume"),
            }),
            "route" => CliCommand::Session(AudioSessionEvent::RouteChanged {
                reason: words.collect::<Vec<_>>().join(" "),
            }),
            "status" => CliCommand::Status,
            "help" | "?" => CliCommand::Help,
            "quit" | "exit" => CliCommand::Quit,
            other => return Err(format!("unknown command '{}' (try 'help')", other)),
        };
        Ok(command)
    }
}

const HELP: &str = "\
Commands:
  play <id>            fade a sound in
  pause <id>           fade a sound out
  stop <id>            silence a sound now
  volume <id> <0..1>   set a sound's volume
  timer <mode>         sleep timer: off, 15 (minutes), 90s, 45m, 2h
  cancel-timer         stop the sleep timer
  undo / redo          step through the change history
  remote <cmd>         play, pause or toggle everything
  interrupt / resume [--no-resume] / route <reason>
                       simulate audio session events
  status               show channels and timer
  quit                 fade out and exit";

struct App {
    mixer: Mixer,
    invoker: Arc<CommandInvoker>,
    coordinator: TimerCoordinator,
    timer_fade_out: Duration,
}

impl App {
    /// Returns false when the app should exit
    fn handle(&self, command: CliCommand) -> AppResult<bool> {
        match command {
            CliCommand::Play(id) => {
                self.invoker.execute(Intent::play(id))?;
            }
            CliCommand::Pause(id) => {
                self.invoker.execute(Intent::pause(id))?;
            }
            CliCommand::Stop(id) => {
                self.invoker.execute(Intent::stop(id))?;
            }
            CliCommand::Volume(id, volume) => {
                self.invoker.execute(Intent::set_volume(id, volume))?;
            }
            CliCommand::Timer(mode) => {
                self.coordinator.set_timer(mode, self.timer_fade_out)?;
                println!("Sleep timer: {}", mode);
            }
            CliCommand::CancelTimer => {
                if !self.coordinator.cancel_timer() {
                    println!("No sleep timer running");
                }
            }
            CliCommand::Undo => {
                if !self.invoker.undo()? {
                    println!("Nothing to undo");
                }
            }
            CliCommand::Redo => {
                if self.invoker.redo()?.is_none() {
                    println!("Nothing to redo");
                }
            }
            CliCommand::Remote(command) => {
                self.invoker.handle_remote(command)?;
            }
            CliCommand::Session(event) => {
                self.invoker.handle_session_event(event);
            }
            CliCommand::Status => self.print_status(),
            CliCommand::Help => println!("{}", HELP),
            CliCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn print_status(&self) {
        for handle in self.mixer.channels() {
            println!(
                "  {:<12} {:<20} {:<8} volume {:.2} (preferred {:.2}){}",
                handle.id().as_str(),
                handle.name(),
                if handle.is_playing() { "playing" } else { "paused" },
                handle.volume(),
                handle.preferred_volume(),
                if handle.fader().is_fading() { " fading" } else { "" }
            );
        }
        if self.coordinator.has_active_timer() {
            println!(
                "  Sleep timer: {} ({} left)",
                self.coordinator.mode(),
                format_remaining(self.coordinator.remaining())
            );
        } else {
            println!("  Sleep timer: off");
        }
    }

    /// Fade everything out and wait for it, bounded by the fade length
    async fn shutdown(&self) {
        self.coordinator.cancel_timer();
        let fade_out = self.mixer.settings().fade_out;
        let fades = self.invoker.fade_out_playing(fade_out, IntentOrigin::User);
        let limit = fade_out + Duration::from_secs(1);
        let drained = tokio::time::timeout(limit, async {
            for fade in fades {
                let _ = fade.await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!("Gave up waiting for fades to finish");
        }
    }
}

fn open_output() -> Option<(OutputStream, OutputStreamHandle)> {
    match OutputStream::try_default() {
        Ok(output) => Some(output),
        Err(e) => {
            tracing::warn!("No audio output ({}); running with silent channels", e);
            None
        }
    }
}

fn register_channels(
    mixer: &Mixer,
    catalog: &SoundCatalog,
    output: Option<&OutputStreamHandle>,
) -> AppResult<()> {
    for sound in catalog.sounds() {
        let Some(variant) = sound.active_variant() else {
            continue;
        };

        let channel: Arc<dyn AudioChannel> = match output {
            Some(handle) => {
                let path = catalog.resolve(variant);
                match RodioChannel::load(sound.id.clone(), &path, handle) {
                    Ok(channel) => Arc::new(channel),
                    Err(e) => {
                        tracing::warn!("Skipping {}: {}", sound.id, e);
                        continue;
                    }
                }
            }
            None => Arc::new(MemoryChannel::new()),
        };

        mixer.add_channel(sound.id.clone(), sound.name.clone(), channel, sound.default_volume)?;
    }
    Ok(())
}

fn catalog_path(config: &MixerConfig) -> AppResult<PathBuf> {
    if let Some(path) = std::env::args().nth(1) {
        return Ok(PathBuf::from(path));
    }
    match &config.catalog_path {
        Some(path) => Ok(PathBuf::from(path)),
        None => bail!("No sound catalog given. Usage: ambient-mixer <catalog.json>"),
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    initialize_tracing();
    log_runtime_environment();

    let config = MixerConfig::load().context("Failed to load configuration")?;
    let settings = config.fade_settings()?;
    let timer_fade_out = config.timer_fade_out()?;

    let path = catalog_path(&config)?;
    let catalog = SoundCatalog::load(&path)
        .with_context(|| format!("Failed to load sound catalog {}", path.display()))?;

    let events = EventBus::new();
    let mixer = match JsonVolumeStore::open_default() {
        Ok(store) => {
            let store: Arc<dyn VolumeStore> = Arc::new(store);
            Mixer::with_store(settings, events.clone(), store)
        }
        Err(e) => {
            tracing::warn!("Volume store unavailable ({}); volumes will not be saved", e);
            Mixer::new(settings, events.clone())
        }
    };

    // Must outlive every RodioChannel
    let output = open_output();
    register_channels(&mixer, &catalog, output.as_ref().map(|(_, handle)| handle))?;

    let (event_rx, _subscription) = events.subscribe();
    std::thread::spawn(move || {
        while let Ok(event) = event_rx.recv() {
            tracing::debug!("{}", event.description());
        }
    });

    let invoker = Arc::new(CommandInvoker::new(mixer.clone(), config.history_limit));
    let coordinator = TimerCoordinator::new(
        SleepTimer::with_events(events.clone()),
        Arc::clone(&invoker) as Arc<dyn FadeOutGroup>,
    );
    if !config.default_timer.is_off() {
        coordinator.set_timer(config.default_timer, timer_fade_out)?;
    }

    let app = App {
        invoker,
        mixer,
        coordinator,
        timer_fade_out,
    };

    println!("Ambient Mixer: {} sounds loaded. Type 'help' for commands.", app.mixer.len());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match CliCommand::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };
        match app.handle(command) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("Error: {:#}", e),
        }
    }

    app.shutdown().await;
    tracing::info!("Ambient Mixer stopped");
    Ok(())
}
