/// Per-channel volume persistence
///
/// Settled user volumes are handed off here and written in the background.
/// Nothing in the mixer ever waits on a save.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio_system::channel::ChannelId;
use crate::config::app_config_dir;
use crate::error::ConfigError;
use crate::messaging::{EventBus, MixerEvent};

/// Somewhere to keep the last volume the user chose for each channel
pub trait VolumeStore: Send + Sync {
    fn save(&self, channel: &ChannelId, volume: f32) -> Result<(), ConfigError>;

    fn load_all(&self) -> BTreeMap<ChannelId, f32>;

    fn load(&self, channel: &ChannelId) -> Option<f32> {
        self.load_all().get(channel).copied()
    }
}

/// Volumes kept as a pretty-printed JSON object `{ "rain": 0.6, ... }`
pub struct JsonVolumeStore {
    path: PathBuf,
    volumes: Mutex<BTreeMap<ChannelId, f32>>,
}

impl JsonVolumeStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let volumes = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
            let raw: BTreeMap<ChannelId, f32> =
                serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.display().to_string(),
                    source: Box::new(e),
                })?;
            raw.into_iter()
                .filter(|(_, volume)| volume.is_finite())
                .map(|(id, volume)| (id, volume.clamp(0.0, 1.0)))
                .collect()
        } else {
            BTreeMap::new()
        };

        tracing::debug!("Opened volume store {} ({} entries)", path.display(), volumes.len());
        Ok(Self {
            path,
            volumes: Mutex::new(volumes),
        })
    }

    /// `<config_dir>/AmbientMixer/volumes.json`
    pub fn open_default() -> Result<Self, ConfigError> {
        Self::open(app_config_dir()?.join("volumes.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, volumes: &BTreeMap<ChannelId, f32>) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(volumes).map_err(|e| ConfigError::SaveFailed {
            path: self.path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(&self.path, json).map_err(|e| ConfigError::SaveFailed {
            path: self.path.display().to_string(),
            source: Box::new(e),
        })
    }
}

impl VolumeStore for JsonVolumeStore {
    fn save(&self, channel: &ChannelId, volume: f32) -> Result<(), ConfigError> {
        // Held across the write so concurrent saves land in order
        let mut volumes = self.volumes.lock();
        volumes.insert(channel.clone(), volume.clamp(0.0, 1.0));
        self.write(&volumes)
    }

    fn load_all(&self) -> BTreeMap<ChannelId, f32> {
        self.volumes.lock().clone()
    }
}

/// Save on the blocking pool and forget about it.
///
/// Failures are logged. Outside a tokio runtime the save runs inline.
pub fn persist_in_background(
    store: Arc<dyn VolumeStore>,
    channel: ChannelId,
    volume: f32,
    events: Option<EventBus>,
) {
    let job = move || match store.save(&channel, volume) {
        Ok(()) => {
            tracing::debug!("Persisted volume {:.2} for {}", volume, channel);
            if let Some(events) = events {
                events.publish(MixerEvent::VolumePersisted { channel, volume });
            }
        }
        Err(e) => tracing::warn!("Failed to persist volume for {}: {}", channel, e),
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(job);
        }
        Err(_) => job(),
    }
}
