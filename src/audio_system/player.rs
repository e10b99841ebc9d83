/// Looping rodio channel
///
/// Plays one sound variant on its own `Sink`, looping forever. The encoded
/// file is kept in memory and decoded lazily on the first `play()`.
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use rodio::{Decoder, OutputStreamHandle, Sink, Source};

use super::channel::{AudioChannel, ChannelId};
use crate::error::AudioError;

/// Read an audio file into memory
pub fn load_audio_data(path: &Path) -> Result<Arc<[u8]>, AudioError> {
    if !path.exists() {
        return Err(AudioError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path).map_err(|e| AudioError::LoadFailed {
        path: path.display().to_string(),
        source: Box::new(e),
    })?;
    Ok(Arc::from(data))
}

/// An `AudioChannel` backed by a rodio `Sink`
pub struct RodioChannel {
    id: ChannelId,
    audio_data: Arc<[u8]>,
    sink: Sink,
}

impl RodioChannel {
    /// Load `path` and create a sink on `stream`
    pub fn load(id: ChannelId, path: &Path, stream: &OutputStreamHandle) -> Result<Self, AudioError> {
        let audio_data = load_audio_data(path)?;
        let channel = Self::from_memory(id, audio_data, stream)?;
        tracing::info!(
            "Loaded audio for {}: {} ({} bytes)",
            channel.id,
            path.display(),
            channel.audio_data.len()
        );
        Ok(channel)
    }

    pub fn from_memory(
        id: ChannelId,
        audio_data: Arc<[u8]>,
        stream: &OutputStreamHandle,
    ) -> Result<Self, AudioError> {
        let sink = Sink::try_new(stream).map_err(|e| AudioError::StreamInitFailed(Box::new(e)))?;
        sink.pause();
        sink.set_volume(0.0);

        Ok(Self {
            id,
            audio_data,
            sink,
        })
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    fn queue_loop(&self) -> Result<(), AudioError> {
        let cursor = Cursor::new(Arc::clone(&self.audio_data));
        let source = Decoder::new(cursor).map_err(|e| AudioError::DecodeFailed(Box::new(e)))?;
        self.sink.append(source.repeat_infinite());
        Ok(())
    }
}

impl AudioChannel for RodioChannel {
    fn play(&self) -> bool {
        if self.sink.empty() {
            if let Err(e) = self.queue_loop() {
                tracing::warn!("Cannot play {}: {}", self.id, e);
                return false;
            }
        }
        self.sink.play();
        true
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn is_playing(&self) -> bool {
        !self.sink.is_paused() && !self.sink.empty()
    }

    fn volume(&self) -> f32 {
        self.sink.volume()
    }

    fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume.clamp(0.0, 1.0));
    }
}

impl Drop for RodioChannel {
    fn drop(&mut self) {
        self.sink.stop();
    }
}
