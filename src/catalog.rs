use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio_system::channel::ChannelId;
use crate::error::ConfigError;

fn default_volume() -> f32 {
    0.5
}

/// One recording of a sound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundVariant {
    pub name: String,

    /// Audio file, relative to the catalog file unless absolute
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundDefinition {
    pub id: ChannelId,
    pub name: String,

    /// Volume used until the user picks one
    #[serde(default = "default_volume")]
    pub default_volume: f32,

    pub variants: Vec<SoundVariant>,

    /// Index into `variants`
    #[serde(default)]
    pub selected_variant: usize,
}

impl SoundDefinition {
    pub fn active_variant(&self) -> Option<&SoundVariant> {
        self.variants.get(self.selected_variant)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.variants.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "sound '{}' has no variants",
                self.id
            )));
        }
        if self.selected_variant >= self.variants.len() {
            return Err(ConfigError::Invalid(format!(
                "sound '{}' selects variant {} but has {}",
                self.id,
                self.selected_variant,
                self.variants.len()
            )));
        }
        if !self.default_volume.is_finite() || !(0.0..=1.0).contains(&self.default_volume) {
            return Err(ConfigError::Invalid(format!(
                "sound '{}' has default volume {} outside 0..1",
                self.id, self.default_volume
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    sounds: Vec<SoundDefinition>,
}

/// The sounds available to the mixer
#[derive(Debug, Clone, Default)]
pub struct SoundCatalog {
    sounds: Vec<SoundDefinition>,
    base_dir: Option<PathBuf>,
}

impl SoundCatalog {
    /// Load and validate a catalog file; variant files resolve against its directory
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let mut catalog = Self::parse(&content, &path.display().to_string())?;
        catalog.base_dir = path.parent().map(Path::to_path_buf);

        tracing::info!("Loaded {} sounds from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::parse(json, "<inline catalog>")
    }

    fn parse(json: &str, origin: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = serde_json::from_str(json).map_err(|e| ConfigError::LoadFailed {
            path: origin.to_string(),
            source: Box::new(e),
        })?;
        Self::from_sounds(file.sounds)
    }

    pub fn from_sounds(sounds: Vec<SoundDefinition>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for sound in &sounds {
            sound.validate()?;
            if !seen.insert(sound.id.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "sound id '{}' appears more than once",
                    sound.id
                )));
            }
        }

        Ok(Self {
            sounds,
            base_dir: None,
        })
    }

    pub fn sounds(&self) -> &[SoundDefinition] {
        &self.sounds
    }

    pub fn get(&self, id: &ChannelId) -> Option<&SoundDefinition> {
        self.sounds.iter().find(|sound| &sound.id == id)
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    /// Full path of a variant's audio file
    pub fn resolve(&self, variant: &SoundVariant) -> PathBuf {
        let file = Path::new(&variant.file);
        match &self.base_dir {
            Some(base) if file.is_relative() => base.join(file),
            _ => file.to_path_buf(),
        }
    }
}
