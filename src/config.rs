use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

fn default_cache_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("nook")
}

fn default_note_autosave_ms() -> u64 {
    800
}

/// Where the remote collection service lives.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RemoteConfig {
    pub url: String,
    /// Public (anonymous) API key sent with every request.
    pub api_key: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct NookConfig {
    pub cache_directory: PathBuf,
    pub remote: Option<RemoteConfig>,
    /// Fixed owner id; when unset the keyring session decides.
    pub owner_id: Option<String>,
    pub debug_logging: bool,
    #[serde(default = "default_note_autosave_ms")]
    pub note_autosave_ms: u64,
}

impl Default for NookConfig {
    fn default() -> Self {
        Self {
            cache_directory: default_cache_dir(),
            remote: None,
            owner_id: None,
            debug_logging: false,
            note_autosave_ms: default_note_autosave_ms(),
        }
    }
}

impl NookConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("nook")
            .join("config.json")
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load from `path`, falling back to defaults when it is missing or broken.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                log::warn!("Using default config, {} is unusable: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn note_autosave(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.note_autosave_ms)
    }

    /// Ensure the cache directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.cache_directory)
    }
}
