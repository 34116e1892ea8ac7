// Configuration management for trackhive
// Handles loading/saving settings, with sensible defaults when config is missing

use anyhow::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub library: LibraryConfig,
    pub storage: StorageConfig,
    pub search: SearchConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    pub paths: Vec<PathBuf>,
    pub supported_extensions: Vec<String>,
    pub skip_hidden: bool,
    pub follow_links: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub backend: StorageBackend,
    pub cache_album_art: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_results_per_category: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub recently_played_limit: usize,
    pub recently_added_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
}

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "wav", "ogg", "m4a", "aac", "alac", "ape", "wv", "opus", "wma", "mp4",
];

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            paths: vec![dirs::audio_dir().unwrap_or_else(|| PathBuf::from("~/Music"))],
            supported_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            skip_hidden: true,
            follow_links: false,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_results_per_category: 50 }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            recently_played_limit: 100,
            recently_added_limit: 50,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trackhive");

        Self {
            library: LibraryConfig::default(),
            storage: StorageConfig {
                data_dir: data_dir.clone(),
                backend: StorageBackend::Json,
                cache_album_art: true,
            },
            search: SearchConfig::default(),
            history: HistoryConfig::default(),
            logging: LoggingConfig {
                log_dir: data_dir.join("logs"),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Reads `path`, writing a default config there first if it doesn't exist.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(config_path, content)?;

        Ok(())
    }

    pub fn album_art_dir(&self) -> Option<PathBuf> {
        self.storage
            .cache_album_art
            .then(|| self.storage.data_dir.join("albumart"))
    }

    pub fn export_dir(&self) -> PathBuf {
        self.storage.data_dir.join("exports")
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("trackhive");

        Ok(config_dir.join("config.toml"))
    }
}
