//! Configuration structs with defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the persisted configuration inside the config directory.
pub const CONFIG_FILE_NAME: &str = "revline.ron";

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub lod: LodConfig,
    pub memory: MemoryConfig,
    pub texture: TextureConfig,
    pub debug: DebugConfig,
}

/// Detail-level selection settings applied to every registered subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Debounce before a new level is committed, in milliseconds. 0 commits immediately.
    pub transition_delay_ms: u64,
    /// Distance band, in scene units, that suppresses flapping at level boundaries.
    pub hysteresis: f32,
    /// Feed viewer positions every N frames.
    pub update_every_n_frames: u32,
}

/// Resource memory manager settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    pub warning_percentage: f64,
    pub critical_percentage: f64,
    pub emergency_percentage: f64,
    /// Start the background sampler at startup.
    pub monitoring_enabled: bool,
    /// Sampling interval of the background monitor, in milliseconds.
    pub monitor_interval_ms: u64,
    /// Number of samples kept for statistics.
    pub history_capacity: usize,
}

/// Texture quality cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextureConfig {
    /// Preset name used when a caller does not pick one ("ultra" .. "minimal").
    pub default_preset: String,
    /// Memory budget for cached variants, in MB.
    pub budget_mb: f64,
    /// Anisotropy ceiling of the render backend. `None` leaves variants at 1.
    pub max_anisotropy: Option<u32>,
    /// Expire variants not accessed for this many seconds. `None` keeps them.
    pub variant_ttl_secs: Option<u64>,
}

/// Debug/development settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter directive (e.g. "debug", "info,revline_lod=trace").
    pub log_level: String,
    /// Write a JSON log file next to the config in debug builds.
    pub file_logging: bool,
    /// Log a statistics summary every N frames. 0 disables it.
    pub stats_every_n_frames: u32,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            transition_delay_ms: 300,
            hysteresis: 1.0,
            update_every_n_frames: 1,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            warning_percentage: 70.0,
            critical_percentage: 85.0,
            emergency_percentage: 95.0,
            monitoring_enabled: true,
            monitor_interval_ms: 5000,
            history_capacity: 100,
        }
    }
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            default_preset: "high".to_string(),
            budget_mb: 500.0,
            max_anisotropy: None,
            variant_ttl_secs: None,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            file_logging: true,
            stats_every_n_frames: 0,
        }
    }
}

/// Platform config directory for Revline, if the platform has one.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("revline"))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            tracing::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            tracing::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as [`CONFIG_FILE_NAME`].
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(2)
            .enumerate_arrays(false);
        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(config_dir.join(CONFIG_FILE_NAME), serialized)
            .map_err(ConfigError::WriteError)
    }

    /// Re-read the file. Returns `Some(new_config)` if it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read(&config_dir.join(CONFIG_FILE_NAME))?;

        if &new_config != self {
            tracing::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        ron::from_str(&contents).map_err(ConfigError::ParseError)
    }
}
