mod behavior;
mod channels;
mod defaults;
mod providers;
mod replies;

#[cfg(test)]
mod tests;

pub use behavior::*;
pub use channels::*;
pub use providers::*;
pub use replies::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::MaitreError;
use defaults::*;

/// Top-level Maitre configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub maitre: AppConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub replies: ReplyTexts,
    #[serde(default)]
    pub prompts: Prompts,
}

/// General agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Memory config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_max_context")]
    pub max_context_messages: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_context_messages: default_max_context(),
        }
    }
}

/// Booking subsystem config — the slot grid the availability query is
/// computed against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    #[serde(default = "default_booking_db_path")]
    pub db_path: String,
    /// Opening time, "HH:MM".
    #[serde(default = "default_open_time")]
    pub open_time: String,
    /// Closing time, "HH:MM". Slots start strictly before this.
    #[serde(default = "default_close_time")]
    pub close_time: String,
    /// Slot length in minutes.
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            db_path: default_booking_db_path(),
            open_time: default_open_time(),
            close_time: default_close_time(),
            slot_minutes: default_slot_minutes(),
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, MaitreError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!("Config file not found at {}, using defaults", path.display());
        return Ok(Config {
            maitre: AppConfig::default(),
            behavior: BehaviorConfig::default(),
            provider: ProviderConfig::default(),
            channel: ChannelConfig::default(),
            memory: MemoryConfig::default(),
            booking: BookingConfig::default(),
            replies: ReplyTexts::default(),
            prompts: Prompts::default(),
        });
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| MaitreError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| MaitreError::Config(format!("failed to parse config: {e}")))?;

    Ok(config)
}
