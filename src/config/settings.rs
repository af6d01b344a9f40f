//! Application settings

use crate::core::master::RtuTiming;
use crate::core::transport::SerialSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid TOML for this schema
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Settings could not be rendered as TOML
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No home or config directory on this platform
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Serial line
    pub serial: SerialSettings,
    /// RTU exchange timing
    pub rtu: RtuTiming,
    /// Text protocol exchanges
    pub ascii: AsciiConfig,
    /// ADAM-4055 module
    pub adam: AdamConfig,
}

impl AppConfig {
    /// Load config from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load config from the default location
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(&Self::default_path()?)
    }

    /// Save config to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file location
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        super::default_config_path().ok_or(ConfigError::NoConfigDir)
    }
}

/// Text protocol settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsciiConfig {
    /// Overall ceiling for one exchange, in milliseconds
    pub read_timeout_ms: u64,
    /// Appended to commands and expected at the end of replies
    pub terminator: String,
}

impl AsciiConfig {
    /// Exchange ceiling
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 5000,
            terminator: "\r".to_string(),
        }
    }
}

/// ADAM-4055 settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    /// Module address
    pub address: u8,
    /// Overall ceiling for one exchange, in milliseconds
    pub read_timeout_ms: u64,
}

impl AdamConfig {
    /// Exchange ceiling
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            address: 1,
            read_timeout_ms: 15000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::IdleMode;
    use crate::core::transport::{SerialParity, SerialStopBits};

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.serial.baud_rate, 38400);
        assert_eq!(config.rtu.read_timeout_ms, 5000);
        assert_eq!(config.adam.read_timeout_ms, 15000);
        assert_eq!(config.ascii.terminator, "\r");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rtupoll.toml");
        std::fs::write(
            &path,
            r#"
[serial]
port = "/dev/ttyUSB0"
baud_rate = 9600
parity = "even"
stop_bits = "two"

[rtu]
idle = { fixed_ms = 100 }
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.parity, SerialParity::Even);
        assert_eq!(config.serial.stop_bits, SerialStopBits::Two);
        assert_eq!(config.serial.data_bits, 8);
        assert_eq!(config.rtu.idle, IdleMode::FixedMs(100));
        assert_eq!(config.rtu.read_timeout_ms, 5000);
        assert_eq!(config.adam.address, 1);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rtupoll.toml");
        let mut config = AppConfig::default();
        config.serial.port = "COM7".to_string();
        config.rtu.idle = IdleMode::CharTimes(4.0);
        config.rtu.auto_open = true;
        config.adam.address = 0x12;

        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rtupoll.toml");
        std::fs::write(&path, "[serial\nport = 1").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
