//! Configuration module
//!
//! Loads line and timing settings from `rtupoll.toml`

mod settings;

pub use settings::{AdamConfig, AppConfig, AsciiConfig, ConfigError};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Configuration file name
pub const CONFIG_FILE: &str = "rtupoll.toml";

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("org", "rtupoll", "rtupoll").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default location of the configuration file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE))
}
