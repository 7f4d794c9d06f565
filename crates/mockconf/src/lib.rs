//! Configuration loading for the mockcli capture harness.
//!
//! The harness itself needs very little configuration: how the console
//! banners look, and how loud its own logging is. Everything else about a
//! capture session is supplied in code by the test that activates it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use mockconf::MockConfig;
//!
//! let config = MockConfig::load().expect("Failed to load config");
//! println!("banner width: {}", config.banner.width);
//! println!("log level: {}", config.logging.log_level);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `~/.config/mockcli/config.toml` (user)
//! 2. `./mockcli.toml` (local override)
//! 3. Environment variables (`MOCKCLI_*`, `NO_COLOR`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [banner]
//! enabled = true
//! width = 100
//! color = false
//! start_message = "captured output below"
//!
//! [logging]
//! log_level = "mockcli=debug"
//! ```

pub mod loader;
pub mod settings;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use settings::{BannerConfig, LoggingConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to read or parse a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MockConfig {
    #[serde(default)]
    pub banner: BannerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MockConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `~/.config/mockcli/config.toml`
    /// 3. `./mockcli.toml`
    /// 4. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./mockcli.toml` override. The user config still loads first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut table = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_table = loader::load_table(&path)?;
            loader::merge_tables(&mut table, file_table);
            sources.files.push(path);
        }

        let mut config: MockConfig = toml::Value::Table(table).try_into().map_err(
            |e: toml::de::Error| ConfigError::Parse {
                path: sources.files.last().cloned().unwrap_or_default(),
                message: e.to_string(),
            },
        )?;

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::from("# mockcli configuration\n\n");
        // Only plain strings, bools and integers live in here, so this cannot fail.
        if let Ok(body) = toml::to_string_pretty(self) {
            output.push_str(&body);
        }
        output
    }
}
