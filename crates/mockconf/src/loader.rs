//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, MockConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Which files and environment variables produced a config.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Files merged, lowest precedence first.
    pub files: Vec<PathBuf>,
    /// Variables that replaced a file or default value.
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (user, local). Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with an explicit override path.
///
/// If `override_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(override_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    // ~/.config/mockcli/config.toml, or the platform equivalent
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("mockcli/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = override_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("mockcli.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load a TOML file as a raw table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Merge `overlay` into `base` key by key; nested tables merge recursively.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut MockConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("MOCKCLI_BANNER") {
        if let Some(enabled) = parse_bool(&v) {
            config.banner.enabled = enabled;
            sources.env_overrides.push("MOCKCLI_BANNER".to_string());
        }
    }
    if let Ok(v) = env::var("MOCKCLI_BANNER_WIDTH") {
        if let Ok(width) = v.parse() {
            config.banner.width = width;
            sources.env_overrides.push("MOCKCLI_BANNER_WIDTH".to_string());
        }
    }
    if let Ok(v) = env::var("MOCKCLI_COLOR") {
        if let Some(color) = parse_bool(&v) {
            config.banner.color = color;
            sources.env_overrides.push("MOCKCLI_COLOR".to_string());
        }
    }
    // https://no-color.org: any non-empty value disables colour
    if let Ok(v) = env::var("NO_COLOR") {
        if !v.is_empty() {
            config.banner.color = false;
            sources.env_overrides.push("NO_COLOR".to_string());
        }
    }

    if let Ok(v) = env::var("MOCKCLI_LOG_LEVEL") {
        config.logging.log_level = v;
        sources.env_overrides.push("MOCKCLI_LOG_LEVEL".to_string());
    }
    // RUST_LOG wins over MOCKCLI_LOG_LEVEL
    if let Ok(v) = env::var("RUST_LOG") {
        config.logging.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_discover_config_files() {
        // Depends on the host; only checks discovery succeeds
        let _files = discover_config_files();
    }

    #[test]
    fn test_missing_override_is_ignored() {
        let files = discover_config_files_with_override(Some(Path::new(
            "/definitely/not/here/mockcli.toml",
        )));
        assert!(!files.iter().any(|f| f.starts_with("/definitely")));
    }

    #[test]
    fn test_merge_tables_nested() {
        let mut base: toml::Table = r#"
[banner]
width = 100
color = false
"#
        .parse()
        .unwrap();
        let overlay: toml::Table = r#"
[banner]
width = 60

[logging]
log_level = "debug"
"#
        .parse()
        .unwrap();

        merge_tables(&mut base, overlay);

        let banner = base["banner"].as_table().unwrap();
        assert_eq!(banner["width"].as_integer(), Some(60));
        assert_eq!(banner["color"].as_bool(), Some(false));
        assert_eq!(base["logging"]["log_level"].as_str(), Some("debug"));
    }

    #[test]
    fn test_load_table_missing_file() {
        let err = load_table(Path::new("/no/such/mockcli.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        env::set_var("MOCKCLI_BANNER", "off");
        env::set_var("MOCKCLI_BANNER_WIDTH", "33");
        env::set_var("NO_COLOR", "1");

        let mut config = MockConfig::default();
        let mut sources = ConfigSources::default();
        apply_env_overrides(&mut config, &mut sources);

        env::remove_var("MOCKCLI_BANNER");
        env::remove_var("MOCKCLI_BANNER_WIDTH");
        env::remove_var("NO_COLOR");

        assert!(!config.banner.enabled);
        assert_eq!(config.banner.width, 33);
        assert!(!config.banner.color);
        assert!(sources.env_overrides.contains(&"MOCKCLI_BANNER_WIDTH".to_string()));
    }
}
