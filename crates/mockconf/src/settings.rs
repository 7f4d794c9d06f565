//! Settings sections - banner rendering and logging.

use serde::{Deserialize, Serialize};

/// Banner lines printed around a capture that relays stdout to the console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannerConfig {
    /// Print start/end banners when stdout is relayed to the real console.
    /// Default: true
    #[serde(default = "BannerConfig::default_enabled")]
    pub enabled: bool,

    /// Width used when the console stream cannot report its columns.
    /// Default: 80
    #[serde(default = "BannerConfig::default_width")]
    pub width: usize,

    /// Render banners in inverse video.
    /// Default: true
    #[serde(default = "BannerConfig::default_color")]
    pub color: bool,

    /// Default: "Start of CLI capture"
    #[serde(default = "BannerConfig::default_start_message")]
    pub start_message: String,

    /// Default: "End of CLI capture"
    #[serde(default = "BannerConfig::default_end_message")]
    pub end_message: String,

    /// Decoration on both sides of the start banner.
    /// Default: " ▼ "
    #[serde(default = "BannerConfig::default_start_decoration")]
    pub start_decoration: String,

    /// Decoration on both sides of the end banner.
    /// Default: " ▲ "
    #[serde(default = "BannerConfig::default_end_decoration")]
    pub end_decoration: String,
}

impl BannerConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_width() -> usize {
        80
    }

    fn default_color() -> bool {
        true
    }

    fn default_start_message() -> String {
        "Start of CLI capture".to_string()
    }

    fn default_end_message() -> String {
        "End of CLI capture".to_string()
    }

    fn default_start_decoration() -> String {
        " ▼ ".to_string()
    }

    fn default_end_decoration() -> String {
        " ▲ ".to_string()
    }
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            width: Self::default_width(),
            color: Self::default_color(),
            start_message: Self::default_start_message(),
            end_message: Self::default_end_message(),
            start_decoration: Self::default_start_decoration(),
            end_decoration: Self::default_end_decoration(),
        }
    }
}

/// Harness log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive (trace, debug, info, warn, error, or an EnvFilter string).
    /// Default: warn
    #[serde(default = "LoggingConfig::default_log_level")]
    pub log_level: String,
}

impl LoggingConfig {
    fn default_log_level() -> String {
        "warn".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
