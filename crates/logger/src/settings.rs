//! Application Configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `telemetry-logger.toml`, then an explicit file, then `TELEMETRY_*`
//! environment variables (`__` separates nested keys, e.g.
//! `TELEMETRY_SYNTHETIC__SEED=7`).

use config::{Config, ConfigError, Environment, File};
use ingest::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use storage::SinkWriterConfig;
use synthetic_source::SyntheticConfig;
use telemetry_protocol::{DecoderConfig, LinkConfig};

/// Config file picked up from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "telemetry-logger";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Use the synthetic source instead of the serial link
    pub demo: bool,
    /// In demo mode, push synthetic frames through the wire decoder
    pub loopback: bool,
    /// Serial link settings
    pub link: LinkConfig,
    /// Explicit CSV path; a timestamped file in `log_dir` otherwise
    pub csv_path: Option<PathBuf>,
    /// Directory for timestamped session logs
    pub log_dir: PathBuf,
    /// Disable the CSV log (live view only)
    pub no_log: bool,
    /// Frames kept for the live view
    pub history_depth: usize,
    /// Snapshot period of the render task (ms)
    pub render_interval_ms: u64,
    /// Minimum period between dashboard lines (ms)
    pub dashboard_interval_ms: u64,
    /// tracing level: trace, debug, info, warn, error
    pub log_level: String,
    pub log_format: LogFormat,
    pub synthetic: SyntheticConfig,
    pub decoder: DecoderConfig,
    pub sink: SinkWriterConfig,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            demo: false,
            loopback: false,
            link: LinkConfig::default(),
            csv_path: None,
            log_dir: PathBuf::from("./logs"),
            no_log: false,
            history_depth: ring_buffer::DEFAULT_CAPACITY,
            render_interval_ms: 100,
            dashboard_interval_ms: 1000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            synthetic: SyntheticConfig::default(),
            decoder: DecoderConfig::default(),
            sink: SinkWriterConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration; `explicit` must exist when given
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            Config::builder().add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix("TELEMETRY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(!config.demo);
        assert_eq!(config.history_depth, 2000);
        assert_eq!(config.link.baud_rate, 115_200);
        assert_eq!(config.log_dir, PathBuf::from("./logs"));
        assert_eq!(config.synthetic.interval_ms, 50);
        assert_eq!(config.decoder.max_pending_bytes, 4096);
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("telemetry-settings-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("logger.toml");
        fs::write(
            &path,
            r#"
demo = true
history_depth = 1200
log_format = "json"

[link]
port = "/dev/ttyACM0"

[synthetic]
seed = 99

[session]
max_consecutive_sink_failures = 25
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(config.demo);
        assert_eq!(config.history_depth, 1200);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.link.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.link.baud_rate, 115_200);
        assert_eq!(config.synthetic.seed, 99);
        assert_eq!(config.synthetic.max_gear, 8);
        assert_eq!(config.session.max_consecutive_sink_failures, Some(25));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("telemetry-settings-does-not-exist.toml");
        assert!(AppConfig::load(Some(&path)).is_err());
    }
}
