//! Configuration for the yuv-pipeline binary
//!
//! Settings come from three layers, later ones winning:
//! 1. Built-in defaults ([`PipelineConfig::default`])
//! 2. A config file (TOML, or JSON when the extension is `.json`)
//! 3. Command-line flags, merged by the binary
//!
//! # Config Location
//!
//! Without `--config`, the file is looked up in the platform config directory:
//! - **Linux**: `~/.config/yuv-pipeline/config.toml`
//! - **macOS**: `~/Library/Application Support/yuv-pipeline/config.toml`
//! - **Windows**: `%APPDATA%\yuv-pipeline\config.toml`
//!
//! A missing default file is not an error.
//!
//! # Example
//!
//! ```toml
//! queue_capacity = 4
//! monitor_interval_ms = 500
//! output_dir_name = "png"
//! close_policy = "discard"
//! input_extensions = ["yuv", "i420"]
//! ```

use crate::error::{AppError, Result};
use crate::pipeline::{ClosePolicy, PipelineOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "yuv-pipeline";

/// Default config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default output sub-directory under the input directory
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "pngs";

/// Default trace filename inside the output directory
pub const DEFAULT_TRACE_FILE: &str = "trace.json";

/// Default log filter when neither `RUST_LOG` nor `log_filter` is set
pub const DEFAULT_LOG_FILTER: &str = "info,yuv_pipeline=debug";

/// Default progress interval in milliseconds
pub const DEFAULT_MONITOR_INTERVAL_MS: u64 = 1000;

/// Default queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Path of the config file in the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Everything the binary can be configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of every inter-stage queue
    pub queue_capacity: usize,

    /// Progress monitor tick in milliseconds
    pub monitor_interval_ms: u64,

    /// Name of the output directory created inside the input directory
    pub output_dir_name: String,

    /// Trace destination. Defaults to `trace.json` in the output directory.
    pub trace_output: Option<PathBuf>,

    /// Record and export a timeline trace
    pub trace_enabled: bool,

    /// What a closed queue does with a late push
    pub close_policy: ClosePolicy,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: Option<String>,

    /// Also write a daily-rolling log file here
    pub log_dir: Option<PathBuf>,

    /// Accepted input file extensions (case-insensitive, without the dot)
    pub input_extensions: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            monitor_interval_ms: DEFAULT_MONITOR_INTERVAL_MS,
            output_dir_name: DEFAULT_OUTPUT_DIR_NAME.to_string(),
            trace_output: None,
            trace_enabled: true,
            close_policy: ClosePolicy::Reject,
            log_filter: None,
            log_dir: None,
            input_extensions: vec!["yuv".to_string()],
        }
    }
}

impl PipelineConfig {
    /// Load a config file. The format is picked from the extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = if is_json(path) {
            serde_json::from_str(&content).map_err(|e| {
                AppError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?
        } else {
            toml::from_str(&content).map_err(|e| {
                AppError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load the file at the default location, or defaults if there is none.
    ///
    /// A file that exists but cannot be parsed is still an error.
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from `path`, falling back to defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to `path`, creating parent directories as needed
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let content = if is_json(path) {
            serde_json::to_string_pretty(self)
                .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?
        } else {
            toml::to_string_pretty(self)
                .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?
        };

        std::fs::write(path, content).map_err(|e| {
            AppError::Config(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(AppError::Config(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.monitor_interval_ms == 0 {
            return Err(AppError::Config(
                "monitor_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.output_dir_name.trim().is_empty()
            || self.output_dir_name.contains(['/', '\\'])
            || self.output_dir_name == ".."
        {
            return Err(AppError::Config(format!(
                "output_dir_name '{}' must be a plain directory name",
                self.output_dir_name
            )));
        }
        if self.input_extensions.is_empty() {
            return Err(AppError::Config(
                "input_extensions must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    /// Output directory for a given input directory
    pub fn output_dir(&self, input_dir: &Path) -> PathBuf {
        input_dir.join(&self.output_dir_name)
    }

    /// Trace destination for a given input directory
    pub fn trace_path(&self, input_dir: &Path) -> PathBuf {
        self.trace_output
            .clone()
            .unwrap_or_else(|| self.output_dir(input_dir).join(DEFAULT_TRACE_FILE))
    }

    /// Filter directive for the log subscriber
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            close_policy: config.close_policy,
            monitor_interval: config.monitor_interval(),
            monitor_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.monitor_interval(), Duration::from_secs(1));
        assert_eq!(config.close_policy, ClosePolicy::Reject);
        assert!(config.trace_enabled);
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            queue_capacity = 3
            close_policy = "discard"
            "#,
        )
        .unwrap();
        assert_eq!(config.queue_capacity, 3);
        assert_eq!(config.close_policy, ClosePolicy::Discard);
        assert_eq!(config.output_dir_name, "pngs");
        assert_eq!(config.input_extensions, vec!["yuv".to_string()]);
    }

    #[test]
    fn test_save_and_load_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = PipelineConfig {
            queue_capacity: 4,
            monitor_interval_ms: 250,
            trace_output: Some(PathBuf::from("/tmp/run.json")),
            log_filter: Some("warn".to_string()),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.JSON");

        let config = PipelineConfig {
            trace_enabled: false,
            input_extensions: vec!["yuv".to_string(), "i420".to_string()],
            ..Default::default()
        };
        config.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.trim_start().starts_with('{'));
        assert_eq!(PipelineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "queue_capacity = 0\n").unwrap();

        let err = PipelineConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("queue_capacity"));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "queue_capacity = \"lots\"\n").unwrap();

        assert!(matches!(
            PipelineConfig::load(&path),
            Err(AppError::Config(_))
        ));
        assert_eq!(PipelineConfig::load_or_default(&path), PipelineConfig::default());
    }

    #[test]
    fn test_validate_output_dir_name() {
        for name in ["", "  ", "a/b", "..", "a\\b"] {
            let config = PipelineConfig {
                output_dir_name: name.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "accepted {:?}", name);
        }
    }

    #[test]
    fn test_paths_derive_from_input_dir() {
        let config = PipelineConfig::default();
        let input = Path::new("/data/frames");
        assert_eq!(config.output_dir(input), PathBuf::from("/data/frames/pngs"));
        assert_eq!(
            config.trace_path(input),
            PathBuf::from("/data/frames/pngs/trace.json")
        );

        let custom = PipelineConfig {
            trace_output: Some(PathBuf::from("/tmp/t.json")),
            ..Default::default()
        };
        assert_eq!(custom.trace_path(input), PathBuf::from("/tmp/t.json"));
    }

    #[test]
    fn test_into_pipeline_options() {
        let config = PipelineConfig {
            queue_capacity: 2,
            monitor_interval_ms: 50,
            close_policy: ClosePolicy::Discard,
            ..Default::default()
        };
        let options = PipelineOptions::from(&config);
        assert_eq!(options.queue_capacity, 2);
        assert_eq!(options.monitor_interval, Duration::from_millis(50));
        assert_eq!(options.close_policy, ClosePolicy::Discard);
    }
}
