//! yuv-pipeline - Main Entry Point
//!
//! Converts every `<name>.<W>_<H>.yuv` frame in a directory into a PNG under
//! `<directory>/pngs/`, printing progress while it runs and writing a
//! timeline trace when done.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use yuv_pipeline::config::{self, PipelineConfig};

#[derive(Debug, Parser, Clone)]
#[command(name = "yuv-pipeline", version)]
#[command(about = "Convert raw I420 frames named <name>.<W>_<H>.yuv into PNG files")]
struct Cli {
    /// Directory containing the .yuv frames.
    directory: PathBuf,

    /// Config file (TOML, or JSON with a .json extension).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Capacity of every inter-stage queue.
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Progress report interval in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Write the trace here instead of <directory>/pngs/trace.json.
    #[arg(long, value_name = "FILE", conflicts_with = "no_trace")]
    trace: Option<PathBuf>,

    /// Do not record or export a trace.
    #[arg(long)]
    no_trace: bool,

    /// Name of the output directory created inside <DIRECTORY>.
    #[arg(long)]
    output_dir_name: Option<String>,

    /// Also write daily-rolling log files into this directory.
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

impl Cli {
    /// Load the config file (explicit or default location), then apply flags.
    fn load_config(&self) -> yuv_pipeline::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::load_default()?,
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(interval) = self.interval_ms {
            config.monitor_interval_ms = interval;
        }
        if let Some(trace) = &self.trace {
            config.trace_output = Some(trace.clone());
            config.trace_enabled = true;
        }
        if self.no_trace {
            config.trace_enabled = false;
        }
        if let Some(name) = &self.output_dir_name {
            config.output_dir_name = name.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = Some(dir.clone());
        }
    }
}

/// Install the global subscriber. The guard must live until exit so the
/// file writer flushes.
fn init_logging(filter: &str, log_dir: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "yuv-pipeline.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging needs the config's filter, so report config errors after init
    let loaded = cli.load_config();
    let (filter, log_dir) = match &loaded {
        Ok(config) => (config.log_filter().to_string(), config.log_dir.clone()),
        Err(_) => (config::DEFAULT_LOG_FILTER.to_string(), None),
    };
    let _log_guard = init_logging(&filter, log_dir.as_ref())?;

    let config = loaded.context("Invalid configuration")?;
    tracing::info!("Starting yuv-pipeline on {}", cli.directory.display());
    tracing::debug!(?config, "Effective configuration");

    let report = yuv_pipeline::run(&config, &cli.directory)
        .with_context(|| format!("Cannot process {}", cli.directory.display()))?;

    if let Some((path, count)) = &report.trace {
        tracing::debug!("Trace: {} events in {}", count, path.display());
    }
    println!("{}", report.summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_is_required() {
        assert!(Cli::try_parse_from(["yuv-pipeline"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "yuv-pipeline",
            "frames",
            "--queue-capacity",
            "3",
            "--interval-ms",
            "250",
            "--output-dir-name",
            "out",
            "--trace",
            "/tmp/t.json",
        ])
        .unwrap();

        let mut config = PipelineConfig {
            trace_enabled: false,
            ..Default::default()
        };
        cli.apply(&mut config);
        assert_eq!(cli.directory, PathBuf::from("frames"));
        assert_eq!(config.queue_capacity, 3);
        assert_eq!(config.monitor_interval_ms, 250);
        assert_eq!(config.output_dir_name, "out");
        assert_eq!(config.trace_output, Some(PathBuf::from("/tmp/t.json")));
        assert!(config.trace_enabled);
    }

    #[test]
    fn test_no_trace_flag() {
        let cli = Cli::try_parse_from(["yuv-pipeline", "frames", "--no-trace"]).unwrap();
        let mut config = PipelineConfig::default();
        cli.apply(&mut config);
        assert!(!config.trace_enabled);
    }

    #[test]
    fn test_trace_and_no_trace_conflict() {
        assert!(
            Cli::try_parse_from(["yuv-pipeline", "d", "--trace", "t.json", "--no-trace"]).is_err()
        );
    }

    #[test]
    fn test_zero_capacity_rejected_after_merge() {
        let cli =
            Cli::try_parse_from(["yuv-pipeline", "d", "--queue-capacity", "0"]).unwrap();
        let mut config = PipelineConfig::default();
        cli.apply(&mut config);
        assert!(config.validate().is_err());
    }
}
