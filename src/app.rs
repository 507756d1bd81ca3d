//! Application wiring
//!
//! Turns a directory of `<name>.<W>_<H>.yuv` frames into PNG files with a
//! three-stage pipeline:
//!
//! ```text
//! main: scan ──► read ──► convert ──► write
//! ```
//!
//! The calling thread scans the directory and feeds the first queue; each
//! stage runs on its own thread. Only start-up problems are returned as
//! errors. Per-file failures are logged and counted in the summary.

use crate::config::PipelineConfig;
use crate::error::{AppError, Result, ResultExt};
use crate::media::{FrameDescriptor, FrameScanner, PngWriter, RgbFrame, YuvFrame};
use crate::pipeline::{Pipeline, PipelineError, PipelineOptions, PipelineSummary};
use crate::trace::EventTracer;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: PipelineSummary,
    pub output_dir: PathBuf,
    /// Trace file and event count, if a trace was written
    pub trace: Option<(PathBuf, usize)>,
}

/// Check that `dir` exists and is a directory.
pub fn validate_input_dir(dir: &Path) -> Result<()> {
    let metadata = std::fs::metadata(dir).map_err(|e| {
        AppError::InvalidInput(format!("cannot access {}: {}", dir.display(), e))
    })?;
    if !metadata.is_dir() {
        return Err(AppError::InvalidInput(format!(
            "{} is not a directory",
            dir.display()
        )));
    }
    Ok(())
}

/// Convert every frame in `input_dir`.
pub fn run(config: &PipelineConfig, input_dir: &Path) -> Result<RunReport> {
    config.validate()?;
    validate_input_dir(input_dir)?;

    let tracer = if config.trace_enabled {
        EventTracer::new()
    } else {
        EventTracer::disabled()
    };
    tracer.set_thread_name("main");

    let scanner = FrameScanner::new(&config.input_extensions)?;
    let outcome = {
        let _scope = tracer.scope_with_args(
            "scan",
            json!({ "dir": input_dir.display().to_string() }),
        );
        scanner
            .scan(input_dir)
            .with_context(|| format!("Failed to scan {}", input_dir.display()))?
    };
    for skipped in &outcome.skipped {
        tracing::warn!("Skipping {}: {}", skipped.path.display(), skipped.error);
        tracer.instant(
            "scan.skipped",
            Some(json!({ "file": skipped.path.display().to_string() })),
        );
    }
    if !outcome.skipped.is_empty() {
        tracing::info!("{} file(s) skipped by scan", outcome.skipped.len());
    }

    let writer = PngWriter::new(config.output_dir(input_dir));
    writer.ensure_output_dir().with_context(|| {
        format!(
            "Failed to create output directory {}",
            writer.output_dir().display()
        )
    })?;
    let output_dir = writer.output_dir().to_path_buf();

    tracing::info!(
        "Converting {} frame(s) from {} into {}",
        outcome.frames.len(),
        input_dir.display(),
        output_dir.display()
    );

    let pipeline = build_pipeline(PipelineOptions::from(config), tracer.clone(), writer);
    pipeline
        .counters()
        .set_items_total(outcome.frames.len() as u64);
    pipeline.counters().add_skipped(outcome.skipped.len() as u64);

    let running = pipeline.start()?;
    {
        let _scope = tracer.scope("enqueue");
        for descriptor in outcome.frames {
            if let Err(e) = running.push(descriptor) {
                // Only reachable if the read stage died
                tracing::warn!("Input rejected: {}", e);
            }
        }
    }
    let summary = running.finish();

    let trace = if tracer.is_enabled() {
        let path = config.trace_path(input_dir);
        match tracer.export(&path) {
            Ok(count) => Some((path, count)),
            Err(e) => {
                tracing::error!("{}", e);
                None
            }
        }
    } else {
        None
    };

    tracing::info!("Conversion completed. PNGs saved to {}", output_dir.display());
    Ok(RunReport {
        summary,
        output_dir,
        trace,
    })
}

/// The read → convert → write chain.
pub fn build_pipeline(
    options: PipelineOptions,
    tracer: EventTracer,
    writer: PngWriter,
) -> Pipeline<FrameDescriptor> {
    Pipeline::builder(options, tracer)
        .stage("read", |descriptor: FrameDescriptor| {
            YuvFrame::read(&descriptor)
                .map_err(|e| PipelineError::source_read(descriptor.path.display().to_string(), e))
        })
        .stage("convert", |frame: YuvFrame| {
            frame
                .to_rgb()
                .map_err(|e| PipelineError::transform(frame.output_name.as_str(), e))
        })
        .sink("write", move |frame: RgbFrame| {
            let name = frame.output_name.clone();
            writer
                .write(frame)
                .map(|_| ())
                .map_err(|e| PipelineError::sink_write(name, e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn quick_config() -> PipelineConfig {
        PipelineConfig {
            monitor_interval_ms: 20,
            ..Default::default()
        }
    }

    #[test]
    fn test_scan_skips_unparseable_names() {
        let dir = tempdir().unwrap();
        // a.2_2.yuv matches, b.yuv does not
        std::fs::write(dir.path().join("a.2_2.yuv"), [16, 16, 16, 16, 128, 128]).unwrap();
        std::fs::write(dir.path().join("b.yuv"), [0u8; 6]).unwrap();

        let report = run(&quick_config(), dir.path()).unwrap();
        let counters = report.summary.counters;
        assert_eq!(counters.items_total, 1);
        assert_eq!(counters.items_skipped, 1);
        assert_eq!(counters.items_processed, 1);
        assert_eq!(counters.items_succeeded, 1);
        assert!(report.output_dir.join("a.2_2.png").is_file());
        assert!(!report.output_dir.join("b.png").exists());
    }

    #[test]
    fn test_missing_directory_is_invalid_input() {
        let dir = tempdir().unwrap();
        let err = run(&quick_config(), &dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_file_argument_is_invalid_input() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("frame.2_2.yuv");
        std::fs::write(&file, [0u8; 6]).unwrap();
        assert!(matches!(
            validate_input_dir(&file),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_disabled_trace_writes_nothing() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig {
            trace_enabled: false,
            ..quick_config()
        };
        let report = run(&config, dir.path()).unwrap();
        assert!(report.trace.is_none());
        assert!(!config.trace_path(dir.path()).exists());
        assert_eq!(report.summary.counters.items_total, 0);
    }

    #[test]
    fn test_unwritable_trace_is_not_fatal() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig {
            trace_output: Some(dir.path().join("no-such-dir").join("trace.json")),
            ..quick_config()
        };
        let report = run(&config, dir.path()).unwrap();
        assert!(report.trace.is_none());
    }
}
