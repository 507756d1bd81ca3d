//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use std::path::Path;
use std::time::Duration;
use yuv_pipeline::PipelineConfig;

/// Monitor interval short enough that tests never wait on a tick
pub fn test_interval() -> Duration {
    Duration::from_millis(20)
}

/// Default config with a fast monitor
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        monitor_interval_ms: test_interval().as_millis() as u64,
        ..Default::default()
    }
}

/// Names of the files directly inside `dir`, sorted
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
