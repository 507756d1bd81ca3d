//! Pipeline-specific error types.

use std::fmt::Display;
use thiserror::Error;

/// Errors that can occur within the pipeline system.
///
/// The per-item variants (`SourceRead`, `Transform`, `SinkWrite`) never stop
/// a stage: the stage logs them, drops the item and keeps pulling.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source read failed for {item}: {message}")]
    SourceRead { item: String, message: String },

    #[error("Transform failed for {item}: {message}")]
    Transform { item: String, message: String },

    #[error("Sink write failed for {item}: {message}")]
    SinkWrite { item: String, message: String },

    #[error("Failed to spawn thread for '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stage '{stage}' panicked on an item: {message}")]
    ItemPanicked { stage: String, message: String },

    #[error("Stage '{0}' panicked")]
    StagePanicked(String),
}

impl PipelineError {
    pub fn source_read(item: impl Into<String>, err: impl Display) -> Self {
        PipelineError::SourceRead {
            item: item.into(),
            message: err.to_string(),
        }
    }

    pub fn transform(item: impl Into<String>, err: impl Display) -> Self {
        PipelineError::Transform {
            item: item.into(),
            message: err.to_string(),
        }
    }

    pub fn sink_write(item: impl Into<String>, err: impl Display) -> Self {
        PipelineError::SinkWrite {
            item: item.into(),
            message: err.to_string(),
        }
    }

    /// Short label for trace args and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::SourceRead { .. } => "source_read",
            PipelineError::Transform { .. } => "transform",
            PipelineError::SinkWrite { .. } => "sink_write",
            PipelineError::Spawn { .. } => "spawn",
            PipelineError::ItemPanicked { .. } => "item_panicked",
            PipelineError::StagePanicked(_) => "stage_panicked",
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
