//! Error handling for the yuv-pipeline application
//!
//! This module defines the top-level error type and a Result alias. Each
//! layer keeps its own error enum ([`PipelineError`], [`MediaError`]) and
//! converts into [`AppError`] at the edges.
//!
//! Only start-up failures are ever surfaced through [`AppError`]; once the
//! stages are running, per-item problems are logged and counted instead.
//! Trace export failures are logged too.

use crate::media::MediaError;
use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for yuv-pipeline operations
#[derive(Error, Debug)]
pub enum AppError {
    /// The input directory argument is missing, not a directory, or unreadable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors from the frame scanner, reader or writer
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Errors raised while starting or joining the pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AppError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for yuv-pipeline operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
