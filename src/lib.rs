//! # yuv-pipeline: bounded multi-stage frame converter
//!
//! Converts a directory of raw I420 frames into PNG files through a chain of
//! worker threads connected by bounded queues, with live progress reporting
//! and a timeline trace of every stage.
//!
//! ## Architecture
//!
//! - **Pipeline**: generic bounded queues, stages, progress monitor and executor
//! - **Trace**: explicit, thread-safe event recorder exported as trace-event JSON
//! - **Memory**: per-platform resident memory probe used by the monitor
//! - **Media**: directory scan, I420 decoding and PNG encoding
//! - **App**: the read → convert → write chain the binary runs
//!
//! ## Example
//!
//! ```ignore
//! use yuv_pipeline::pipeline::{Pipeline, PipelineOptions};
//! use yuv_pipeline::trace::EventTracer;
//!
//! let tracer = EventTracer::new();
//! let pipeline = Pipeline::builder(PipelineOptions::default(), tracer.clone())
//!     .stage("double", |x: u32| Ok(x * 2))
//!     .sink("print", |x: u32| {
//!         println!("{x}");
//!         Ok(())
//!     });
//!
//! let running = pipeline.start()?;
//! for i in 0..10 {
//!     running.push(i)?;
//! }
//! let summary = running.finish();
//! tracer.export("trace.json".as_ref())?;
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod media;
pub mod memory;
pub mod pipeline;
pub mod trace;

// Re-export commonly used types
pub use app::{run, RunReport};
pub use config::PipelineConfig;
pub use error::{AppError, Result, ResultExt};
pub use memory::{MemoryProbe, ProcessMemoryProbe};
pub use pipeline::{BoundedQueue, ClosePolicy, Pipeline, PipelineOptions, PipelineSummary};
pub use trace::{EventTracer, TraceScope};
