//! Linear multi-stage pipeline architecture.
//!
//! Items flow from a source through a chain of stages into a sink. Adjacent
//! stages are connected by bounded, closable FIFO queues, every stage runs on
//! its own thread, and a monitor thread reports progress at a fixed interval.
//!
//! # Architecture
//!
//! ```text
//! source ──► [q:source] ──► stage 1 ──► [q:1] ──► stage 2 ──► [q:2] ──► sink
//!                                                                      │
//!                               monitor ◄── counters, queue depths, finished
//! ```
//!
//! # Design
//!
//! - **Backpressure** - a full queue blocks its producer, so a slow stage
//!   throttles everything upstream of it.
//! - **Close cascade** - closing the input is the only shutdown signal; each
//!   stage closes its successor once its own upstream is drained.
//! - **Local failures** - a failed item is logged and dropped; the stage
//!   keeps running.

pub mod counters;
pub mod error;
pub mod executor;
pub mod monitor;
pub mod queue;
pub mod stage;

pub use counters::{Counters, CountersSnapshot};
pub use error::{PipelineError, PipelineResult};
pub use executor::{
    Pipeline, PipelineBuilder, PipelineOptions, PipelineSummary, RunningPipeline, INPUT_QUEUE,
};
pub use monitor::{MonitorHandle, ProgressMonitor, ProgressSnapshot, QueueDepth, PROGRESS_TARGET};
pub use queue::{BoundedQueue, ClosePolicy, PushError, QueueGauge, QueueIter};
pub use stage::{Stage, StageContext, StageReport, StageRunner};
