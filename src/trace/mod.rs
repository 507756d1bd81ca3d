//! Timeline instrumentation.
//!
//! Any thread can record begin/end/instant/counter events into a shared
//! [`EventTracer`]. At shutdown the log is exported as a JSON array of
//! trace-event objects that generic timeline viewers can load:
//!
//! ```text
//! [{"name":"convert","ph":"B","ts":1520,"pid":0,"tid":3,"args":{"item":"a.png"}},
//!  {"name":"convert","ph":"E","ts":2210,"pid":0,"tid":3},
//!  {"name":"thread_name","ph":"M","ts":9000,"pid":0,"tid":3,"args":{"name":"convert"}}]
//! ```
//!
//! Timestamps are microseconds since the tracer was created.

pub mod event;
pub mod tracer;

pub use event::{EventKind, TraceEvent, THREAD_NAME_EVENT, TRACE_PID};
pub use tracer::{EventTracer, TraceScope};

use std::path::PathBuf;
use thiserror::Error;

/// Failure to write a trace. Never affects the pipeline outcome.
#[derive(Error, Debug)]
pub enum TraceExportError {
    #[error("cannot create trace file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize trace: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write trace: {0}")]
    Io(#[from] std::io::Error),
}
