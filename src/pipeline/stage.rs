//! A single pipeline stage: pull, transform, push.
//!
//! Each stage owns one worker thread. It pops from its upstream queue until
//! end-of-stream, applies its transform, and forwards successful results.
//!
//! # Failure handling
//!
//! A transform error is strictly local: the stage logs it, drops the item
//! and keeps pulling. The only thing that terminates a stage is exhaustion of
//! its upstream queue, at which point it closes its downstream queue (or, for
//! the terminal stage, raises the pipeline's `finished` flag).
//!
//! A transform that panics is caught and treated like a transform error for
//! that one item. Should the loop itself unwind, the stage's shutdown guard
//! still propagates the shutdown: it closes and drains the upstream queue so
//! the producer cannot block forever, then closes downstream as usual.

use crate::pipeline::counters::Counters;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::queue::{BoundedQueue, PushError};
use crate::trace::EventTracer;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Boxed per-item transform.
pub type BoxedTransform<I, O> = Box<dyn FnMut(I) -> PipelineResult<O> + Send>;

/// Shared handles every stage receives.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub counters: Arc<Counters>,
    pub tracer: EventTracer,
}

/// Per-stage totals returned when the stage thread exits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub name: String,
    /// Items popped from upstream.
    pub received: u64,
    /// Items pushed downstream, or written successfully by a sink.
    pub forwarded: u64,
    /// Items whose transform or write failed.
    pub failed: u64,
    /// Results refused by a closed downstream queue.
    pub rejected: u64,
}

impl StageReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

enum Downstream<O> {
    Queue(Arc<BoundedQueue<O>>),
    /// Terminal stage. The flag is raised once the stage has drained.
    Sink(Arc<AtomicBool>),
}

impl<O> Clone for Downstream<O> {
    fn clone(&self) -> Self {
        match self {
            Downstream::Queue(q) => Downstream::Queue(Arc::clone(q)),
            Downstream::Sink(flag) => Downstream::Sink(Arc::clone(flag)),
        }
    }
}

/// Propagates shutdown when the stage loop exits, including by panic.
struct ShutdownGuard<I, O> {
    name: String,
    upstream: Arc<BoundedQueue<I>>,
    downstream: Downstream<O>,
    counters: Arc<Counters>,
}

impl<I, O> Drop for ShutdownGuard<I, O> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!(stage = %self.name, "Stage panicked, discarding its input");
            self.upstream.close();
            while self.upstream.pop().is_some() {
                self.counters.add_dropped();
            }
        }
        match &self.downstream {
            Downstream::Queue(queue) => queue.close(),
            Downstream::Sink(finished) => finished.store(true, Ordering::Release),
        }
    }
}

/// A worker between an upstream queue and a downstream queue or sink.
pub struct Stage<I, O> {
    name: String,
    upstream: Arc<BoundedQueue<I>>,
    downstream: Downstream<O>,
    transform: BoxedTransform<I, O>,
    ctx: StageContext,
}

impl<I, O> Stage<I, O> {
    /// A mid-pipeline stage forwarding results to `downstream`.
    pub fn new<F>(
        name: impl Into<String>,
        upstream: Arc<BoundedQueue<I>>,
        downstream: Arc<BoundedQueue<O>>,
        ctx: StageContext,
        transform: F,
    ) -> Self
    where
        F: FnMut(I) -> PipelineResult<O> + Send + 'static,
    {
        Self {
            name: name.into(),
            upstream,
            downstream: Downstream::Queue(downstream),
            transform: Box::new(transform),
            ctx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the stage loop on the current thread until upstream is exhausted.
    pub fn run(mut self) -> StageReport {
        self.ctx.tracer.set_thread_name(self.name.as_str());
        tracing::debug!(stage = %self.name, "Stage started");

        let _guard = ShutdownGuard {
            name: self.name.clone(),
            upstream: Arc::clone(&self.upstream),
            downstream: self.downstream.clone(),
            counters: Arc::clone(&self.ctx.counters),
        };

        let mut report = StageReport::new(self.name.as_str());
        while let Some(item) = self.upstream.pop() {
            report.received += 1;
            let outcome = {
                let _scope = self.ctx.tracer.scope(self.name.as_str());
                let transform = &mut self.transform;
                panic::catch_unwind(AssertUnwindSafe(|| transform(item))).unwrap_or_else(
                    |payload| {
                        Err(PipelineError::ItemPanicked {
                            stage: self.name.clone(),
                            message: panic_message(payload.as_ref()),
                        })
                    },
                )
            };

            match (&self.downstream, outcome) {
                (Downstream::Queue(queue), Ok(output)) => match queue.push(output) {
                    Ok(()) => report.forwarded += 1,
                    Err(err) => {
                        report.rejected += 1;
                        self.ctx.counters.add_dropped();
                        self.log_rejection(&err);
                    }
                },
                (Downstream::Queue(_), Err(err)) => {
                    report.failed += 1;
                    self.ctx.counters.add_dropped();
                    self.log_failure(&err);
                }
                (Downstream::Sink(_), Ok(_)) => {
                    report.forwarded += 1;
                    self.ctx.counters.add_processed(true);
                }
                (Downstream::Sink(_), Err(err)) => {
                    // Still counted as processed: the item left the pipeline
                    report.failed += 1;
                    self.ctx.counters.add_processed(false);
                    self.log_failure(&err);
                }
            }
        }

        tracing::debug!(
            stage = %self.name,
            received = report.received,
            forwarded = report.forwarded,
            failed = report.failed,
            "Stage drained"
        );
        report
    }

    fn log_failure(&self, err: &PipelineError) {
        tracing::warn!(stage = %self.name, "{}", err);
        self.ctx.tracer.instant(
            format!("{}.error", self.name),
            Some(serde_json::json!({ "kind": err.kind(), "error": err.to_string() })),
        );
    }

    fn log_rejection(&self, err: &PushError<O>) {
        tracing::warn!(stage = %self.name, "Dropping result: {}", err);
    }
}

impl<I> Stage<I, ()> {
    /// The terminal stage. `finished` is raised once it has drained.
    pub fn sink<F>(
        name: impl Into<String>,
        upstream: Arc<BoundedQueue<I>>,
        finished: Arc<AtomicBool>,
        ctx: StageContext,
        write: F,
    ) -> Self
    where
        F: FnMut(I) -> PipelineResult<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            upstream,
            downstream: Downstream::Sink(finished),
            transform: Box::new(write),
            ctx,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Type-erased stage so the executor can hold a heterogeneous chain.
pub trait StageRunner: Send {
    fn name(&self) -> &str;
    fn run_boxed(self: Box<Self>) -> StageReport;
}

impl<I: Send + 'static, O: Send + 'static> StageRunner for Stage<I, O> {
    fn name(&self) -> &str {
        Stage::name(self)
    }

    fn run_boxed(self: Box<Self>) -> StageReport {
        (*self).run()
    }
}
