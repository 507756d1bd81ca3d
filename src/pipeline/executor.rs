//! Pipeline executor: wires stages into a chain and runs them.
//!
//! A pipeline is a strict linear chain. The source feeds the `input` queue,
//! stage *i* reads queue *i* and writes queue *i+1*, and the last stage is a
//! sink. Every stage gets its own thread; a progress monitor gets one more.
//!
//! The caller's thread plays the part of stage 0: it drives the head
//! `source` queue, so a chain of N stages owns N queues rather than N-1.
//!
//! # Lifecycle
//!
//! 1. Build the chain with [`Pipeline::builder`], `.stage(..)` and `.sink(..)`.
//! 2. [`Pipeline::start`] spawns the stage threads and the monitor.
//! 3. The caller pushes items into [`RunningPipeline::input`] from its own
//!    thread, then closes it.
//! 4. Closing the input is the only shutdown trigger: each stage drains and
//!    closes the next queue, and the sink raises the `finished` flag.
//! 5. [`RunningPipeline::join`] joins the stages in chain order, then the
//!    monitor, and returns a [`PipelineSummary`].
//!
//! There is no forced cancellation. If the input is never closed, `join`
//! never returns.

use crate::memory::{MemoryProbe, ProcessMemoryProbe};
use crate::pipeline::counters::{Counters, CountersSnapshot};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::monitor::{MonitorHandle, ProgressMonitor, ProgressSnapshot};
use crate::pipeline::queue::{BoundedQueue, ClosePolicy, PushError, QueueGauge};
use crate::pipeline::stage::{Stage, StageContext, StageReport, StageRunner};
use crate::trace::EventTracer;
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Name of the queue the source feeds.
pub const INPUT_QUEUE: &str = "source";

/// Default capacity of every inter-stage queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default progress monitor tick
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(1);

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Runtime knobs shared by every queue and the monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub queue_capacity: usize,
    pub close_policy: ClosePolicy,
    pub monitor_interval: Duration,
    /// Spawn the progress monitor thread.
    pub monitor_enabled: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            close_policy: ClosePolicy::Reject,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            monitor_enabled: true,
        }
    }
}

/// Typed chain builder. `H` is the input item type, `T` the output type of
/// the last stage added so far.
pub struct PipelineBuilder<H, T> {
    options: PipelineOptions,
    ctx: StageContext,
    finished: Arc<AtomicBool>,
    input: Arc<BoundedQueue<H>>,
    tail: Arc<BoundedQueue<T>>,
    stages: Vec<Box<dyn StageRunner>>,
    queues: Vec<Arc<dyn QueueGauge>>,
    memory: Box<dyn MemoryProbe>,
    snapshots: Option<Sender<ProgressSnapshot>>,
}

impl<H: Send + 'static> PipelineBuilder<H, H> {
    fn new(options: PipelineOptions, tracer: EventTracer) -> Self {
        let input = Arc::new(BoundedQueue::with_policy(
            INPUT_QUEUE,
            options.queue_capacity,
            options.close_policy,
        ));
        Self {
            ctx: StageContext {
                counters: Arc::new(Counters::new()),
                tracer,
            },
            finished: Arc::new(AtomicBool::new(false)),
            tail: Arc::clone(&input),
            queues: vec![Arc::clone(&input) as Arc<dyn QueueGauge>],
            input,
            stages: Vec::new(),
            memory: Box::new(ProcessMemoryProbe::new()),
            snapshots: None,
            options,
        }
    }
}

impl<H: Send + 'static, T: Send + 'static> PipelineBuilder<H, T> {
    /// Replace the resident-memory probe used by the monitor.
    pub fn memory_probe(mut self, probe: Box<dyn MemoryProbe>) -> Self {
        self.memory = probe;
        self
    }

    /// Publish every monitor snapshot on `tx`.
    pub fn progress_sender(mut self, tx: Sender<ProgressSnapshot>) -> Self {
        self.snapshots = Some(tx);
        self
    }

    /// Append a stage. Its output queue is named after the stage.
    pub fn stage<U, F>(mut self, name: &str, transform: F) -> PipelineBuilder<H, U>
    where
        U: Send + 'static,
        F: FnMut(T) -> PipelineResult<U> + Send + 'static,
    {
        let downstream = Arc::new(BoundedQueue::with_policy(
            name,
            self.options.queue_capacity,
            self.options.close_policy,
        ));
        let stage = Stage::new(
            name,
            self.tail,
            Arc::clone(&downstream),
            self.ctx.clone(),
            transform,
        );
        self.stages.push(Box::new(stage));
        self.queues.push(Arc::clone(&downstream) as Arc<dyn QueueGauge>);

        PipelineBuilder {
            options: self.options,
            ctx: self.ctx,
            finished: self.finished,
            input: self.input,
            tail: downstream,
            stages: self.stages,
            queues: self.queues,
            memory: self.memory,
            snapshots: self.snapshots,
        }
    }

    /// Terminate the chain with a sink stage.
    pub fn sink<F>(mut self, name: &str, write: F) -> Pipeline<H>
    where
        F: FnMut(T) -> PipelineResult<()> + Send + 'static,
    {
        let sink = Stage::sink(
            name,
            self.tail,
            Arc::clone(&self.finished),
            self.ctx.clone(),
            write,
        );
        self.stages.push(Box::new(sink));

        Pipeline {
            options: self.options,
            ctx: self.ctx,
            finished: self.finished,
            input: self.input,
            stages: self.stages,
            queues: self.queues,
            memory: self.memory,
            snapshots: self.snapshots,
        }
    }
}

/// A fully wired, not yet started pipeline.
pub struct Pipeline<H> {
    options: PipelineOptions,
    ctx: StageContext,
    finished: Arc<AtomicBool>,
    input: Arc<BoundedQueue<H>>,
    stages: Vec<Box<dyn StageRunner>>,
    queues: Vec<Arc<dyn QueueGauge>>,
    memory: Box<dyn MemoryProbe>,
    snapshots: Option<Sender<ProgressSnapshot>>,
}

impl<H: Send + 'static> Pipeline<H> {
    /// Start building a chain whose input items are `H`.
    pub fn builder(options: PipelineOptions, tracer: EventTracer) -> PipelineBuilder<H, H> {
        PipelineBuilder::new(options, tracer)
    }

    pub fn input(&self) -> &Arc<BoundedQueue<H>> {
        &self.input
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.ctx.counters
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Spawn one thread per stage, then the monitor.
    ///
    /// If a stage thread cannot be spawned, the input is closed so the
    /// already-running stages drain and exit, and the error is returned.
    pub fn start(self) -> PipelineResult<RunningPipeline<H>> {
        let started_at = Utc::now();
        let started = Instant::now();
        let names = self.stage_names().join(" -> ");
        tracing::info!(
            "Starting pipeline: {} (queue capacity {})",
            names,
            self.options.queue_capacity
        );

        let mut handles = Vec::with_capacity(self.stages.len());
        for runner in self.stages {
            let name = runner.name().to_string();
            let spawned = std::thread::Builder::new()
                .name(format!("stage-{name}"))
                .spawn(move || runner.run_boxed());

            match spawned {
                Ok(handle) => handles.push((name, handle)),
                Err(source) => {
                    tracing::error!("Failed to spawn stage '{}': {}", name, source);
                    self.input.close();
                    for (_, handle) in handles {
                        let _ = handle.join();
                    }
                    return Err(PipelineError::Spawn { name, source });
                }
            }
        }

        let monitor = if self.options.monitor_enabled {
            let mut monitor = ProgressMonitor::new(
                self.options.monitor_interval,
                Arc::clone(&self.ctx.counters),
                self.queues.clone(),
                Arc::clone(&self.finished),
                self.memory,
                self.ctx.tracer.clone(),
            );
            if let Some(tx) = self.snapshots {
                monitor = monitor.with_snapshot_sender(tx);
            }
            match monitor.spawn() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    // Telemetry is best-effort; run without it
                    tracing::warn!("{}; continuing without progress reporting", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(RunningPipeline {
            input: self.input,
            counters: self.ctx.counters,
            finished: self.finished,
            queues: self.queues,
            handles,
            monitor,
            started_at,
            started,
        })
    }
}

/// Handle to a started pipeline.
pub struct RunningPipeline<H> {
    input: Arc<BoundedQueue<H>>,
    counters: Arc<Counters>,
    finished: Arc<AtomicBool>,
    queues: Vec<Arc<dyn QueueGauge>>,
    handles: Vec<(String, JoinHandle<StageReport>)>,
    monitor: Option<MonitorHandle>,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl<H: Send + 'static> RunningPipeline<H> {
    pub fn input(&self) -> &Arc<BoundedQueue<H>> {
        &self.input
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    /// Feed one item into the first stage, blocking under backpressure.
    pub fn push(&self, item: H) -> Result<(), PushError<H>> {
        self.input.push(item)
    }

    /// Signal that no more input will arrive.
    pub fn close_input(&self) {
        self.input.close();
    }

    /// Whether the sink has drained.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Join stage threads in chain order, then the monitor.
    ///
    /// Blocks until the input has been closed and fully drained.
    pub fn join(self) -> PipelineSummary {
        let mut stages = Vec::with_capacity(self.handles.len());
        let mut panicked_stages = Vec::new();

        for (name, handle) in self.handles {
            match handle.join() {
                Ok(report) => stages.push(report),
                Err(_) => {
                    tracing::error!("{}", PipelineError::StagePanicked(name.clone()));
                    stages.push(StageReport::new(name.as_str()));
                    panicked_stages.push(name);
                }
            }
        }

        let final_progress = self.monitor.and_then(MonitorHandle::join);

        let summary = PipelineSummary {
            started_at: self.started_at,
            elapsed: self.started.elapsed(),
            counters: self.counters.snapshot(),
            stages,
            panicked_stages,
            queue_high_water: self
                .queues
                .iter()
                .map(|q| (q.name().to_string(), q.high_water_mark()))
                .collect(),
            final_progress,
        };
        tracing::info!("{}", summary);
        summary
    }

    /// Close the input, then [`join`](Self::join).
    pub fn finish(self) -> PipelineSummary {
        self.close_input();
        self.join()
    }
}

/// Totals for a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub started_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
    pub counters: CountersSnapshot,
    pub stages: Vec<StageReport>,
    pub panicked_stages: Vec<String>,
    /// Largest depth each queue reached.
    pub queue_high_water: Vec<(String, usize)>,
    /// Last reading taken by the monitor, if it ran.
    pub final_progress: Option<ProgressSnapshot>,
}

impl PipelineSummary {
    /// Every admitted item was written and no stage crashed.
    pub fn is_clean(&self) -> bool {
        self.panicked_stages.is_empty()
            && self.counters.items_succeeded == self.counters.items_total
    }
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pipeline finished in {:.2}s: {} total, {} processed, {} written, {} dropped, {} write failures, {} skipped by scan",
            self.elapsed.as_secs_f64(),
            self.counters.items_total,
            self.counters.items_processed,
            self.counters.items_succeeded,
            self.counters.items_dropped,
            self.counters.sink_failures(),
            self.counters.items_skipped,
        )?;
        if !self.panicked_stages.is_empty() {
            write!(f, " | panicked: {}", self.panicked_stages.join(", "))?;
        }
        Ok(())
    }
}
