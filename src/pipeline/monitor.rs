//! Periodic, read-only progress reporting.
//!
//! The monitor runs on its own thread and wakes on a fixed-interval ticker.
//! Each tick it samples the shared counters, every queue's depth and the
//! process's resident memory, then logs a one-line status. It never touches
//! the queues beyond `len()`, so it cannot stall a stage; a late or missed
//! tick only delays the report.
//!
//! It exits once the pipeline's `finished` flag is raised *and* every queue
//! reports empty, so the last buffered items are always reflected in the
//! final report.

use crate::memory::{format_bytes, MemoryProbe};
use crate::pipeline::counters::{Counters, CountersSnapshot};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::queue::QueueGauge;
use crate::trace::EventTracer;
use crossbeam_channel::{never, select, tick, Receiver, Sender};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Log target of the status line, so it can be filtered on its own.
pub const PROGRESS_TARGET: &str = "yuv_pipeline::progress";

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Depth of one queue at sampling time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    pub name: String,
    pub len: usize,
    pub capacity: usize,
}

/// Everything the monitor observed in one tick.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub tick: u64,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
    pub counters: CountersSnapshot,
    pub queues: Vec<QueueDepth>,
    pub resident_memory: Option<u64>,
    pub finished: bool,
}

impl ProgressSnapshot {
    pub fn queues_drained(&self) -> bool {
        self.queues.iter().all(|q| q.len == 0)
    }

    /// No further work can appear.
    pub fn is_terminal(&self) -> bool {
        self.finished && self.queues_drained()
    }

    pub fn items_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.counters.items_processed as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{} {:.1}%] ",
            self.counters.items_processed,
            self.counters.items_total,
            self.counters.percent_complete()
        )?;
        for (i, queue) in self.queues.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{} {}/{}", queue.name, queue.len, queue.capacity)?;
        }
        match self.resident_memory {
            Some(bytes) => write!(f, " | rss {}", format_bytes(bytes))?,
            None => write!(f, " | rss n/a")?,
        }
        write!(
            f,
            " | {:.1} items/s | {:.1}s",
            self.items_per_second(),
            self.elapsed.as_secs_f64()
        )
    }
}

/// Observer thread body. Build with [`ProgressMonitor::new`], then [`spawn`](Self::spawn).
pub struct ProgressMonitor {
    interval: Duration,
    counters: Arc<Counters>,
    queues: Vec<Arc<dyn QueueGauge>>,
    finished: Arc<AtomicBool>,
    memory: Box<dyn MemoryProbe>,
    tracer: EventTracer,
    snapshots: Option<Sender<ProgressSnapshot>>,
    started: Instant,
}

impl ProgressMonitor {
    pub fn new(
        interval: Duration,
        counters: Arc<Counters>,
        queues: Vec<Arc<dyn QueueGauge>>,
        finished: Arc<AtomicBool>,
        memory: Box<dyn MemoryProbe>,
        tracer: EventTracer,
    ) -> Self {
        Self {
            interval,
            counters,
            queues,
            finished,
            memory,
            tracer,
            snapshots: None,
            started: Instant::now(),
        }
    }

    /// Also publish every snapshot on `tx`. Sends never block the monitor.
    pub fn with_snapshot_sender(mut self, tx: Sender<ProgressSnapshot>) -> Self {
        self.snapshots = Some(tx);
        self
    }

    /// Take one reading without side effects.
    pub fn sample(&self, tick: u64) -> ProgressSnapshot {
        // Read the flag first: if it is set, every queue has already been
        // drained by the stages, so the depths below cannot be stale-high.
        let finished = self.finished.load(Ordering::Acquire);
        ProgressSnapshot {
            tick,
            elapsed: self.started.elapsed(),
            counters: self.counters.snapshot(),
            queues: self
                .queues
                .iter()
                .map(|q| QueueDepth {
                    name: q.name().to_string(),
                    len: q.len(),
                    capacity: q.capacity(),
                })
                .collect(),
            resident_memory: self.memory.current_resident_memory(),
            finished,
        }
    }

    fn report(&self, snapshot: &ProgressSnapshot) {
        tracing::info!(target: PROGRESS_TARGET, "{}", snapshot);

        for queue in &snapshot.queues {
            self.tracer
                .counter(format!("queue.{}", queue.name), queue.len as i64);
        }
        self.tracer.counter(
            "items_processed",
            snapshot.counters.items_processed as i64,
        );
        if let Some(bytes) = snapshot.resident_memory {
            self.tracer.counter("rss_bytes", bytes as i64);
        }

        if let Some(tx) = &self.snapshots {
            let _ = tx.try_send(snapshot.clone());
        }
    }

    /// Tick until the pipeline is finished and drained. A message on `wake`
    /// triggers an early re-check. Returns the final snapshot.
    pub fn run(self, wake: Receiver<()>) -> ProgressSnapshot {
        self.tracer.set_thread_name("monitor");
        let ticker = tick(self.interval);
        let mut wake = wake;
        let mut ticks = 0u64;

        loop {
            let wake_closed = select! {
                recv(ticker) -> _ => false,
                recv(wake) -> msg => msg.is_err(),
            };
            if wake_closed {
                // Handle dropped: fall back to the ticker alone
                wake = never();
            }

            ticks += 1;
            let snapshot = self.sample(ticks);
            self.report(&snapshot);
            if snapshot.is_terminal() {
                tracing::debug!(ticks, "Progress monitor exiting");
                return snapshot;
            }
        }
    }

    /// Run on a dedicated named thread.
    pub fn spawn(self) -> PipelineResult<MonitorHandle> {
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        let handle = std::thread::Builder::new()
            .name("monitor".to_string())
            .spawn(move || self.run(wake_rx))
            .map_err(|source| PipelineError::Spawn {
                name: "monitor".to_string(),
                source,
            })?;
        Ok(MonitorHandle {
            wake: wake_tx,
            handle,
        })
    }
}

/// Owner side of a spawned monitor.
pub struct MonitorHandle {
    wake: Sender<()>,
    handle: JoinHandle<ProgressSnapshot>,
}

impl MonitorHandle {
    /// Ask the monitor to re-check now instead of at its next tick.
    pub fn nudge(&self) {
        let _ = self.wake.try_send(());
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the monitor to exit. `None` if it panicked.
    pub fn join(self) -> Option<ProgressSnapshot> {
        self.nudge();
        match self.handle.join() {
            Ok(snapshot) => Some(snapshot),
            Err(_) => {
                tracing::error!("Progress monitor panicked");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MockMemoryProbe;
    use crate::pipeline::queue::BoundedQueue;
    use serial_test::serial;

    fn mock_memory(bytes: u64) -> Box<dyn MemoryProbe> {
        let mut mock = MockMemoryProbe::new();
        mock.expect_current_resident_memory()
            .return_const(Some(bytes));
        Box::new(mock)
    }

    struct Fixture {
        counters: Arc<Counters>,
        queue: Arc<BoundedQueue<u32>>,
        finished: Arc<AtomicBool>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                counters: Arc::new(Counters::new()),
                queue: Arc::new(BoundedQueue::new("convert", 4)),
                finished: Arc::new(AtomicBool::new(false)),
            }
        }

        fn monitor(&self, interval: Duration) -> ProgressMonitor {
            ProgressMonitor::new(
                interval,
                Arc::clone(&self.counters),
                vec![Arc::clone(&self.queue) as Arc<dyn QueueGauge>],
                Arc::clone(&self.finished),
                mock_memory(3 * 1024 * 1024),
                EventTracer::new(),
            )
        }
    }

    #[test]
    fn test_sample_reads_counters_queues_and_memory() {
        let fx = Fixture::new();
        fx.counters.set_items_total(10);
        fx.counters.add_processed(true);
        fx.queue.push(1).unwrap();
        fx.queue.push(2).unwrap();

        let snap = fx.monitor(Duration::from_secs(1)).sample(1);
        assert_eq!(snap.counters.items_total, 10);
        assert_eq!(snap.counters.items_processed, 1);
        assert_eq!(
            snap.queues,
            vec![QueueDepth {
                name: "convert".to_string(),
                len: 2,
                capacity: 4
            }]
        );
        assert_eq!(snap.resident_memory, Some(3 * 1024 * 1024));
        assert!(!snap.is_terminal());
        // Sampling never consumes items
        assert_eq!(fx.queue.len(), 2);
    }

    #[test]
    fn test_status_line_format() {
        let fx = Fixture::new();
        fx.counters.set_items_total(4);
        fx.counters.add_processed(true);
        let line = fx.monitor(Duration::from_secs(1)).sample(1).to_string();
        assert!(line.starts_with("[1/4 25.0%] convert 0/4"), "{line}");
        assert!(line.contains("rss 3.0 MiB"), "{line}");
    }

    #[test]
    #[serial]
    fn test_monitor_waits_for_drain_after_finished_flag() {
        let fx = Fixture::new();
        fx.queue.push(7).unwrap();
        fx.finished.store(true, Ordering::Release);

        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = fx
            .monitor(Duration::from_millis(10))
            .with_snapshot_sender(tx)
            .spawn()
            .unwrap();

        // Flag is up but a buffered item remains: the monitor keeps ticking
        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(first.finished);
        assert!(!first.queues_drained());
        std::thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        assert_eq!(fx.queue.pop(), Some(7));
        let last = handle.join().unwrap();
        assert!(last.is_terminal());
    }

    #[test]
    #[serial]
    fn test_monitor_keeps_running_until_flag_is_raised() {
        let fx = Fixture::new();
        let handle = fx.monitor(Duration::from_millis(10)).spawn().unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        fx.finished.store(true, Ordering::Release);
        let last = handle.join().unwrap();
        assert!(last.finished);
        assert!(last.tick >= 1);
    }

    #[test]
    #[serial]
    fn test_monitor_emits_counter_events() {
        let fx = Fixture::new();
        let tracer = EventTracer::new();
        let monitor = ProgressMonitor::new(
            Duration::from_millis(5),
            Arc::clone(&fx.counters),
            vec![Arc::clone(&fx.queue) as Arc<dyn QueueGauge>],
            Arc::clone(&fx.finished),
            mock_memory(4096),
            tracer.clone(),
        );
        fx.finished.store(true, Ordering::Release);
        monitor.spawn().unwrap().join().unwrap();

        let names: Vec<_> = tracer
            .collect_events()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert!(names.contains(&"queue.convert".to_string()));
        assert!(names.contains(&"items_processed".to_string()));
        assert!(names.contains(&"rss_bytes".to_string()));
    }
}
