//! Thread-safe event recorder.
//!
//! [`EventTracer`] is a cheap, clonable handle. One instance is created at
//! process start and handed to every component that records events; there is
//! no global tracer.
//!
//! Three independent locks are used: the event log, the native-thread id
//! table and the thread-name registry. None of them is ever held while
//! acquiring another, and none is shared with the pipeline queues.

use crate::trace::event::{EventKind, TraceEvent};
use crate::trace::TraceExportError;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;
use std::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Native thread to small sequential id. Ids are never reassigned.
struct ThreadTable {
    ids: HashMap<ThreadId, u32>,
    next_id: u32,
}

struct TracerInner {
    epoch: Instant,
    events: Mutex<Vec<TraceEvent>>,
    threads: Mutex<ThreadTable>,
    names: Mutex<BTreeMap<u32, String>>,
}

impl TracerInner {
    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    fn thread_id(&self) -> u32 {
        let native = std::thread::current().id();
        let mut table = lock(&self.threads);
        if let Some(&id) = table.ids.get(&native) {
            return id;
        }
        let id = table.next_id;
        table.next_id += 1;
        table.ids.insert(native, id);
        id
    }
}

/// Handle to a shared trace log. Clones record into the same log.
#[derive(Clone)]
pub struct EventTracer {
    inner: Option<Arc<TracerInner>>,
}

impl Default for EventTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTracer")
            .field("enabled", &self.is_enabled())
            .field("events", &self.event_count())
            .finish()
    }
}

impl EventTracer {
    /// Create an enabled tracer. Timestamps are measured from this call.
    pub fn new() -> Self {
        Self {
            inner: Some(Arc::new(TracerInner {
                epoch: Instant::now(),
                events: Mutex::new(Vec::new()),
                threads: Mutex::new(ThreadTable {
                    ids: HashMap::new(),
                    next_id: 1,
                }),
                names: Mutex::new(BTreeMap::new()),
            })),
        }
    }

    /// A tracer that accepts every call and records nothing.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Append an event stamped with the calling thread's id and the current
    /// time. Begin/end balance is the caller's responsibility.
    pub fn record_event(
        &self,
        name: impl Into<String>,
        kind: EventKind,
        args: Option<serde_json::Value>,
    ) {
        let Some(inner) = &self.inner else {
            return;
        };
        let tid = inner.thread_id();
        let name = name.into();
        let mut events = lock(&inner.events);
        // Stamped under the log lock so recording order and time order agree
        let ts = inner.now_us();
        events.push(TraceEvent::new(name, kind, ts, tid, args));
    }

    pub fn begin(&self, name: impl Into<String>) {
        self.record_event(name, EventKind::Begin, None);
    }

    pub fn begin_with_args(&self, name: impl Into<String>, args: serde_json::Value) {
        self.record_event(name, EventKind::Begin, Some(args));
    }

    pub fn end(&self, name: impl Into<String>) {
        self.record_event(name, EventKind::End, None);
    }

    pub fn instant(&self, name: impl Into<String>, args: Option<serde_json::Value>) {
        self.record_event(name, EventKind::Instant, args);
    }

    /// Record a counter sample, exported as `{"value": n}`.
    pub fn counter(&self, name: impl Into<String>, value: i64) {
        self.record_event(
            name,
            EventKind::Counter,
            Some(serde_json::json!({ "value": value })),
        );
    }

    /// Begin an event that ends when the returned guard is dropped.
    pub fn scope(&self, name: impl Into<String>) -> TraceScope {
        TraceScope::new(self.clone(), name.into(), None)
    }

    /// Like [`scope`](Self::scope) with arguments on the begin event.
    pub fn scope_with_args(&self, name: impl Into<String>, args: serde_json::Value) -> TraceScope {
        TraceScope::new(self.clone(), name.into(), Some(args))
    }

    /// Label the calling thread. Last write wins.
    pub fn set_thread_name(&self, name: impl Into<String>) {
        let Some(inner) = &self.inner else {
            return;
        };
        let tid = inner.thread_id();
        lock(&inner.names).insert(tid, name.into());
    }

    /// The calling thread's trace id, assigning one on first sighting.
    /// Returns 0 on a disabled tracer.
    pub fn current_thread_id(&self) -> u32 {
        self.inner.as_ref().map_or(0, |inner| inner.thread_id())
    }

    /// Number of events recorded so far (metadata excluded).
    pub fn event_count(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inner| lock(&inner.events).len())
    }

    /// Build the export sequence: one `thread_name` metadata event per
    /// registered thread (stamped now), plus every recorded event, stably
    /// sorted by timestamp.
    pub fn collect_events(&self) -> Vec<TraceEvent> {
        let Some(inner) = &self.inner else {
            return Vec::new();
        };

        let names: Vec<(u32, String)> = lock(&inner.names)
            .iter()
            .map(|(&tid, name)| (tid, name.clone()))
            .collect();
        let recorded = lock(&inner.events).clone();
        let export_ts = inner.now_us();

        let mut all = recorded;
        all.reserve(names.len());
        all.extend(
            names
                .iter()
                .map(|(tid, name)| TraceEvent::thread_name(*tid, name, export_ts)),
        );
        // Stable: equal timestamps keep recording order
        all.sort_by_key(|event| event.ts);
        all
    }

    /// Serialize the export sequence as a JSON array. Returns the number of
    /// events written.
    pub fn export_to_writer<W: Write>(&self, writer: W) -> Result<usize, TraceExportError> {
        let events = self.collect_events();
        let mut writer = BufWriter::new(writer);
        serde_json::to_writer(&mut writer, &events)?;
        writer.flush()?;
        Ok(events.len())
    }

    /// Write the trace to `path`. A disabled tracer writes nothing.
    pub fn export(&self, path: &Path) -> Result<usize, TraceExportError> {
        if !self.is_enabled() {
            tracing::debug!("Tracing disabled, not writing {}", path.display());
            return Ok(0);
        }

        let file = File::create(path).map_err(|source| TraceExportError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        let count = self.export_to_writer(file)?;
        tracing::info!("Saved {} trace events to {}", count, path.display());
        tracing::info!("Load the file in chrome://tracing or ui.perfetto.dev to inspect it");
        Ok(count)
    }
}

/// RAII guard that records an end event on drop.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct TraceScope {
    tracer: EventTracer,
    name: String,
}

impl TraceScope {
    fn new(tracer: EventTracer, name: String, args: Option<serde_json::Value>) -> Self {
        tracer.record_event(name.clone(), EventKind::Begin, args);
        Self { tracer, name }
    }
}

impl Drop for TraceScope {
    fn drop(&mut self) {
        self.tracer
            .record_event(std::mem::take(&mut self.name), EventKind::End, None);
    }
}
