//! Trace event records and their export encoding.

use serde::{Serialize, Serializer};

/// Placeholder process id written on every exported event.
pub const TRACE_PID: u32 = 0;

/// Name of the synthesized per-thread metadata event.
pub const THREAD_NAME_EVENT: &str = "thread_name";

/// Phase of a trace event. Serialized as the single-letter phase code
/// timeline viewers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Begin,
    End,
    Instant,
    Counter,
    Metadata,
}

impl EventKind {
    pub fn code(self) -> &'static str {
        match self {
            EventKind::Begin => "B",
            EventKind::End => "E",
            EventKind::Instant => "I",
            EventKind::Counter => "C",
            EventKind::Metadata => "M",
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// A single timestamped instrumentation record.
///
/// Created once by the recording thread, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent {
    pub name: String,
    #[serde(rename = "ph")]
    pub kind: EventKind,
    /// Microseconds since the tracer was created.
    pub ts: u64,
    pub pid: u32,
    pub tid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
}

impl TraceEvent {
    pub fn new(
        name: impl Into<String>,
        kind: EventKind,
        ts: u64,
        tid: u32,
        args: Option<serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            ts,
            pid: TRACE_PID,
            tid,
            args,
        }
    }

    /// Metadata event naming a thread.
    pub fn thread_name(tid: u32, label: &str, ts: u64) -> Self {
        Self::new(
            THREAD_NAME_EVENT,
            EventKind::Metadata,
            ts,
            tid,
            Some(serde_json::json!({ "name": label })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_phase_code() {
        let event = TraceEvent::new("read", EventKind::Begin, 42, 3, None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["name"], "read");
        assert_eq!(json["ph"], "B");
        assert_eq!(json["ts"], 42);
        assert_eq!(json["pid"], 0);
        assert_eq!(json["tid"], 3);
        assert!(json.get("args").is_none());
    }

    #[test]
    fn test_name_is_escaped() {
        let event = TraceEvent::new("a \"quoted\"\nname", EventKind::Instant, 0, 1, None);
        let text = serde_json::to_string(&event).unwrap();
        assert!(text.contains(r#"a \"quoted\"\nname"#));
    }

    #[test]
    fn test_thread_name_metadata() {
        let event = TraceEvent::thread_name(2, "convert", 10);
        assert_eq!(event.kind, EventKind::Metadata);
        assert_eq!(event.name, THREAD_NAME_EVENT);
        assert_eq!(event.args.unwrap()["name"], "convert");
    }
}
