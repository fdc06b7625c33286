//! Host event protocol — newline-delimited JSON on stdout.
//!
//! The engine runs as a child of a host process that draws the overlay UI.
//! Every internal transition the host cares about is serialized as one JSON
//! object per line, tagged with a `type` field:
//!
//! ```json
//! {"type":"engine_ready"}
//! {"type":"overlay","hover":true}
//! {"type":"overlay_level","level":0.42}
//! {"type":"transcript","text":"hello world"}
//! ```
//!
//! Emission is fire-and-forget: there is no acknowledgement protocol, and the
//! only ordering guarantee is FIFO per process.  The level-emitter thread and
//! the orchestrator both write to the same sink, so [`StdoutSink`] serializes
//! whole lines under a mutex — a partially interleaved record would be
//! unparseable on the host side.

use std::io::Write;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// HostEvent
// ---------------------------------------------------------------------------

/// Everything this process ever tells the host.
///
/// Adding a variant here forces every consumer `match` to be revisited, which
/// is the point — the previous life of this protocol as ad hoc string
/// concatenation made it too easy to ship a malformed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// Model loaded, hook subscribed — the host may show its ready state.
    EngineReady,

    /// The overlay should expand (`hover: true`) or collapse.
    Overlay { hover: bool },

    /// Smoothed loudness in `[0, 1]`, emitted every tick while recording.
    OverlayLevel { level: f32 },

    /// A dictation session began (hotkey combo went down).
    DictationStart,

    /// The dictation session ended (combo released).
    DictationStop,

    /// Final transcript for the session that just ended.
    Transcript { text: String },
}

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

/// Where [`HostEvent`]s go.
///
/// Implementations must be `Send + Sync`: the orchestrator and the
/// level-emitter thread share one sink behind an `Arc`.
pub trait EventSink: Send + Sync {
    /// Deliver one event.  Must not block for long and must not panic;
    /// delivery failures are logged, never propagated.
    fn emit(&self, event: HostEvent);
}

// ---------------------------------------------------------------------------
// StdoutSink
// ---------------------------------------------------------------------------

/// Production sink: one JSON object per line on stdout, flushed immediately.
///
/// The full line is serialized before the lock is taken, so the critical
/// section is a single `write_all` + `flush`.
pub struct StdoutSink {
    out: Mutex<std::io::Stdout>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(std::io::stdout()),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for StdoutSink {
    fn emit(&self, event: HostEvent) {
        let mut line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                log::error!("events: failed to serialize {event:?}: {e}");
                return;
            }
        };
        line.push('\n');

        let mut out = self.out.lock().unwrap();
        if let Err(e) = out.write_all(line.as_bytes()).and_then(|_| out.flush()) {
            // Host likely went away; nothing useful to do but note it.
            log::error!("events: stdout write failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// CollectingSink  (test-only)
// ---------------------------------------------------------------------------

/// Test double that records every emitted event in order.
#[cfg(test)]
pub struct CollectingSink {
    events: Mutex<Vec<HostEvent>>,
}

#[cfg(test)]
impl CollectingSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl EventSink for CollectingSink {
    fn emit(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_snake_case() {
        let json = serde_json::to_string(&HostEvent::EngineReady).unwrap();
        assert_eq!(json, r#"{"type":"engine_ready"}"#);

        let json = serde_json::to_string(&HostEvent::DictationStart).unwrap();
        assert_eq!(json, r#"{"type":"dictation_start"}"#);
    }

    #[test]
    fn overlay_carries_hover_flag() {
        let json = serde_json::to_string(&HostEvent::Overlay { hover: true }).unwrap();
        assert_eq!(json, r#"{"type":"overlay","hover":true}"#);
    }

    #[test]
    fn level_serializes_as_float() {
        let json = serde_json::to_string(&HostEvent::OverlayLevel { level: 0.5 }).unwrap();
        assert_eq!(json, r#"{"type":"overlay_level","level":0.5}"#);
    }

    #[test]
    fn transcript_round_trips() {
        let ev = HostEvent::Transcript {
            text: "hello world".into(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: HostEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }
}
