//! Structured game event stream.
//!
//! Discrete, typed events emitted while the game runs. Events are
//! serialized as newline-delimited JSON (JSONL) and include a monotonically
//! increasing sequence number for ordering guarantees.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during operation.
///
/// Each variant is tagged with `"type"` when serialized to JSON so consumers
/// can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The runtime is connected to the host and accepting interactions.
    RuntimeStarted {
        /// When the runtime started.
        timestamp: DateTime<Utc>,
        /// Tracked projectile class.
        entity_class: String,
        /// Whether calibration geometry was loaded at start-up.
        calibrated: bool,
    },

    /// The runtime has stopped.
    RuntimeStopped {
        /// When the runtime stopped.
        timestamp: DateTime<Utc>,
        /// Human-readable stop reason.
        reason: String,
    },

    /// A player triggered a new session.
    SessionStarted {
        /// When the trigger was accepted.
        timestamp: DateTime<Utc>,
        /// Player name.
        player: String,
        /// Session generation counter.
        generation: u64,
    },

    /// A wave of targets was placed.
    TargetsSpawned {
        /// When the wave was placed.
        timestamp: DateTime<Utc>,
        /// Player name.
        player: String,
        /// Point value of each placed target.
        points: Vec<u32>,
    },

    /// A projectile's trajectory passed through a target.
    TargetHit {
        /// When the hit was detected.
        timestamp: DateTime<Utc>,
        /// Player name.
        player: String,
        /// External id of the projectile.
        entity_id: String,
        /// Points awarded.
        points: u32,
        /// Score after the hit.
        score: u32,
    },

    /// A session finished.
    SessionEnded {
        /// When the session ended.
        timestamp: DateTime<Utc>,
        /// Player name.
        player: String,
        /// Final score.
        score: u32,
        /// Score beat the player's previous best.
        personal_best: bool,
        /// Score beat every recorded score.
        global_best: bool,
    },

    /// The setup wizard saved new calibration geometry.
    CalibrationSaved {
        /// When the geometry was saved.
        timestamp: DateTime<Utc>,
        /// Player who ran the wizard.
        player: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) atomically increments the sequence
/// counter, serializes the event as a single JSON line, and flushes the
/// underlying writer. Serialization or I/O failures are dropped: a broken
/// event sink never interrupts a game.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug.
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    ///
    /// stdout is reserved for host directives.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Flushes buffered output.
    pub fn flush(&self) {
        if let Ok(mut w) = self.writer.lock() {
            let _ = w.flush();
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn sample_event() -> Event {
        Event::TargetHit {
            timestamp: DateTime::parse_from_rfc3339("2025-02-04T10:15:30Z")
                .unwrap()
                .with_timezone(&Utc),
            player: "ann".to_owned(),
            entity_id: "Projectile_Handaxe_C_7".to_owned(),
            points: 2,
            score: 5,
        }
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_string(&sample_event()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "TargetHit");
        assert_eq!(parsed["points"], 2);
    }

    #[test]
    fn emitter_writes_sequenced_jsonl() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(sample_event());
        emitter.emit(Event::RuntimeStopped {
            timestamp: Utc::now(),
            reason: "EOF".to_owned(),
        });

        assert_eq!(emitter.event_count(), 2);

        let lines: Vec<serde_json::Value> = tw
            .contents()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[0]["type"], "TargetHit");
        assert_eq!(lines[0]["player"], "ann");
        assert_eq!(lines[1]["sequence"], 1);
        assert!(lines[1].get("event").is_none());
    }

    #[test]
    fn session_ended_carries_best_flags() {
        let json = serde_json::to_value(Event::SessionEnded {
            timestamp: Utc::now(),
            player: "bob".to_owned(),
            score: 9,
            personal_best: true,
            global_best: false,
        })
        .unwrap();
        assert_eq!(json["type"], "SessionEnded");
        assert_eq!(json["personal_best"], true);
        assert_eq!(json["global_best"], false);
    }
}
