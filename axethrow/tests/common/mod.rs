//! Shared integration-test harness: in-process host doubles for driving the
//! runtime directly, and helpers for spawning the `axethrow` binary.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axethrow::config::GameConfig;
use axethrow::error::HostError;
use axethrow::host::{
    ConsoleChannel, GameContext, LineMatch, MemoryStore, PlacedVolume, WatchWindow, World,
};
use axethrow::observability::EventEmitter;
use axethrow::tracking::{EntitySource, Snapshot};
use axethrow_core::{CalibrationGeometry, Point3, Vec3, Volume};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

/// Default timeout for reading one directive from the binary.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// World double
// ============================================================================

/// One recorded world call.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldCall {
    Place(Vec<PlacedVolume>),
    Clear(Volume),
    Give { player: String, item: String },
    Take { player: String, item: String },
    Whisper { player: String, lines: Vec<String> },
    Broadcast(Vec<String>),
    MiddlePrint { player: String, message: String },
    Teleport { player: String, position: Point3 },
}

/// World that records every call and can be told to refuse placements.
#[derive(Debug, Default)]
pub struct RecordingWorld {
    calls: Mutex<Vec<WorldCall>>,
    fail_place: Mutex<bool>,
}

impl RecordingWorld {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<WorldCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_placements(&self, fail: bool) {
        *self.fail_place.lock().unwrap() = fail;
    }

    /// Every line whispered to `player`, in order.
    pub fn whispers_to(&self, player: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                WorldCall::Whisper { player: p, lines } if p == player => Some(lines),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Every middle-screen message shown to `player`, in order.
    pub fn prints_to(&self, player: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                WorldCall::MiddlePrint { player: p, message } if p == player => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn placements(&self) -> Vec<Vec<PlacedVolume>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                WorldCall::Place(volumes) => Some(volumes),
                _ => None,
            })
            .collect()
    }

    pub fn clears(&self) -> Vec<Volume> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                WorldCall::Clear(region) => Some(region),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: WorldCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl World for RecordingWorld {
    async fn place_volumes(&self, volumes: &[PlacedVolume]) -> Result<(), HostError> {
        if *self.fail_place.lock().unwrap() {
            return Err(HostError::Closed);
        }
        self.record(WorldCall::Place(volumes.to_vec()));
        Ok(())
    }

    async fn clear_region(&self, region: &Volume) -> Result<(), HostError> {
        self.record(WorldCall::Clear(*region));
        Ok(())
    }

    async fn give_item(&self, player: &str, item: &str) -> Result<(), HostError> {
        self.record(WorldCall::Give {
            player: player.to_string(),
            item: item.to_string(),
        });
        Ok(())
    }

    async fn take_item(&self, player: &str, item: &str) -> Result<(), HostError> {
        self.record(WorldCall::Take {
            player: player.to_string(),
            item: item.to_string(),
        });
        Ok(())
    }

    async fn whisper(&self, player: &str, lines: &[String]) -> Result<(), HostError> {
        self.record(WorldCall::Whisper {
            player: player.to_string(),
            lines: lines.to_vec(),
        });
        Ok(())
    }

    async fn broadcast(&self, lines: &[String]) -> Result<(), HostError> {
        self.record(WorldCall::Broadcast(lines.to_vec()));
        Ok(())
    }

    async fn middle_print(&self, player: &str, message: &str) -> Result<(), HostError> {
        self.record(WorldCall::MiddlePrint {
            player: player.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    async fn teleport(&self, player: &str, position: Point3) -> Result<(), HostError> {
        self.record(WorldCall::Teleport {
            player: player.to_string(),
            position,
        });
        Ok(())
    }
}

// ============================================================================
// Console and feed doubles
// ============================================================================

/// Console that never answers.
#[derive(Debug, Default)]
pub struct SilentConsole;

#[async_trait::async_trait]
impl ConsoleChannel for SilentConsole {
    async fn watch(
        &self,
        _directive: &str,
        _pattern: &Regex,
        _window: WatchWindow,
    ) -> Result<Vec<LineMatch>, HostError> {
        Ok(Vec::new())
    }
}

/// Entity source that replays queued snapshots, one per poll, then reports
/// an empty world.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Snapshot>>,
    polls: Mutex<usize>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues one snapshot per entry, each holding a single projectile.
    pub fn push_path(&self, id: &str, positions: &[Point3]) {
        let mut script = self.script.lock().unwrap();
        for position in positions {
            let mut snapshot = Snapshot::new();
            snapshot.insert(id.to_string(), *position);
            script.push_back(snapshot);
        }
    }

    pub fn polls(&self) -> usize {
        *self.polls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl EntitySource for ScriptedSource {
    async fn poll(&self) -> Result<Snapshot, HostError> {
        *self.polls.lock().unwrap() += 1;
        Ok(self.script.lock().unwrap().pop_front().unwrap_or_default())
    }
}

// ============================================================================
// Context
// ============================================================================

/// A game context wired to in-memory doubles.
pub struct Harness {
    pub ctx: GameContext,
    pub world: Arc<RecordingWorld>,
    pub store: Arc<MemoryStore>,
    pub source: Arc<ScriptedSource>,
}

impl Harness {
    pub fn new(config: GameConfig) -> Self {
        let world = RecordingWorld::new();
        let store = Arc::new(MemoryStore::new());
        let ctx = GameContext {
            config: Arc::new(config),
            console: Arc::new(SilentConsole),
            world: Arc::clone(&world) as _,
            store: Arc::clone(&store) as _,
            events: Arc::new(EventEmitter::noop()),
        };
        Self {
            ctx,
            world,
            store,
            source: ScriptedSource::new(),
        }
    }

    pub fn source(&self) -> Arc<dyn EntitySource> {
        Arc::clone(&self.source) as _
    }
}

/// Deterministic single-tier configuration.
pub fn test_config() -> GameConfig {
    let mut config = GameConfig::default();
    config.features.tiered_scoring = false;
    config.rng_seed = Some(7);
    config.trusted_role = Some("admin".to_string());
    config
}

/// Trigger at the origin facing a surface 100 units along +y.
///
/// The surface's in-plane half-extent is smaller than any target, so every
/// target is centred on it at `(0, 97, 0)`.
pub fn calibration() -> CalibrationGeometry {
    CalibrationGeometry {
        trigger_position: Vec3::ZERO,
        target_surface: Volume::new(Vec3::new(0.0, 100.0, 0.0), Vec3::new(2.0, 1.0, 2.0)),
        finish_position: Vec3::new(0.0, -10.0, 0.0),
    }
}

// ============================================================================
// Binary helpers
// ============================================================================

/// Returns the path to a test fixture.
#[must_use]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Runs the binary to completion with the given arguments.
#[allow(clippy::missing_panics_doc)]
pub fn spawn_command(args: &[&str]) -> std::process::Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_axethrow"))
        .args(args)
        .output()
        .expect("failed to run axethrow")
}

/// A running `axethrow run` process driven over stdio.
pub struct AxethrowProcess {
    child: Child,
    stdin: tokio::process::ChildStdin,
    reader: BufReader<tokio::process::ChildStdout>,
}

impl AxethrowProcess {
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn(extra_args: &[&str]) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_axethrow"))
            .arg("--quiet")
            .arg("run")
            .args(extra_args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("failed to spawn axethrow");

        let stdin = child.stdin.take().expect("stdin not captured");
        let stdout = child.stdout.take().expect("stdout not captured");

        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
        }
    }

    /// Writes one line to the process.
    #[allow(clippy::missing_panics_doc)]
    pub async fn send_line(&mut self, line: &str) {
        self.stdin.write_all(line.as_bytes()).await.expect("write failed");
        self.stdin.write_all(b"\n").await.expect("write failed");
        self.stdin.flush().await.expect("flush failed");
    }

    /// Reads directives until one has the given `type`, or panics on timeout.
    #[allow(clippy::missing_panics_doc)]
    pub async fn expect_directive(&mut self, kind: &str) -> serde_json::Value {
        let mut line = String::new();
        tokio::time::timeout(DEFAULT_TIMEOUT, async {
            loop {
                line.clear();
                let n = self.reader.read_line(&mut line).await.expect("read_line I/O error");
                assert!(n > 0, "unexpected EOF from axethrow");
                let value: serde_json::Value =
                    serde_json::from_str(line.trim()).expect("directive is not JSON");
                if value["type"] == kind {
                    return value;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("no {kind} directive within {DEFAULT_TIMEOUT:?}"))
    }

    /// Closes stdin and waits for the process to exit.
    #[allow(clippy::missing_panics_doc)]
    pub async fn shutdown(self) -> std::process::ExitStatus {
        let Self {
            mut child, stdin, ..
        } = self;
        drop(stdin);

        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(status) => status.expect("wait failed"),
            Err(_) => {
                child.kill().await.expect("failed to kill child");
                panic!("axethrow did not exit after stdin closed");
            }
        }
    }
}
