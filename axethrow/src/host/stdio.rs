//! Line-framed host bridge.
//!
//! The bridge speaks newline-delimited text in both directions. Inbound,
//! a line that parses as a JSON [`HostMessage`] is an interaction or chat
//! command; any other line is raw console output and is fanned out to
//! every active console query. Outbound, world calls and console
//! directives are written as NDJSON [`HostDirective`] lines.

use axethrow_core::{Point3, Volume};
use futures::StreamExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{Command, ConsoleChannel, Interaction, LineMatch, PlacedVolume, WatchWindow, World};
use crate::error::HostError;

/// Default maximum inbound line length (1 MB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Default number of console lines buffered per query before it lags.
pub const DEFAULT_CONSOLE_BUFFER: usize = 4096;

// ============================================================================
// Wire Types
// ============================================================================

/// An inbound event from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// A player clicked an interactable brick.
    Interact(Interaction),
    /// A player issued a chat command.
    Command(Command),
}

/// An outbound request to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostDirective {
    /// Raw console command; responses arrive as console lines.
    Console { command: String },
    Place { volumes: Vec<PlacedVolume> },
    Clear { region: Volume },
    GiveItem { player: String, item: String },
    TakeItem { player: String, item: String },
    Whisper { player: String, lines: Vec<String> },
    Broadcast { lines: Vec<String> },
    MiddlePrint { player: String, message: String },
    Teleport { player: String, position: Point3 },
}

// ============================================================================
// Configuration
// ============================================================================

/// Limits for the line bridge.
#[derive(Debug, Clone, Copy)]
pub struct LineHostConfig {
    /// Inbound lines longer than this are dropped.
    pub max_line_length: usize,
    /// Console lines buffered per active query.
    pub console_buffer: usize,
}

impl Default for LineHostConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            console_buffer: DEFAULT_CONSOLE_BUFFER,
        }
    }
}

// ============================================================================
// LineHost
// ============================================================================

/// Host bridge over an `AsyncRead`/`AsyncWrite` pair.
///
/// The writer sits behind an async mutex so directives from concurrent
/// callers never interleave within a line. Console lines are delivered
/// through a broadcast channel; a query subscribes before writing its
/// directive so it cannot miss an early response.
pub struct LineHost {
    writer: Mutex<Box<dyn AsyncWrite + Unpin + Send>>,
    console_tx: broadcast::Sender<String>,
    config: LineHostConfig,
}

impl LineHost {
    /// Creates a bridge writing directives to `writer`.
    #[must_use]
    pub fn new<W>(writer: W, config: LineHostConfig) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (console_tx, _) = broadcast::channel(config.console_buffer.max(1));
        Self {
            writer: Mutex::new(Box::new(writer)),
            console_tx,
            config,
        }
    }

    /// Creates a bridge writing to stdout with default limits.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout(), LineHostConfig::default())
    }

    /// Reads inbound lines until EOF or cancellation.
    ///
    /// Host messages are forwarded to `inbound`; everything else is
    /// published to active console queries.
    ///
    /// # Errors
    ///
    /// Returns `HostError::Io` if reading fails.
    pub async fn pump<R>(
        &self,
        reader: R,
        inbound: mpsc::Sender<HostMessage>,
        cancel: CancellationToken,
    ) -> Result<(), HostError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let limit = self.config.max_line_length;
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(limit));
        // After a decode error the stream yields one `None` before it resumes.
        let mut resuming = false;

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => {
                    debug!("host pump cancelled");
                    break;
                }
                next = lines.next() => next,
            };

            let Some(next) = next else {
                if std::mem::take(&mut resuming) {
                    continue;
                }
                debug!("host input closed");
                break;
            };

            let line = match next {
                Ok(line) => line,
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!(error = %HostError::FrameTooLarge { limit }, "dropping inbound line");
                    resuming = true;
                    continue;
                }
                Err(LinesCodecError::Io(e)) => return Err(e.into()),
            };

            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }

            if let Some(message) = parse_message(line) {
                if inbound.send(message).await.is_err() {
                    debug!("inbound receiver dropped");
                    break;
                }
            } else {
                trace!(line, "console line");
                // No receivers just means no query is listening right now.
                let _ = self.console_tx.send(line.to_string());
            }
        }

        Ok(())
    }

    /// Writes one directive as a JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn send(&self, directive: &HostDirective) -> Result<(), HostError> {
        let mut serialized = serde_json::to_string(directive)?;
        serialized.push('\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(serialized.as_bytes()).await?;
        writer.flush().await?;
        drop(writer);
        Ok(())
    }
}

impl std::fmt::Debug for LineHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineHost")
            .field("config", &self.config)
            .field("watchers", &self.console_tx.receiver_count())
            .finish_non_exhaustive()
    }
}

fn parse_message(line: &str) -> Option<HostMessage> {
    if !line.starts_with('{') {
        return None;
    }
    serde_json::from_str(line).ok()
}

#[async_trait::async_trait]
impl ConsoleChannel for LineHost {
    async fn watch(
        &self,
        directive: &str,
        pattern: &Regex,
        window: WatchWindow,
    ) -> Result<Vec<LineMatch>, HostError> {
        let mut rx = self.console_tx.subscribe();
        self.send(&HostDirective::Console {
            command: directive.to_string(),
        })
        .await?;

        let hard_stop = Instant::now() + window.max;
        let mut idle_until = Instant::now() + window.idle;
        let mut matches = Vec::new();

        loop {
            let line = tokio::select! {
                () = tokio::time::sleep_until(idle_until.min(hard_stop)) => break,
                line = rx.recv() => line,
            };

            match line {
                Ok(line) => {
                    if let Some(found) = LineMatch::capture(pattern, &line) {
                        idle_until = Instant::now() + window.idle;
                        matches.push(found);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, directive, "console query lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        Ok(matches)
    }
}

#[async_trait::async_trait]
impl World for LineHost {
    async fn place_volumes(&self, volumes: &[PlacedVolume]) -> Result<(), HostError> {
        self.send(&HostDirective::Place {
            volumes: volumes.to_vec(),
        })
        .await
    }

    async fn clear_region(&self, region: &Volume) -> Result<(), HostError> {
        self.send(&HostDirective::Clear { region: *region }).await
    }

    async fn give_item(&self, player: &str, item: &str) -> Result<(), HostError> {
        self.send(&HostDirective::GiveItem {
            player: player.to_string(),
            item: item.to_string(),
        })
        .await
    }

    async fn take_item(&self, player: &str, item: &str) -> Result<(), HostError> {
        self.send(&HostDirective::TakeItem {
            player: player.to_string(),
            item: item.to_string(),
        })
        .await
    }

    async fn whisper(&self, player: &str, lines: &[String]) -> Result<(), HostError> {
        self.send(&HostDirective::Whisper {
            player: player.to_string(),
            lines: lines.to_vec(),
        })
        .await
    }

    async fn broadcast(&self, lines: &[String]) -> Result<(), HostError> {
        self.send(&HostDirective::Broadcast {
            lines: lines.to_vec(),
        })
        .await
    }

    async fn middle_print(&self, player: &str, message: &str) -> Result<(), HostError> {
        self.send(&HostDirective::MiddlePrint {
            player: player.to_string(),
            message: message.to_string(),
        })
        .await
    }

    async fn teleport(&self, player: &str, position: Point3) -> Result<(), HostError> {
        self.send(&HostDirective::Teleport {
            player: player.to_string(),
            position,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, BufReader};

    use super::*;

    const fn default_window() -> WatchWindow {
        WatchWindow {
            idle: Duration::from_millis(100),
            max: Duration::from_secs(1),
        }
    }

    async fn read_directive<R: tokio::io::AsyncBufRead + Unpin>(reader: &mut R) -> HostDirective {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(line.trim()).unwrap()
    }

    #[test]
    fn test_directive_wire_format() {
        let directive = HostDirective::MiddlePrint {
            player: "ann".to_string(),
            message: "12".to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&directive).unwrap();
        assert_eq!(json["type"], "middle_print");
        assert_eq!(json["player"], "ann");
    }

    #[test]
    fn test_place_directive_flattens_volume() {
        let directive = HostDirective::Place {
            volumes: vec![PlacedVolume {
                volume: Volume::new(Point3::new(1.0, 2.0, 3.0), Point3::new(2.0, 8.0, 8.0)),
                color: [255, 255, 255, 255],
            }],
        };
        let json: serde_json::Value = serde_json::to_value(&directive).unwrap();
        assert_eq!(json["volumes"][0]["position"], serde_json::json!([1.0, 2.0, 3.0]));
        assert_eq!(json["volumes"][0]["color"], serde_json::json!([255, 255, 255, 255]));
    }

    #[test]
    fn test_parse_message_ignores_console_text() {
        assert!(parse_message("Projectile_Handaxe_C /Game/Maps.PersistentLevel.P_1").is_none());
        assert!(parse_message("{not json").is_none());
        assert!(parse_message(r#"{"type":"unknown"}"#).is_none());
        assert!(matches!(
            parse_message(r#"{"type":"command","name":"axethrow_top","speaker":"ann"}"#),
            Some(HostMessage::Command(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_collects_matching_lines() {
        let (host_out, test_in) = tokio::io::duplex(4096);
        let (mut test_out, host_in) = tokio::io::duplex(4096);
        let host = Arc::new(LineHost::new(host_out, LineHostConfig::default()));

        let (tx, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let pump = {
            let host = Arc::clone(&host);
            let cancel = cancel.clone();
            tokio::spawn(async move { host.pump(host_in, tx, cancel).await })
        };

        let watcher = {
            let host = Arc::clone(&host);
            tokio::spawn(async move {
                let pattern = Regex::new(r"^Thing (?<id>\w+)$").unwrap();
                host.watch("getAll Thing", &pattern, default_window()).await
            })
        };

        let mut reader = BufReader::new(test_in);
        assert_eq!(
            read_directive(&mut reader).await,
            HostDirective::Console {
                command: "getAll Thing".to_string()
            }
        );

        test_out
            .write_all(b"Thing a1\nunrelated noise\nThing b2\n")
            .await
            .unwrap();

        let matches = watcher.await.unwrap().unwrap();
        let ids: Vec<_> = matches.iter().map(|m| m.get("id").unwrap()).collect();
        assert_eq!(ids, vec!["a1", "b2"]);

        cancel.cancel();
        pump.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_without_response_returns_empty() {
        let (host_out, _test_in) = tokio::io::duplex(4096);
        let host = LineHost::new(host_out, LineHostConfig::default());
        let pattern = Regex::new("never").unwrap();
        let matches = host
            .watch("getAll Nothing", &pattern, default_window())
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_pump_forwards_host_messages() {
        let (host_out, _test_in) = tokio::io::duplex(4096);
        let host = LineHost::new(host_out, LineHostConfig::default());
        let input = concat!(
            r#"{"type":"interact","player":"ann","signal":"axethrow_start","position":[0,0,0],"brick_size":[5,5,5]}"#,
            "\n",
            "some console output\n",
            r#"{"type":"command","name":"axethrow_pb","speaker":"bob","roles":["Admin"]}"#,
            "\n",
        );

        let (tx, mut rx) = mpsc::channel(8);
        host.pump(input.as_bytes(), tx, CancellationToken::new())
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            HostMessage::Interact(interaction) => assert_eq!(interaction.signal, "axethrow_start"),
            HostMessage::Command(_) => panic!("expected interaction first"),
        }
        match rx.recv().await.unwrap() {
            HostMessage::Command(command) => assert_eq!(command.roles, vec!["Admin"]),
            HostMessage::Interact(_) => panic!("expected command second"),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_drops_oversized_lines() {
        let (host_out, _test_in) = tokio::io::duplex(4096);
        let host = LineHost::new(
            host_out,
            LineHostConfig {
                max_line_length: 64,
                console_buffer: 8,
            },
        );
        let long = "x".repeat(200);
        let input = format!(
            "{long}\n{}\n",
            r#"{"type":"command","name":"a","speaker":"b"}"#
        );

        let (tx, mut rx) = mpsc::channel(8);
        host.pump(input.as_bytes(), tx, CancellationToken::new())
            .await
            .unwrap();
        match rx.recv().await.unwrap() {
            HostMessage::Command(command) => assert_eq!(command.speaker, "b"),
            HostMessage::Interact(_) => panic!("expected command"),
        }
        assert!(rx.recv().await.is_none());
    }
}
