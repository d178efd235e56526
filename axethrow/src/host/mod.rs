//! Host interface boundary.
//!
//! The game never talks to the world directly. Everything it observes or
//! changes goes through the traits in this module: a text console it can
//! query, a set of world-mutation primitives, and a key/value store. An
//! explicit [`GameContext`] carries the implementations to every component.

pub mod stdio;
pub mod store;

pub use stdio::{HostDirective, HostMessage, LineHost, LineHostConfig};
pub use store::{FileStore, MemoryStore};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axethrow_core::config::GameConfig;
use axethrow_core::{CalibrationGeometry, Leaderboard, Point3, Vector3, Volume};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{HostError, StoreError};
use crate::observability::EventEmitter;

// ============================================================================
// Console Channel
// ============================================================================

/// How long a console query listens for its response lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchWindow {
    /// The window closes once no matching line arrived for this long.
    pub idle: Duration,
    /// Hard cap on the whole window.
    pub max: Duration,
}

/// One console line that matched a query pattern, with its named captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    line: String,
    captures: HashMap<String, String>,
}

impl LineMatch {
    /// Matches `line` against `pattern`, keeping every named capture group.
    #[must_use]
    pub fn capture(pattern: &Regex, line: &str) -> Option<Self> {
        let caps = pattern.captures(line)?;
        let captures = pattern
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Some(Self {
            line: line.to_string(),
            captures,
        })
    }

    /// Returns a named capture group.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.captures.get(name).map(String::as_str)
    }

    /// Returns the full matched line.
    #[must_use]
    pub fn line(&self) -> &str {
        &self.line
    }
}

/// The world's text-based state channel.
///
/// A query writes one directive and collects the console lines matching
/// `pattern` until the response window closes. Lines that do not match are
/// ignored, so concurrent queries with distinct patterns do not interfere.
#[async_trait::async_trait]
pub trait ConsoleChannel: Send + Sync {
    /// Issues `directive` and returns every matching line in arrival order.
    async fn watch(
        &self,
        directive: &str,
        pattern: &Regex,
        window: WatchWindow,
    ) -> Result<Vec<LineMatch>, HostError>;
}

// ============================================================================
// World Mutation
// ============================================================================

/// A volume to place in the world, with its RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacedVolume {
    /// Centre and half-extents.
    #[serde(flatten)]
    pub volume: Volume,
    /// RGBA color.
    pub color: [u8; 4],
}

/// World-mutation and player-feedback primitives.
#[async_trait::async_trait]
pub trait World: Send + Sync {
    /// Places one or more volumes.
    async fn place_volumes(&self, volumes: &[PlacedVolume]) -> Result<(), HostError>;

    /// Clears everything inside `region`.
    async fn clear_region(&self, region: &Volume) -> Result<(), HostError>;

    /// Grants an item to a player.
    async fn give_item(&self, player: &str, item: &str) -> Result<(), HostError>;

    /// Revokes an item from a player.
    async fn take_item(&self, player: &str, item: &str) -> Result<(), HostError>;

    /// Sends private chat lines to one player.
    async fn whisper(&self, player: &str, lines: &[String]) -> Result<(), HostError>;

    /// Sends chat lines to every player.
    async fn broadcast(&self, lines: &[String]) -> Result<(), HostError>;

    /// Shows a short message in the middle of a player's screen.
    async fn middle_print(&self, player: &str, message: &str) -> Result<(), HostError>;

    /// Moves a player to `position`.
    async fn teleport(&self, player: &str, position: Point3) -> Result<(), HostError>;
}

// ============================================================================
// Storage
// ============================================================================

/// Persistent key/value storage for calibration geometry and the leaderboard.
///
/// A missing key is a valid "not configured" state, not an error.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Returns the saved calibration, if any.
    async fn calibration(&self) -> Result<Option<CalibrationGeometry>, StoreError>;

    /// Saves the calibration.
    async fn set_calibration(&self, calibration: &CalibrationGeometry) -> Result<(), StoreError>;

    /// Returns the leaderboard (empty when nothing was saved).
    async fn leaderboard(&self) -> Result<Leaderboard, StoreError>;

    /// Saves the leaderboard.
    async fn set_leaderboard(&self, leaderboard: &Leaderboard) -> Result<(), StoreError>;
}

// ============================================================================
// Inbound Events
// ============================================================================

/// A player clicked an interactable brick that logs a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Player name.
    pub player: String,
    /// Signal text the brick logs.
    pub signal: String,
    /// Brick centre.
    pub position: Point3,
    /// Brick half-extents.
    pub brick_size: Vector3,
}

/// A chat command issued by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Command name without the leading slash.
    pub name: String,
    /// Player who issued the command.
    pub speaker: String,
    /// Roles the host reports for the speaker.
    #[serde(default)]
    pub roles: Vec<String>,
}

// ============================================================================
// Context
// ============================================================================

/// Everything a game component needs from the outside world.
#[derive(Clone)]
pub struct GameContext {
    pub config: Arc<GameConfig>,
    pub console: Arc<dyn ConsoleChannel>,
    pub world: Arc<dyn World>,
    pub store: Arc<dyn Store>,
    pub events: Arc<EventEmitter>,
}

impl std::fmt::Debug for GameContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GameContext {
    /// Whispers a single line, logging instead of failing.
    pub async fn tell(&self, player: &str, message: impl Into<String>) {
        let lines = [message.into()];
        if let Err(e) = self.world.whisper(player, &lines).await {
            tracing::warn!(player, error = %e, "failed to whisper player");
        }
    }

    /// Whispers several lines, logging instead of failing.
    pub async fn tell_lines(&self, player: &str, lines: &[String]) {
        if let Err(e) = self.world.whisper(player, lines).await {
            tracing::warn!(player, error = %e, "failed to whisper player");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_match_named_captures() {
        let pattern = Regex::new(r"id=(?<id>\w+) pos=(?<pos>\d+)").unwrap();
        let m = LineMatch::capture(&pattern, "entity id=abc pos=12 extra").unwrap();
        assert_eq!(m.get("id"), Some("abc"));
        assert_eq!(m.get("pos"), Some("12"));
        assert_eq!(m.get("missing"), None);
        assert_eq!(m.line(), "entity id=abc pos=12 extra");
    }

    #[test]
    fn test_line_match_rejects_other_lines() {
        let pattern = Regex::new(r"id=(?<id>\w+)").unwrap();
        assert!(LineMatch::capture(&pattern, "nothing here").is_none());
    }

    #[test]
    fn test_interaction_deserializes_arrays() {
        let json = r#"{"player":"ann","signal":"axethrow_start","position":[1,2,3],"brick_size":[5,5,2]}"#;
        let interaction: Interaction = serde_json::from_str(json).unwrap();
        assert_eq!(interaction.position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(interaction.brick_size.z, 2.0);
    }

    #[test]
    fn test_command_roles_default_empty() {
        let command: Command =
            serde_json::from_str(r#"{"name":"axethrow_pb","speaker":"ann"}"#).unwrap();
        assert!(command.roles.is_empty());
    }
}
