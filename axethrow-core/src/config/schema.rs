//! Configuration schema types
//!
//! Every section and field has a default, so an empty file (or a file that
//! only overrides a few values) describes a playable game. Durations are
//! written as human-readable strings such as `"150ms"` or `"30s"`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration for an axe-throw installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct GameConfig {
    /// Interaction signals the start, target and finish bricks log.
    pub signals: SignalConfig,

    /// Chat command names.
    pub commands: CommandConfig,

    /// Projectile tracking over the console channel.
    pub feed: FeedConfig,

    /// Session timing and scoring.
    pub session: SessionConfig,

    /// Target spawning and difficulty ramp.
    pub spawn: SpawnConfig,

    /// Optional game features.
    pub features: FeatureFlags,

    /// Start-up handling of stored state.
    pub storage: StorageConfig,

    /// Role required to run the setup command. `None` allows everyone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trusted_role: Option<String>,

    /// Seed for target placement and tier draws. `None` seeds from the OS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            signals: SignalConfig::default(),
            commands: CommandConfig::default(),
            feed: FeedConfig::default(),
            session: SessionConfig::default(),
            spawn: SpawnConfig::default(),
            features: FeatureFlags::default(),
            storage: StorageConfig::default(),
            trusted_role: None,
            rng_seed: None,
        }
    }
}

// ============================================================================
// Signals & Commands
// ============================================================================

/// Interaction signals logged by the installation's bricks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct SignalConfig {
    /// Logged by the start trigger; starts a session and confirms setup step 1.
    pub start: String,
    /// Logged by the target surface; confirms setup step 2.
    pub target: String,
    /// Logged by the finish marker; confirms setup step 3.
    pub finish: String,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            start: "axethrow_start".to_string(),
            target: "axethrow_target".to_string(),
            finish: "axethrow_finish".to_string(),
        }
    }
}

/// Chat command names registered with the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct CommandConfig {
    /// Starts the setup wizard.
    pub setup: String,
    /// Whispers the speaker's best score.
    pub personal_best: String,
    /// Whispers the top five players.
    pub top: String,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            setup: "axethrow_setup".to_string(),
            personal_best: "axethrow_pb".to_string(),
            top: "axethrow_top".to_string(),
        }
    }
}

// ============================================================================
// Feed
// ============================================================================

/// Projectile tracking configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct FeedConfig {
    /// Projectile class name, as in `Projectile_<class>_C`.
    pub entity_class: String,

    /// Time between polling cycles.
    #[serde(with = "duration_str")]
    pub poll_interval: Duration,

    /// A query's response window closes once no matching line arrived for
    /// this long.
    #[serde(with = "duration_str")]
    pub response_window: Duration,

    /// Hard cap on a single query's response window.
    #[serde(with = "duration_str")]
    pub max_window: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            entity_class: "Handaxe".to_string(),
            poll_interval: Duration::from_millis(150),
            response_window: Duration::from_millis(100),
            max_window: Duration::from_secs(1),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Session timing and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct SessionConfig {
    /// Initial session length once the countdown finishes.
    #[serde(with = "duration_str")]
    pub game_length: Duration,

    /// Deadline extension per target hit.
    #[serde(with = "duration_str")]
    pub hit_bonus: Duration,

    /// Delay between the countdown beats.
    #[serde(with = "duration_str")]
    pub countdown_beat: Duration,

    /// Period of the deadline check.
    #[serde(with = "duration_str")]
    pub deadline_tick: Duration,

    /// Item granted to the player for the length of a session.
    pub item: String,

    /// How far the last observed movement is extended, as a multiple of the
    /// last sampled delta, when testing a vanished projectile for hits.
    pub trajectory_multiplier: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            game_length: Duration::from_secs(30),
            hit_bonus: Duration::from_secs(2),
            countdown_beat: Duration::from_secs(1),
            deadline_tick: Duration::from_secs(1),
            item: "Weapon_Handaxe".to_string(),
            trajectory_multiplier: 10.0,
        }
    }
}

// ============================================================================
// Spawning
// ============================================================================

/// Target spawning and difficulty ramp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct SpawnConfig {
    /// Targets placed per wave.
    pub targets_per_wave: usize,

    /// Wave interval at the start of a session.
    #[serde(with = "duration_str")]
    pub slow_interval: Duration,

    /// Wave interval once the ramp window has elapsed.
    #[serde(with = "duration_str")]
    pub fast_interval: Duration,

    /// Session time over which difficulty ramps from easiest to hardest.
    #[serde(with = "duration_str")]
    pub ramp_window: Duration,

    /// Per-step probability of drawing a harder tier at full difficulty.
    pub upgrade_ceiling: f64,

    /// Half-thickness of a target along the surface normal.
    pub thickness: f64,

    /// Half-size of single-tier targets at the start of a session.
    pub start_half_size: f64,

    /// Half-size single-tier targets shrink to by the end of the ramp.
    pub min_half_size: f64,

    /// Default RGBA target color.
    pub color: [u8; 4],

    /// Target tiers ordered from easiest (large, low value) to hardest.
    pub tiers: Vec<TargetTier>,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            targets_per_wave: 1,
            slow_interval: Duration::from_secs(2),
            fast_interval: Duration::from_secs(1),
            ramp_window: Duration::from_secs(60),
            upgrade_ceiling: 0.6,
            thickness: 2.0,
            start_half_size: 24.0,
            min_half_size: 4.0,
            color: [255, 255, 255, 255],
            tiers: vec![
                TargetTier::new(24.0, 1, [255, 255, 255, 255]),
                TargetTier::new(14.0, 2, [80, 160, 255, 255]),
                TargetTier::new(7.0, 5, [255, 200, 40, 255]),
            ],
        }
    }
}

/// One target size/value tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct TargetTier {
    /// Half-size of the target in the plane of the surface.
    pub half_size: f64,
    /// Points awarded for a hit.
    pub points: u32,
    /// RGBA color; falls back to `spawn.color`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[u8; 4]>,
}

impl TargetTier {
    #[must_use]
    pub const fn new(half_size: f64, points: u32, color: [u8; 4]) -> Self {
        Self {
            half_size,
            points,
            color: Some(color),
        }
    }
}

// ============================================================================
// Features & Storage
// ============================================================================

/// Optional game features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct FeatureFlags {
    /// Draw targets from `spawn.tiers`; otherwise single-tier shrinking targets.
    pub tiered_scoring: bool,
    /// Teleport the player to the finish position when a session ends.
    pub finish_teleport: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            tiered_scoring: true,
            finish_teleport: true,
        }
    }
}

/// Start-up handling of stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct StorageConfig {
    /// Load calibration geometry saved by a previous setup.
    pub load_cache: bool,
    /// Clear the leaderboard at start-up.
    pub reset_leaderboard: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            load_cache: true,
            reset_leaderboard: false,
        }
    }
}

// ============================================================================
// Duration (de)serialization
// ============================================================================

/// Serde adapter for `Duration` fields written as `"150ms"`, `"2s"`, `"1m"`.
pub mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a duration in humantime format.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    /// Deserializes a humantime duration string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid duration.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim())
            .map_err(|e| serde::de::Error::custom(format!("invalid duration '{raw}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config: GameConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let yaml = r#"
feed:
  entity_class: Knife
  poll_interval: 250ms
session:
  game_length: 45s
features:
  finish_teleport: false
"#;
        let config: GameConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.feed.entity_class, "Knife");
        assert_eq!(config.feed.poll_interval, Duration::from_millis(250));
        assert_eq!(config.feed.response_window, Duration::from_millis(100));
        assert_eq!(config.session.game_length, Duration::from_secs(45));
        assert!(!config.features.finish_teleport);
        assert!(config.features.tiered_scoring);
    }

    #[test]
    fn test_tiers_parse() {
        let yaml = r#"
spawn:
  tiers:
    - half_size: 20
      points: 1
    - half_size: 6
      points: 4
      color: [255, 0, 0, 255]
"#;
        let config: GameConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.spawn.tiers.len(), 2);
        assert_eq!(config.spawn.tiers[0].color, None);
        assert_eq!(config.spawn.tiers[1].points, 4);
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let result: Result<GameConfig, _> = serde_yaml::from_str("session:\n  hit_bonus: soon\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<GameConfig, _> = serde_yaml::from_str("sesion:\n  game_length: 3s\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_duration_serializes_as_text() {
        let yaml = serde_yaml::to_string(&FeedConfig::default()).unwrap();
        assert!(yaml.contains("poll_interval: 150ms"));
    }
}
