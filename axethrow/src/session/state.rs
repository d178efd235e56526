//! Session state types.

use std::time::Duration;

use axethrow_core::{CalibrationGeometry, Point3, Vec3, Volume};
use tokio::time::Instant;

/// Where the session state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No session. Triggers start one.
    #[default]
    Idle,
    /// Ready / Set / Go beats are being printed.
    Countdown,
    /// Targets spawn and hits score.
    Active,
    /// Timers are stopping and the score is being recorded.
    Ending,
}

impl Phase {
    /// Returns `true` while a player owns the game.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Countdown => "countdown",
            Self::Active => "active",
            Self::Ending => "ending",
        };
        f.write_str(name)
    }
}

/// The one running session.
#[derive(Debug, Clone)]
pub struct GameSession {
    /// Player who triggered the session.
    pub player: String,
    /// Geometry captured at the trigger. Setup finishing mid-session does
    /// not move this session's targets or finish position.
    pub calibration: CalibrationGeometry,
    /// Points scored so far.
    pub score: u32,
    /// Targets hit so far.
    pub hits: u32,
    /// When the trigger was accepted.
    pub started_at: Instant,
    /// When `Active` began. Difficulty is measured from here.
    pub active_since: Option<Instant>,
    /// The session ends on the first deadline tick after this instant.
    pub deadline: Instant,
}

impl GameSession {
    /// Creates a session in its countdown state.
    #[must_use]
    pub fn new(
        player: impl Into<String>,
        calibration: CalibrationGeometry,
        now: Instant,
        game_length: Duration,
    ) -> Self {
        Self {
            player: player.into(),
            calibration,
            score: 0,
            hits: 0,
            started_at: now,
            active_since: None,
            deadline: now + game_length,
        }
    }

    /// Time spent in `Active`, zero before it began.
    #[must_use]
    pub fn difficulty_elapsed(&self, now: Instant) -> Duration {
        self.active_since
            .map_or(Duration::ZERO, |since| now.saturating_duration_since(since))
    }

    /// Whole seconds until the deadline, rounded up. Negative once overdue.
    #[must_use]
    pub fn seconds_left(&self, now: Instant) -> i64 {
        let millis = if self.deadline >= now {
            i64::try_from((self.deadline - now).as_millis()).unwrap_or(i64::MAX)
        } else {
            -i64::try_from((now - self.deadline).as_millis()).unwrap_or(i64::MAX)
        };
        millis.div_euclid(1000) + i64::from(millis.rem_euclid(1000) != 0)
    }

    /// Adds `points` and pushes the deadline back by `bonus`.
    pub fn award(&mut self, points: u32, bonus: Duration) {
        self.score = self.score.saturating_add(points);
        self.hits = self.hits.saturating_add(1);
        self.deadline += bonus;
    }
}

/// A placed target. Paired with exactly one world volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub volume: Volume,
    pub points: u32,
    pub spawned_at: Instant,
}

/// The last two observed positions of one projectile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySample {
    previous: Option<Point3>,
    latest: Point3,
}

impl TrajectorySample {
    /// Starts a trajectory from its first observation.
    #[must_use]
    pub const fn new(first: Point3) -> Self {
        Self {
            previous: None,
            latest: first,
        }
    }

    /// Shifts a new observation in.
    pub const fn push(&mut self, position: Point3) {
        self.previous = Some(self.latest);
        self.latest = position;
    }

    /// Returns the extrapolated segment `p0 → p0 + (p1 - p0) * multiplier`.
    ///
    /// `None` until two observations exist.
    #[must_use]
    pub fn segment(&self, multiplier: f64) -> Option<(Point3, Point3)> {
        let start = self.previous?;
        let direction: Vec3 = self.latest - start;
        Some((start, start + direction * multiplier))
    }
}
