//! Difficulty ramp.
//!
//! Everything here is a pure function of the time spent in `Active` and the
//! spawn configuration, plus an RNG for the tier draw.

use std::time::Duration;

use axethrow_core::config::{FeatureFlags, SpawnConfig};
use rand::Rng;

/// What the next target looks like.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetSpec {
    /// Half-size in the plane of the surface.
    pub half_size: f64,
    /// Points for a hit.
    pub points: u32,
    /// RGBA color.
    pub color: [u8; 4],
}

/// `clamp(elapsed / ramp_window, 0, 1)`. A zero window is fully ramped.
#[must_use]
pub fn ramp(elapsed: Duration, ramp_window: Duration) -> f64 {
    if ramp_window.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / ramp_window.as_secs_f64()).clamp(0.0, 1.0)
}

/// Delay before the next spawn tick: `lerp(slow, fast, ramp)`.
#[must_use]
pub fn spawn_interval(spawn: &SpawnConfig, ramp: f64) -> Duration {
    let slow = spawn.slow_interval.as_secs_f64();
    let fast = spawn.fast_interval.as_secs_f64();
    Duration::from_secs_f64((slow + (fast - slow) * ramp.clamp(0.0, 1.0)).max(0.0))
}

/// Chance of climbing one tier: `upgrade_ceiling * ramp`.
#[must_use]
pub fn upgrade_probability(spawn: &SpawnConfig, ramp: f64) -> f64 {
    (spawn.upgrade_ceiling * ramp).clamp(0.0, 1.0)
}

/// Draws a tier index in `0..tier_count`.
///
/// Starts at tier 0 and climbs while a uniform draw is below `p`, so
/// `P(tier >= k) = p^k` for every reachable `k`.
pub fn draw_tier<R: Rng + ?Sized>(tier_count: usize, p: f64, rng: &mut R) -> usize {
    let mut tier = 0;
    while tier + 1 < tier_count && rng.random::<f64>() < p {
        tier += 1;
    }
    tier
}

/// Half-size in single-tier mode: shrinks linearly from `start_half_size`
/// to `min_half_size` over the ramp window.
#[must_use]
pub fn shrinking_half_size(spawn: &SpawnConfig, ramp: f64) -> f64 {
    let shrunk = spawn.start_half_size - (spawn.start_half_size - spawn.min_half_size) * ramp.clamp(0.0, 1.0);
    shrunk.max(spawn.min_half_size)
}

/// Picks the next target for a session that has been active for `elapsed`.
pub fn next_target<R: Rng + ?Sized>(
    spawn: &SpawnConfig,
    features: FeatureFlags,
    elapsed: Duration,
    rng: &mut R,
) -> TargetSpec {
    let ramp = ramp(elapsed, spawn.ramp_window);

    if features.tiered_scoring && !spawn.tiers.is_empty() {
        let index = draw_tier(spawn.tiers.len(), upgrade_probability(spawn, ramp), rng);
        let tier = &spawn.tiers[index];
        return TargetSpec {
            half_size: tier.half_size,
            points: tier.points,
            color: tier.color.unwrap_or(spawn.color),
        };
    }

    TargetSpec {
        half_size: shrinking_half_size(spawn, ramp),
        points: 1,
        color: spawn.color,
    }
}
