//! Configuration validation.
//!
//! Semantic checks on a deserialized `GameConfig`. Validation collects every
//! issue instead of stopping at the first, so one run of `axethrow validate`
//! reports everything wrong with a file.

use std::time::Duration;

use crate::config::loader::ConfigLimits;
use crate::config::schema::{FeedConfig, GameConfig, SessionConfig, SpawnConfig};
use crate::error::{Severity, ValidationIssue};

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns the result.
    pub fn validate(&mut self, config: &GameConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_names(config);
        self.validate_feed(&config.feed);
        self.validate_session(&config.session);
        self.validate_spawn(config, limits);
        self.validate_access(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_names(&mut self, config: &GameConfig) {
        let signals = &config.signals;
        for (path, value) in [
            ("signals.start", &signals.start),
            ("signals.target", &signals.target),
            ("signals.finish", &signals.finish),
            ("commands.setup", &config.commands.setup),
            ("commands.personal_best", &config.commands.personal_best),
            ("commands.top", &config.commands.top),
        ] {
            if value.trim().is_empty() {
                self.add_error(path, "must not be empty");
            }
        }

        if signals.start == signals.target
            || signals.start == signals.finish
            || signals.target == signals.finish
        {
            self.add_error(
                "signals",
                "start, target and finish signals must be distinct",
            );
        }

        let commands = &config.commands;
        if commands.setup == commands.personal_best
            || commands.setup == commands.top
            || commands.personal_best == commands.top
        {
            self.add_error("commands", "command names must be distinct");
        }
    }

    fn validate_feed(&mut self, feed: &FeedConfig) {
        if feed.entity_class.trim().is_empty() {
            self.add_error("feed.entity_class", "must not be empty");
        } else if feed.entity_class.chars().any(char::is_whitespace) {
            self.add_error("feed.entity_class", "must not contain whitespace");
        }

        self.require_positive("feed.poll_interval", feed.poll_interval);
        self.require_positive("feed.response_window", feed.response_window);
        self.require_positive("feed.max_window", feed.max_window);

        if feed.max_window < feed.response_window {
            self.add_error(
                "feed.max_window",
                "must be at least as long as feed.response_window",
            );
        }
    }

    fn validate_session(&mut self, session: &SessionConfig) {
        self.require_positive("session.game_length", session.game_length);
        self.require_positive("session.countdown_beat", session.countdown_beat);
        self.require_positive("session.deadline_tick", session.deadline_tick);

        if session.item.trim().is_empty() {
            self.add_error("session.item", "must not be empty");
        }
        if !session.trajectory_multiplier.is_finite() || session.trajectory_multiplier <= 0.0 {
            self.add_error("session.trajectory_multiplier", "must be a positive number");
        }
        if session.hit_bonus.is_zero() {
            self.add_warning("session.hit_bonus", "hits will not extend the game");
        }
    }

    fn validate_spawn(&mut self, config: &GameConfig, limits: &ConfigLimits) {
        let spawn: &SpawnConfig = &config.spawn;

        if spawn.targets_per_wave == 0 {
            self.add_error("spawn.targets_per_wave", "must be at least 1");
        } else if spawn.targets_per_wave > limits.max_targets_per_wave {
            self.add_error(
                "spawn.targets_per_wave",
                &format!("must be at most {}", limits.max_targets_per_wave),
            );
        }

        self.require_positive("spawn.slow_interval", spawn.slow_interval);
        self.require_positive("spawn.fast_interval", spawn.fast_interval);
        if spawn.fast_interval > spawn.slow_interval {
            self.add_error(
                "spawn.fast_interval",
                "must not be longer than spawn.slow_interval",
            );
        }
        if spawn.ramp_window.is_zero() {
            self.add_warning("spawn.ramp_window", "zero window starts at full difficulty");
        }

        if !(0.0..=1.0).contains(&spawn.upgrade_ceiling) {
            self.add_error("spawn.upgrade_ceiling", "must be between 0 and 1");
        }
        if !spawn.thickness.is_finite() || spawn.thickness <= 0.0 {
            self.add_error("spawn.thickness", "must be a positive number");
        }
        if !spawn.min_half_size.is_finite() || spawn.min_half_size <= 0.0 {
            self.add_error("spawn.min_half_size", "must be a positive number");
        }
        if !spawn.start_half_size.is_finite() || spawn.start_half_size < spawn.min_half_size {
            self.add_error(
                "spawn.start_half_size",
                "must be at least spawn.min_half_size",
            );
        }

        if spawn.tiers.len() > limits.max_tiers {
            self.add_error(
                "spawn.tiers",
                &format!("at most {} tiers are allowed", limits.max_tiers),
            );
        }
        if config.features.tiered_scoring && spawn.tiers.is_empty() {
            self.add_error(
                "spawn.tiers",
                "at least one tier is required when features.tiered_scoring is on",
            );
        }
        for (i, tier) in spawn.tiers.iter().enumerate() {
            let path = format!("spawn.tiers[{i}]");
            if !tier.half_size.is_finite() || tier.half_size <= 0.0 {
                self.add_error(&format!("{path}.half_size"), "must be a positive number");
            }
            if tier.points == 0 {
                self.add_warning(&format!("{path}.points"), "tier is worth no points");
            }
        }
        for (i, pair) in spawn.tiers.windows(2).enumerate() {
            if pair[1].half_size > pair[0].half_size || pair[1].points < pair[0].points {
                self.add_warning(
                    &format!("spawn.tiers[{}]", i + 1),
                    "tiers should go from large and cheap to small and valuable",
                );
            }
        }
    }

    fn validate_access(&mut self, config: &GameConfig) {
        match config.trusted_role.as_deref() {
            None => self.add_warning("trusted_role", "not set; anyone can run setup"),
            Some(role) if role.trim().is_empty() => {
                self.add_error("trusted_role", "must not be empty when set");
            }
            Some(_) => {}
        }
    }

    fn require_positive(&mut self, path: &str, value: Duration) {
        if value.is_zero() {
            self.add_error(path, "must be greater than zero");
        }
    }

    /// Adds an error to the collection.
    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    /// Adds a warning to the collection.
    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}
