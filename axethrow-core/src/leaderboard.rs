//! Per-player best scores.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Best score per player id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Leaderboard {
    scores: BTreeMap<String, u32>,
}

/// What a recorded score achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreOutcome {
    /// The score beat the player's previous best (or is their first).
    pub personal_best: bool,
    /// The score beat every other recorded score.
    pub global_best: bool,
}

impl Leaderboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the player's best score, if they have played.
    #[must_use]
    pub fn best(&self, player: &str) -> Option<u32> {
        self.scores.get(player).copied()
    }

    /// Returns the highest recorded score.
    #[must_use]
    pub fn top_score(&self) -> Option<u32> {
        self.scores.values().copied().max()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Records a finished session's score.
    ///
    /// The stored value only changes on a personal best. A global best needs
    /// a strictly higher score than the previous leader and a non-zero score.
    pub fn record(&mut self, player: &str, score: u32) -> ScoreOutcome {
        let previous_top = self.top_score();
        let personal_best = self.best(player).is_none_or(|best| score > best);

        if personal_best {
            self.scores.insert(player.to_string(), score);
        }

        ScoreOutcome {
            personal_best,
            global_best: personal_best && score > 0 && previous_top.is_none_or(|top| score > top),
        }
    }

    /// Returns up to `n` players ordered by descending score, ties by name.
    #[must_use]
    pub fn top(&self, n: usize) -> Vec<(&str, u32)> {
        let mut entries: Vec<(&str, u32)> = self
            .scores
            .iter()
            .map(|(player, score)| (player.as_str(), *score))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries.truncate(n);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_score_is_personal_best() {
        let mut board = Leaderboard::new();
        let outcome = board.record("alice", 4);
        assert!(outcome.personal_best);
        assert!(outcome.global_best);
        assert_eq!(board.best("alice"), Some(4));
    }

    #[test]
    fn test_lower_score_keeps_best() {
        let mut board = Leaderboard::new();
        board.record("alice", 7);
        let outcome = board.record("alice", 3);
        assert_eq!(outcome, ScoreOutcome::default());
        assert_eq!(board.best("alice"), Some(7));
    }

    #[test]
    fn test_personal_best_below_leader() {
        let mut board = Leaderboard::new();
        board.record("alice", 10);
        board.record("bob", 2);
        let outcome = board.record("bob", 6);
        assert!(outcome.personal_best);
        assert!(!outcome.global_best);
    }

    #[test]
    fn test_tie_with_leader_is_not_global_best() {
        let mut board = Leaderboard::new();
        board.record("alice", 10);
        let outcome = board.record("bob", 10);
        assert!(outcome.personal_best);
        assert!(!outcome.global_best);
    }

    #[test]
    fn test_zero_score_never_global_best() {
        let mut board = Leaderboard::new();
        let outcome = board.record("alice", 0);
        assert!(outcome.personal_best);
        assert!(!outcome.global_best);
    }

    #[test]
    fn test_top_orders_by_score_then_name() {
        let mut board = Leaderboard::new();
        for (player, score) in [("dave", 3), ("carol", 9), ("bob", 9), ("alice", 1), ("eve", 5), ("frank", 2)] {
            board.record(player, score);
        }
        let top = board.top(5);
        assert_eq!(
            top,
            vec![("bob", 9), ("carol", 9), ("eve", 5), ("dave", 3), ("frank", 2)]
        );
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut board = Leaderboard::new();
        board.record("alice", 3);
        let json = serde_json::to_string(&board).unwrap();
        assert_eq!(json, r#"{"alice":3}"#);
    }
}
