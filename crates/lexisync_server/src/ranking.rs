//! Ranking recomputation hook.

use crate::error::ServerResult;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Notified inside the push transaction when a batch touched a table that
/// feeds the global ranking.
///
/// An error rolls the push back.
pub trait RankingHook: Send + Sync {
    /// Called with the user's profile as written by the push.
    fn on_user_changed(&self, user_id: &str, profile: &Value) -> ServerResult<()>;
}

/// Ignores every change.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRanking;

impl RankingHook for NoopRanking {
    fn on_user_changed(&self, _user_id: &str, _profile: &Value) -> ServerResult<()> {
        Ok(())
    }
}

/// In-memory leaderboard ordered by `dakaScore`.
#[derive(Debug, Default)]
pub struct Leaderboard {
    scores: RwLock<HashMap<String, i64>>,
}

impl Leaderboard {
    /// Creates an empty leaderboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the 1-based rank of `user_id`; ties share a rank.
    pub fn rank_of(&self, user_id: &str) -> Option<usize> {
        let scores = self.scores.read();
        let score = *scores.get(user_id)?;
        Some(1 + scores.values().filter(|&&other| other > score).count())
    }

    /// Returns the best `n` users, highest score first, ties by id.
    pub fn top(&self, n: usize) -> Vec<(String, i64)> {
        let mut entries: Vec<_> = self
            .scores
            .read()
            .iter()
            .map(|(id, score)| (id.clone(), *score))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }
}

impl RankingHook for Leaderboard {
    fn on_user_changed(&self, user_id: &str, profile: &Value) -> ServerResult<()> {
        let score = profile.get("dakaScore").and_then(Value::as_i64).unwrap_or(0);
        self.scores.write().insert(user_id.to_string(), score);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaderboard_ranks_by_score() {
        let board = Leaderboard::new();
        board.on_user_changed("a", &json!({"dakaScore": 10})).unwrap();
        board.on_user_changed("b", &json!({"dakaScore": 30})).unwrap();
        board.on_user_changed("c", &json!({"dakaScore": 10})).unwrap();
        board.on_user_changed("d", &json!({})).unwrap();

        assert_eq!(board.rank_of("b"), Some(1));
        assert_eq!(board.rank_of("a"), Some(2));
        assert_eq!(board.rank_of("c"), Some(2));
        assert_eq!(board.rank_of("d"), Some(4));
        assert_eq!(board.rank_of("zz"), None);

        let top = board.top(2);
        assert_eq!(top, vec![("b".to_string(), 30), ("a".to_string(), 10)]);
    }

    #[test]
    fn rescoring_replaces_previous_score() {
        let board = Leaderboard::new();
        board.on_user_changed("a", &json!({"dakaScore": 1})).unwrap();
        board.on_user_changed("b", &json!({"dakaScore": 2})).unwrap();
        board.on_user_changed("a", &json!({"dakaScore": 5})).unwrap();
        assert_eq!(board.rank_of("a"), Some(1));
    }
}
