use serde::Serialize;

use crate::models::Episode;

/// Aggregate viewing progress over an episode collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ViewingStats {
    pub total: usize,
    pub watched: usize,
    pub pending: usize,
    /// Whole percentage watched, rounded down.
    pub percent: u8,
}

impl ViewingStats {
    pub fn from_episodes(episodes: &[Episode]) -> Self {
        let total = episodes.len();
        let watched = episodes.iter().filter(|e| e.viewed).count();
        let percent = if total == 0 {
            0
        } else {
            (watched * 100 / total) as u8
        };
        Self {
            total,
            watched,
            pending: total - watched,
            percent,
        }
    }
}

impl std::fmt::Display for ViewingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} episodes watched ({}%), {} pending",
            self.watched, self.total, self.percent, self.pending
        )
    }
}
