//! Last observed running flag per game.

use crate::models::GameStatusChange;
use std::collections::HashMap;

/// Last observed running flag per tracked id.
///
/// An id with no entry is "unknown"; the first observation of it always
/// counts as a transition.
#[derive(Debug, Default, Clone)]
pub struct StatusTable {
    statuses: HashMap<i64, bool>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, game_id: i64) -> Option<bool> {
        self.statuses.get(&game_id).copied()
    }

    /// Record an observation, returning the change when it differs from the
    /// previous one.
    pub fn observe(&mut self, game_id: i64, is_running: bool) -> Option<GameStatusChange> {
        match self.statuses.insert(game_id, is_running) {
            Some(previous) if previous == is_running => None,
            _ => Some(GameStatusChange {
                game_id,
                is_running,
            }),
        }
    }

    pub fn remove(&mut self, game_id: i64) -> Option<bool> {
        self.statuses.remove(&game_id)
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}
