//! The set of targets currently being watched.

use crate::models::GameTarget;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe map from game id to target, replaced wholesale.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: Mutex<HashMap<i64, GameTarget>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, GameTarget>> {
        self.targets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the tracked set and return the ids that are no longer tracked.
    ///
    /// When an id appears more than once the last target wins.
    pub fn replace<I>(&self, targets: I) -> HashSet<i64>
    where
        I: IntoIterator<Item = GameTarget>,
    {
        let next: HashMap<i64, GameTarget> = targets.into_iter().map(|t| (t.id, t)).collect();
        let mut current = self.lock();
        let removed = current
            .keys()
            .filter(|id| !next.contains_key(*id))
            .copied()
            .collect();
        *current = next;
        removed
    }

    /// Copy of every tracked target, ordered by id.
    pub fn snapshot(&self) -> Vec<GameTarget> {
        let mut targets: Vec<GameTarget> = self.lock().values().cloned().collect();
        targets.sort_by_key(|t| t.id);
        targets
    }

    pub fn get(&self, id: i64) -> Option<GameTarget> {
        self.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_is_wholesale() {
        let registry = TargetRegistry::new();
        registry.replace(vec![GameTarget::new(1, "a"), GameTarget::new(2, "b")]);

        let removed = registry.replace(vec![GameTarget::new(3, "c")]);

        assert_eq!(removed, HashSet::from([1, 2]));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(3));
        assert!(!registry.contains(1));
    }

    #[test]
    fn test_duplicate_ids_last_wins() {
        let registry = TargetRegistry::new();
        registry.replace(vec![GameTarget::new(1, "old"), GameTarget::new(1, "new")]);
        assert_eq!(registry.get(1).unwrap().title, "new");
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let registry = TargetRegistry::new();
        registry.replace(vec![
            GameTarget::new(9, "z"),
            GameTarget::new(2, "b"),
            GameTarget::new(5, "m"),
        ]);
        let ids: Vec<i64> = registry.snapshot().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }
}
