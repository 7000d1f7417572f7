// Bounded policy history for rollback

use std::collections::VecDeque;
use std::sync::Arc;

use contextlog_types::PersistencePolicy;

pub const DEFAULT_HISTORY_CAPACITY: usize = 32;

/// Previous policies, newest at the back. The oldest is dropped when full.
#[derive(Debug, Clone)]
pub struct PolicyHistory {
    entries: VecDeque<Arc<PersistencePolicy>>,
    capacity: usize,
}

impl Default for PolicyHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl PolicyHistory {
    pub fn new(capacity: usize) -> Self {
        PolicyHistory {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, policy: Arc<PersistencePolicy>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(policy);
    }

    /// Pop `steps` entries and return the last one popped. `None` if too few.
    pub fn rollback(&mut self, steps: usize) -> Option<Arc<PersistencePolicy>> {
        if steps == 0 || steps > self.entries.len() {
            return None;
        }
        let keep = self.entries.len() - steps;
        self.entries.drain(keep..).next()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Arc<PersistencePolicy> {
        Arc::new(PersistencePolicy::new(name))
    }

    #[test]
    fn test_rollback_returns_target() {
        let mut history = PolicyHistory::new(4);
        history.push(named("a"));
        history.push(named("b"));
        history.push(named("c"));
        assert_eq!(history.rollback(2).map(|p| p.name.clone()), Some("b".to_string()));
        assert_eq!(history.len(), 1);
        assert!(history.rollback(2).is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = PolicyHistory::new(2);
        history.push(named("a"));
        history.push(named("b"));
        history.push(named("c"));
        assert_eq!(history.len(), 2);
        assert_eq!(history.rollback(2).map(|p| p.name.clone()), Some("b".to_string()));
    }
}
