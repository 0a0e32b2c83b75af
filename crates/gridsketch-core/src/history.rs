//! Bounded undo/redo over full model snapshots.

use crate::config::DEFAULT_HISTORY_CAPACITY;
use crate::constraint::Constraint;
use crate::shapes::Entity;
use kurbo::Point;
use std::collections::VecDeque;

/// A deep copy of the model state that undo/redo restores.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub entities: Vec<Entity>,
    pub constraints: Vec<Constraint>,
    pub id_counter: u64,
    /// View-space origin at capture time, when the snapshot came from a
    /// canvas. Stored coordinates are only meaningful against it.
    pub origin: Option<Point>,
}

/// Linear undo/redo history.
///
/// Snapshots are taken *before* a mutating action. The undo stack is bounded;
/// at capacity the oldest snapshot is evicted first.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<Snapshot>,
    redo_stack: Vec<Snapshot>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Push a snapshot of the state about to be changed. Clears the redo stack.
    pub fn save_state(&mut self, snapshot: Snapshot) {
        self.push_undo(snapshot);
        self.redo_stack.clear();
    }

    /// Step back. `current` is the live state, kept for redo.
    ///
    /// Returns the snapshot to restore, or `None` when there is nothing to undo.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let snapshot = self.undo_stack.pop_back()?;
        self.redo_stack.push(current);
        Some(snapshot)
    }

    /// Step forward again. `current` is pushed back onto the undo stack so the
    /// redo itself stays undoable.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let snapshot = self.redo_stack.pop()?;
        self.push_undo(current);
        Some(snapshot)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    fn push_undo(&mut self, snapshot: Snapshot) {
        self.undo_stack.push_back(snapshot);
        while self.undo_stack.len() > self.capacity {
            self.undo_stack.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(counter: u64) -> Snapshot {
        Snapshot {
            entities: Vec::new(),
            constraints: Vec::new(),
            id_counter: counter,
            origin: None,
        }
    }

    #[test]
    fn test_undo_empty_stack() {
        let mut history = History::default();
        assert!(history.undo(state(1)).is_none());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_then_redo() {
        let mut history = History::default();
        history.save_state(state(1));
        let restored = history.undo(state(2)).unwrap();
        assert_eq!(restored.id_counter, 1);
        assert!(history.can_redo());

        let again = history.redo(state(1)).unwrap();
        assert_eq!(again.id_counter, 2);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn test_save_clears_redo() {
        let mut history = History::default();
        history.save_state(state(1));
        history.undo(state(2));
        assert!(history.can_redo());
        history.save_state(state(1));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = History::new(3);
        for i in 1..=5 {
            history.save_state(state(i));
        }
        assert_eq!(history.undo_len(), 3);
        let mut seen = Vec::new();
        while let Some(s) = history.undo(state(0)) {
            seen.push(s.id_counter);
        }
        assert_eq!(seen, vec![5, 4, 3]);
    }
}
