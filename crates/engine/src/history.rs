/// Undo/Redo history over full document snapshots
use std::collections::VecDeque;

use crate::state::DocumentState;

/// Maximum number of undo steps kept.
pub const MAX_HISTORY_DEPTH: usize = 10;

#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<DocumentState>,
    redo_stack: Vec<DocumentState>,
    max_entries: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_depth(MAX_HISTORY_DEPTH)
    }

    pub fn with_depth(max_entries: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Snapshot `current` before a mutation. Invalidates the redo branch.
    pub fn commit(&mut self, current: &DocumentState) {
        self.undo_stack.push_back(current.clone());
        self.redo_stack.clear();

        // Limit history size
        while self.undo_stack.len() > self.max_entries {
            self.undo_stack.pop_front();
        }
    }

    /// Step back. `current` goes onto the redo stack; the returned snapshot
    /// becomes the new current state.
    pub fn undo(&mut self, current: &DocumentState) -> Option<DocumentState> {
        let previous = self.undo_stack.pop_back()?;
        self.redo_stack.push(current.clone());
        Some(previous)
    }

    /// Inverse of [`History::undo`].
    pub fn redo(&mut self, current: &DocumentState) -> Option<DocumentState> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push_back(current.clone());
        if self.undo_stack.len() > self.max_entries {
            self.undo_stack.pop_front();
        }
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridassist_core::grid::grid_from;

    fn state(v: &str) -> DocumentState {
        DocumentState::from_grid(grid_from(&[&["H"][..], &[v][..]]))
    }

    #[test]
    fn test_undo_empty_is_noop() {
        let mut h = History::new();
        assert!(h.undo(&state("a")).is_none());
        assert!(!h.can_redo());
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut h = History::new();
        let a = state("a");
        let b = state("b");

        h.commit(&a);
        let back = h.undo(&b).unwrap();
        assert_eq!(back, a);
        assert!(h.can_redo());

        let forward = h.redo(&back).unwrap();
        assert_eq!(forward, b);
        assert!(h.can_undo());
        assert!(!h.can_redo());
    }

    #[test]
    fn test_commit_clears_redo() {
        let mut h = History::new();
        h.commit(&state("a"));
        h.undo(&state("b"));
        assert!(h.can_redo());
        h.commit(&state("c"));
        assert!(!h.can_redo());
    }

    #[test]
    fn test_depth_bound_evicts_oldest() {
        let mut h = History::new();
        for i in 0..15 {
            h.commit(&state(&i.to_string()));
        }
        assert_eq!(h.undo_depth(), MAX_HISTORY_DEPTH);

        let mut oldest = None;
        let mut current = state("now");
        while let Some(prev) = h.undo(&current) {
            oldest = Some(prev.clone());
            current = prev;
        }
        assert_eq!(oldest.unwrap(), state("5"));
    }
}
