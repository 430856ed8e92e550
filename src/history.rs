//! Undo/redo history of selection snapshots

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::part::PartMap;
use crate::pool::SelectionIndex;

pub const DEFAULT_HISTORY_LIMIT: usize = 300;

/// Everything an undo step restores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub indices: SelectionIndex,
    pub locks: PartMap<bool>,
    pub cohesive_cursor: Option<usize>,
    pub set_number: Option<usize>,
    pub set_id: Option<String>,
}

/// Bounded undo stack (oldest dropped first) plus an unbounded redo stack
/// that any new recorded action clears.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record the pre-mutation state of a human action.
    pub fn record(&mut self, snapshot: Snapshot) {
        if self.undo.back() != Some(&snapshot) {
            self.push_undo(snapshot);
        }
        self.redo.clear();
    }

    fn push_undo(&mut self, snapshot: Snapshot) {
        self.undo.push_back(snapshot);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    /// Pop the last undo step, parking `current` on the redo stack.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Pop the last redo step, parking `current` on the undo stack.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo.pop()?;
        self.push_undo(current);
        Some(next)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
