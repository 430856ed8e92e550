//! Selection State Machine
//!
//! Owns the per-Part indices and locks, the cohesive-set cursor and the
//! undo/redo history. Every operation is atomic and reports an
//! [`ActionOutcome`]; precondition failures are outcomes, not errors.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cohesive::{build_cohesive_sets, indices_for_set, matching_set, CohesiveSet};
use crate::history::{History, Snapshot};
use crate::part::{Part, PartMap};
use crate::pool::{wrap_index, Pool, PoolEntry, PoolMode, SelectionIndex, Signature};

/// Who triggered an operation. Only human actions are recorded for undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Human,
    Machine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    /// State changed.
    Changed,
    /// Nothing to change (e.g. a Part with a single sprite).
    Unchanged,
    /// Every Part targeted by a randomizing operation is locked.
    AllLocked,
    /// No cohesive set exists in the active pool.
    NoSet,
    NothingToUndo,
    NothingToRedo,
}

impl ActionOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, ActionOutcome::Changed)
    }
}

#[derive(Debug, Clone)]
pub struct SelectionState {
    mode: Option<PoolMode>,
    pool: Pool,
    indices: SelectionIndex,
    locks: PartMap<bool>,
    /// Built on first use, dropped on pool switch.
    cohesive_sets: Option<Vec<CohesiveSet>>,
    cursor: Option<usize>,
    set_number: Option<usize>,
    set_id: Option<String>,
    history: History,
}

impl SelectionState {
    pub fn new(history_limit: usize) -> Self {
        Self {
            mode: None,
            pool: Pool::default(),
            indices: PartMap::splat(0),
            locks: PartMap::splat(false),
            cohesive_sets: None,
            cursor: None,
            set_number: None,
            set_id: None,
            history: History::new(history_limit),
        }
    }

    // --- Accessors ---

    pub fn mode(&self) -> Option<PoolMode> {
        self.mode
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn indices(&self) -> &SelectionIndex {
        &self.indices
    }

    pub fn locks(&self) -> &PartMap<bool> {
        &self.locks
    }

    pub fn is_locked(&self, part: Part) -> bool {
        self.locks[part]
    }

    pub fn signature(&self) -> Signature {
        Signature::compute(self.mode, &self.pool, &self.indices)
    }

    pub fn selected_entries(&self) -> PartMap<Option<PoolEntry>> {
        self.pool.selected(&self.indices)
    }

    pub fn cohesive_cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current_set(&self) -> Option<(usize, &str)> {
        Some((self.set_number?, self.set_id.as_deref()?))
    }

    /// `NNN·ID` or `--`.
    pub fn set_label(&self) -> String {
        match self.set_number {
            Some(n) => format!("{:03}·{}", n, self.set_id.as_deref().unwrap_or("----")),
            None => "--".to_string(),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            indices: self.indices,
            locks: self.locks,
            cohesive_cursor: self.cursor,
            set_number: self.set_number,
            set_id: self.set_id.clone(),
        }
    }

    /// Per-Part display id of the current pick (`----` if nothing is selected).
    pub fn part_ids(&self) -> PartMap<String> {
        self.selected_entries().map(|_, e| {
            e.as_ref().map_or_else(|| "----".to_string(), PoolEntry::display_id)
        })
    }

    pub fn cohesive_sets(&mut self) -> &[CohesiveSet] {
        let pool = &self.pool;
        self.cohesive_sets
            .get_or_insert_with(|| build_cohesive_sets(pool))
            .as_slice()
    }

    // --- Transitions ---

    /// Install a new pool. Indices are wrapped into it; locks, history and
    /// cohesive sets start over.
    pub fn switch_pool(&mut self, mode: PoolMode, pool: Pool) {
        self.indices = PartMap::from_fn(|part| wrap_index(self.indices[part] as i64, pool.len(part)));
        self.mode = Some(mode);
        self.pool = pool;
        self.locks = PartMap::splat(false);
        self.cohesive_sets = None;
        self.cursor = None;
        self.set_number = None;
        self.set_id = None;
        self.history.clear();
        log::info!("Selection switched to {} pool {:?}", mode, self.pool.lens());
    }

    fn record(&mut self, origin: Origin) {
        if origin == Origin::Human {
            let snapshot = self.snapshot();
            self.history.record(snapshot);
        }
    }

    pub fn shift(&mut self, part: Part, delta: i64, origin: Origin) -> ActionOutcome {
        let count = self.pool.len(part);
        if count <= 1 {
            return ActionOutcome::Unchanged;
        }
        self.record(origin);
        self.indices[part] = wrap_index(self.indices[part] as i64 + delta, count);
        ActionOutcome::Changed
    }

    /// Move every unlocked Part to a different random sprite.
    pub fn randomize_all<R: Rng + ?Sized>(&mut self, rng: &mut R, origin: Origin) -> ActionOutcome {
        self.randomize_unlocked(rng, origin)
    }

    /// Same transition as [`randomize_all`](Self::randomize_all), offered as
    /// the explicit "keep locked parts, reroll the rest" action.
    pub fn mutate_unlocked<R: Rng + ?Sized>(&mut self, rng: &mut R, origin: Origin) -> ActionOutcome {
        self.randomize_unlocked(rng, origin)
    }

    fn randomize_unlocked<R: Rng + ?Sized>(&mut self, rng: &mut R, origin: Origin) -> ActionOutcome {
        let targets: Vec<Part> = Part::ALL.into_iter().filter(|&p| !self.locks[p]).collect();
        if targets.is_empty() {
            return ActionOutcome::AllLocked;
        }
        if targets.iter().all(|&p| self.pool.len(p) <= 1) {
            return ActionOutcome::Unchanged;
        }
        self.record(origin);
        for part in targets {
            let count = self.pool.len(part);
            self.indices[part] = different_index(rng, self.indices[part], count);
        }
        ActionOutcome::Changed
    }

    pub fn toggle_lock(&mut self, part: Part, origin: Origin) -> ActionOutcome {
        self.record(origin);
        self.locks[part] = !self.locks[part];
        ActionOutcome::Changed
    }

    /// Jump to a random cohesive set other than the current one.
    pub fn set_anchor<R: Rng + ?Sized>(&mut self, rng: &mut R, origin: Origin) -> ActionOutcome {
        let set_count = self.cohesive_sets().len();
        if set_count == 0 {
            return ActionOutcome::NoSet;
        }
        self.record(origin);

        let mut next = rng.gen_range(0..set_count);
        if set_count > 1 && Some(next) == self.cursor {
            next = (next + 1 + rng.gen_range(0..set_count - 1)) % set_count;
        }

        let sets = self.cohesive_sets.as_deref().unwrap_or_default();
        let set = &sets[next];
        let (number, id) = (set.number, set.id.clone());
        let indices = indices_for_set(set, &self.pool, &self.indices);
        self.indices = indices;
        self.cursor = Some(next);
        self.set_number = Some(number);
        self.set_id = Some(id);
        ActionOutcome::Changed
    }

    pub fn undo(&mut self) -> ActionOutcome {
        let current = self.snapshot();
        match self.history.undo(current) {
            Some(previous) => {
                self.apply(previous);
                ActionOutcome::Changed
            }
            None => ActionOutcome::NothingToUndo,
        }
    }

    pub fn redo(&mut self) -> ActionOutcome {
        let current = self.snapshot();
        match self.history.redo(current) {
            Some(next) => {
                self.apply(next);
                ActionOutcome::Changed
            }
            None => ActionOutcome::NothingToRedo,
        }
    }

    fn apply(&mut self, snapshot: Snapshot) {
        let pool = &self.pool;
        self.indices = PartMap::from_fn(|part| wrap_index(snapshot.indices[part] as i64, pool.len(part)));
        self.locks = snapshot.locks;
        self.cursor = snapshot.cohesive_cursor;
        self.set_number = snapshot.set_number;
        self.set_id = snapshot.set_id;
    }

    /// Directly select `indices` (wrapped into the pool), recorded like any
    /// other human action.
    pub fn select(&mut self, indices: SelectionIndex, origin: Origin) -> ActionOutcome {
        let pool = &self.pool;
        let wrapped = PartMap::from_fn(|part| wrap_index(indices[part] as i64, pool.len(part)));
        if wrapped == self.indices {
            return ActionOutcome::Unchanged;
        }
        self.record(origin);
        self.indices = wrapped;
        ActionOutcome::Changed
    }

    /// Re-derive the current set number/id from the selection after a render.
    /// The cursor is kept when the selection drifted away from its set.
    pub fn sync_set_marker(&mut self) {
        if self.cohesive_sets().is_empty() {
            self.cursor = None;
            self.set_number = None;
            self.set_id = None;
            return;
        }
        let sets = self.cohesive_sets.as_deref().unwrap_or_default();
        match matching_set(sets, &self.pool, &self.indices) {
            Some(i) => {
                let (number, id) = (sets[i].number, sets[i].id.clone());
                self.cursor = Some(i);
                self.set_number = Some(number);
                self.set_id = Some(id);
            }
            None => {
                self.set_number = None;
                self.set_id = None;
            }
        }
    }
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new(crate::history::DEFAULT_HISTORY_LIMIT)
    }
}

/// Uniform index in `0..count` other than `current`; `current` when count <= 1.
fn different_index<R: Rng + ?Sized>(rng: &mut R, current: usize, count: usize) -> usize {
    if count <= 1 {
        return current;
    }
    let next = rng.gen_range(0..count);
    if next != current {
        return next;
    }
    (current + 1 + rng.gen_range(0..count - 1)) % count
}
