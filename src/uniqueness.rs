//! Uniqueness Tracker - how much of the combinatorial space a session explored
//!
//! The space is the product of per-Part pool sizes, which overflows machine
//! integers for realistic catalogs, so counting uses `BigUint`.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};

use crate::part::{Part, PartMap};
use crate::pool::{PoolEntry, SelectionIndex, Signature};

/// Product of the pool sizes; 0 if any Part is empty.
pub fn total_variations(lens: &PartMap<usize>) -> BigUint {
    if lens.values().iter().any(|&&n| n == 0) {
        return BigUint::zero();
    }
    lens.values()
        .iter()
        .fold(BigUint::one(), |acc, &&n| acc * BigUint::from(n))
}

/// 1-based mixed-radix number of the selection, head most significant.
/// 0 if any Part is empty.
pub fn creature_index(indices: &SelectionIndex, lens: &PartMap<usize>) -> BigUint {
    if lens.values().iter().any(|&&n| n == 0) {
        return BigUint::zero();
    }
    let mut idx = BigUint::zero();
    for part in Part::ALL {
        idx = idx * BigUint::from(lens[part]) + BigUint::from(indices[part]);
    }
    idx + BigUint::one()
}

/// Share of parts changed between two selections, in whole percent.
pub fn distance_percent(previous: &PartMap<Option<PoolEntry>>, current: &PartMap<Option<PoolEntry>>) -> u32 {
    let changed = Part::ALL
        .iter()
        .filter(|&&p| previous[p] != current[p])
        .count();
    ((changed as f64 / Part::COUNT as f64) * 100.0).round() as u32
}

/// Result of a committed selection change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSummary {
    pub generation: u64,
    pub distance: u32,
    pub first_sighting: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rarity {
    pub overall: u32,
    pub per_part: PartMap<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct ExplorationTracker {
    seen: HashSet<Signature>,
    visits: HashMap<Signature, u64>,
    picks: PartMap<HashMap<PoolEntry, u64>>,
    generation: u64,
    last_signature: Option<Signature>,
    last_entries: Option<PartMap<Option<PoolEntry>>>,
    last_distance: u32,
}

impl ExplorationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `signature` if it differs from the last committed one.
    pub fn commit(
        &mut self,
        signature: &Signature,
        entries: &PartMap<Option<PoolEntry>>,
    ) -> Option<CommitSummary> {
        if self.last_signature.as_ref() == Some(signature) {
            return None;
        }

        let first_sighting = self.seen.insert(signature.clone());
        *self.visits.entry(signature.clone()).or_insert(0) += 1;
        self.generation += 1;
        for part in Part::ALL {
            if let Some(entry) = &entries[part] {
                *self.picks[part].entry(entry.clone()).or_insert(0) += 1;
            }
        }

        self.last_distance = match &self.last_entries {
            Some(previous) => distance_percent(previous, entries),
            None => 0,
        };
        self.last_signature = Some(signature.clone());
        self.last_entries = Some(entries.clone());

        log::debug!(
            "Committed generation {} ({}% distance, first sighting: {})",
            self.generation,
            self.last_distance,
            first_sighting
        );

        Some(CommitSummary {
            generation: self.generation,
            distance: self.last_distance,
            first_sighting,
        })
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn last_distance(&self) -> u32 {
        self.last_distance
    }

    pub fn last_signature(&self) -> Option<&Signature> {
        self.last_signature.as_ref()
    }

    pub fn visits(&self, signature: &Signature) -> u64 {
        self.visits.get(signature).copied().unwrap_or(0)
    }

    /// Earlier visits of `signature`: 0 on first sighting, 1 on the first repeat.
    pub fn repeat_count(&self, signature: &Signature) -> u64 {
        self.visits(signature).saturating_sub(1)
    }

    pub fn pick_count(&self, part: Part, entry: &PoolEntry) -> u64 {
        self.picks[part].get(entry).copied().unwrap_or(0)
    }

    pub fn rarity(&self, entries: &PartMap<Option<PoolEntry>>) -> Rarity {
        let base = self.generation.max(1) as f64;
        let per_part = entries.map(|part, entry| {
            let count = entry.as_ref().map_or(0, |e| self.pick_count(part, e));
            let commonness = count as f64 / base;
            ((1.0 - commonness) * 100.0).round().clamp(0.0, 100.0) as u32
        });
        let mean = per_part.values().iter().map(|&&r| r as f64 / 100.0).sum::<f64>() / Part::COUNT as f64;
        Rarity {
            overall: (mean * 100.0).round().clamp(0.0, 100.0) as u32,
            per_part,
        }
    }

    /// Seen share of `total` in [0, 1]; 0 when the space is empty.
    pub fn explored_fraction(&self, total: &BigUint) -> f64 {
        if total.is_zero() {
            return 0.0;
        }
        let total = total.to_f64().unwrap_or(f64::INFINITY);
        self.seen.len() as f64 / total
    }
}

/// Read-only view of the exploration state for the current selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationStats {
    #[serde(serialize_with = "as_decimal")]
    pub total_variations: BigUint,
    #[serde(serialize_with = "as_decimal")]
    pub creature_index: BigUint,
    pub seen: usize,
    pub generation: u64,
    pub repeat_count: u64,
    pub rarity: Rarity,
    pub distance: u32,
    pub explored_fraction: f64,
}

impl ExplorationStats {
    /// Explored share as a percentage with 4 decimals.
    pub fn explored_percent(&self) -> String {
        format!("{:.4}", self.explored_fraction * 100.0)
    }

    pub fn is_repeat(&self) -> bool {
        self.repeat_count >= 1
    }
}

fn as_decimal<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Pool, PoolMode};

    fn pool(n: usize) -> Pool {
        Pool::new(PartMap::from_fn(|part| {
            (0..n).map(|i| PoolEntry::primary(format!("{}_{}.png", part, i))).collect()
        }))
    }

    fn visit(t: &mut ExplorationTracker, p: &Pool, idx: SelectionIndex) -> Option<CommitSummary> {
        let sig = Signature::compute(Some(PoolMode::Large), p, &idx);
        t.commit(&sig, &p.selected(&idx))
    }

    #[test]
    fn test_total_variations_exact_beyond_u64() {
        let lens = PartMap::splat(500);
        assert_eq!(total_variations(&lens).to_string(), "62500000000");
        let huge = PartMap::splat(100_000);
        assert_eq!(total_variations(&huge).to_string(), "100000000000000000000");
        let mut empty = PartMap::splat(3);
        empty.legs = 0;
        assert!(total_variations(&empty).is_zero());
    }

    #[test]
    fn test_creature_index_mixed_radix() {
        let lens = PartMap { head: 2, torso: 3, legs: 4, feet: 5 };
        assert_eq!(creature_index(&PartMap::splat(0), &lens), BigUint::from(1u32));
        let last = PartMap { head: 1, torso: 2, legs: 3, feet: 4 };
        assert_eq!(creature_index(&last, &lens), total_variations(&lens));
        let idx = PartMap { head: 1, torso: 0, legs: 0, feet: 0 };
        assert_eq!(creature_index(&idx, &lens), BigUint::from(61u32));
    }

    #[test]
    fn test_commit_only_on_change() {
        let p = pool(4);
        let mut t = ExplorationTracker::new();
        assert!(visit(&mut t, &p, PartMap::splat(0)).is_some());
        assert!(visit(&mut t, &p, PartMap::splat(0)).is_none());
        assert_eq!(t.generation(), 1);
    }

    #[test]
    fn test_distance() {
        let p = pool(4);
        let mut t = ExplorationTracker::new();
        assert_eq!(visit(&mut t, &p, PartMap::splat(0)).unwrap().distance, 0);
        let one = PartMap { head: 0, torso: 1, legs: 0, feet: 0 };
        assert_eq!(visit(&mut t, &p, one).unwrap().distance, 25);
        assert_eq!(visit(&mut t, &p, PartMap::splat(2)).unwrap().distance, 100);
    }

    #[test]
    fn test_repeat_count_baseline() {
        let p = pool(4);
        let mut t = ExplorationTracker::new();
        let a = PartMap::splat(0);
        let sig_a = Signature::compute(Some(PoolMode::Large), &p, &a);
        visit(&mut t, &p, a);
        assert_eq!(t.repeat_count(&sig_a), 0);
        visit(&mut t, &p, PartMap::splat(1));
        let summary = visit(&mut t, &p, a).unwrap();
        assert!(!summary.first_sighting);
        assert_eq!(t.repeat_count(&sig_a), 1);
        assert_eq!(t.seen_count(), 2);
        assert_eq!(t.generation(), 3);
    }

    #[test]
    fn test_rarity() {
        let p = pool(4);
        let mut t = ExplorationTracker::new();
        let a = PartMap::splat(0);
        visit(&mut t, &p, a);
        // Everything picked once out of one generation: fully common.
        assert_eq!(t.rarity(&p.selected(&a)).overall, 0);
        let b = PartMap { head: 1, torso: 0, legs: 0, feet: 0 };
        visit(&mut t, &p, b);
        let r = t.rarity(&p.selected(&b));
        assert_eq!(r.per_part.head, 50);
        assert_eq!(r.per_part.torso, 0);
        assert_eq!(r.overall, 13);
    }

    #[test]
    fn test_explored_fraction() {
        let p = pool(2);
        let mut t = ExplorationTracker::new();
        visit(&mut t, &p, PartMap::splat(0));
        visit(&mut t, &p, PartMap::splat(1));
        let total = total_variations(&p.lens());
        assert_eq!(t.explored_fraction(&total), 2.0 / 16.0);
        assert_eq!(t.explored_fraction(&BigUint::zero()), 0.0);
    }

    #[test]
    fn test_reset() {
        let p = pool(3);
        let mut t = ExplorationTracker::new();
        visit(&mut t, &p, PartMap::splat(1));
        t.reset();
        assert_eq!(t.generation(), 0);
        assert_eq!(t.seen_count(), 0);
        assert!(t.last_signature().is_none());
    }
}
