//! Cohesive sets - originally matched creatures
//!
//! A set bundles one entry per Part that share a catalog tag and numeric id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::catalog::extract_id;
use crate::part::{Part, PartMap};
use crate::pool::{Pool, PoolEntry, SelectionIndex, SourceTag};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohesiveSet {
    /// 1-based position in the sorted set list.
    pub number: usize,
    /// `<tag>-<id>`, e.g. `S-0042`.
    pub id: String,
    pub id_raw: String,
    pub source: SourceTag,
    pub entries: PartMap<PoolEntry>,
}

type SetKey = (SourceTag, String);

pub fn build_cohesive_sets(pool: &Pool) -> Vec<CohesiveSet> {
    let mut per_part: PartMap<HashMap<SetKey, PoolEntry>> = PartMap::default();
    let mut head_keys: Vec<SetKey> = Vec::new();

    for part in Part::ALL {
        for entry in pool.entries(part) {
            let Some(id) = extract_id(&entry.file) else {
                continue;
            };
            let key = (entry.source, id);
            if per_part[part].contains_key(&key) {
                continue;
            }
            if part == Part::Head {
                head_keys.push(key.clone());
            }
            per_part[part].insert(key, entry.clone());
        }
    }

    let mut keys: Vec<SetKey> = head_keys
        .into_iter()
        .filter(|k| Part::ALL.iter().all(|&p| per_part[p].contains_key(k)))
        .collect();
    keys.sort_by(|a, b| {
        a.0.code()
            .cmp(b.0.code())
            .then_with(|| id_value(&a.1).cmp(&id_value(&b.1)))
    });

    keys.into_iter()
        .enumerate()
        .filter_map(|(i, key)| {
            let entries = PartMap {
                head: per_part.head.get(&key)?.clone(),
                torso: per_part.torso.get(&key)?.clone(),
                legs: per_part.legs.get(&key)?.clone(),
                feet: per_part.feet.get(&key)?.clone(),
            };
            Some(CohesiveSet {
                number: i + 1,
                id: format!("{}-{}", key.0.code(), key.1),
                id_raw: key.1,
                source: key.0,
                entries,
            })
        })
        .collect()
}

fn id_value(id: &str) -> u32 {
    id.parse().unwrap_or(u32::MAX)
}

/// Position of the set whose entries are exactly the current selection.
pub fn matching_set(sets: &[CohesiveSet], pool: &Pool, indices: &SelectionIndex) -> Option<usize> {
    sets.iter().position(|set| {
        Part::ALL
            .iter()
            .all(|&p| pool.get(p, indices[p]) == Some(&set.entries[p]))
    })
}

/// Indices that select every entry of `set`; Parts whose entry left the pool keep `current`.
pub fn indices_for_set(set: &CohesiveSet, pool: &Pool, current: &SelectionIndex) -> SelectionIndex {
    PartMap::from_fn(|part| pool.position(part, &set.entries[part]).unwrap_or(current[part]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Pool {
        Pool::new(PartMap::from_fn(|part| {
            let mut v = vec![
                PoolEntry::primary(format!("{}_0003.png", part)),
                PoolEntry::primary(format!("{}_0001.png", part)),
                PoolEntry::curated(format!("{}_0001.png", part)),
                PoolEntry::primary(format!("{}_nodigits.png", part)),
            ];
            if part == Part::Feet {
                // Only the primary catalog ships feet for id 3.
                v.push(PoolEntry::curated("feet_0009.png"));
            }
            v
        }))
    }

    #[test]
    fn test_sets_sorted_by_source_then_id() {
        let sets = build_cohesive_sets(&pool());
        let ids: Vec<&str> = sets.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["C-0001", "S-0001", "S-0003"]);
        assert_eq!(sets[0].number, 1);
        assert_eq!(sets[2].entries.legs, PoolEntry::primary("legs_0003.png"));
    }

    #[test]
    fn test_partial_ids_are_not_sets() {
        let sets = build_cohesive_sets(&pool());
        assert!(sets.iter().all(|s| s.id_raw != "0009"));
    }

    #[test]
    fn test_matching_set_round_trip() {
        let p = pool();
        let sets = build_cohesive_sets(&p);
        let idx = indices_for_set(&sets[1], &p, &PartMap::splat(0));
        assert_eq!(idx, PartMap::splat(1));
        assert_eq!(matching_set(&sets, &p, &idx), Some(1));
        assert_eq!(matching_set(&sets, &p, &PartMap::splat(3)), None);
    }

    #[test]
    fn test_empty_pool_has_no_sets() {
        assert!(build_cohesive_sets(&Pool::default()).is_empty());
    }
}
