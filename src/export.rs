//! Variation log - bounded in-session history of commits, exportable as CSV

use chrono::NaiveDateTime;
use std::collections::VecDeque;

use crate::naming::slugify;
use crate::sink::CommitRecord;

pub const DEFAULT_VARIATION_LOG_LIMIT: usize = 1800;

pub const CSV_HEADERS: [&str; 18] = [
    "at",
    "poolMode",
    "seed",
    "signature",
    "creatureNumber",
    "name",
    "headId",
    "torsoId",
    "legsId",
    "feetId",
    "repeatFactor",
    "rarity",
    "distance",
    "generation",
    "set",
    "seenUnique",
    "totalVariations",
    "exploredPercent",
];

#[derive(Debug, Clone)]
pub struct VariationLog {
    limit: usize,
    records: VecDeque<CommitRecord>,
}

impl VariationLog {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            records: VecDeque::new(),
        }
    }

    /// Append, discarding the oldest records beyond the limit.
    pub fn push(&mut self, record: CommitRecord) {
        self.records.push_back(record);
        while self.records.len() > self.limit {
            self.records.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &CommitRecord> {
        self.records.iter()
    }

    pub fn to_csv(&self) -> String {
        let mut lines = Vec::with_capacity(self.records.len() + 1);
        lines.push(CSV_HEADERS.join(","));
        for r in &self.records {
            let row = [
                r.at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                r.pool_mode.clone(),
                r.seed.clone(),
                r.signature.clone(),
                r.creature_number.clone(),
                r.name.clone(),
                r.ids.head.clone(),
                r.ids.torso.clone(),
                r.ids.legs.clone(),
                r.ids.feet.clone(),
                r.repeat_factor.to_string(),
                r.rarity.to_string(),
                r.distance.to_string(),
                r.generation.to_string(),
                r.set.clone(),
                r.seen_unique.to_string(),
                r.total_variations.clone(),
                r.explored_percent.to_string(),
            ];
            let escaped: Vec<String> = row.iter().map(|v| csv_escape(v)).collect();
            lines.push(escaped.join(","));
        }
        lines.join("\n")
    }
}

impl Default for VariationLog {
    fn default() -> Self {
        Self::new(DEFAULT_VARIATION_LOG_LIMIT)
    }
}

/// Quote fields containing `"`, `,` or a newline, doubling inner quotes.
pub fn csv_escape(value: &str) -> String {
    if value.contains(['"', ',', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn timestamp(now: &NaiveDateTime) -> String {
    now.format("%Y%m%d-%H%M%S").to_string()
}

/// `variation-log-<YYYYMMDD-HHMMSS>.csv`
pub fn export_filename(now: &NaiveDateTime) -> String {
    format!("variation-log-{}.csv", timestamp(now))
}

/// `<slugified-name>-<seed lowercase>-<YYYYMMDD-HHMMSS>.png`
pub fn submission_filename(name: &str, display_seed: &str, now: &NaiveDateTime) -> String {
    format!(
        "{}-{}-{}.png",
        slugify(name),
        display_seed.to_lowercase(),
        timestamp(now)
    )
}
