//! Sinks - where snapshots, commit records and submissions go
//!
//! The core never escalates storage problems: every sink call returns a
//! [`SinkReceipt`], and a failed write is logged and reported as `ok: false`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::part::PartMap;
use crate::pool::{PoolMode, SelectionIndex};

pub const DEFAULT_SINK_CAPACITY: usize = 120;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Full state of the current creature, published after every applied render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    /// Milliseconds since the Unix epoch.
    pub at: i64,
    pub seed: String,
    pub name: String,
    pub creature_index: String,
    pub pool_mode: Option<PoolMode>,
    pub indices: SelectionIndex,
    pub part_ids: PartMap<String>,
    pub set_number: Option<usize>,
    pub set_id: Option<String>,
    pub repeat_count: u64,
    pub rarity: u32,
    pub distance: u32,
    pub generation: u64,
    pub human_score: u32,
    pub coherence: f64,
    pub mutation: f64,
    pub sync: f64,
    #[serde(rename = "corrHT")]
    pub corr_ht: f64,
    #[serde(rename = "corrLF")]
    pub corr_lf: f64,
    #[serde(rename = "corrUL")]
    pub corr_ul: f64,
    pub part_rarity: PartMap<u32>,
    pub seen: usize,
    pub total: String,
    pub explored_percent: String,
}

/// One row of the variation log, appended whenever the Signature changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    pub at: DateTime<Utc>,
    pub pool_mode: String,
    pub seed: String,
    pub signature: String,
    pub creature_number: String,
    pub name: String,
    pub ids: PartMap<String>,
    pub repeat_factor: u64,
    pub rarity: u32,
    pub distance: u32,
    pub generation: u64,
    pub set: String,
    pub seen_unique: usize,
    pub total_variations: String,
    pub explored_percent: f64,
    /// SHA-256 of the pool the record was produced from.
    #[serde(default)]
    pub pool_digest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: String,
    pub at: DateTime<Utc>,
    pub filename: String,
    pub seed: String,
    pub name: String,
    pub creature_number: String,
    pub set_number: Option<usize>,
    pub set_id: Option<String>,
    pub pool_mode: Option<PoolMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkReceipt {
    pub ok: bool,
    /// Entries retained by the sink after this call.
    pub stored: usize,
    /// Older entries were dropped to make room.
    pub trimmed: bool,
}

impl SinkReceipt {
    pub fn stored(stored: usize, trimmed: bool) -> Self {
        Self { ok: true, stored, trimmed }
    }

    pub fn failed() -> Self {
        Self { ok: false, stored: 0, trimmed: false }
    }
}

pub trait Sink: Send {
    fn publish(&mut self, snapshot: &SyncSnapshot) -> SinkReceipt;
    fn append(&mut self, record: &CommitRecord) -> SinkReceipt;
    fn submit(&mut self, submission: &SubmissionRecord) -> SinkReceipt;
}

/// Push onto a bounded queue, dropping the oldest entries. Returns whether any were dropped.
fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, capacity: usize) -> bool {
    queue.push_back(item);
    let mut trimmed = false;
    while queue.len() > capacity {
        queue.pop_front();
        trimmed = true;
    }
    trimmed
}

/// In-process sink keeping the most recent entries of each kind.
#[derive(Debug, Clone)]
pub struct MemorySink {
    capacity: usize,
    snapshots: VecDeque<SyncSnapshot>,
    records: VecDeque<CommitRecord>,
    submissions: VecDeque<SubmissionRecord>,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            snapshots: VecDeque::new(),
            records: VecDeque::new(),
            submissions: VecDeque::new(),
        }
    }

    pub fn last_snapshot(&self) -> Option<&SyncSnapshot> {
        self.snapshots.back()
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &SyncSnapshot> {
        self.snapshots.iter()
    }

    pub fn records(&self) -> impl Iterator<Item = &CommitRecord> {
        self.records.iter()
    }

    pub fn submissions(&self) -> impl Iterator<Item = &SubmissionRecord> {
        self.submissions.iter()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(DEFAULT_SINK_CAPACITY)
    }
}

impl Sink for MemorySink {
    fn publish(&mut self, snapshot: &SyncSnapshot) -> SinkReceipt {
        let trimmed = push_bounded(&mut self.snapshots, snapshot.clone(), self.capacity);
        SinkReceipt::stored(self.snapshots.len(), trimmed)
    }

    fn append(&mut self, record: &CommitRecord) -> SinkReceipt {
        let trimmed = push_bounded(&mut self.records, record.clone(), self.capacity);
        SinkReceipt::stored(self.records.len(), trimmed)
    }

    fn submit(&mut self, submission: &SubmissionRecord) -> SinkReceipt {
        let trimmed = push_bounded(&mut self.submissions, submission.clone(), self.capacity);
        SinkReceipt::stored(self.submissions.len(), trimmed)
    }
}

pub const LAST_SNAPSHOT_FILE: &str = "last.json";
pub const VARIATIONS_FILE: &str = "variations.jsonl";
pub const SUBMISSIONS_FILE: &str = "submissions.jsonl";

/// Directory-backed sink: the last snapshot as JSON, records and submissions as JSON lines.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
    appended: usize,
    submitted: usize,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            appended: 0,
            submitted: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_last(&self, snapshot: &SyncSnapshot) -> Result<(), SinkError> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(self.dir.join(LAST_SNAPSHOT_FILE), json)?;
        Ok(())
    }

    fn append_line<T: Serialize>(&self, file: &str, value: &T) -> Result<(), SinkError> {
        fs::create_dir_all(&self.dir)?;
        let line = serde_json::to_string(value)?;
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))?;
        writeln!(out, "{}", line)?;
        Ok(())
    }
}

impl Sink for JsonFileSink {
    fn publish(&mut self, snapshot: &SyncSnapshot) -> SinkReceipt {
        match self.write_last(snapshot) {
            Ok(()) => SinkReceipt::stored(1, false),
            Err(e) => {
                log::warn!("Could not publish snapshot to {}: {}", self.dir.display(), e);
                SinkReceipt::failed()
            }
        }
    }

    fn append(&mut self, record: &CommitRecord) -> SinkReceipt {
        match self.append_line(VARIATIONS_FILE, record) {
            Ok(()) => {
                self.appended += 1;
                SinkReceipt::stored(self.appended, false)
            }
            Err(e) => {
                log::warn!("Could not append variation record: {}", e);
                SinkReceipt::failed()
            }
        }
    }

    fn submit(&mut self, submission: &SubmissionRecord) -> SinkReceipt {
        match self.append_line(SUBMISSIONS_FILE, submission) {
            Ok(()) => {
                self.submitted += 1;
                SinkReceipt::stored(self.submitted, false)
            }
            Err(e) => {
                log::warn!("Could not store submission {}: {}", submission.filename, e);
                SinkReceipt::failed()
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{record, snapshot};
    use super::*;

    #[test]
    fn test_memory_sink_is_bounded() {
        let mut sink = MemorySink::new(2);
        assert_eq!(sink.publish(&snapshot(1)), SinkReceipt::stored(1, false));
        sink.publish(&snapshot(2));
        let receipt = sink.publish(&snapshot(3));
        assert!(receipt.ok && receipt.trimmed);
        assert_eq!(receipt.stored, 2);
        assert_eq!(sink.last_snapshot().map(|s| s.generation), Some(3));
        assert_eq!(sink.snapshots().next().map(|s| s.generation), Some(2));
    }

    #[test]
    fn test_snapshot_wire_names() {
        let value = serde_json::to_value(snapshot(1)).unwrap();
        assert_eq!(value["creatureIndex"], "42");
        assert_eq!(value["poolMode"], "large");
        assert_eq!(value["corrHT"], 0.5);
        assert_eq!(value["partRarity"]["feet"], 50);
        assert!(value["setNumber"].is_null());
    }

    #[test]
    fn test_json_file_sink_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonFileSink::new(dir.path().join("out"));
        assert!(sink.publish(&snapshot(1)).ok);
        sink.append(&record(1));
        let receipt = sink.append(&record(2));
        assert_eq!(receipt.stored, 2);

        let last: SyncSnapshot =
            serde_json::from_str(&fs::read_to_string(sink.dir().join(LAST_SNAPSHOT_FILE)).unwrap()).unwrap();
        assert_eq!(last, snapshot(1));
        let lines = fs::read_to_string(sink.dir().join(VARIATIONS_FILE)).unwrap();
        assert_eq!(lines.lines().count(), 2);
        let first: CommitRecord = serde_json::from_str(lines.lines().next().unwrap()).unwrap();
        assert_eq!(first.generation, 1);
    }

    #[test]
    fn test_json_file_sink_failure_is_a_receipt() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();
        let mut sink = JsonFileSink::new(blocker.join("nested"));
        assert_eq!(sink.publish(&snapshot(1)), SinkReceipt::failed());
        assert!(!sink.append(&record(1)).ok);
    }
}
