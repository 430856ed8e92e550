//! Pools - tagged sprite references and selection identity

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::extract_id;
use crate::hashing::compute_digest;
use crate::part::{Part, PartMap};

const ENTRY_SEP: &str = "::";

/// Which catalog a sprite came from. File names may collide across catalogs,
/// so entries always compare as (tag, file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceTag {
    /// Large, machine-extracted catalog.
    #[serde(rename = "S")]
    Primary,
    /// Small hand-curated catalog.
    #[serde(rename = "C")]
    Curated,
}

impl SourceTag {
    pub fn code(self) -> &'static str {
        match self {
            SourceTag::Primary => "S",
            SourceTag::Curated => "C",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolEntry {
    pub source: SourceTag,
    pub file: String,
}

impl PoolEntry {
    pub fn new(source: SourceTag, file: impl Into<String>) -> Self {
        Self { source, file: file.into() }
    }

    pub fn primary(file: impl Into<String>) -> Self {
        Self::new(SourceTag::Primary, file)
    }

    pub fn curated(file: impl Into<String>) -> Self {
        Self::new(SourceTag::Curated, file)
    }

    /// 4-digit id from the file name, else the file stem.
    pub fn display_id(&self) -> String {
        match extract_id(&self.file) {
            Some(id) => id,
            None => strip_png(&self.file).to_string(),
        }
    }
}

fn strip_png(file: &str) -> &str {
    let n = file.len();
    if n >= 4 && file.is_char_boundary(n - 4) && file[n - 4..].eq_ignore_ascii_case(".png") {
        &file[..n - 4]
    } else {
        file
    }
}

impl fmt::Display for PoolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.source.code(), ENTRY_SEP, self.file)
    }
}

/// Active catalog mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolMode {
    /// Primary catalog followed by the curated one.
    Large,
    /// Curated catalog only.
    Small,
}

impl PoolMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PoolMode::Large => "large",
            PoolMode::Small => "small",
        }
    }

    pub fn parse(s: &str) -> Option<PoolMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "large" => Some(PoolMode::Large),
            "small" => Some(PoolMode::Small),
            _ => None,
        }
    }
}

impl fmt::Display for PoolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current index per Part.
pub type SelectionIndex = PartMap<usize>;

/// Wrap `value` into [0, count); 0 when count is 0.
pub fn wrap_index(value: i64, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    value.rem_euclid(count as i64) as usize
}

/// Ordered sprite sequence per Part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    parts: PartMap<Vec<PoolEntry>>,
}

impl Pool {
    pub fn new(parts: PartMap<Vec<PoolEntry>>) -> Self {
        Self { parts }
    }

    pub fn entries(&self, part: Part) -> &[PoolEntry] {
        &self.parts[part]
    }

    pub fn len(&self, part: Part) -> usize {
        self.parts[part].len()
    }

    pub fn lens(&self) -> PartMap<usize> {
        self.parts.map(|_, v| v.len())
    }

    pub fn get(&self, part: Part, index: usize) -> Option<&PoolEntry> {
        self.parts[part].get(index)
    }

    pub fn position(&self, part: Part, entry: &PoolEntry) -> Option<usize> {
        self.parts[part].iter().position(|e| e == entry)
    }

    /// First Part with no entries, if any. Compositing requires `None`.
    pub fn first_empty(&self) -> Option<Part> {
        Part::ALL.into_iter().find(|&p| self.parts[p].is_empty())
    }

    pub fn is_renderable(&self) -> bool {
        self.first_empty().is_none()
    }

    /// Entries selected by `indices`.
    pub fn selected(&self, indices: &SelectionIndex) -> PartMap<Option<PoolEntry>> {
        PartMap::from_fn(|part| self.get(part, indices[part]).cloned())
    }

    /// Stable digest of the whole pool, used to tie logs to a catalog.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        compute_digest(&self.parts)
    }
}

/// Canonical identity of (mode, selected entry per Part).
///
/// Two selections are the same creature iff their signatures are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn compute(mode: Option<PoolMode>, pool: &Pool, indices: &SelectionIndex) -> Self {
        let mut out = String::from(mode.map_or("none", PoolMode::as_str));
        for part in Part::ALL {
            out.push('|');
            out.push_str(part.name());
            out.push(':');
            match pool.get(part, indices[part]) {
                Some(entry) => out.push_str(&entry.to_string()),
                None => out.push_str("none"),
            }
        }
        Signature(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
