//! Catalogs - sprite manifests and pool preparation

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::part::{Part, PartMap};
use crate::pool::{Pool, PoolEntry, PoolMode};
use crate::MIN_CATALOG_VERSION;

pub const DEFAULT_PRIMARY_SOURCE: &str = "../PARTS_SMART_LATEST";
pub const DEFAULT_CURATED_SOURCE: &str = "../CURATED PARTS";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Manifest version {0} is older than the supported minimum {1}")]
    UnsupportedVersion(String, String),

    #[error("Invalid manifest version: {0}")]
    InvalidVersion(String),

    #[error("No sprites in either catalog")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestId {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestItem {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub id: Option<ManifestId>,
}

impl ManifestItem {
    pub fn file(file: impl Into<String>) -> Self {
        Self { file: Some(file.into()), id: None }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestParts {
    #[serde(default)]
    pub head: Vec<ManifestItem>,
    #[serde(default)]
    pub torso: Vec<ManifestItem>,
    #[serde(default)]
    pub legs: Vec<ManifestItem>,
    #[serde(default)]
    pub feet: Vec<ManifestItem>,
}

impl ManifestParts {
    pub fn items(&self, part: Part) -> &[ManifestItem] {
        match part {
            Part::Head => &self.head,
            Part::Torso => &self.torso,
            Part::Legs => &self.legs,
            Part::Feet => &self.feet,
        }
    }
}

/// A sprite catalog as shipped next to the images.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogManifest {
    #[serde(default)]
    pub version: Option<String>,
    /// Base directory of the sprites, relative to the viewer.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub parts: ManifestParts,
}

impl CatalogManifest {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: CatalogManifest = serde_json::from_str(&content)?;
        manifest.check_version()?;
        Ok(manifest)
    }

    fn check_version(&self) -> Result<(), CatalogError> {
        let raw = self.version.as_deref().unwrap_or(MIN_CATALOG_VERSION);
        let version = semver::Version::parse(raw)
            .map_err(|_| CatalogError::InvalidVersion(raw.to_string()))?;
        let min = semver::Version::parse(MIN_CATALOG_VERSION)
            .map_err(|_| CatalogError::InvalidVersion(MIN_CATALOG_VERSION.to_string()))?;
        if version < min {
            return Err(CatalogError::UnsupportedVersion(
                raw.to_string(),
                MIN_CATALOG_VERSION.to_string(),
            ));
        }
        Ok(())
    }

    /// Every named file per Part, in manifest order.
    pub fn files(&self) -> PartMap<Vec<String>> {
        PartMap::from_fn(|part| {
            self.parts
                .items(part)
                .iter()
                .filter_map(|it| it.file.clone())
                .filter(|f| !f.is_empty())
                .collect()
        })
    }
}

/// First run of 1-4 ASCII digits, zero-padded to 4.
pub fn extract_id(text: &str) -> Option<String> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .take(4)
        .collect();
    Some(format!("{:0>4}", digits))
}

/// Id of a manifest item: its explicit id, else its file name.
pub fn id_from_item(item: &ManifestItem) -> Option<String> {
    let raw = match &item.id {
        Some(ManifestId::Number(n)) => n.to_string(),
        Some(ManifestId::Text(s)) if !s.is_empty() => s.clone(),
        _ => item.file.clone().unwrap_or_default(),
    };
    extract_id(&raw)
}

/// Files that share an id across all four Parts.
#[derive(Debug, Clone, Default)]
pub struct CorrelatedPool {
    pub files: PartMap<Vec<String>>,
    pub ids: Vec<String>,
    pub complete: bool,
}

/// Keep the first file per id in every Part, intersect the ids, sort them
/// numerically and optionally cap the count (`limit == 0` means no cap).
pub fn correlated_pool(manifest: &CatalogManifest, limit: usize) -> CorrelatedPool {
    let mut by_id: PartMap<HashMap<String, String>> = PartMap::default();
    let mut head_order: Vec<String> = Vec::new();

    for part in Part::ALL {
        for item in manifest.parts.items(part) {
            let Some(file) = item.file.as_ref().filter(|f| !f.is_empty()) else {
                continue;
            };
            let Some(id) = id_from_item(item) else {
                continue;
            };
            if by_id[part].contains_key(&id) {
                continue;
            }
            if part == Part::Head {
                head_order.push(id.clone());
            }
            by_id[part].insert(id, file.clone());
        }
    }

    let mut ids: Vec<String> = head_order
        .into_iter()
        .filter(|id| Part::ALL.iter().all(|&p| by_id[p].contains_key(id)))
        .collect();
    ids.sort_by_key(|id| id.parse::<u32>().unwrap_or(u32::MAX));
    if limit > 0 {
        ids.truncate(limit);
    }

    let files = PartMap::from_fn(|part| {
        ids.iter()
            .filter_map(|id| by_id[part].get(id).cloned())
            .collect::<Vec<_>>()
    });
    let complete = !ids.is_empty() && files.values().iter().all(|f| f.len() == ids.len());

    CorrelatedPool { files, ids, complete }
}

/// Both mode pools.
#[derive(Debug, Clone, Default)]
pub struct PreparedPools {
    pub large: Pool,
    pub small: Pool,
}

impl PreparedPools {
    pub fn pool(&self, mode: PoolMode) -> &Pool {
        match mode {
            PoolMode::Large => &self.large,
            PoolMode::Small => &self.small,
        }
    }

    /// The large pool holds both catalogs, so it is empty only when both are.
    pub fn check_not_empty(&self) -> Result<(), CatalogError> {
        if Part::ALL.iter().all(|&p| self.large.len(p) == 0) {
            return Err(CatalogError::Empty);
        }
        Ok(())
    }
}

/// Build the `large` and `small` pools.
///
/// Without a curated manifest the primary one stands in for it.
pub fn prepare_pools(
    primary: &CatalogManifest,
    curated: Option<&CatalogManifest>,
    small_limit: usize,
) -> PreparedPools {
    let curated = curated.unwrap_or(primary);

    let primary_corr = correlated_pool(primary, 0);
    let curated_corr = correlated_pool(curated, small_limit);
    let primary_all = primary.files();
    let curated_all = curated.files();

    let mut large = PartMap::<Vec<PoolEntry>>::default();
    let mut small = PartMap::<Vec<PoolEntry>>::default();

    for part in Part::ALL {
        let primary_files: &[String] = if primary_corr.complete {
            &primary_corr.files[part]
        } else {
            &primary_all[part]
        };
        let curated_files: Vec<String> = if curated_corr.complete {
            curated_corr.files[part].clone()
        } else {
            curated_all[part].iter().take(small_limit).cloned().collect()
        };

        let curated_entries: Vec<PoolEntry> =
            curated_files.into_iter().map(PoolEntry::curated).collect();
        large[part] = primary_files
            .iter()
            .cloned()
            .map(PoolEntry::primary)
            .chain(curated_entries.iter().cloned())
            .collect();
        small[part] = curated_entries;
    }

    let prepared = PreparedPools {
        large: Pool::new(large),
        small: Pool::new(small),
    };

    log::info!(
        "Prepared pools: large {:?}, small {:?} (primary correlated: {}, curated correlated: {})",
        prepared.large.lens(),
        prepared.small.lens(),
        primary_corr.complete,
        curated_corr.complete
    );

    prepared
}

/// Distinct ids seen in a manifest, mostly for diagnostics.
pub fn distinct_ids(manifest: &CatalogManifest) -> HashSet<String> {
    Part::ALL
        .iter()
        .flat_map(|&p| manifest.parts.items(p).iter().filter_map(id_from_item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::SourceTag;
    use std::io::Write;

    fn manifest(ids: &[&str]) -> CatalogManifest {
        let items = |prefix: &str| -> Vec<ManifestItem> {
            ids.iter()
                .map(|id| ManifestItem::file(format!("{}_{}.png", prefix, id)))
                .collect()
        };
        CatalogManifest {
            version: None,
            source: None,
            parts: ManifestParts {
                head: items("head"),
                torso: items("torso"),
                legs: items("legs"),
                feet: items("feet"),
            },
        }
    }

    #[test]
    fn test_extract_id() {
        assert_eq!(extract_id("head_7.png").as_deref(), Some("0007"));
        assert_eq!(extract_id("x123456.png").as_deref(), Some("1234"));
        assert_eq!(extract_id("no-digits.png"), None);
    }

    #[test]
    fn test_id_prefers_explicit_id() {
        let item = ManifestItem {
            file: Some("head_0009.png".into()),
            id: Some(ManifestId::Number(42)),
        };
        assert_eq!(id_from_item(&item).as_deref(), Some("0042"));
    }

    #[test]
    fn test_correlated_pool_intersects_and_sorts() {
        let mut m = manifest(&["10", "2", "7"]);
        m.parts.feet.retain(|it| it.file.as_deref() != Some("feet_7.png"));
        let corr = correlated_pool(&m, 0);
        assert!(corr.complete);
        assert_eq!(corr.ids, vec!["0002", "0010"]);
        assert_eq!(corr.files.head, vec!["head_2.png", "head_10.png"]);
    }

    #[test]
    fn test_correlated_pool_limit() {
        let corr = correlated_pool(&manifest(&["1", "2", "3"]), 2);
        assert_eq!(corr.ids.len(), 2);
    }

    #[test]
    fn test_prepare_pools_modes() {
        let primary = manifest(&["1", "2", "3"]);
        let curated = manifest(&["5"]);
        let prepared = prepare_pools(&primary, Some(&curated), 30);
        assert_eq!(prepared.large.len(Part::Head), 4);
        assert_eq!(prepared.small.len(Part::Head), 1);
        assert_eq!(prepared.small.entries(Part::Head)[0], PoolEntry::curated("head_5.png"));
        assert_eq!(prepared.large.entries(Part::Legs)[3].source, SourceTag::Curated);
    }

    #[test]
    fn test_uncorrelated_curated_falls_back_to_first_files() {
        let primary = manifest(&["1"]);
        let mut curated = manifest(&["1", "2", "3"]);
        curated.parts.head.clear();
        let prepared = prepare_pools(&primary, Some(&curated), 2);
        assert_eq!(prepared.small.len(Part::Head), 0);
        assert_eq!(prepared.small.len(Part::Torso), 2);
    }

    #[test]
    fn test_empty_catalogs() {
        let prepared = prepare_pools(&manifest(&[]), None, 30);
        assert!(matches!(prepared.check_not_empty(), Err(CatalogError::Empty)));
        assert!(prepare_pools(&manifest(&["1"]), None, 30).check_not_empty().is_ok());
    }

    #[test]
    fn test_load_rejects_old_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let mut f = fs::File::create(&path).unwrap();
        write!(f, r#"{{"version": "0.9.0", "parts": {{}}}}"#).unwrap();
        let err = CatalogManifest::load(&path).unwrap_err();
        assert!(matches!(err, CatalogError::UnsupportedVersion(_, _)));
    }

    #[test]
    fn test_load_reads_parts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(
            &path,
            r#"{"source": "/sprites", "parts": {"head": [{"file": "h_1.png", "id": "1"}]}}"#,
        )
        .unwrap();
        let m = CatalogManifest::load(&path).unwrap();
        assert_eq!(m.source.as_deref(), Some("/sprites"));
        assert_eq!(m.files().head, vec!["h_1.png"]);
        assert!(m.files().feet.is_empty());
        assert_eq!(distinct_ids(&m).len(), 1);
    }
}
