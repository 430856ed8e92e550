//! Sprite assets - image store seam and the per-session analysis cache
//!
//! Load failures are cached as permanently missing for the session and are
//! never retried; callers only ever see "no image".

use image::RgbaImage;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::ink::{analyze_ink_bounds, InkMetric, InkSettings};
use crate::part::Part;
use crate::pool::{PoolEntry, SourceTag};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Sprite not found: {0}")]
    NotFound(String),

    #[error("Failed to read sprite {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode sprite: {0}")]
    Decode(#[from] image::ImageError),
}

/// Resolves and decodes sprites. Implementations may block; the loader runs
/// them off the async executor.
pub trait ImageStore: Send + Sync {
    fn fetch(&self, part: Part, entry: &PoolEntry) -> Result<RgbaImage, AssetError>;
}

/// Sprites on disk under `<catalog base>/<part>/<file>`.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    primary_root: PathBuf,
    curated_root: PathBuf,
}

impl FsImageStore {
    pub fn new(primary_root: impl Into<PathBuf>, curated_root: impl Into<PathBuf>) -> Self {
        Self {
            primary_root: primary_root.into(),
            curated_root: curated_root.into(),
        }
    }

    pub fn resolve(&self, part: Part, entry: &PoolEntry) -> PathBuf {
        let root = match entry.source {
            SourceTag::Primary => &self.primary_root,
            SourceTag::Curated => &self.curated_root,
        };
        root.join(part.name()).join(&entry.file)
    }
}

impl ImageStore for FsImageStore {
    fn fetch(&self, part: Part, entry: &PoolEntry) -> Result<RgbaImage, AssetError> {
        let path = self.resolve(part, entry);
        if !path.exists() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(&path).map_err(|source| AssetError::Io { path, source })?;
        Ok(image::load_from_memory(&bytes)?.to_rgba8())
    }
}

/// A decoded sprite with its ink analysis.
#[derive(Debug)]
pub struct LoadedSprite {
    pub image: RgbaImage,
    pub metric: InkMetric,
}

#[derive(Debug, Clone)]
pub enum SpriteOutcome {
    Ready(Arc<LoadedSprite>),
    Missing,
}

impl SpriteOutcome {
    pub fn sprite(&self) -> Option<&Arc<LoadedSprite>> {
        match self {
            SpriteOutcome::Ready(s) => Some(s),
            SpriteOutcome::Missing => None,
        }
    }
}

type CacheKey = (Part, PoolEntry);

#[derive(Debug, Default)]
struct AssetCache {
    sprites: HashMap<CacheKey, Arc<LoadedSprite>>,
    missing: HashSet<CacheKey>,
}

/// Shared, cheaply clonable loader handle.
#[derive(Clone)]
pub struct SpriteLoader {
    store: Arc<dyn ImageStore>,
    cache: Arc<Mutex<AssetCache>>,
    ink: InkSettings,
}

impl SpriteLoader {
    pub fn new(store: Arc<dyn ImageStore>, ink: InkSettings) -> Self {
        Self {
            store,
            cache: Arc::new(Mutex::new(AssetCache::default())),
            ink,
        }
    }

    fn cache(&self) -> MutexGuard<'_, AssetCache> {
        // A panic while holding the lock cannot leave the maps half-updated.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn load(&self, part: Part, entry: &PoolEntry) -> SpriteOutcome {
        let key = (part, entry.clone());
        {
            let cache = self.cache();
            if let Some(sprite) = cache.sprites.get(&key) {
                log::debug!("Sprite cache hit: {} {}", part, entry);
                return SpriteOutcome::Ready(Arc::clone(sprite));
            }
            if cache.missing.contains(&key) {
                return SpriteOutcome::Missing;
            }
        }

        let store = Arc::clone(&self.store);
        let ink = self.ink;
        let task_entry = entry.clone();
        let result = tokio::task::spawn_blocking(move || {
            store.fetch(part, &task_entry).map(|image| {
                let metric = analyze_ink_bounds(&image, &ink);
                LoadedSprite { image, metric }
            })
        })
        .await;

        let mut cache = self.cache();
        match result {
            Ok(Ok(sprite)) => {
                let sprite = Arc::new(sprite);
                cache.sprites.insert(key, Arc::clone(&sprite));
                SpriteOutcome::Ready(sprite)
            }
            Ok(Err(e)) => {
                log::warn!("Sprite {} {} unavailable for this session: {}", part, entry, e);
                cache.missing.insert(key);
                SpriteOutcome::Missing
            }
            Err(e) => {
                log::warn!("Sprite task for {} {} failed: {}", part, entry, e);
                cache.missing.insert(key);
                SpriteOutcome::Missing
            }
        }
    }

    pub fn metric(&self, part: Part, entry: &PoolEntry) -> Option<InkMetric> {
        self.cache()
            .sprites
            .get(&(part, entry.clone()))
            .map(|s| s.metric)
    }

    pub fn is_missing(&self, part: Part, entry: &PoolEntry) -> bool {
        self.cache().missing.contains(&(part, entry.clone()))
    }

    pub fn cached_count(&self) -> usize {
        self.cache().sprites.len()
    }

    pub fn missing_count(&self) -> usize {
        self.cache().missing.len()
    }

    /// Forget every analyzed and missing sprite (pool switch).
    pub fn clear(&self) {
        let mut cache = self.cache();
        cache.sprites.clear();
        cache.missing.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        calls: AtomicUsize,
    }

    impl ImageStore for CountingStore {
        fn fetch(&self, _part: Part, entry: &PoolEntry) -> Result<RgbaImage, AssetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if entry.file.starts_with("broken") {
                return Err(AssetError::NotFound(entry.file.clone()));
            }
            let mut img = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255]));
            img.put_pixel(10, 10, Rgba([0, 0, 0, 255]));
            Ok(img)
        }
    }

    fn loader() -> (Arc<CountingStore>, SpriteLoader) {
        let store = Arc::new(CountingStore { calls: AtomicUsize::new(0) });
        let loader = SpriteLoader::new(store.clone(), InkSettings::default());
        (store, loader)
    }

    #[tokio::test]
    async fn test_metrics_are_cached() {
        let (store, loader) = loader();
        let entry = PoolEntry::primary("head_1.png");
        assert!(loader.load(Part::Head, &entry).await.sprite().is_some());
        assert!(loader.load(Part::Head, &entry).await.sprite().is_some());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(loader.metric(Part::Head, &entry).map(|m| m.center_x), Some(10.0));
    }

    #[tokio::test]
    async fn test_failures_are_never_retried() {
        let (store, loader) = loader();
        let entry = PoolEntry::curated("broken.png");
        assert!(loader.load(Part::Feet, &entry).await.sprite().is_none());
        assert!(loader.load(Part::Feet, &entry).await.sprite().is_none());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert!(loader.is_missing(Part::Feet, &entry));
        loader.clear();
        assert_eq!(loader.missing_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_key_includes_part_and_catalog() {
        let (store, loader) = loader();
        loader.load(Part::Head, &PoolEntry::primary("x_1.png")).await;
        loader.load(Part::Torso, &PoolEntry::primary("x_1.png")).await;
        loader.load(Part::Head, &PoolEntry::curated("x_1.png")).await;
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        assert_eq!(loader.cached_count(), 3);
    }

    #[test]
    fn test_fs_store_resolves_by_catalog() {
        let store = FsImageStore::new("/smart", "/curated");
        assert_eq!(
            store.resolve(Part::Legs, &PoolEntry::curated("l_2.png")),
            PathBuf::from("/curated/legs/l_2.png")
        );
    }

    #[test]
    fn test_fs_store_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("head")).unwrap();
        let img = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]));
        img.save(dir.path().join("head").join("h_1.png")).unwrap();

        let store = FsImageStore::new(dir.path(), dir.path());
        let loaded = store.fetch(Part::Head, &PoolEntry::primary("h_1.png")).unwrap();
        assert_eq!(loaded.dimensions(), (4, 3));
        assert!(matches!(
            store.fetch(Part::Head, &PoolEntry::primary("missing.png")),
            Err(AssetError::NotFound(_))
        ));
    }
}
