//! Session - one explicit context tying the engine together
//!
//! Owns the prepared pools, the selection state machine, the exploration
//! tracker, the compositor and the outputs. Nothing here is global: two
//! sessions never share state.

use chrono::{Local, Utc};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::assets::{ImageStore, SpriteLoader};
use crate::catalog::PreparedPools;
use crate::compose::{Compositor, Frame, RenderError, RenderOutcome};
use crate::config::EngineConfig;
use crate::export::{export_filename, submission_filename, VariationLog};
use crate::identity::{compute_profile, normalized_index, Profile};
use crate::part::{Part, PartMap};
use crate::pool::{PoolMode, SelectionIndex};
use crate::selection::{ActionOutcome, Origin, SelectionState};
use crate::sink::{CommitRecord, Sink, SinkReceipt, SubmissionRecord, SyncSnapshot};
use crate::uniqueness::{creature_index, total_variations, CommitSummary, ExplorationStats, ExplorationTracker};

/// What an applied redraw produced.
#[derive(Debug, Clone)]
pub struct RedrawReport {
    pub frame: Frame,
    /// Present when the Signature changed since the last commit.
    pub committed: Option<CommitSummary>,
    pub degraded: bool,
    pub snapshot: SyncSnapshot,
    pub published: SinkReceipt,
    pub appended: Option<SinkReceipt>,
}

#[derive(Debug, Clone)]
pub enum RedrawOutcome {
    Applied(Box<RedrawReport>),
    Discarded { seq: u64, latest: u64 },
    /// The frame finished, but the selection changed after it was requested.
    Outdated { seq: u64 },
}

impl RedrawOutcome {
    pub fn report(&self) -> Option<&RedrawReport> {
        match self {
            RedrawOutcome::Applied(report) => Some(report),
            RedrawOutcome::Discarded { .. } | RedrawOutcome::Outdated { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub record: SubmissionRecord,
    pub receipt: SinkReceipt,
}

pub struct Session {
    config: EngineConfig,
    pools: PreparedPools,
    selection: SelectionState,
    tracker: ExplorationTracker,
    compositor: Compositor,
    log: VariationLog,
    sink: Box<dyn Sink>,
    pool_digest: String,
}

impl Session {
    pub fn new(
        config: EngineConfig,
        pools: PreparedPools,
        store: Arc<dyn ImageStore>,
        sink: Box<dyn Sink>,
    ) -> Self {
        let loader = SpriteLoader::new(store, config.ink);
        let compositor = Compositor::new(loader, config.canvas, config.layout);
        Self {
            selection: SelectionState::new(config.history_limit),
            tracker: ExplorationTracker::new(),
            log: VariationLog::new(config.variation_log_limit),
            compositor,
            config,
            pools,
            sink,
            pool_digest: String::new(),
        }
    }

    /// Activate `mode`: new pool, fresh locks/history/cohesive sets,
    /// fresh exploration counters and empty asset caches.
    pub fn start(&mut self, mode: PoolMode) {
        let pool = self.pools.pool(mode).clone();
        self.pool_digest = pool.digest().unwrap_or_else(|e| {
            log::warn!("Could not digest {} pool: {}", mode, e);
            String::new()
        });
        self.selection.switch_pool(mode, pool);
        self.tracker.reset();
        self.compositor.loader().clear();
    }

    // --- Accessors ---

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pools(&self) -> &PreparedPools {
        &self.pools
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn tracker(&self) -> &ExplorationTracker {
        &self.tracker
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn variation_log(&self) -> &VariationLog {
        &self.log
    }

    pub fn mode(&self) -> Option<PoolMode> {
        self.selection.mode()
    }

    // --- Selection operations ---

    pub fn shift(&mut self, part: Part, delta: i64, origin: Origin) -> ActionOutcome {
        self.selection.shift(part, delta, origin)
    }

    pub fn randomize_all<R: Rng + ?Sized>(&mut self, rng: &mut R, origin: Origin) -> ActionOutcome {
        self.selection.randomize_all(rng, origin)
    }

    pub fn mutate_unlocked<R: Rng + ?Sized>(&mut self, rng: &mut R, origin: Origin) -> ActionOutcome {
        self.selection.mutate_unlocked(rng, origin)
    }

    /// Auto-randomize after inactivity. Never recorded for undo.
    pub fn idle_randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> ActionOutcome {
        self.selection.randomize_all(rng, Origin::Machine)
    }

    pub fn toggle_lock(&mut self, part: Part, origin: Origin) -> ActionOutcome {
        self.selection.toggle_lock(part, origin)
    }

    pub fn set_anchor<R: Rng + ?Sized>(&mut self, rng: &mut R, origin: Origin) -> ActionOutcome {
        self.selection.set_anchor(rng, origin)
    }

    pub fn select(&mut self, indices: SelectionIndex, origin: Origin) -> ActionOutcome {
        self.selection.select(indices, origin)
    }

    pub fn undo(&mut self) -> ActionOutcome {
        self.selection.undo()
    }

    pub fn redo(&mut self) -> ActionOutcome {
        self.selection.redo()
    }

    // --- Derived views ---

    pub fn profile(&self) -> Profile {
        let pool = self.selection.pool();
        let indices = self.selection.indices();
        let normalized = PartMap::from_fn(|part| normalized_index(indices[part], pool.len(part)));
        compute_profile(&self.selection.signature(), &normalized, &self.config.scoring)
    }

    pub fn exploration(&self) -> ExplorationStats {
        let lens = self.selection.pool().lens();
        let total = total_variations(&lens);
        let signature = self.selection.signature();
        ExplorationStats {
            creature_index: creature_index(self.selection.indices(), &lens),
            seen: self.tracker.seen_count(),
            generation: self.tracker.generation(),
            repeat_count: self.tracker.repeat_count(&signature),
            rarity: self.tracker.rarity(&self.selection.selected_entries()),
            distance: self.tracker.last_distance(),
            explored_fraction: self.tracker.explored_fraction(&total),
            total_variations: total,
        }
    }

    pub fn sync_snapshot(&self) -> SyncSnapshot {
        let profile = self.profile();
        let stats = self.exploration();
        let (set_number, set_id) = match self.selection.current_set() {
            Some((n, id)) => (Some(n), Some(id.to_string())),
            None => (None, None),
        };
        SyncSnapshot {
            at: Utc::now().timestamp_millis(),
            seed: profile.display_seed,
            name: profile.name,
            creature_index: stats.creature_index.to_string(),
            pool_mode: self.selection.mode(),
            indices: *self.selection.indices(),
            part_ids: self.selection.part_ids(),
            set_number,
            set_id,
            repeat_count: stats.repeat_count,
            rarity: stats.rarity.overall,
            distance: stats.distance,
            generation: stats.generation,
            human_score: profile.human_score,
            coherence: profile.coherence,
            mutation: profile.mutation,
            sync: profile.sync,
            corr_ht: profile.corr_ht,
            corr_lf: profile.corr_lf,
            corr_ul: profile.corr_ul,
            part_rarity: stats.rarity.per_part,
            seen: stats.seen,
            explored_percent: stats.explored_percent(),
            total: stats.total_variations.to_string(),
        }
    }

    fn commit_record(&self) -> CommitRecord {
        let profile = self.profile();
        let stats = self.exploration();
        let explored = (stats.explored_fraction * 100.0 * 10_000.0).round() / 10_000.0;
        CommitRecord {
            at: Utc::now(),
            pool_mode: self
                .selection
                .mode()
                .map_or_else(|| "unknown".to_string(), |m| m.to_string()),
            seed: profile.display_seed,
            signature: self.selection.signature().as_str().to_string(),
            creature_number: stats.creature_index.to_string(),
            name: profile.name,
            ids: self.selection.part_ids(),
            repeat_factor: stats.repeat_count,
            rarity: stats.rarity.overall,
            distance: stats.distance,
            generation: stats.generation,
            set: self.selection.set_label(),
            seen_unique: stats.seen,
            total_variations: stats.total_variations.to_string(),
            explored_percent: explored,
            pool_digest: self.pool_digest.clone(),
        }
    }

    // --- Rendering ---

    /// Start a render of the current selection. Requesting another render
    /// before this one is applied makes this one come back discarded.
    pub fn request_render(&self) -> impl Future<Output = Result<RenderOutcome, RenderError>> + Send + 'static {
        self.compositor
            .render(self.selection.signature(), &self.selection.selected_entries())
    }

    /// Apply a finished render: commit exploration bookkeeping when the
    /// Signature changed, log it, refresh the set marker and publish.
    ///
    /// A frame of a selection that is no longer current touches nothing;
    /// request a fresh render after changing the selection.
    pub fn apply_render(&mut self, outcome: RenderOutcome) -> RedrawOutcome {
        let frame = match outcome {
            RenderOutcome::Applied(frame) => frame,
            RenderOutcome::Discarded { seq, latest } => return RedrawOutcome::Discarded { seq, latest },
        };

        let signature = self.selection.signature();
        if frame.signature != signature {
            log::debug!("Render {} outdated: selection changed since it was requested", frame.seq);
            return RedrawOutcome::Outdated { seq: frame.seq };
        }
        let committed = self.tracker.commit(&signature, &self.selection.selected_entries());
        let appended = committed.map(|_| {
            let record = self.commit_record();
            let receipt = self.sink.append(&record);
            self.log.push(record);
            receipt
        });

        self.selection.sync_set_marker();
        let snapshot = self.sync_snapshot();
        let published = self.sink.publish(&snapshot);

        RedrawOutcome::Applied(Box::new(RedrawReport {
            degraded: frame.degraded,
            frame,
            committed,
            snapshot,
            published,
            appended,
        }))
    }

    pub async fn redraw(&mut self) -> Result<RedrawOutcome, RenderError> {
        let outcome = self.request_render().await?;
        Ok(self.apply_render(outcome))
    }

    // --- Outputs ---

    /// Record the current creature as submitted and republish the snapshot.
    pub fn submit(&mut self) -> Submission {
        let profile = self.profile();
        let stats = self.exploration();
        let (set_number, set_id) = match self.selection.current_set() {
            Some((n, id)) => (Some(n), Some(id.to_string())),
            None => (None, None),
        };
        let record = SubmissionRecord {
            id: Uuid::new_v4().to_string(),
            at: Utc::now(),
            filename: submission_filename(&profile.name, &profile.display_seed, &Local::now().naive_local()),
            seed: profile.display_seed,
            name: profile.name,
            creature_number: stats.creature_index.to_string(),
            set_number,
            set_id,
            pool_mode: self.selection.mode(),
        };
        let receipt = self.sink.submit(&record);
        if !receipt.ok {
            log::warn!("Submission {} was not stored", record.filename);
        }
        let snapshot = self.sync_snapshot();
        self.sink.publish(&snapshot);
        Submission { record, receipt }
    }

    /// File name and contents of the variation log export, `None` when empty.
    pub fn export_csv(&self) -> Option<(String, String)> {
        if self.log.is_empty() {
            return None;
        }
        Some((export_filename(&Local::now().naive_local()), self.log.to_csv()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetError;
    use crate::pool::{Pool, PoolEntry, SourceTag};
    use crate::sink::MemorySink;
    use image::{Rgba, RgbaImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct SolidStore;

    impl ImageStore for SolidStore {
        fn fetch(&self, _part: Part, _entry: &PoolEntry) -> Result<RgbaImage, AssetError> {
            let mut img = RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]));
            img.put_pixel(8, 8, Rgba([20, 20, 20, 255]));
            Ok(img)
        }
    }

    fn pools() -> PreparedPools {
        let pool = |tag: SourceTag, n: usize| {
            Pool::new(PartMap::from_fn(|part| {
                (1..=n).map(|i| PoolEntry::new(tag, format!("{}_{:04}.png", part, i))).collect()
            }))
        };
        PreparedPools {
            large: pool(SourceTag::Primary, 4),
            small: pool(SourceTag::Curated, 2),
        }
    }

    fn session() -> Session {
        let config = EngineConfig { canvas: 64, ..Default::default() };
        let mut s = Session::new(config, pools(), Arc::new(SolidStore), Box::new(MemorySink::default()));
        s.start(PoolMode::Large);
        s
    }

    #[tokio::test]
    async fn test_redraw_commits_once_per_signature() {
        let mut s = session();
        let first = s.redraw().await.unwrap();
        let report = first.report().unwrap();
        assert_eq!(report.committed.map(|c| c.generation), Some(1));
        assert!(report.appended.is_some());
        assert_eq!(report.snapshot.generation, 1);

        let again = s.redraw().await.unwrap();
        assert!(again.report().unwrap().committed.is_none());
        assert_eq!(s.variation_log().len(), 1);
    }

    #[tokio::test]
    async fn test_redraw_marks_cohesive_set() {
        let mut s = session();
        s.select(PartMap::splat(2), Origin::Human);
        let outcome = s.redraw().await.unwrap();
        let snapshot = &outcome.report().unwrap().snapshot;
        assert_eq!(snapshot.set_number, Some(3));
        assert_eq!(snapshot.set_id.as_deref(), Some("S-0003"));
        assert_eq!(snapshot.creature_index, "171");
    }

    #[tokio::test]
    async fn test_superseded_render_is_not_applied() {
        let mut s = session();
        let stale = s.request_render();
        s.shift(Part::Head, 1, Origin::Human);
        let fresh = s.request_render();
        let (stale, fresh) = tokio::join!(stale, fresh);
        assert!(matches!(s.apply_render(stale.unwrap()), RedrawOutcome::Discarded { .. }));
        assert_eq!(s.tracker().generation(), 0);
        assert!(s.apply_render(fresh.unwrap()).report().is_some());
        assert_eq!(s.tracker().generation(), 1);
    }

    #[tokio::test]
    async fn test_frame_of_a_changed_selection_is_not_committed() {
        let mut s = session();
        let pending = s.request_render();
        s.shift(Part::Head, 1, Origin::Human);
        let frame_sig = match pending.await.unwrap() {
            RenderOutcome::Applied(frame) => {
                let sig = frame.signature.clone();
                assert!(matches!(
                    s.apply_render(RenderOutcome::Applied(frame)),
                    RedrawOutcome::Outdated { seq: 1 }
                ));
                sig
            }
            RenderOutcome::Discarded { .. } => panic!("only render in flight"),
        };
        assert_ne!(frame_sig, s.selection().signature());
        assert_eq!(s.tracker().generation(), 0);
        assert!(s.variation_log().is_empty());

        let fresh = s.redraw().await.unwrap();
        let report = fresh.report().unwrap();
        assert_eq!(report.snapshot.indices.head, 1);
        assert_eq!(report.frame.signature, s.selection().signature());
        assert_eq!(s.tracker().last_signature(), Some(&report.frame.signature));
    }

    #[tokio::test]
    async fn test_start_resets_exploration() {
        let mut s = session();
        let mut rng = StdRng::seed_from_u64(11);
        s.redraw().await.unwrap();
        s.randomize_all(&mut rng, Origin::Human);
        s.redraw().await.unwrap();
        assert_eq!(s.tracker().generation(), 2);

        s.start(PoolMode::Small);
        assert_eq!(s.tracker().generation(), 0);
        assert_eq!(s.tracker().seen_count(), 0);
        assert!(!s.selection().can_undo());
        assert_eq!(s.exploration().total_variations.to_string(), "16");
        assert_eq!(s.compositor().loader().cached_count(), 0);
    }

    #[tokio::test]
    async fn test_idle_randomize_is_not_undoable() {
        let mut s = session();
        let mut rng = StdRng::seed_from_u64(12);
        assert!(s.idle_randomize(&mut rng).changed());
        assert!(!s.selection().can_undo());
        assert_eq!(s.undo(), ActionOutcome::NothingToUndo);
    }

    #[tokio::test]
    async fn test_submit_and_export() {
        let mut s = session();
        assert!(s.export_csv().is_none());
        s.redraw().await.unwrap();

        let submission = s.submit();
        assert!(submission.receipt.ok);
        let seed = s.profile().display_seed.to_lowercase();
        assert!(submission.record.filename.contains(&format!("-{}-", seed)));
        assert!(submission.record.filename.ends_with(".png"));
        assert_eq!(submission.record.creature_number, "1");

        let (name, csv) = s.export_csv().unwrap();
        assert!(name.starts_with("variation-log-") && name.ends_with(".csv"));
        assert_eq!(csv.lines().count(), 2);
    }
}
