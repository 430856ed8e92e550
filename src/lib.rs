//! Creature Lab Core - composite creature engine
//!
//! Builds a creature from four independently chosen sprites (head, torso,
//! legs, feet), stacks them into a square frame and derives a stable
//! identity for every combination.
//!
//! # Ground Rules
//! 1. The Signature is the identity: every derived value is a pure function of it
//! 2. Precondition failures are outcomes, never errors
//! 3. A missing sprite degrades the frame, never the session
//! 4. Only the latest requested render is ever applied
//! 5. Counting is exact at any catalog size

pub mod part;
pub mod hashing;
pub mod rng;
pub mod pool;
pub mod catalog;
pub mod ink;
pub mod layout;
pub mod assets;
pub mod compose;
pub mod naming;
pub mod identity;
pub mod cohesive;
pub mod history;
pub mod selection;
pub mod uniqueness;
pub mod sink;
pub mod export;
pub mod config;
pub mod session;

pub use part::{Part, PartMap};
pub use pool::{Pool, PoolEntry, PoolMode, SelectionIndex, Signature, SourceTag};
pub use catalog::{prepare_pools, CatalogError, CatalogManifest, PreparedPools};
pub use ink::{analyze_ink_bounds, InkMetric, InkSettings};
pub use layout::{plan_layout, Band, Layout, LayoutSettings, SourceWindow};
pub use assets::{AssetError, FsImageStore, ImageStore, SpriteLoader};
pub use compose::{Compositor, Frame, RenderError, RenderOutcome};
pub use identity::{compute_profile, Profile, ScoringConfig};
pub use cohesive::CohesiveSet;
pub use selection::{ActionOutcome, Origin, SelectionState};
pub use uniqueness::{ExplorationStats, ExplorationTracker};
pub use sink::{CommitRecord, JsonFileSink, MemorySink, Sink, SinkReceipt, SubmissionRecord, SyncSnapshot};
pub use export::VariationLog;
pub use config::{ConfigError, EngineConfig};
pub use session::{RedrawOutcome, RedrawReport, Session};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MIN_CATALOG_VERSION: &str = "1.0.0";
