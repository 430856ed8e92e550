//! Creature Lab CLI - headless front end
//!
//! Commands: pools, render, explore
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when a render had to fall back to placeholders

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use creaturelab_core::catalog::distinct_ids;
use creaturelab_core::cohesive::build_cohesive_sets;
use creaturelab_core::uniqueness::total_variations;
use creaturelab_core::{
    prepare_pools, CatalogManifest, EngineConfig, FsImageStore, JsonFileSink, MemorySink, Origin,
    Part, PartMap, PoolMode, PreparedPools, RedrawOutcome, SelectionIndex, Session, Sink,
};

#[derive(Parser)]
#[command(name = "creaturelab-cli")]
#[command(about = "Creature Lab CLI - composite creature engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Primary catalog manifest
    #[arg(short, long, default_value = "manifest.json")]
    manifest: PathBuf,

    /// Curated catalog manifest (the primary one stands in when absent)
    #[arg(long)]
    curated: Option<PathBuf>,

    /// Engine config JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Active pool: large or small
    #[arg(long, default_value = "large", value_parser = parse_mode)]
    mode: PoolMode,

    /// Write last.json / variations.jsonl here instead of keeping them in memory
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Pool sizes, variation counts and cohesive sets
    Pools,

    /// Render one creature
    Render {
        /// Indices as H,T,L,F
        #[arg(short, long, value_parser = parse_indices)]
        indices: SelectionIndex,

        /// PNG output path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Run seeded mutations and report exploration stats
    Explore {
        #[arg(long, default_value_t = 10)]
        steps: usize,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Also write the variation log as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

fn parse_mode(s: &str) -> Result<PoolMode, String> {
    PoolMode::parse(s).ok_or_else(|| format!("unknown pool mode '{}', expected large or small", s))
}

fn parse_indices(s: &str) -> Result<SelectionIndex, String> {
    let values: Vec<usize> = s
        .split(',')
        .map(|v| v.trim().parse::<usize>().map_err(|e| format!("bad index '{}': {}", v, e)))
        .collect::<Result<_, _>>()?;
    if values.len() != Part::COUNT {
        return Err(format!("expected {} indices, got {}", Part::COUNT, values.len()));
    }
    Ok(PartMap::from_fn(|part| values[part.index()]))
}

fn emit(value: serde_json::Value) {
    println!("{:#}", value);
}

fn fail(message: impl std::fmt::Display) -> ExitCode {
    emit(json!({ "success": false, "error": message.to_string() }));
    ExitCode::FAILURE
}

/// Sprite root for a catalog: the manifest's `source`, else the configured
/// directory, relative to the manifest file.
fn sprite_root(manifest_path: &Path, source: Option<&str>, fallback: &str) -> PathBuf {
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    base.join(source.unwrap_or(fallback))
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(c) => c,
            Err(e) => return fail(e),
        },
        None => EngineConfig::default(),
    };

    let primary = match CatalogManifest::load(&cli.manifest) {
        Ok(m) => m,
        Err(e) => return fail(format!("Failed to load manifest: {}", e)),
    };
    let curated = match &cli.curated {
        Some(path) => match CatalogManifest::load(path) {
            Ok(m) => Some(m),
            Err(e) => return fail(format!("Failed to load curated manifest: {}", e)),
        },
        None => None,
    };

    let pools = prepare_pools(&primary, curated.as_ref(), config.small_pool_limit);
    if let Err(e) = pools.check_not_empty() {
        return fail(e);
    }

    match &cli.command {
        Commands::Pools => {
            let active = pools.pool(cli.mode);
            emit(json!({
                "success": true,
                "mode": cli.mode,
                "large": pools.large.lens(),
                "small": pools.small.lens(),
                "totalVariations": {
                    "large": total_variations(&pools.large.lens()).to_string(),
                    "small": total_variations(&pools.small.lens()).to_string(),
                },
                "cohesiveSets": build_cohesive_sets(active).len(),
                "distinctIds": {
                    "primary": distinct_ids(&primary).len(),
                    "curated": curated.as_ref().map(|m| distinct_ids(m).len()),
                },
            }));
            ExitCode::SUCCESS
        }

        Commands::Render { indices, out } => {
            let mut session = open_session(&cli.paths(), config, pools, &primary, curated.as_ref());
            session.start(cli.mode);
            session.select(*indices, Origin::Human);

            let report = match session.redraw().await {
                Ok(RedrawOutcome::Applied(report)) => report,
                Ok(RedrawOutcome::Discarded { seq, latest }) => {
                    return fail(format!("Render {} superseded by {}", seq, latest))
                }
                Ok(RedrawOutcome::Outdated { seq }) => {
                    return fail(format!("Render {} no longer matches the selection", seq))
                }
                Err(e) => return fail(e),
            };
            if let Err(e) = report.frame.save(out) {
                return fail(e);
            }

            emit(json!({
                "success": true,
                "out": out.display().to_string(),
                "degraded": report.degraded,
                "placeholders": report.frame.placeholder_labels(),
                "snapshot": report.snapshot,
            }));
            if report.degraded {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }

        Commands::Explore { steps, seed, csv } => {
            let mut session = open_session(&cli.paths(), config, pools, &primary, curated.as_ref());
            session.start(cli.mode);
            let mut rng = StdRng::seed_from_u64(*seed);

            let mut degraded = 0usize;
            for step in 0..=*steps {
                if step > 0 {
                    session.mutate_unlocked(&mut rng, Origin::Human);
                }
                match session.redraw().await {
                    Ok(outcome) => {
                        if outcome.report().is_some_and(|r| r.degraded) {
                            degraded += 1;
                        }
                    }
                    Err(e) => return fail(e),
                }
            }

            if let Some(path) = csv {
                if let Err(e) = std::fs::write(path, session.variation_log().to_csv()) {
                    return fail(format!("Failed to write {}: {}", path.display(), e));
                }
            }

            let stats = session.exploration();
            emit(json!({
                "success": true,
                "steps": steps,
                "degradedFrames": degraded,
                "exploredPercent": stats.explored_percent(),
                "stats": stats,
                "profile": session.profile(),
                "set": session.selection().set_label(),
                "logged": session.variation_log().len(),
            }));
            ExitCode::SUCCESS
        }
    }
}

struct Paths<'a> {
    manifest: &'a Path,
    curated: Option<&'a Path>,
    out_dir: Option<&'a Path>,
}

impl Cli {
    fn paths(&self) -> Paths<'_> {
        Paths {
            manifest: &self.manifest,
            curated: self.curated.as_deref(),
            out_dir: self.out_dir.as_deref(),
        }
    }
}

fn open_session(
    paths: &Paths<'_>,
    config: EngineConfig,
    pools: PreparedPools,
    primary: &CatalogManifest,
    curated: Option<&CatalogManifest>,
) -> Session {
    let curated_path = paths.curated.unwrap_or(paths.manifest);
    let curated_source = curated.map_or(primary.source.as_deref(), |m| m.source.as_deref());
    let store = FsImageStore::new(
        sprite_root(paths.manifest, primary.source.as_deref(), &config.sources.primary),
        sprite_root(curated_path, curated_source, &config.sources.curated),
    );
    let sink: Box<dyn Sink> = match paths.out_dir {
        Some(dir) => Box::new(JsonFileSink::new(dir)),
        None => Box::new(MemorySink::new(config.sink_capacity)),
    };
    Session::new(config, pools, Arc::new(store), sink)
}
