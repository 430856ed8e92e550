//! Engine configuration (JSON, every field optional)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::catalog::{DEFAULT_CURATED_SOURCE, DEFAULT_PRIMARY_SOURCE};
use crate::compose::DEFAULT_CANVAS;
use crate::export::DEFAULT_VARIATION_LOG_LIMIT;
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::identity::ScoringConfig;
use crate::ink::InkSettings;
use crate::layout::LayoutSettings;
use crate::sink::DEFAULT_SINK_CAPACITY;

pub const DEFAULT_SMALL_POOL_LIMIT: usize = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Sprite base directories; a manifest's own `source` wins over these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDirs {
    #[serde(default = "default_primary_dir")]
    pub primary: String,
    #[serde(default = "default_curated_dir")]
    pub curated: String,
}

fn default_primary_dir() -> String { DEFAULT_PRIMARY_SOURCE.to_string() }
fn default_curated_dir() -> String { DEFAULT_CURATED_SOURCE.to_string() }

impl Default for SourceDirs {
    fn default() -> Self {
        Self {
            primary: default_primary_dir(),
            curated: default_curated_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Edge of the square canvas in pixels.
    #[serde(default = "default_canvas")]
    pub canvas: u32,
    #[serde(default)]
    pub ink: InkSettings,
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_small_pool_limit")]
    pub small_pool_limit: usize,
    #[serde(default = "default_variation_log_limit")]
    pub variation_log_limit: usize,
    /// Published snapshots and submissions kept by bounded sinks.
    #[serde(default = "default_sink_capacity")]
    pub sink_capacity: usize,
    #[serde(default)]
    pub sources: SourceDirs,
}

fn default_canvas() -> u32 { DEFAULT_CANVAS }
fn default_history_limit() -> usize { DEFAULT_HISTORY_LIMIT }
fn default_small_pool_limit() -> usize { DEFAULT_SMALL_POOL_LIMIT }
fn default_variation_log_limit() -> usize { DEFAULT_VARIATION_LOG_LIMIT }
fn default_sink_capacity() -> usize { DEFAULT_SINK_CAPACITY }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canvas: default_canvas(),
            ink: InkSettings::default(),
            layout: LayoutSettings::default(),
            scoring: ScoringConfig::default(),
            history_limit: default_history_limit(),
            small_pool_limit: default_small_pool_limit(),
            variation_log_limit: default_variation_log_limit(),
            sink_capacity: default_sink_capacity(),
            sources: SourceDirs::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}
