//! Identity & Scoring Engine
//!
//! Every value here is a pure function of the selection signature (plus the
//! normalized pool positions, which the signature already determines).

use serde::{Deserialize, Serialize};

use crate::hashing::{display_seed, seed, stability};
use crate::naming::procedural_name;
use crate::part::PartMap;
use crate::pool::Signature;
use crate::rng::{gaussian, SeededRng};

/// Gaussian stat around `base + slope * corr_mean`, clamped to `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatSpec {
    pub base: f64,
    pub slope: f64,
    pub sigma: f64,
    pub min: f64,
    pub max: f64,
}

impl StatSpec {
    fn sample(&self, rng: &mut SeededRng, corr_mean: f64) -> f64 {
        let mean = self.base + self.slope * corr_mean;
        (mean + gaussian(rng) * self.sigma).clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanScoreSpec {
    pub coherence_weight: f64,
    pub sync_weight: f64,
    /// Applied to `100 - mutation`.
    pub stability_weight: f64,
    pub jitter_sigma: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringConfig {
    #[serde(default = "default_correlation_sigma")]
    pub correlation_sigma: f64,
    #[serde(default = "default_correlation_max")]
    pub correlation_max: f64,
    #[serde(default = "default_coherence")]
    pub coherence: StatSpec,
    #[serde(default = "default_mutation")]
    pub mutation: StatSpec,
    #[serde(default = "default_sync")]
    pub sync: StatSpec,
    #[serde(default = "default_human")]
    pub human: HumanScoreSpec,
    #[serde(default = "default_name_seed_xor")]
    pub name_seed_xor: u32,
    #[serde(default = "default_name_thresholds")]
    pub name_style_thresholds: [f64; 3],
}

fn default_correlation_sigma() -> f64 { 0.06 }
fn default_correlation_max() -> f64 { 0.99 }
fn default_coherence() -> StatSpec {
    StatSpec { base: 46.0, slope: 42.0, sigma: 8.0, min: 20.0, max: 99.0 }
}
fn default_mutation() -> StatSpec {
    StatSpec { base: 52.0, slope: -22.0, sigma: 9.0, min: 5.0, max: 95.0 }
}
fn default_sync() -> StatSpec {
    StatSpec { base: 40.0, slope: 50.0, sigma: 7.0, min: 15.0, max: 99.0 }
}
fn default_human() -> HumanScoreSpec {
    HumanScoreSpec {
        coherence_weight: 0.46,
        sync_weight: 0.36,
        stability_weight: 0.28,
        jitter_sigma: 4.5,
        min: 10.0,
        max: 99.0,
    }
}
fn default_name_seed_xor() -> u32 { 0x9e37_79b9 }
fn default_name_thresholds() -> [f64; 3] { [0.56, 0.84, 0.94] }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            correlation_sigma: default_correlation_sigma(),
            correlation_max: default_correlation_max(),
            coherence: default_coherence(),
            mutation: default_mutation(),
            sync: default_sync(),
            human: default_human(),
            name_seed_xor: default_name_seed_xor(),
            name_style_thresholds: default_name_thresholds(),
        }
    }
}

/// Derived identity of one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub seed: u32,
    pub display_seed: String,
    pub stability: u32,
    pub name: String,
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
    pub corr_mean: f64,
}

/// Position of the pick within its pool in [0, 1]; 0.5 for pools of 0 or 1.
pub fn normalized_index(index: usize, count: usize) -> f64 {
    if count <= 1 {
        return 0.5;
    }
    index as f64 / (count - 1) as f64
}

pub fn compute_profile(
    signature: &Signature,
    normalized: &PartMap<f64>,
    config: &ScoringConfig,
) -> Profile {
    let seed = seed(signature.as_str());
    let mut rng = SeededRng::new(seed);

    let (h, t, l, f) = (normalized.head, normalized.torso, normalized.legs, normalized.feet);
    let mut correlate = |base: f64| {
        (base + gaussian(&mut rng) * config.correlation_sigma).clamp(0.0, config.correlation_max)
    };
    let corr_ht = correlate(1.0 - (h - t).abs());
    let corr_lf = correlate(1.0 - (l - f).abs());
    let corr_ul = correlate(1.0 - ((h + t) / 2.0 - (l + f) / 2.0).abs());
    let corr_mean = (corr_ht + corr_lf + corr_ul) / 3.0;

    let coherence = config.coherence.sample(&mut rng, corr_mean);
    let mutation = config.mutation.sample(&mut rng, corr_mean);
    let sync = config.sync.sample(&mut rng, corr_mean);

    let hs = &config.human;
    let raw = coherence * hs.coherence_weight
        + sync * hs.sync_weight
        + (100.0 - mutation) * hs.stability_weight
        + gaussian(&mut rng) * hs.jitter_sigma;
    let human_score = raw.round().clamp(hs.min, hs.max) as u32;

    Profile {
        seed,
        display_seed: display_seed(seed),
        stability: stability(seed),
        name: procedural_name(seed ^ config.name_seed_xor, &config.name_style_thresholds),
        human_score,
        coherence,
        mutation,
        sync,
        corr_ht,
        corr_lf,
        corr_ul,
        corr_mean,
    }
}
