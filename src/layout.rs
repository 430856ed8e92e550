//! Layout Engine - proportional vertical stacking and loose horizontal alignment

use serde::{Deserialize, Serialize};

use crate::ink::InkMetric;
use crate::part::{Part, PartMap};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSettings {
    #[serde(default = "default_top_padding")]
    pub top_padding_ratio: f64,
    #[serde(default = "default_bottom_padding")]
    pub bottom_padding_ratio: f64,
    /// Width of the horizontal source window relative to the sprite width.
    #[serde(default = "default_source_window")]
    pub source_window_ratio: f64,
    /// Weight of a sprite's own center against the median center.
    #[serde(default = "default_own_center_weight")]
    pub own_center_weight: f64,
}

fn default_top_padding() -> f64 { 0.06 }
fn default_bottom_padding() -> f64 { 0.01 }
fn default_source_window() -> f64 { 0.96 }
fn default_own_center_weight() -> f64 { 0.65 }

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            top_padding_ratio: default_top_padding(),
            bottom_padding_ratio: default_bottom_padding(),
            source_window_ratio: default_source_window(),
            own_center_weight: default_own_center_weight(),
        }
    }
}

/// Vertical band allotted to one Part on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub y: u32,
    pub h: u32,
}

/// Source rectangle cut from a sprite before scaling into its band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceWindow {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub bands: PartMap<Band>,
    /// Per-Part crop; `None` where the sprite is missing.
    pub windows: PartMap<Option<SourceWindow>>,
    pub median_center: Option<f64>,
}

fn weight(metric: &Option<InkMetric>) -> f64 {
    metric.map_or(1.0, |m| m.crop_height as f64)
}

/// Split the usable height between the Parts in proportion to their ink height.
///
/// A missing metric weighs 1. The last Part takes the rounding remainder so the
/// bands exactly cover `[top_pad, canvas - bottom_pad)`.
pub fn allocate_bands(
    metrics: &PartMap<Option<InkMetric>>,
    canvas: u32,
    settings: &LayoutSettings,
) -> PartMap<Band> {
    let size = canvas as f64;
    let total: f64 = metrics.values().iter().map(|m| weight(m)).sum();
    let top_pad = (size * settings.top_padding_ratio).round() as i64;
    let bottom_pad = (size * settings.bottom_padding_ratio).round() as i64;
    let usable = (canvas as i64 - top_pad - bottom_pad).max(1) as f64;

    let mut y = top_pad;
    let mut bands = PartMap::splat(Band { y: 0, h: 0 });
    for part in Part::ALL {
        let h = if part == Part::Feet {
            (canvas as i64 - bottom_pad - y).max(0)
        } else {
            ((weight(&metrics[part]) / total * usable).round() as i64).max(1)
        };
        bands[part] = Band { y: y.max(0) as u32, h: h as u32 };
        y += h;
    }
    bands
}

/// Upper median of the centers of every analyzed sprite.
pub fn median_center(metrics: &PartMap<Option<InkMetric>>) -> Option<f64> {
    let mut centers: Vec<f64> = metrics
        .values()
        .iter()
        .filter_map(|m| m.map(|m| m.center_x))
        .collect();
    if centers.is_empty() {
        return None;
    }
    centers.sort_by(|a, b| a.total_cmp(b));
    Some(centers[centers.len() / 2])
}

/// Fixed-ratio crop centered between the sprite's own center and `target`,
/// clamped inside the sprite.
pub fn source_window(metric: &InkMetric, target: Option<f64>, settings: &LayoutSettings) -> SourceWindow {
    let width = metric.width.max(1);
    let w = ((width as f64 * settings.source_window_ratio).floor() as u32).clamp(1, width);
    let target = target.unwrap_or(metric.center_x);
    let own = settings.own_center_weight;
    let blended = metric.center_x * own + target * (1.0 - own);
    let x = (blended - w as f64 / 2.0)
        .round()
        .clamp(0.0, (width - w) as f64) as u32;
    SourceWindow {
        x,
        y: metric.crop_top,
        w,
        h: metric.crop_height,
    }
}

pub fn plan_layout(
    metrics: &PartMap<Option<InkMetric>>,
    canvas: u32,
    settings: &LayoutSettings,
) -> Layout {
    let median = median_center(metrics);
    Layout {
        bands: allocate_bands(metrics, canvas, settings),
        windows: metrics.map(|_, m| m.as_ref().map(|m| source_window(m, median, settings))),
        median_center: median,
    }
}
