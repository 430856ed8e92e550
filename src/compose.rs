//! Compositor - one render pass from selection to frame
//!
//! Every pass takes a sequence number when it is requested. A pass whose
//! number is no longer the latest once its sprites are in (or once it has
//! drawn) is discarded and never applied.

use base64::Engine;
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use serde::Serialize;
use std::future::Future;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::assets::{LoadedSprite, SpriteLoader};
use crate::ink::InkMetric;
use crate::layout::{plan_layout, Band, Layout, LayoutSettings, SourceWindow};
use crate::part::{Part, PartMap};
use crate::pool::{PoolEntry, Signature};

pub const DEFAULT_CANVAS: u32 = 1024;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PLACEHOLDER_FILL: Rgba<u8> = Rgba([250, 250, 250, 255]);
const PLACEHOLDER_OUTLINE: Rgba<u8> = Rgba([179, 179, 179, 255]);
const PLACEHOLDER_TEXT: Rgba<u8> = Rgba([84, 84, 96, 255]);
const GLYPH: u32 = 8;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No assets for {part}: the active pool is empty")]
    NoAssets { part: Part },

    #[error("Frame encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Render task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SegmentContent {
    Sprite { entry: PoolEntry, window: SourceWindow },
    Placeholder { label: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub band: Band,
    pub content: SegmentContent,
}

impl Segment {
    pub fn is_placeholder(&self) -> bool {
        matches!(self.content, SegmentContent::Placeholder { .. })
    }
}

/// A finished, applied render.
#[derive(Debug, Clone)]
pub struct Frame {
    pub seq: u64,
    /// The selection this frame depicts.
    pub signature: Signature,
    pub image: RgbaImage,
    pub segments: PartMap<Segment>,
    pub layout: Layout,
    /// At least one Part was drawn as a placeholder.
    pub degraded: bool,
}

impl Frame {
    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    pub fn to_base64(&self) -> Result<String, RenderError> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.encode_png()?))
    }

    pub fn save(&self, path: &Path) -> Result<(), RenderError> {
        self.image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }

    pub fn placeholder_labels(&self) -> Vec<&str> {
        self.segments
            .values()
            .into_iter()
            .filter_map(|s| match &s.content {
                SegmentContent::Placeholder { label } => Some(label.as_str()),
                SegmentContent::Sprite { .. } => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum RenderOutcome {
    Applied(Frame),
    /// A newer pass was requested while this one was in flight.
    Discarded { seq: u64, latest: u64 },
}

impl RenderOutcome {
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            RenderOutcome::Applied(frame) => Some(frame),
            RenderOutcome::Discarded { .. } => None,
        }
    }
}

pub fn placeholder_label(part: Part, entry: Option<&PoolEntry>) -> String {
    format!(
        "MISSING {} {}",
        part.name().to_uppercase(),
        entry.map_or("(none)", |e| e.file.as_str())
    )
}

#[derive(Clone)]
pub struct Compositor {
    loader: SpriteLoader,
    sequence: Arc<AtomicU64>,
    canvas: u32,
    layout: LayoutSettings,
}

impl Compositor {
    pub fn new(loader: SpriteLoader, canvas: u32, layout: LayoutSettings) -> Self {
        Self {
            loader,
            sequence: Arc::new(AtomicU64::new(0)),
            canvas: canvas.max(1),
            layout,
        }
    }

    pub fn loader(&self) -> &SpriteLoader {
        &self.loader
    }

    pub fn canvas(&self) -> u32 {
        self.canvas
    }

    pub fn latest_seq(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Request a render of `selection`, identified by `signature`.
    ///
    /// The sequence number is taken immediately, so a later call supersedes
    /// this one even if neither future has been polled yet. An empty Part
    /// fails the pass with [`RenderError::NoAssets`] without taking a number.
    pub fn render(
        &self,
        signature: Signature,
        selection: &PartMap<Option<PoolEntry>>,
    ) -> impl Future<Output = Result<RenderOutcome, RenderError>> + Send + 'static {
        let entries = complete(selection);
        let seq = match entries {
            Ok(_) => self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            Err(_) => self.latest_seq(),
        };
        let this = self.clone();
        async move {
            let entries = entries.map_err(|part| RenderError::NoAssets { part })?;
            this.run(seq, signature, entries).await
        }
    }

    async fn run(
        self,
        seq: u64,
        signature: Signature,
        entries: PartMap<PoolEntry>,
    ) -> Result<RenderOutcome, RenderError> {
        let (head, torso, legs, feet) = tokio::join!(
            self.loader.load(Part::Head, &entries.head),
            self.loader.load(Part::Torso, &entries.torso),
            self.loader.load(Part::Legs, &entries.legs),
            self.loader.load(Part::Feet, &entries.feet),
        );
        let sprites: PartMap<Option<Arc<LoadedSprite>>> = PartMap { head, torso, legs, feet }
            .map(|_, outcome| outcome.sprite().cloned());

        if let Some(discarded) = self.superseded(seq) {
            return Ok(discarded);
        }

        let canvas = self.canvas;
        let settings = self.layout;
        let frame = tokio::task::spawn_blocking(move || {
            draw_frame(seq, signature, canvas, &settings, &entries, &sprites)
        })
        .await?;

        if let Some(discarded) = self.superseded(seq) {
            return Ok(discarded);
        }
        if frame.degraded {
            log::warn!("Render {} degraded: {}", seq, frame.placeholder_labels().join(", "));
        }
        Ok(RenderOutcome::Applied(frame))
    }

    fn superseded(&self, seq: u64) -> Option<RenderOutcome> {
        let latest = self.latest_seq();
        if latest == seq {
            return None;
        }
        log::debug!("Render {} discarded, {} is newer", seq, latest);
        Some(RenderOutcome::Discarded { seq, latest })
    }
}

/// Every Part's entry, or the first Part without one.
fn complete(selection: &PartMap<Option<PoolEntry>>) -> Result<PartMap<PoolEntry>, Part> {
    Ok(PartMap {
        head: selection.head.clone().ok_or(Part::Head)?,
        torso: selection.torso.clone().ok_or(Part::Torso)?,
        legs: selection.legs.clone().ok_or(Part::Legs)?,
        feet: selection.feet.clone().ok_or(Part::Feet)?,
    })
}

fn draw_frame(
    seq: u64,
    signature: Signature,
    canvas: u32,
    settings: &LayoutSettings,
    entries: &PartMap<PoolEntry>,
    sprites: &PartMap<Option<Arc<LoadedSprite>>>,
) -> Frame {
    let metrics: PartMap<Option<InkMetric>> = sprites.map(|_, s| s.as_ref().map(|s| s.metric));
    let layout = plan_layout(&metrics, canvas, settings);
    let mut image = RgbaImage::from_pixel(canvas, canvas, BACKGROUND);

    let segments = PartMap::from_fn(|part| {
        let band = layout.bands[part];
        let content = match (&sprites[part], layout.windows[part]) {
            (Some(sprite), Some(window)) => {
                draw_sprite(&mut image, &sprite.image, window, band);
                SegmentContent::Sprite { entry: entries[part].clone(), window }
            }
            _ => {
                let label = placeholder_label(part, Some(&entries[part]));
                draw_placeholder(&mut image, band, &label);
                SegmentContent::Placeholder { label }
            }
        };
        Segment { band, content }
    });
    let degraded = segments.values().iter().any(|s| s.is_placeholder());

    Frame {
        seq,
        signature,
        image,
        segments,
        layout,
        degraded,
    }
}

fn draw_sprite(canvas: &mut RgbaImage, sprite: &RgbaImage, window: SourceWindow, band: Band) {
    if band.h == 0 || window.w == 0 || window.h == 0 {
        return;
    }
    let cropped = imageops::crop_imm(sprite, window.x, window.y, window.w, window.h).to_image();
    let scaled = imageops::resize(&cropped, canvas.width(), band.h, FilterType::Triangle);
    imageops::overlay(canvas, &scaled, 0, band.y as i64);
}

fn draw_placeholder(canvas: &mut RgbaImage, band: Band, label: &str) {
    if band.h == 0 {
        return;
    }
    let rect = Rect::at(0, band.y as i32).of_size(canvas.width(), band.h);
    draw_filled_rect_mut(canvas, rect, PLACEHOLDER_FILL);
    draw_hollow_rect_mut(canvas, rect, PLACEHOLDER_OUTLINE);
    draw_label(canvas, band, label);
}

/// Bitmap text centered in the band, scaled to a quarter of its height and
/// never wider than the canvas.
fn draw_label(canvas: &mut RgbaImage, band: Band, label: &str) {
    let chars = label.chars().count() as u32;
    if chars == 0 || band.h < GLYPH {
        return;
    }
    let by_height = band.h / 4 / GLYPH;
    let by_width = canvas.width() * 9 / 10 / (GLYPH * chars);
    let scale = by_height.min(by_width).max(1);
    let text_w = GLYPH * scale * chars;
    let x0 = canvas.width().saturating_sub(text_w) / 2;
    let y0 = band.y + (band.h - GLYPH * scale) / 2;

    for (i, ch) in label.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            continue;
        };
        let cx = x0 + i as u32 * GLYPH * scale;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let x = cx + col * scale + dx;
                        let y = y0 + row as u32 * scale + dy;
                        if x < canvas.width() && y < canvas.height() {
                            canvas.put_pixel(x, y, PLACEHOLDER_TEXT);
                        }
                    }
                }
            }
        }
    }
}
