//! Ink-Bounds Analyzer
//!
//! Finds the tight vertical extent and horizontal center of the visible
//! (non near-white) content of a sprite.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InkSettings {
    /// A channel below this value marks the pixel as ink.
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    /// Rows trimmed inward from top and bottom to drop anti-aliasing fringe.
    #[serde(default = "default_trim_px")]
    pub trim_px: u32,
    /// Composite each pixel over white before the threshold test, so
    /// transparent areas read as background. Off: raw RGB is tested.
    #[serde(default)]
    pub flatten_alpha: bool,
}

fn default_threshold() -> u8 { 244 }
fn default_trim_px() -> u32 { 2 }

impl Default for InkSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            trim_px: default_trim_px(),
            flatten_alpha: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InkMetric {
    pub width: u32,
    pub height: u32,
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
    pub crop_top: u32,
    pub crop_bottom: u32,
    pub crop_height: u32,
    /// Midpoint of the ink extrema, not of the image frame.
    pub center_x: f64,
    /// True when no ink was found and the full image is treated as content.
    pub blank: bool,
}

impl InkMetric {
    fn whole_image(width: u32, height: u32) -> Self {
        let last_row = height.saturating_sub(1);
        Self {
            width,
            height,
            top: 0,
            bottom: last_row,
            left: 0,
            right: width.saturating_sub(1),
            crop_top: 0,
            crop_bottom: last_row,
            crop_height: height.max(1),
            center_x: width as f64 / 2.0,
            blank: true,
        }
    }
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((channel as u32 * a + 255 * (255 - a)) / 255) as u8
}

pub fn analyze_ink_bounds(img: &RgbaImage, settings: &InkSettings) -> InkMetric {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return InkMetric::whole_image(w, h);
    }

    let mut top: Option<u32> = None;
    let mut bottom = 0u32;
    let mut left = w - 1;
    let mut right = 0u32;

    for (y, row) in img.rows().enumerate() {
        let mut row_has_ink = false;
        for (x, px) in row.enumerate() {
            let [r, g, b, a] = px.0;
            let ink = [r, g, b].into_iter().any(|c| {
                let c = if settings.flatten_alpha { over_white(c, a) } else { c };
                c < settings.threshold
            });
            if ink {
                row_has_ink = true;
                left = left.min(x as u32);
                right = right.max(x as u32);
            }
        }
        if row_has_ink {
            top.get_or_insert(y as u32);
            bottom = y as u32;
        }
    }

    let Some(top) = top else {
        return InkMetric::whole_image(w, h);
    };

    let last = (h - 1) as i64;
    let crop_top = (top as i64 + settings.trim_px as i64).clamp(0, last);
    let crop_bottom = (bottom as i64 - settings.trim_px as i64).clamp(crop_top, last);
    let crop_height = (crop_bottom - crop_top + 1).max(1);

    InkMetric {
        width: w,
        height: h,
        top,
        bottom,
        left,
        right,
        crop_top: crop_top as u32,
        crop_bottom: crop_bottom as u32,
        crop_height: crop_height as u32,
        center_x: (left as f64 + right as f64) / 2.0,
        blank: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn canvas(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, WHITE)
    }

    fn fill(img: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..=y1 {
            for x in x0..=x1 {
                img.put_pixel(x, y, BLACK);
            }
        }
    }

    #[test]
    fn test_all_white_is_whole_image() {
        let m = analyze_ink_bounds(&canvas(40, 30), &InkSettings::default());
        assert!(m.blank);
        assert_eq!((m.top, m.bottom), (0, 29));
        assert_eq!(m.crop_height, 30);
        assert_eq!(m.center_x, 20.0);
    }

    #[test]
    fn test_bounds_and_trim() {
        let mut img = canvas(50, 60);
        fill(&mut img, 10, 20, 29, 39);
        let m = analyze_ink_bounds(&img, &InkSettings::default());
        assert!(!m.blank);
        assert_eq!((m.top, m.bottom, m.left, m.right), (20, 39, 10, 29));
        assert_eq!((m.crop_top, m.crop_bottom), (22, 37));
        assert_eq!(m.crop_height, 16);
        assert_eq!(m.center_x, 19.5);
    }

    #[test]
    fn test_center_follows_content_not_frame() {
        let mut img = canvas(100, 10);
        fill(&mut img, 70, 2, 80, 7);
        let m = analyze_ink_bounds(&img, &InkSettings::default());
        assert_eq!(m.center_x, 75.0);
    }

    #[test]
    fn test_thin_ink_never_inverts_crop() {
        let mut img = canvas(10, 10);
        fill(&mut img, 4, 5, 5, 5);
        let m = analyze_ink_bounds(&img, &InkSettings::default());
        assert!(m.crop_bottom >= m.crop_top);
        assert_eq!(m.crop_height, 1);
    }

    #[test]
    fn test_near_white_is_background() {
        let mut img = canvas(8, 8);
        img.put_pixel(3, 3, Rgba([250, 250, 246, 255]));
        assert!(analyze_ink_bounds(&img, &InkSettings::default()).blank);
        img.put_pixel(3, 3, Rgba([250, 243, 250, 255]));
        assert!(!analyze_ink_bounds(&img, &InkSettings::default()).blank);
    }

    #[test]
    fn test_ink_test_reads_raw_rgb() {
        let mut img = RgbaImage::from_pixel(20, 30, Rgba([0, 0, 0, 0]));
        fill(&mut img, 5, 10, 6, 12);
        let m = analyze_ink_bounds(&img, &InkSettings::default());
        assert!(!m.blank);
        assert_eq!((m.top, m.bottom, m.left, m.right), (0, 29, 0, 19));
        assert_eq!(m.center_x, 9.5);

        // Transparent white is still background.
        let img = RgbaImage::from_pixel(6, 6, Rgba([255, 255, 255, 0]));
        assert!(analyze_ink_bounds(&img, &InkSettings::default()).blank);
    }

    #[test]
    fn test_flatten_alpha_treats_transparency_as_background() {
        let settings = InkSettings { flatten_alpha: true, ..Default::default() };
        let mut img = RgbaImage::from_pixel(20, 30, Rgba([0, 0, 0, 0]));
        assert!(analyze_ink_bounds(&img, &settings).blank);
        fill(&mut img, 5, 10, 6, 12);
        let m = analyze_ink_bounds(&img, &settings);
        assert_eq!((m.top, m.bottom, m.left, m.right), (10, 12, 5, 6));
        assert_eq!(m.center_x, 5.5);
    }
}
