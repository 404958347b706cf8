// src/app/palette.rs — dominant-color extraction for the open still.
// Downscale, sample, quantize into 32-wide buckets, then pick the five
// most frequent buckets that are not near-duplicates of one another.

use std::path::Path;

use image::imageops::FilterType;
use image::RgbaImage;
use tracing::warn;

pub const PALETTE_SIZE: usize = 5;
const ANALYSIS_SIZE: u32 = 150;
const MAX_SAMPLES: usize = 5000;
const ALPHA_THRESHOLD: u8 = 128;
const BLACK_THRESHOLD: u8 = 15;
const QUANT: u32 = 32;
const SIMILARITY: f32 = 50.0;
const LIGHT_LUMINANCE: f32 = 160.0;

/// Extract up to `num` dominant colors, most frequent first. Returned
/// colors are bucket centers, so two visually identical images yield
/// identical palettes.
pub fn extract_palette(img: &RgbaImage, num: usize) -> Vec<[u8; 3]> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || num == 0 {
        return Vec::new();
    }

    let scaled;
    let img = if w.max(h) > ANALYSIS_SIZE {
        let scale = ANALYSIS_SIZE as f32 / w.max(h) as f32;
        let nw = ((w as f32 * scale) as u32).max(1);
        let nh = ((h as f32 * scale) as u32).max(1);
        scaled = image::imageops::resize(img, nw, nh, FilterType::Triangle);
        &scaled
    } else {
        img
    };

    let pixels: Vec<_> = img.pixels().collect();
    let stride = (pixels.len() / MAX_SAMPLES).max(1);

    let mut counts: std::collections::HashMap<(u32, u32, u32), u32> =
        std::collections::HashMap::new();
    for px in pixels.iter().step_by(stride) {
        let [r, g, b, a] = px.0;
        if a < ALPHA_THRESHOLD {
            continue;
        }
        if r < BLACK_THRESHOLD && g < BLACK_THRESHOLD && b < BLACK_THRESHOLD {
            continue;
        }
        let bucket = (r as u32 / QUANT, g as u32 / QUANT, b as u32 / QUANT);
        *counts.entry(bucket).or_insert(0) += 1;
    }

    let mut buckets: Vec<((u32, u32, u32), u32)> = counts.into_iter().collect();
    buckets.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let center = |(r, g, b): (u32, u32, u32)| -> [u8; 3] {
        [
            (r * QUANT + QUANT / 2).min(255) as u8,
            (g * QUANT + QUANT / 2).min(255) as u8,
            (b * QUANT + QUANT / 2).min(255) as u8,
        ]
    };

    let mut palette: Vec<[u8; 3]> = Vec::with_capacity(num);
    for (bucket, _) in buckets {
        let candidate = center(bucket);
        let distinct = palette
            .iter()
            .all(|kept| color_distance(kept, &candidate) >= SIMILARITY);
        if distinct {
            palette.push(candidate);
            if palette.len() == num {
                break;
            }
        }
    }
    palette
}

fn color_distance(a: &[u8; 3], b: &[u8; 3]) -> f32 {
    let dr = a[0] as f32 - b[0] as f32;
    let dg = a[1] as f32 - b[1] as f32;
    let db = a[2] as f32 - b[2] as f32;
    (dr * dr + dg * dg + db * db).sqrt()
}

/// Decode a cached image file and extract its palette. Decode failures
/// log and yield an empty palette so the swatch row just stays hidden.
pub fn palette_from_path(path: &Path) -> Vec<[u8; 3]> {
    match image::open(path) {
        Ok(img) => extract_palette(&img.to_rgba8(), PALETTE_SIZE),
        Err(err) => {
            warn!("palette decode failed for {}: {err}", path.display());
            Vec::new()
        }
    }
}

pub fn rgb_to_hex(color: &[u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

/// Whether a swatch needs dark text on top of it.
pub fn is_light(color: &[u8; 3]) -> bool {
    let lum = color[0] as f32 * 0.299 + color[1] as f32 * 0.587 + color[2] as f32 * 0.114;
    lum > LIGHT_LUMINANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(px))
    }

    #[test]
    fn solid_image_yields_one_bucket_center() {
        let img = solid(64, 64, [200, 100, 50, 255]);
        let palette = extract_palette(&img, PALETTE_SIZE);
        // 200/32=6 -> 6*32+16 = 208, 100/32=3 -> 112, 50/32=1 -> 48
        assert_eq!(palette, vec![[208, 112, 48]]);
    }

    #[test]
    fn transparent_and_near_black_are_skipped() {
        let transparent = solid(32, 32, [255, 0, 0, 10]);
        assert!(extract_palette(&transparent, PALETTE_SIZE).is_empty());

        let black = solid(32, 32, [5, 5, 5, 255]);
        assert!(extract_palette(&black, PALETTE_SIZE).is_empty());
    }

    #[test]
    fn dominant_color_comes_first() {
        let mut img = solid(100, 100, [250, 20, 20, 255]);
        // paint a quarter with a clearly different color
        for y in 0..50 {
            for x in 0..50 {
                img.put_pixel(x, y, Rgba([20, 20, 250, 255]));
            }
        }
        let palette = extract_palette(&img, PALETTE_SIZE);
        assert_eq!(palette.len(), 2);
        assert_eq!(palette[0], [240, 16, 16]);
        assert_eq!(palette[1], [16, 16, 240]);
    }

    #[test]
    fn similar_buckets_are_deduped() {
        let mut img = solid(100, 100, [100, 100, 100, 255]);
        // neighbor bucket, center distance under the similarity cutoff
        for y in 0..30 {
            for x in 0..100 {
                img.put_pixel(x, y, Rgba([130, 100, 100, 255]));
            }
        }
        let palette = extract_palette(&img, PALETTE_SIZE);
        assert_eq!(palette.len(), 1);
    }

    #[test]
    fn hex_and_luminance() {
        assert_eq!(rgb_to_hex(&[208, 112, 48]), "#d07030");
        assert!(is_light(&[255, 255, 255]));
        assert!(!is_light(&[30, 30, 30]));
        // pure blue is dark despite full channel value
        assert!(!is_light(&[0, 0, 255]));
    }

    #[test]
    fn large_image_is_downscaled_not_rejected() {
        let img = solid(1920, 1080, [64, 160, 224, 255]);
        let palette = extract_palette(&img, PALETTE_SIZE);
        assert_eq!(palette, vec![[80, 176, 240]]);
    }
}
