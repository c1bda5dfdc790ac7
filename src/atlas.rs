//! Pre-rasterized glyph images, one per palette slot.
//!
//! Each glyph comes from an 8×8 bitmap font, scaled to the cell and lit with two
//! passes: a wide soft shadow under a translucent glow fill, then a tight shadow under
//! the solid primary fill. The atlas is immutable once built; any change to scale, cell
//! size, palette or colors produces a new one.

use font8x8::{UnicodeFonts, BASIC_FONTS, BLOCK_FONTS, BOX_FONTS, GREEK_FONTS, LATIN_FONTS, MISC_FONTS};
use rand::Rng;

use crate::blob::random_between;
use crate::color::{resolve_or_derive, Rgba, DEFAULT_PRIMARY};
use crate::config::Settings;

/// Font height relative to the cell.
const FONT_SCALE: f32 = 0.86;
const OUTER_BLUR: f32 = 6.0;
const INNER_BLUR: f32 = 2.0;
const MAX_WORKERS: usize = 8;

/// Straight-alpha RGBA pixels, channels in 0..=1.
#[derive(Clone, Debug)]
pub struct GlyphImage {
    pub ch: char,
    /// Side length in device pixels.
    pub size: u32,
    pub pixels: Vec<[f32; 4]>,
    /// Solid fill color, for surfaces that draw characters instead of images.
    pub tint: Rgba,
}

impl GlyphImage {
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.size + x) as usize]
    }

    pub fn coverage(&self) -> f32 {
        self.pixels.iter().map(|p| p[3]).sum::<f32>() / self.pixels.len().max(1) as f32
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AtlasOptions {
    pub primary: Rgba,
    pub glow: Rgba,
    pub shadow_outer: Rgba,
    pub shadow_inner: Rgba,
    pub cell_size: f32,
    pub enable_blur: bool,
    /// Rasterize glyphs on worker threads.
    pub offscreen: bool,
}

impl Default for AtlasOptions {
    fn default() -> Self {
        Self {
            primary: DEFAULT_PRIMARY,
            glow: DEFAULT_PRIMARY.with_alpha(0.35),
            shadow_outer: DEFAULT_PRIMARY.with_alpha(0.6),
            shadow_inner: DEFAULT_PRIMARY.with_alpha(0.3),
            cell_size: 14.0,
            enable_blur: true,
            offscreen: false,
        }
    }
}

impl AtlasOptions {
    pub fn from_settings(s: &Settings) -> Self {
        let primary = Rgba::parse(&s.colors.primary).unwrap_or(DEFAULT_PRIMARY);
        let shadow = s.colors.shadow.as_deref();
        Self {
            primary,
            glow: resolve_or_derive(s.colors.glow.as_deref(), primary, 0.35),
            shadow_outer: resolve_or_derive(shadow, primary, 0.6),
            shadow_inner: resolve_or_derive(shadow, primary, 0.3),
            cell_size: s.performance.cell_size,
            enable_blur: s.performance.enable_blur,
            offscreen: s.performance.offscreen_atlas,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct GlyphAtlas {
    entries: Vec<Option<GlyphImage>>,
    pixel_size: u32,
}

impl GlyphAtlas {
    pub fn build(scale: f32, characters: &[char], opts: &AtlasOptions) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        let cell_size = opts.cell_size.max(4.0);
        let pixel_size = ((cell_size * scale).ceil() as u32).max(1);
        let raster = Rasterizer {
            scale,
            cell_size,
            pixel_size,
            opts,
        };

        let workers = worker_count(characters.len());
        let entries: Vec<Option<GlyphImage>> = if opts.offscreen && workers > 1 {
            let chunk = characters.len().div_ceil(workers);
            std::thread::scope(|scope| {
                let handles: Vec<_> = characters
                    .chunks(chunk)
                    .map(|part| {
                        let h = scope.spawn(move || {
                            part.iter().map(|&ch| raster.glyph(ch)).collect::<Vec<_>>()
                        });
                        (part.len(), h)
                    })
                    .collect();
                // a panicked worker just loses its glyphs
                handles
                    .into_iter()
                    .flat_map(|(len, h)| h.join().unwrap_or_else(|_| vec![None; len]))
                    .collect()
            })
        } else {
            characters.iter().map(|&ch| raster.glyph(ch)).collect()
        };

        let atlas = Self {
            entries,
            pixel_size,
        };
        let missing = characters
            .iter()
            .zip(&atlas.entries)
            .filter(|(ch, e)| !ch.is_whitespace() && e.is_none())
            .count();
        if missing > 0 {
            tracing::warn!(missing, "palette characters without a glyph will not be drawn");
        }
        tracing::debug!(glyphs = atlas.entries.len(), pixel_size, "glyph atlas built");
        atlas
    }

    /// `None` means draw nothing for this slot.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&GlyphImage> {
        self.entries.get(idx).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pixel_size(&self) -> u32 {
        self.pixel_size
    }
}

#[derive(Clone, Copy)]
struct Rasterizer<'a> {
    scale: f32,
    cell_size: f32,
    pixel_size: u32,
    opts: &'a AtlasOptions,
}

impl Rasterizer<'_> {
    fn glyph(&self, ch: char) -> Option<GlyphImage> {
        if ch.is_whitespace() {
            return None;
        }
        let bitmap = glyph_bitmap(ch)?;
        let mask = self.coverage_mask(&bitmap);
        if mask.iter().all(|&m| m == 0.0) {
            return None;
        }

        let n = self.pixel_size as usize;
        let mut pixels = vec![[0.0f32; 4]; n * n];
        let o = self.opts;

        if o.enable_blur {
            let wide = gaussian_blur(&mask, n, OUTER_BLUR * self.scale / 2.0);
            paint(&mut pixels, &wide, o.shadow_outer);
        }
        paint(&mut pixels, &mask, o.glow);
        if o.enable_blur {
            let tight = gaussian_blur(&mask, n, INNER_BLUR * self.scale / 2.0);
            paint(&mut pixels, &tight, o.shadow_inner);
        }
        paint(&mut pixels, &mask, o.primary);

        Some(GlyphImage {
            ch,
            size: self.pixel_size,
            pixels,
            tint: o.primary,
        })
    }

    /// 8×8 bitmap scaled to the font box, centered in the cell. Nearest sampling.
    fn coverage_mask(&self, bitmap: &[u8; 8]) -> Vec<f32> {
        let n = self.pixel_size as usize;
        let font_px = self.cell_size * FONT_SCALE * self.scale;
        let origin = (n as f32 - font_px) / 2.0;
        let mut mask = vec![0.0f32; n * n];

        for y in 0..n {
            let v = ((y as f32 + 0.5 - origin) / font_px * 8.0).floor();
            if !(0.0..8.0).contains(&v) {
                continue;
            }
            let row = bitmap[v as usize];
            for x in 0..n {
                let u = ((x as f32 + 0.5 - origin) / font_px * 8.0).floor();
                if !(0.0..8.0).contains(&u) {
                    continue;
                }
                // bit 0 is the leftmost column
                if row & (1 << u as u8) != 0 {
                    mask[y * n + x] = 1.0;
                }
            }
        }
        mask
    }
}

/// Threads used for an offscreen build of `glyphs` glyphs.
fn worker_count(glyphs: usize) -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    cores.min(MAX_WORKERS).min(glyphs).max(1)
}

fn glyph_bitmap(ch: char) -> Option<[u8; 8]> {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BLOCK_FONTS.get(ch))
        .or_else(|| BOX_FONTS.get(ch))
        .or_else(|| GREEK_FONTS.get(ch))
        .or_else(|| MISC_FONTS.get(ch))
}

/// Source-over a `coverage`-weighted layer of `color` onto `dst`.
fn paint(dst: &mut [[f32; 4]], coverage: &[f32], color: Rgba) {
    let src_rgb = [
        color.r as f32 / 255.0,
        color.g as f32 / 255.0,
        color.b as f32 / 255.0,
    ];
    for (d, &c) in dst.iter_mut().zip(coverage) {
        let sa = (c * color.a).clamp(0.0, 1.0);
        if sa <= 0.0 {
            continue;
        }
        let da = d[3];
        let out_a = sa + da * (1.0 - sa);
        for k in 0..3 {
            d[k] = (src_rgb[k] * sa + d[k] * da * (1.0 - sa)) / out_a;
        }
        d[3] = out_a;
    }
}

/// Separable gaussian over an `n`×`n` single-channel image, clipped at the edges.
fn gaussian_blur(src: &[f32], n: usize, sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 || n == 0 {
        return src.to_vec();
    }
    let radius = (sigma * 3.0).ceil() as i64;
    let kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let norm: f32 = kernel.iter().sum();

    let pass = |input: &[f32], horizontal: bool| -> Vec<f32> {
        let mut out = vec![0.0f32; n * n];
        for y in 0..n {
            for x in 0..n {
                let mut acc = 0.0;
                for (k, w) in kernel.iter().enumerate() {
                    let off = k as i64 - radius;
                    let (sx, sy) = if horizontal {
                        (x as i64 + off, y as i64)
                    } else {
                        (x as i64, y as i64 + off)
                    };
                    if sx < 0 || sy < 0 || sx >= n as i64 || sy >= n as i64 {
                        continue;
                    }
                    acc += input[sy as usize * n + sx as usize] * w;
                }
                out[y * n + x] = acc / norm;
            }
        }
        out
    };

    let h = pass(src, true);
    pass(&h, false)
}

/// Slot-indexed character table the atlas is built from. Each slot is nudged by less
/// than half a step before rounding, so slot 0 stays the palette's blank.
pub fn build_character_lut<R: Rng + ?Sized>(characters: &[char], rng: &mut R) -> Vec<char> {
    if characters.is_empty() {
        return Vec::new();
    }
    let last = (characters.len() - 1) as f32;
    (0..characters.len())
        .map(|i| {
            let adjusted = (i as f32 + random_between(rng, -0.2, 0.2)).clamp(0.0, last);
            characters[adjusted.round() as usize]
        })
        .collect()
}
