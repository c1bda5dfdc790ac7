//! Per-frame compositing: blob influence → brightness → palette slot → glyph draw.
//!
//! Order matters. Blob influence is accumulated on top of the static base brightness
//! first, the eased reveal is applied to the result, and only then is the palette slot
//! and draw alpha derived.

use crate::atlas::GlyphAtlas;
use crate::blob::Blob;
use crate::falloff::FalloffTable;
use crate::grid::{Lattice, RevealDelays};
use crate::surface::Surface;

/// Draws fainter than this are skipped.
pub const ALPHA_EPSILON: f32 = 0.012;
/// Floor on the pulsed radius, in cells.
pub const MIN_RADIUS: f32 = 12.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameOptions {
    pub cell_size: f32,
    /// ms for a single cell to go from hidden to fully revealed.
    pub reveal_fade: f32,
    pub fade_in_duration: f32,
}

/// Everything a frame reads. All of it is read-only for the duration of the pass.
pub struct Scene<'a> {
    pub lattice: &'a Lattice,
    pub reveal: &'a RevealDelays,
    pub blobs: &'a [Blob],
    pub atlas: &'a GlyphAtlas,
    pub falloff: &'a FalloffTable,
}

/// Map a brightness to a palette slot. Slot 0 is the blank.
pub fn pick_shade_index(intensity: f32, jitter: f32, bias: f32, palette_size: usize) -> usize {
    if palette_size == 0 {
        return 0;
    }
    let top = (palette_size - 1) as f32;
    let adjusted = (intensity + jitter).clamp(0.0, 1.0);
    let biased = adjusted * top + bias * 0.6;
    biased.round().clamp(0.0, top) as usize
}

#[inline]
fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// Eased reveal progress of a cell, 0 while it is still waiting.
#[inline]
pub fn reveal_progress(reveal_elapsed: f32, delay: f32, reveal_fade: f32) -> f32 {
    let fade = reveal_fade.max(1e-3);
    let t = ((reveal_elapsed - delay) / fade).clamp(0.0, 1.0);
    if t <= 0.0 {
        0.0
    } else {
        smoothstep(t)
    }
}

/// Per-blob values hoisted out of the cell loop. Reused across frames.
#[derive(Clone, Debug, Default)]
pub struct BlobScratch {
    centers_x: Vec<f32>,
    centers_y: Vec<f32>,
    cos: Vec<f32>,
    sin: Vec<f32>,
    inv_radius_x: Vec<f32>,
    inv_radius_y: Vec<f32>,
    intensity: Vec<f32>,
}

impl BlobScratch {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            centers_x: Vec::with_capacity(n),
            centers_y: Vec::with_capacity(n),
            cos: Vec::with_capacity(n),
            sin: Vec::with_capacity(n),
            inv_radius_x: Vec::with_capacity(n),
            inv_radius_y: Vec::with_capacity(n),
            intensity: Vec::with_capacity(n),
        }
    }

    fn clear(&mut self) {
        self.centers_x.clear();
        self.centers_y.clear();
        self.cos.clear();
        self.sin.clear();
        self.inv_radius_x.clear();
        self.inv_radius_y.clear();
        self.intensity.clear();
    }

    pub fn fill(&mut self, blobs: &[Blob], now: f64, fade_in_duration: f32) {
        self.clear();
        for blob in blobs {
            let pulse = 1.0
                + (now * blob.wobble_speed as f64 + blob.wobble_phase as f64).sin() as f32
                    * blob.wobble_amplitude;
            let radius_x = (blob.base_radius_x * pulse).max(MIN_RADIUS);
            let radius_y = (blob.base_radius_y * pulse).max(MIN_RADIUS);

            self.centers_x.push(blob.cx);
            self.centers_y.push(blob.cy);
            self.cos.push(blob.rotation.cos());
            self.sin.push(blob.rotation.sin());
            self.inv_radius_x.push(1.0 / radius_x);
            self.inv_radius_y.push(1.0 / radius_y);
            self.intensity.push(blob.intensity * blob.envelope(fade_in_duration));
        }
    }

    pub fn len(&self) -> usize {
        self.intensity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensity.is_empty()
    }

    /// Base brightness plus every live blob's contribution at a lattice position.
    #[inline]
    fn accumulate(&self, base: f32, col: f32, row: f32, falloff: &FalloffTable) -> f32 {
        let mut brightness = base;
        for b in 0..self.len() {
            let intensity = self.intensity[b];
            if intensity <= 0.0 {
                continue;
            }
            let dx = col - self.centers_x[b];
            let dy = row - self.centers_y[b];
            let lx = (dx * self.cos[b] - dy * self.sin[b]) * self.inv_radius_x[b];
            let ly = (dx * self.sin[b] + dy * self.cos[b]) * self.inv_radius_y[b];
            let influence = falloff.sample(lx * lx + ly * ly);
            if influence <= 0.0 {
                continue;
            }
            brightness += influence * intensity;
        }
        brightness
    }
}

/// Owns the scratch buffers; one per engine.
#[derive(Debug, Default)]
pub struct Compositor {
    scratch: BlobScratch,
    last_draws: usize,
}

impl Compositor {
    pub fn new(blob_count: usize) -> Self {
        Self {
            scratch: BlobScratch::with_capacity(blob_count),
            last_draws: 0,
        }
    }

    /// Glyphs drawn by the most recent `render`.
    pub fn last_draws(&self) -> usize {
        self.last_draws
    }

    pub fn render<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        scene: &Scene<'_>,
        now: f64,
        reveal_elapsed: f32,
        opts: &FrameOptions,
    ) {
        let lattice = scene.lattice;
        let palette_size = scene.atlas.len();
        let half = opts.cell_size / 2.0;

        surface.set_alpha(1.0);
        surface.clear();

        self.scratch.fill(scene.blobs, now, opts.fade_in_duration);
        let mut draws = 0;

        for idx in 0..lattice.cell_count {
            let eased = reveal_progress(reveal_elapsed, scene.reveal.get(idx), opts.reveal_fade);
            if eased <= 0.0 {
                continue;
            }

            let raw = self.scratch.accumulate(
                lattice.base_brightness[idx],
                lattice.cell_columns[idx],
                lattice.cell_rows[idx],
                scene.falloff,
            );
            let brightness = raw.clamp(0.0, 1.0) * eased;

            let shade = pick_shade_index(
                brightness,
                lattice.jitter[idx],
                lattice.palette_bias[idx],
                palette_size,
            );
            if shade == 0 {
                continue;
            }
            let Some(glyph) = scene.atlas.get(shade) else {
                continue;
            };

            let alpha = (0.1 + brightness * 0.56) * eased;
            if alpha <= ALPHA_EPSILON {
                continue;
            }

            surface.set_alpha(alpha);
            surface.draw_glyph(
                glyph,
                lattice.centers_x[idx] - half,
                lattice.centers_y[idx] - half,
                opts.cell_size,
                opts.cell_size,
            );
            draws += 1;
        }

        surface.set_alpha(1.0);
        self.last_draws = draws;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{AtlasOptions, GlyphImage};
    use crate::config::BlobBehavior;
    use rand::{rngs::StdRng, SeedableRng};

    #[derive(Default)]
    struct Recorder {
        clears: usize,
        alpha: f32,
        draws: Vec<(char, f32, f32, f32)>,
    }

    impl Surface for Recorder {
        fn clear(&mut self) {
            self.clears += 1;
            self.draws.clear();
        }
        fn set_alpha(&mut self, alpha: f32) {
            self.alpha = alpha;
        }
        fn draw_glyph(&mut self, glyph: &GlyphImage, x: f32, y: f32, _w: f32, _h: f32) {
            self.draws.push((glyph.ch, self.alpha, x, y));
        }
    }

    const PALETTE: &str = " .,:;!~+=xoX#";

    struct Fixture {
        lattice: Lattice,
        atlas: GlyphAtlas,
        falloff: FalloffTable,
        opts: FrameOptions,
    }

    fn fixture() -> Fixture {
        let mut rng = StdRng::seed_from_u64(7);
        let chars: Vec<char> = PALETTE.chars().collect();
        Fixture {
            lattice: Lattice::build(280.0, 140.0, 14.0, &mut rng),
            atlas: GlyphAtlas::build(1.0, &chars, &AtlasOptions::default()),
            falloff: FalloffTable::default(),
            opts: FrameOptions {
                cell_size: 14.0,
                reveal_fade: 400.0,
                fade_in_duration: 2000.0,
            },
        }
    }

    fn still_blob(cx: f32, cy: f32) -> Blob {
        let mut b = Blob::spawn(10, 10, &BlobBehavior::default(), false, &mut StdRng::seed_from_u64(1));
        b.cx = cx;
        b.cy = cy;
        b.intensity = 0.45;
        b.wobble_amplitude = 0.0;
        b.max_life = 10_000.0;
        b.life = 5_000.0;
        b
    }

    #[test]
    fn shade_index_endpoints() {
        assert_eq!(pick_shade_index(0.0, 0.0, 0.0, 12), 0);
        assert_eq!(pick_shade_index(1.0, 0.0, 0.0, 12), 11);
        for i in 0..=20 {
            let idx = pick_shade_index(i as f32 / 20.0, 0.05, 0.5, 12);
            assert!(idx < 12);
        }
        assert_eq!(pick_shade_index(5.0, 1.0, 1.0, 12), 11);
        assert_eq!(pick_shade_index(-3.0, -1.0, -0.5, 12), 0);
        assert_eq!(pick_shade_index(0.5, 0.0, 0.0, 0), 0);
    }

    #[test]
    fn reveal_is_eased() {
        assert_eq!(reveal_progress(0.0, 100.0, 400.0), 0.0);
        assert_eq!(reveal_progress(100.0, 100.0, 400.0), 0.0);
        assert!((reveal_progress(300.0, 100.0, 400.0) - 0.5).abs() < 1e-6);
        // slower than linear at the start
        assert!(reveal_progress(140.0, 100.0, 400.0) < 0.1);
        assert_eq!(reveal_progress(10_000.0, 100.0, 400.0), 1.0);
    }

    #[test]
    fn unrevealed_cells_draw_nothing() {
        let f = fixture();
        let reveal = RevealDelays::uniform(f.lattice.cell_count, 5_000.0);
        let blobs = vec![still_blob(10.0, 8.0)];
        let scene = Scene {
            lattice: &f.lattice,
            reveal: &reveal,
            blobs: &blobs,
            atlas: &f.atlas,
            falloff: &f.falloff,
        };
        let mut surface = Recorder::default();
        let mut comp = Compositor::new(1);
        comp.render(&mut surface, &scene, 0.0, 4_999.0, &f.opts);
        assert!(surface.draws.is_empty());
        assert_eq!(comp.last_draws(), 0);
        assert_eq!(surface.clears, 1);
        assert_eq!(surface.alpha, 1.0);
    }

    #[test]
    fn revealed_cells_draw_centered_glyphs() {
        let f = fixture();
        let reveal = RevealDelays::uniform(f.lattice.cell_count, 0.0);
        let scene = Scene {
            lattice: &f.lattice,
            reveal: &reveal,
            blobs: &[],
            atlas: &f.atlas,
            falloff: &f.falloff,
        };
        let mut surface = Recorder::default();
        let mut comp = Compositor::new(0);
        comp.render(&mut surface, &scene, 0.0, 10_000.0, &f.opts);

        assert!(!surface.draws.is_empty());
        assert_eq!(comp.last_draws(), surface.draws.len());
        for &(ch, alpha, x, y) in &surface.draws {
            assert_ne!(ch, ' ');
            assert!(alpha > ALPHA_EPSILON && alpha <= 0.66 + 1e-6);
            // top-left of a cell: offset by a whole number of cells from the origin
            let col = (x - f.lattice.offset_x) / 14.0;
            let row = (y - f.lattice.offset_y) / 14.0;
            assert!((col - col.round()).abs() < 1e-3 && (row - row.round()).abs() < 1e-3);
        }
        assert_eq!(surface.alpha, 1.0);
    }

    #[test]
    fn blob_brightens_cells_near_its_center() {
        let f = fixture();
        let reveal = RevealDelays::uniform(f.lattice.cell_count, 0.0);
        let mut scratch = BlobScratch::default();
        let blob = still_blob(10.0, 8.0);
        scratch.fill(std::slice::from_ref(&blob), 0.0, 2000.0);
        assert_eq!(scratch.len(), 1);

        let near = scratch.accumulate(0.14, 10.0, 8.0, &f.falloff);
        let far = scratch.accumulate(0.14, 10.0 + 500.0, 8.0, &f.falloff);
        assert!((near - (0.14 + 0.45)).abs() < 1e-4);
        assert_eq!(far, 0.14);

        // and the composited frame picks denser glyphs with more blob light
        let dark = Scene {
            lattice: &f.lattice,
            reveal: &reveal,
            blobs: &[],
            atlas: &f.atlas,
            falloff: &f.falloff,
        };
        let blobs = vec![blob];
        let lit = Scene {
            blobs: &blobs,
            ..dark
        };
        let mean_alpha = |scene: &Scene<'_>| {
            let mut s = Recorder::default();
            Compositor::new(1).render(&mut s, scene, 0.0, 10_000.0, &f.opts);
            s.draws.iter().map(|d| d.1).sum::<f32>() / s.draws.len().max(1) as f32
        };
        assert!(mean_alpha(&lit) > mean_alpha(&dark));
    }

    #[test]
    fn envelope_gates_newborn_blobs() {
        let f = fixture();
        let mut blob = still_blob(10.0, 8.0);
        blob.life = blob.max_life;
        let mut scratch = BlobScratch::default();
        scratch.fill(std::slice::from_ref(&blob), 0.0, 2000.0);
        assert_eq!(scratch.accumulate(0.2, 10.0, 8.0, &f.falloff), 0.2);
    }

    #[test]
    fn pulse_never_shrinks_below_floor() {
        let mut blob = still_blob(0.0, 0.0);
        blob.base_radius_x = 1.0;
        blob.base_radius_y = 1.0;
        let mut scratch = BlobScratch::default();
        scratch.fill(&[blob], 0.0, 0.0);
        assert_eq!(scratch.inv_radius_x[0], 1.0 / MIN_RADIUS);
        assert_eq!(scratch.inv_radius_y[0], 1.0 / MIN_RADIUS);
    }
}
