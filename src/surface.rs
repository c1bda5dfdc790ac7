//! Drawing surfaces the compositor can target.

use crate::atlas::GlyphImage;
use crate::color::Rgba;
use crate::error::{FogError, Result};

/// Minimal 2D target: clear, a global alpha, and a scaled image blit.
/// Coordinates are logical pixels; the surface applies its own device scale.
pub trait Surface {
    fn clear(&mut self);
    fn set_alpha(&mut self, alpha: f32);
    /// Draw `glyph` stretched over the logical rect at the current alpha.
    fn draw_glyph(&mut self, glyph: &GlyphImage, x: f32, y: f32, w: f32, h: f32);
}

/// Software RGBA target with straight alpha, sized in device pixels.
pub struct PixelCanvas {
    pub w: u32,
    pub h: u32,
    scale: f32,
    alpha: f32,
    px: Vec<[f32; 4]>,
}

impl PixelCanvas {
    /// `width`/`height` are logical pixels.
    pub fn new(width: f32, height: f32, scale: f32) -> Result<Self> {
        let scale = if scale.is_finite() { scale.clamp(0.5, 4.0) } else { 1.0 };
        let w = (width.max(0.0) * scale).floor() as u32;
        let h = (height.max(0.0) * scale).floor() as u32;
        if w == 0 || h == 0 {
            return Err(FogError::SurfaceUnavailable(format!(
                "canvas of {width}x{height} at scale {scale} has no pixels"
            )));
        }
        Ok(Self {
            w,
            h,
            scale,
            alpha: 1.0,
            px: vec![[0.0; 4]; (w as usize) * (h as usize)],
        })
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    #[inline]
    pub fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.px[self.idx(x, y)]
    }

    fn blend_over(&mut self, x: i64, y: i64, src: [f32; 4]) {
        if x < 0 || y < 0 || x >= self.w as i64 || y >= self.h as i64 {
            return;
        }
        let i = self.idx(x as u32, y as u32);
        let dst = self.px[i];

        let sa = src[3];
        let da = dst[3];
        let out_a = sa + da * (1.0 - sa);
        if out_a <= 1e-6 {
            self.px[i] = [0.0; 4];
            return;
        }
        let blend = |sc: f32, dc: f32| (sc * sa + dc * da * (1.0 - sa)) / out_a;
        self.px[i] = [
            blend(src[0], dst[0]),
            blend(src[1], dst[1]),
            blend(src[2], dst[2]),
            out_a.clamp(0.0, 1.0),
        ];
    }

    /// Flatten onto an opaque background as 8-bit RGBA rows.
    pub fn to_rgba8(&self, background: Rgba) -> Vec<u8> {
        let bg = [
            background.r as f32 / 255.0,
            background.g as f32 / 255.0,
            background.b as f32 / 255.0,
        ];
        let mut out = Vec::with_capacity(self.px.len() * 4);
        for p in &self.px {
            let a = p[3];
            for k in 0..3 {
                let v = p[k] * a + bg[k] * (1.0 - a);
                out.push((v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8);
            }
            out.push(255);
        }
        out
    }
}

impl Surface for PixelCanvas {
    fn clear(&mut self) {
        self.px.fill([0.0; 4]);
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    fn draw_glyph(&mut self, glyph: &GlyphImage, x: f32, y: f32, w: f32, h: f32) {
        if glyph.size == 0 || self.alpha <= 0.0 {
            return;
        }
        let x0 = (x * self.scale).round() as i64;
        let y0 = (y * self.scale).round() as i64;
        let dw = ((w * self.scale).round() as i64).max(1);
        let dh = ((h * self.scale).round() as i64).max(1);
        let size = glyph.size as i64;

        for dy in 0..dh {
            let sy = (dy * size / dh).min(size - 1) as u32;
            for dx in 0..dw {
                let sx = (dx * size / dw).min(size - 1) as u32;
                let mut p = glyph.pixel(sx, sy);
                if p[3] <= 0.0 {
                    continue;
                }
                p[3] *= self.alpha;
                self.blend_over(x0 + dx, y0 + dy, p);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(size: u32) -> GlyphImage {
        GlyphImage {
            ch: '#',
            size,
            pixels: vec![[1.0, 0.0, 0.0, 1.0]; (size * size) as usize],
            tint: Rgba::rgb(255, 0, 0),
        }
    }

    #[test]
    fn zero_area_is_unavailable() {
        assert!(matches!(
            PixelCanvas::new(0.0, 100.0, 1.0),
            Err(FogError::SurfaceUnavailable(_))
        ));
        assert!(PixelCanvas::new(10.0, 10.0, 1.0).is_ok());
    }

    #[test]
    fn draw_respects_alpha_and_scale() {
        let mut c = PixelCanvas::new(20.0, 20.0, 2.0).unwrap();
        assert_eq!((c.w, c.h), (40, 40));
        c.set_alpha(0.5);
        c.draw_glyph(&solid(4), 2.0, 2.0, 4.0, 4.0);
        let inside = c.pixel(5, 5);
        assert!((inside[3] - 0.5).abs() < 1e-6);
        assert_eq!(inside[0], 1.0);
        assert_eq!(c.pixel(3, 3)[3], 0.0);
        assert_eq!(c.pixel(12, 12)[3], 0.0);
    }

    #[test]
    fn clipped_at_edges() {
        let mut c = PixelCanvas::new(8.0, 8.0, 1.0).unwrap();
        c.draw_glyph(&solid(8), -4.0, -4.0, 8.0, 8.0);
        c.draw_glyph(&solid(8), 6.0, 6.0, 8.0, 8.0);
        assert_eq!(c.pixel(0, 0)[3], 1.0);
        assert_eq!(c.pixel(7, 7)[3], 1.0);
        assert_eq!(c.pixel(4, 4)[3], 0.0);
    }

    #[test]
    fn flatten_over_background() {
        let mut c = PixelCanvas::new(2.0, 1.0, 1.0).unwrap();
        c.draw_glyph(&solid(1), 0.0, 0.0, 1.0, 1.0);
        let bytes = c.to_rgba8(Rgba::rgb(0, 0, 255));
        assert_eq!(&bytes[0..4], &[255, 0, 0, 255]);
        assert_eq!(&bytes[4..8], &[0, 0, 255, 255]);
        c.clear();
        assert_eq!(c.pixel(0, 0), [0.0; 4]);
    }
}
