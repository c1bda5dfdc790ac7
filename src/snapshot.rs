//! Headless host: run the engine on a software canvas and write the result as PNG.

use std::path::Path;

use image::{ImageFormat, RgbaImage};

use crate::color::Rgba;
use crate::config::Settings;
use crate::engine::{Engine, Viewport};
use crate::error::{FogError, Result};
use crate::surface::PixelCanvas;

/// Simulated frame step.
pub const STEP_MS: f64 = 16.0;
/// Largest logical side length; larger requests are clamped.
pub const MAX_SIDE: u32 = 8_192;

#[derive(Clone, Debug)]
pub struct SnapshotOptions {
    /// Logical pixels.
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    /// Simulated time at which the frame is captured.
    pub time_ms: f64,
    pub seed: Option<u64>,
}

/// Step a fresh engine to `time_ms` and composite the frame at that instant.
pub fn render(settings: &Settings, opts: &SnapshotOptions) -> Result<PixelCanvas> {
    let (w, h) = (opts.width.min(MAX_SIDE) as f32, opts.height.min(MAX_SIDE) as f32);
    let mut canvas = PixelCanvas::new(w, h, opts.scale)?;
    let mut engine = Engine::new(settings, Viewport::new(w, h, canvas.scale()), 0.0, opts.seed);

    let end = if opts.time_ms.is_finite() { opts.time_ms.max(0.0) } else { 0.0 };
    let mut t = 0.0;
    while t < end {
        t = (t + STEP_MS).min(end);
        engine.tick(t, &mut canvas);
    }
    engine.render_now(&mut canvas, end);
    tracing::debug!(time_ms = end, draws = engine.last_draws(), "snapshot composited");
    engine.destroy();
    Ok(canvas)
}

pub fn write_png(canvas: &PixelCanvas, background: Rgba, path: &Path) -> Result<()> {
    let bytes = canvas.to_rgba8(background);
    let img = RgbaImage::from_raw(canvas.w, canvas.h, bytes).ok_or_else(|| {
        FogError::SurfaceUnavailable(format!("canvas {}x{} has a short buffer", canvas.w, canvas.h))
    })?;
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
