//! One fog instance: owns the lattice, atlas, falloff table, blobs and timers, and
//! turns host frame callbacks into simulation steps and composited frames.

use rand::{rngs::StdRng, SeedableRng};

use crate::atlas::{build_character_lut, AtlasOptions, GlyphAtlas};
use crate::blob::Blob;
use crate::compositor::{Compositor, FrameOptions, Scene};
use crate::config::Settings;
use crate::falloff::FalloffTable;
use crate::grid::{Lattice, RevealDelays};
use crate::surface::Surface;

/// Quiet period before a burst of resize notifications is applied.
pub const RESIZE_DEBOUNCE_MS: f64 = 180.0;
/// Longest step the simulation takes, so a stalled host does not teleport blobs.
pub const MAX_DELTA_MS: f64 = 120.0;

/// Logical size of the drawing area plus its device scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32, scale: f32) -> Self {
        let scale = if scale.is_finite() { scale.clamp(0.5, 4.0) } else { 1.0 };
        Self {
            width,
            height,
            scale,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub blob_count: usize,
    pub fps: u32,
    pub paused: bool,
    /// Blobs replaced after expiring.
    pub spawned: u64,
}

#[derive(Clone, Debug, PartialEq)]
struct AtlasKey {
    scale: f32,
    characters: Vec<char>,
    options: AtlasOptions,
}

#[derive(Clone, Copy, Debug)]
struct PendingResize {
    viewport: Viewport,
    due: f64,
}

pub struct Engine {
    settings: Settings,
    viewport: Viewport,
    rng: StdRng,
    characters: Vec<char>,
    lattice: Lattice,
    reveal: RevealDelays,
    atlas: GlyphAtlas,
    atlas_key: AtlasKey,
    atlas_generation: u64,
    falloff: FalloffTable,
    blobs: Vec<Blob>,
    compositor: Compositor,

    paused: bool,
    last_timestamp: f64,
    last_draw: f64,
    reveal_start: f64,
    fps: u32,
    frame_count: u32,
    fps_timestamp: f64,
    pending_resize: Option<PendingResize>,
    spawned: u64,
}

impl Engine {
    /// `seed` makes the whole animation reproducible; `None` draws one from entropy.
    pub fn new(settings: &Settings, viewport: Viewport, now: f64, seed: Option<u64>) -> Self {
        let settings = settings.sanitized();
        let seed = seed.or(settings.seed).unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);

        let characters = build_character_lut(&settings.palette(), &mut rng);
        let atlas_key = AtlasKey {
            scale: viewport.scale,
            characters: characters.clone(),
            options: AtlasOptions::from_settings(&settings),
        };
        let atlas = GlyphAtlas::build(atlas_key.scale, &atlas_key.characters, &atlas_key.options);
        let falloff = FalloffTable::with_size(settings.performance.falloff_table_size);
        let lattice = Lattice::build(
            viewport.width,
            viewport.height,
            settings.performance.cell_size,
            &mut rng,
        );
        let reveal = RevealDelays::uniform(lattice.cell_count, 0.0);

        let mut engine = Self {
            compositor: Compositor::new(settings.blob.count),
            settings,
            viewport,
            rng,
            characters,
            lattice,
            reveal,
            atlas,
            atlas_key,
            atlas_generation: 1,
            falloff,
            blobs: Vec::new(),
            paused: false,
            last_timestamp: now,
            last_draw: now,
            reveal_start: now,
            fps: 0,
            frame_count: 0,
            fps_timestamp: now,
            pending_resize: None,
            spawned: 0,
        };
        engine.populate(now);
        tracing::info!(
            seed,
            columns = engine.lattice.columns,
            rows = engine.lattice.rows,
            blobs = engine.blobs.len(),
            "fog engine ready"
        );
        engine
    }

    /// Fresh reveal delays and a warm-started population on the current lattice.
    fn populate(&mut self, now: f64) {
        let anim = &self.settings.animation;
        self.reveal = RevealDelays::build(
            self.lattice.cell_count,
            anim.reveal_fade,
            anim.reveal_duration,
            &mut self.rng,
        );
        self.spawn_population(now);
    }

    fn spawn_population(&mut self, now: f64) {
        let (columns, rows) = (self.lattice.columns, self.lattice.rows);
        self.blobs = (0..self.settings.blob.count)
            .map(|_| Blob::spawn(columns, rows, &self.settings.blob, true, &mut self.rng))
            .collect();
        self.reveal_start = now;
        self.last_timestamp = now;
        self.last_draw = now;
    }

    /// Replace the lattice wholesale for the current viewport, then the atlas if its
    /// inputs changed.
    fn rebuild(&mut self, now: f64) {
        self.lattice = Lattice::build(
            self.viewport.width,
            self.viewport.height,
            self.settings.performance.cell_size,
            &mut self.rng,
        );
        self.refresh_atlas();
        self.populate(now);
        tracing::info!(
            columns = self.lattice.columns,
            rows = self.lattice.rows,
            "lattice rebuilt"
        );
    }

    /// Rebuild the atlas when scale, palette, cell size or colors differ from the
    /// inputs it was built from.
    fn refresh_atlas(&mut self) -> bool {
        let key = AtlasKey {
            scale: self.viewport.scale,
            characters: self.characters.clone(),
            options: AtlasOptions::from_settings(&self.settings),
        };
        if key == self.atlas_key {
            return false;
        }
        self.atlas = GlyphAtlas::build(key.scale, &key.characters, &key.options);
        self.atlas_key = key;
        self.atlas_generation += 1;
        true
    }

    fn respawn(&mut self, i: usize) {
        let (columns, rows) = (self.lattice.columns, self.lattice.rows);
        self.blobs[i] = Blob::spawn(columns, rows, &self.settings.blob, false, &mut self.rng);
        self.spawned += 1;
        let b = &self.blobs[i];
        tracing::trace!(slot = i, cx = b.cx, cy = b.cy, life = b.max_life, "blob spawned");
    }

    /// One host frame. Returns whether a frame was composited onto `surface`.
    pub fn tick<S: Surface + ?Sized>(&mut self, now: f64, surface: &mut S) -> bool {
        if let Some(pending) = self.pending_resize {
            if now >= pending.due {
                self.pending_resize = None;
                self.viewport = pending.viewport;
                self.rebuild(now);
            }
        }

        if self.paused {
            return false;
        }

        let delta = (now - self.last_timestamp).clamp(0.0, MAX_DELTA_MS) as f32;
        self.last_timestamp = now;

        self.frame_count += 1;
        let window = now - self.fps_timestamp;
        if window >= 1000.0 {
            self.fps = (self.frame_count as f64 * 1000.0 / window).round() as u32;
            self.frame_count = 0;
            self.fps_timestamp = now;
        }

        let reveal_elapsed = (now - self.reveal_start).max(0.0) as f32;
        let reveal_duration = self.settings.animation.reveal_duration;
        // blobs hold still while the lattice materializes
        let movement = if reveal_duration > 0.0 {
            (reveal_elapsed / reveal_duration).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let step = delta * movement;

        let (columns, rows) = (self.lattice.columns, self.lattice.rows);
        for i in 0..self.blobs.len() {
            if self.blobs[i].is_expired() {
                self.respawn(i);
                continue;
            }
            self.blobs[i].update(step, columns, rows, now);
            if self.blobs[i].is_expired() {
                self.respawn(i);
            }
        }

        if now - self.last_draw >= self.settings.frame_interval() as f64 {
            self.draw(surface, now, reveal_elapsed);
            self.last_draw = now;
            return true;
        }
        false
    }

    /// Composite immediately, ignoring the frame interval and pause state.
    pub fn render_now<S: Surface + ?Sized>(&mut self, surface: &mut S, now: f64) {
        let reveal_elapsed = (now - self.reveal_start).max(0.0) as f32;
        self.draw(surface, now, reveal_elapsed);
        self.last_draw = now;
    }

    fn draw<S: Surface + ?Sized>(&mut self, surface: &mut S, now: f64, reveal_elapsed: f32) {
        let scene = Scene {
            lattice: &self.lattice,
            reveal: &self.reveal,
            blobs: &self.blobs,
            atlas: &self.atlas,
            falloff: &self.falloff,
        };
        let opts = FrameOptions {
            cell_size: self.settings.performance.cell_size,
            reveal_fade: self.settings.animation.reveal_fade,
            fade_in_duration: self.settings.blob.fade_in_duration,
        };
        self.compositor.render(surface, &scene, now, reveal_elapsed, &opts);
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// `now` becomes the new delta baseline so the pause does not count as elapsed time.
    pub fn resume(&mut self, now: f64) {
        self.paused = false;
        self.last_timestamp = now;
    }

    /// Warm-start a new population and replay the reveal.
    pub fn reset(&mut self, now: f64) {
        self.spawn_population(now);
    }

    pub fn stats(&self) -> Stats {
        Stats {
            blob_count: self.blobs.len(),
            fps: self.fps,
            paused: self.paused,
            spawned: self.spawned,
        }
    }

    /// Debounced: bursts of calls collapse into one rebuild once `RESIZE_DEBOUNCE_MS`
    /// pass without another request. Applied at the start of a later `tick`.
    pub fn request_resize(&mut self, viewport: Viewport, now: f64) {
        if self.pending_resize.is_none() && viewport == self.viewport {
            return;
        }
        if self.pending_resize.is_some() {
            tracing::debug!(width = viewport.width, height = viewport.height, "resize coalesced");
        }
        self.pending_resize = Some(PendingResize {
            viewport,
            due: now + RESIZE_DEBOUNCE_MS,
        });
    }

    /// Swap in new settings, rebuilding only what depends on the changed values.
    pub fn reconfigure(&mut self, settings: &Settings, now: f64) {
        let next = settings.sanitized();
        let prev = std::mem::replace(&mut self.settings, next);
        let cur = &self.settings;

        if cur.characters != prev.characters {
            self.characters = build_character_lut(&cur.palette(), &mut self.rng);
        }
        if cur.performance.falloff_table_size != prev.performance.falloff_table_size {
            self.falloff = FalloffTable::with_size(cur.performance.falloff_table_size);
        }

        if cur.performance.cell_size != prev.performance.cell_size {
            self.rebuild(now);
            return;
        }

        self.refresh_atlas();
        let target = self.settings.blob.count;
        if target < self.blobs.len() {
            self.blobs.truncate(target);
        } else {
            let (columns, rows) = (self.lattice.columns, self.lattice.rows);
            while self.blobs.len() < target {
                let b = Blob::spawn(columns, rows, &self.settings.blob, true, &mut self.rng);
                self.blobs.push(b);
            }
        }
    }

    /// Tear down. Any pending resize is dropped with the engine.
    pub fn destroy(self) {
        if self.pending_resize.is_some() {
            tracing::debug!("dropping pending resize");
        }
        tracing::info!(spawned = self.spawned, "fog engine destroyed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }

    pub fn atlas(&self) -> &GlyphAtlas {
        &self.atlas
    }

    /// Bumped every time the atlas is rebuilt.
    pub fn atlas_generation(&self) -> u64 {
        self.atlas_generation
    }

    pub fn characters(&self) -> &[char] {
        &self.characters
    }

    pub fn has_pending_resize(&self) -> bool {
        self.pending_resize.is_some()
    }

    pub fn last_draws(&self) -> usize {
        self.compositor.last_draws()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::GlyphImage;

    #[derive(Default)]
    struct Counter {
        clears: usize,
        draws: usize,
    }

    impl Surface for Counter {
        fn clear(&mut self) {
            self.clears += 1;
        }
        fn set_alpha(&mut self, _alpha: f32) {}
        fn draw_glyph(&mut self, _g: &GlyphImage, _x: f32, _y: f32, _w: f32, _h: f32) {
            self.draws += 1;
        }
    }

    fn settings() -> Settings {
        let mut s = Settings::default();
        s.performance.offscreen_atlas = false;
        s
    }

    fn engine() -> Engine {
        Engine::new(&settings(), Viewport::new(420.0, 280.0, 1.0), 0.0, Some(42))
    }

    #[test]
    fn builds_everything_up_front() {
        let e = engine();
        assert_eq!(e.blobs().len(), 8);
        assert_eq!(e.lattice().columns, 30 + 6);
        assert_eq!(e.lattice().rows, 20 + 6);
        assert_eq!(e.atlas().len(), e.settings().characters.chars().count());
        assert!(e.atlas().get(0).is_none());
        assert_eq!(e.stats(), Stats { blob_count: 8, fps: 0, paused: false, spawned: 0 });
    }

    #[test]
    fn same_seed_same_animation() {
        let a = engine();
        let b = engine();
        assert_eq!(a.blobs(), b.blobs());
        assert_eq!(a.lattice().base_brightness, b.lattice().base_brightness);
    }

    #[test]
    fn frames_follow_interval() {
        let mut e = engine();
        let mut s = Counter::default();
        assert!(!e.tick(16.0, &mut s));
        assert!(!e.tick(32.0, &mut s));
        assert!(e.tick(48.0, &mut s));
        assert!(!e.tick(64.0, &mut s));
        assert_eq!(s.clears, 1);
    }

    #[test]
    fn blobs_hold_still_during_reveal_start() {
        let mut e = engine();
        let before = e.blobs().to_vec();
        let mut s = Counter::default();
        e.tick(0.0, &mut s);
        assert_eq!(e.blobs(), &before[..]);
        e.tick(600.0, &mut s);
        assert_ne!(e.blobs()[0].cx, before[0].cx);
    }

    #[test]
    fn pause_freezes_everything() {
        let mut e = engine();
        let mut s = Counter::default();
        e.tick(2000.0, &mut s);
        e.pause();
        let frozen = e.blobs().to_vec();
        for t in 1..50 {
            assert!(!e.tick(2000.0 + t as f64 * 100.0, &mut s));
        }
        assert_eq!(e.blobs(), &frozen[..]);
        assert!(e.stats().paused);

        e.resume(10_000.0);
        e.tick(10_016.0, &mut s);
        // only the 16 ms since resuming were simulated
        let lost = frozen[0].life - e.blobs()[0].life;
        assert!(lost > 0.0 && lost < 16.0 * 6.0);
    }

    #[test]
    fn reset_replays_reveal() {
        let mut e = engine();
        let mut s = Counter::default();
        e.tick(5000.0, &mut s);
        e.render_now(&mut s, 5000.0);
        assert!(s.draws > 0);

        e.reset(6000.0);
        s.draws = 0;
        e.render_now(&mut s, 6000.0);
        assert_eq!(s.draws, 0);
        assert_eq!(e.blobs().len(), 8);
    }

    #[test]
    fn expired_blobs_are_replaced_cold() {
        let mut e = engine();
        let mut s = Counter::default();
        e.tick(2000.0, &mut s);
        e.blobs[3].life = 1.0;
        e.tick(2100.0, &mut s);
        let b = &e.blobs()[3];
        assert_eq!(b.life, b.max_life);
        assert_eq!(e.stats().spawned, 1);
        assert!(e.blobs().iter().all(|b| b.life > 0.0));
    }

    #[test]
    fn resize_is_debounced() {
        let mut e = engine();
        let mut s = Counter::default();
        let columns = e.lattice().columns;

        e.request_resize(Viewport::new(500.0, 280.0, 1.0), 100.0);
        e.tick(150.0, &mut s);
        e.request_resize(Viewport::new(560.0, 280.0, 1.0), 200.0);
        e.tick(300.0, &mut s);
        assert_eq!(e.lattice().columns, columns);
        assert!(e.has_pending_resize());

        e.tick(380.0, &mut s);
        assert!(!e.has_pending_resize());
        assert_eq!(e.lattice().columns, 40 + 6);
        assert_eq!(e.viewport().width, 560.0);
        // scale did not change, so the atlas survives
        assert_eq!(e.atlas_generation(), 1);
    }

    #[test]
    fn resize_to_current_viewport_is_ignored() {
        let mut e = engine();
        e.request_resize(e.viewport(), 10.0);
        assert!(!e.has_pending_resize());
    }

    #[test]
    fn scale_change_rebuilds_atlas() {
        let mut e = engine();
        let mut s = Counter::default();
        e.request_resize(Viewport::new(420.0, 280.0, 2.0), 0.0);
        e.tick(200.0, &mut s);
        assert_eq!(e.atlas_generation(), 2);
        assert_eq!(e.atlas().pixel_size(), 28);
    }

    #[test]
    fn reconfigure_invalidates_only_what_changed() {
        let mut e = engine();
        let mut next = e.settings().clone();
        e.reconfigure(&next, 0.0);
        assert_eq!(e.atlas_generation(), 1);

        next.blob.count = 3;
        e.reconfigure(&next, 0.0);
        assert_eq!(e.blobs().len(), 3);
        assert_eq!(e.atlas_generation(), 1);

        next.colors.primary = "#ff00ff".into();
        e.reconfigure(&next, 0.0);
        assert_eq!(e.atlas_generation(), 2);

        next.characters = " .:#".into();
        e.reconfigure(&next, 0.0);
        assert_eq!(e.atlas_generation(), 3);
        assert_eq!(e.atlas().len(), 4);

        let columns = e.lattice().columns;
        next.performance.cell_size = 28.0;
        e.reconfigure(&next, 0.0);
        assert_ne!(e.lattice().columns, columns);
        assert_eq!(e.atlas().pixel_size(), 28);
        assert_eq!(e.blobs().len(), 3);
    }

    #[test]
    fn absurd_cell_size_is_capped_before_allocating() {
        let mut s = settings();
        s.characters = " #".into();
        s.performance.enable_blur = false;
        s.performance.cell_size = 100_000.0;
        let e = Engine::new(&s, Viewport::new(420.0, 280.0, 1.0), 0.0, Some(1));
        assert_eq!(e.settings().performance.cell_size, 256.0);
        assert_eq!(e.atlas().pixel_size(), 256);
        assert_eq!(e.lattice().columns, 2 + 6);
    }

    #[test]
    fn destroy_consumes() {
        let mut e = engine();
        e.request_resize(Viewport::new(10.0, 10.0, 1.0), 0.0);
        e.destroy();
    }
}
