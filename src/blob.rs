//! Blob lifecycle: spawn at an edge, drift inward, wobble, fade, expire.

use std::f32::consts::TAU;

use rand::Rng;

use crate::config::BlobBehavior;

/// Soft bound (cells outside the lattice) past which life drains faster.
pub const WRAP_MARGIN: f32 = 8.0;
/// Hard bound; also where new blobs appear.
pub const SPAWN_MARGIN: f32 = 18.0;
/// Spawn heading aims at a point inside this band of each axis.
pub const INTERIOR_MIN: f32 = 0.18;
pub const INTERIOR_MAX: f32 = 0.82;

const SOFT_LEAK: f32 = 1.45;
const HARD_LEAK: f32 = 3.5;

// Working range the user-facing radius/speed bounds are remapped onto.
const INTERNAL_RADIUS_MIN: f32 = 30.0;
const INTERNAL_RADIUS_MAX: f32 = 56.0;
const INTERNAL_SPEED_MIN: f32 = 0.0018;
const INTERNAL_SPEED_MAX: f32 = 0.0031;

const HEADING_JITTER: f32 = 0.35;

/// Uniform sample in `[min, max)`; tolerates `min == max` and reversed bounds.
pub fn random_between<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    min + rng.gen::<f32>() * (max - min)
}

fn remap(value: f32, base_min: f32, base_max: f32, target_min: f32, target_max: f32) -> f32 {
    if !value.is_finite() {
        return target_min;
    }
    let range = base_max - base_min;
    if range.abs() < 1e-6 {
        return target_min;
    }
    let t = (value - base_min) / range;
    target_min + t * (target_max - target_min)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnPoint {
    pub cx: f32,
    pub cy: f32,
    /// Radians, pointing from the spawn point at an interior target.
    pub heading: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

pub fn pick_spawn_point<R: Rng + ?Sized>(columns: usize, rows: usize, rng: &mut R) -> SpawnPoint {
    let edge = match rng.gen_range(0..4) {
        0 => Edge::Left,
        1 => Edge::Right,
        2 => Edge::Top,
        _ => Edge::Bottom,
    };
    spawn_on_edge(columns, rows, edge, rng)
}

pub fn spawn_on_edge<R: Rng + ?Sized>(
    columns: usize,
    rows: usize,
    edge: Edge,
    rng: &mut R,
) -> SpawnPoint {
    let (w, h) = (columns as f32, rows as f32);
    let target_x = random_between(rng, w * INTERIOR_MIN, w * INTERIOR_MAX);
    let target_y = random_between(rng, h * INTERIOR_MIN, h * INTERIOR_MAX);

    let (cx, cy) = match edge {
        Edge::Left => (-SPAWN_MARGIN, random_between(rng, -SPAWN_MARGIN, h + SPAWN_MARGIN)),
        Edge::Right => (w + SPAWN_MARGIN, random_between(rng, -SPAWN_MARGIN, h + SPAWN_MARGIN)),
        Edge::Top => (random_between(rng, -SPAWN_MARGIN, w + SPAWN_MARGIN), -SPAWN_MARGIN),
        Edge::Bottom => (random_between(rng, -SPAWN_MARGIN, w + SPAWN_MARGIN), h + SPAWN_MARGIN),
    };

    SpawnPoint {
        cx,
        cy,
        heading: (target_y - cy).atan2(target_x - cx),
    }
}

/// Elliptical light source. Position is in lattice cells, times in ms.
#[derive(Clone, Debug, PartialEq)]
pub struct Blob {
    pub cx: f32,
    pub cy: f32,
    pub base_radius_x: f32,
    pub base_radius_y: f32,
    pub rotation: f32,
    /// rad/ms
    pub rotation_speed: f32,
    pub intensity: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub wobble_amplitude: f32,
    pub wobble_speed: f32,
    pub wobble_phase: f32,
    pub life: f32,
    pub max_life: f32,
}

impl Blob {
    /// A new blob on a random edge. `warm_start` burns off part of its life so a whole
    /// population created at once does not expire in lockstep.
    pub fn spawn<R: Rng + ?Sized>(
        columns: usize,
        rows: usize,
        behavior: &BlobBehavior,
        warm_start: bool,
        rng: &mut R,
    ) -> Self {
        let spawn = pick_spawn_point(columns, rows, rng);
        Self::from_spawn(spawn, behavior, warm_start, rng)
    }

    pub fn from_spawn<R: Rng + ?Sized>(
        spawn: SpawnPoint,
        behavior: &BlobBehavior,
        warm_start: bool,
        rng: &mut R,
    ) -> Self {
        let base = BlobBehavior::default();

        let radius_sample = random_between(rng, behavior.min_radius, behavior.max_radius);
        let radius = remap(
            radius_sample,
            base.min_radius,
            base.max_radius,
            INTERNAL_RADIUS_MIN,
            INTERNAL_RADIUS_MAX,
        )
        .max(6.0);
        let aspect = random_between(rng, 0.75, 1.35);

        let speed_sample = random_between(rng, behavior.min_speed, behavior.max_speed);
        let speed = remap(
            speed_sample,
            base.min_speed,
            base.max_speed,
            INTERNAL_SPEED_MIN,
            INTERNAL_SPEED_MAX,
        )
        .max(0.00001);
        let direction = spawn.heading + random_between(rng, -HEADING_JITTER, HEADING_JITTER);

        let fade_in = behavior.fade_in_duration.max(0.0);
        let variance = behavior.spawn_interval.max(0.0) * 0.5;
        let life_span = (behavior.lifespan + random_between(rng, -variance, variance))
            .max(fade_in * 1.5)
            .max(1.0);
        let life = if warm_start {
            let head_start_cap = behavior.spawn_interval.max(0.0).min(life_span * 0.9);
            life_span - random_between(rng, 0.0, head_start_cap)
        } else {
            life_span
        };

        let wobble_amplitude = behavior.wobble_amplitude
            * random_between(rng, 0.75, 1.25).clamp(0.1, (behavior.wobble_amplitude * 2.0).max(0.2));
        let wobble_speed = behavior.wobble_speed * random_between(rng, 0.75, 1.25);
        let rotation_speed = random_between(rng, -behavior.rotation_speed, behavior.rotation_speed);

        Self {
            cx: spawn.cx,
            cy: spawn.cy,
            base_radius_x: radius,
            base_radius_y: radius * aspect,
            rotation: random_between(rng, 0.0, TAU),
            rotation_speed,
            intensity: random_between(rng, 0.24, 0.45),
            velocity_x: direction.cos() * speed,
            velocity_y: direction.sin() * speed,
            wobble_amplitude,
            wobble_speed,
            wobble_phase: random_between(rng, 0.0, TAU),
            life,
            max_life: life_span,
        }
    }

    /// Advance by `delta` ms. `now` drives the slow drift modulation.
    pub fn update(&mut self, delta: f32, columns: usize, rows: usize, now: f64) {
        let drift = drift_modifier(now, self.wobble_phase);

        self.cx += self.velocity_x * delta * drift;
        self.cy += self.velocity_y * delta * drift;
        self.rotation += self.rotation_speed * delta;
        self.life -= delta;

        let outside = self.distance_outside(columns, rows);
        if outside > WRAP_MARGIN {
            self.life -= delta * SOFT_LEAK;
        }
        if outside > SPAWN_MARGIN {
            self.life -= delta * HARD_LEAK;
        }
    }

    /// How far past the lattice bounds the center lies, in cells. Zero when inside.
    pub fn distance_outside(&self, columns: usize, rows: usize) -> f32 {
        let (w, h) = (columns as f32, rows as f32);
        let dx = (-self.cx).max(self.cx - w).max(0.0);
        let dy = (-self.cy).max(self.cy - h).max(0.0);
        dx.max(dy)
    }

    pub fn is_expired(&self) -> bool {
        self.life <= 0.0
    }

    /// 0→1 over the first `fade_in_duration` ms of life, 1→0 over the last quarter.
    pub fn envelope(&self, fade_in_duration: f32) -> f32 {
        if self.max_life <= 0.0 {
            return 0.0;
        }
        let time_alive = self.max_life - self.life;
        let fade_in = if fade_in_duration > 0.0 {
            (time_alive / fade_in_duration).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let fade_out = (self.life / (self.max_life * 0.25)).clamp(0.0, 1.0);
        fade_in * fade_out
    }
}

/// Two slow, independent oscillations; stays within [0.7, 1.3].
pub fn drift_modifier(now: f64, phase: f32) -> f32 {
    let a = (now * 0.00002 + phase as f64 * 0.5).sin() as f32;
    let b = (now * 0.000015).cos() as f32;
    1.0 + a * 0.2 + b * 0.1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0xB10B)
    }

    fn centered(columns: usize, rows: usize) -> Blob {
        let mut b = Blob::spawn(columns, rows, &BlobBehavior::default(), false, &mut rng());
        b.cx = columns as f32 / 2.0;
        b.cy = rows as f32 / 2.0;
        b
    }

    #[test]
    fn fresh_blob_life_invariants() {
        let mut rng = rng();
        let behavior = BlobBehavior::default();
        for warm in [false, true] {
            for _ in 0..200 {
                let b = Blob::spawn(100, 60, &behavior, warm, &mut rng);
                assert!(b.life > 0.0);
                assert!(b.life <= b.max_life);
                assert!(b.max_life >= 1.5 * behavior.fade_in_duration);
                if !warm {
                    assert_eq!(b.life, b.max_life);
                }
            }
        }
    }

    #[test]
    fn lifespan_floor_respects_fade_in() {
        let behavior = BlobBehavior {
            lifespan: 600.0,
            fade_in_duration: 5000.0,
            spawn_interval: 0.0,
            ..BlobBehavior::default()
        };
        let b = Blob::spawn(50, 50, &behavior, false, &mut rng());
        assert_eq!(b.max_life, 7500.0);
    }

    #[test]
    fn warm_start_desynchronizes() {
        let mut rng = rng();
        let behavior = BlobBehavior::default();
        let blobs: Vec<Blob> = (0..16)
            .map(|_| Blob::spawn(80, 60, &behavior, true, &mut rng))
            .collect();
        assert!(blobs.iter().any(|b| b.life < b.max_life));
    }

    #[test]
    fn spawn_sits_outside_and_heads_inward() {
        let mut rng = rng();
        let (columns, rows) = (90usize, 70usize);
        for edge in [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom] {
            for _ in 0..50 {
                let s = spawn_on_edge(columns, rows, edge, &mut rng);
                let (w, h) = (columns as f32, rows as f32);
                match edge {
                    Edge::Left => assert_eq!(s.cx, -SPAWN_MARGIN),
                    Edge::Right => assert_eq!(s.cx, w + SPAWN_MARGIN),
                    Edge::Top => assert_eq!(s.cy, -SPAWN_MARGIN),
                    Edge::Bottom => assert_eq!(s.cy, h + SPAWN_MARGIN),
                }
                // Stepping along the heading lands inside the interior band sooner or later.
                let (dx, dy) = (s.heading.cos(), s.heading.sin());
                let center = (w / 2.0 - s.cx, h / 2.0 - s.cy);
                assert!(dx * center.0 + dy * center.1 > 0.0, "{edge:?} heads away");
            }
        }
    }

    #[test]
    fn radius_and_speed_follow_remap() {
        let mut rng = rng();
        let behavior = BlobBehavior::default();
        for _ in 0..100 {
            let b = Blob::spawn(60, 40, &behavior, false, &mut rng);
            assert!((INTERNAL_RADIUS_MIN..=INTERNAL_RADIUS_MAX).contains(&b.base_radius_x));
            let ratio = b.base_radius_y / b.base_radius_x;
            assert!((0.75..=1.35).contains(&ratio));
            let speed = (b.velocity_x.powi(2) + b.velocity_y.powi(2)).sqrt();
            assert!(speed >= INTERNAL_SPEED_MIN * 0.999 && speed <= INTERNAL_SPEED_MAX * 1.001);
            assert!((0.24..=0.45).contains(&b.intensity));
        }
    }

    #[test]
    fn degenerate_behavior_still_produces_a_blob() {
        let behavior = BlobBehavior {
            min_radius: f32::NAN,
            max_radius: f32::NAN,
            min_speed: 0.0,
            max_speed: 0.0,
            ..BlobBehavior::default()
        };
        let b = Blob::spawn(10, 10, &behavior, false, &mut rng());
        assert_eq!(b.base_radius_x, INTERNAL_RADIUS_MIN);
        assert!(b.velocity_x.is_finite() && b.velocity_y.is_finite());
    }

    #[test]
    fn update_moves_and_ages() {
        let mut b = Blob::spawn(100, 100, &BlobBehavior::default(), false, &mut rng());
        let before = b.clone();
        b.update(1000.0, 100, 100, 12_345.0);
        assert!(b.life < before.life);
        assert!(b.cx != before.cx || b.cy != before.cy);
        assert_eq!(b.rotation, before.rotation + before.rotation_speed * 1000.0);
    }

    #[test]
    fn life_strictly_decreases_in_bounds() {
        let mut b = centered(200, 200);
        b.velocity_x = 0.0;
        b.velocity_y = 0.0;
        let mut prev = b.life;
        for step in 0..100 {
            b.update(16.0, 200, 200, step as f64 * 16.0);
            assert!(b.life < prev);
            assert!((prev - b.life - 16.0).abs() < 0.01);
            prev = b.life;
        }
    }

    #[test]
    fn off_screen_blobs_decay_faster() {
        let (columns, rows) = (60usize, 40usize);
        let mut inside = centered(columns, rows);
        let mut soft = inside.clone();
        let mut hard = inside.clone();
        for b in [&mut inside, &mut soft, &mut hard] {
            b.velocity_x = 0.0;
            b.velocity_y = 0.0;
        }
        soft.cx = -(WRAP_MARGIN + SPAWN_MARGIN) / 2.0;
        hard.cx = -2.0 * SPAWN_MARGIN;

        let start = inside.life;
        inside.update(16.0, columns, rows, 0.0);
        soft.update(16.0, columns, rows, 0.0);
        hard.update(16.0, columns, rows, 0.0);

        let lost = |b: &Blob| start - b.life;
        assert!(lost(&soft) > lost(&inside));
        assert!(lost(&hard) > lost(&soft));
        assert!((lost(&hard) - 16.0 * (1.0 + SOFT_LEAK + HARD_LEAK)).abs() < 1e-2);
    }

    #[test]
    fn envelope_ramps_in_and_out() {
        let mut b = centered(10, 10);
        b.max_life = 10_000.0;
        b.life = 10_000.0;
        assert_eq!(b.envelope(2000.0), 0.0);
        b.life = 9_000.0;
        assert!((b.envelope(2000.0) - 0.5).abs() < 1e-5);
        b.life = 5_000.0;
        assert_eq!(b.envelope(2000.0), 1.0);
        b.life = 1_250.0;
        assert!((b.envelope(2000.0) - 0.5).abs() < 1e-5);
        b.life = 0.0;
        assert_eq!(b.envelope(2000.0), 0.0);
        b.life = 10_000.0;
        assert_eq!(b.envelope(0.0), 1.0);
    }

    #[test]
    fn drift_is_bounded() {
        for i in 0..2000 {
            let d = drift_modifier(i as f64 * 997.0, (i % 7) as f32);
            assert!((0.7..=1.3).contains(&d));
        }
    }
}
