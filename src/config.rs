use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{FogError, Result};

/// Ceilings applied by `sanitized`. Anything larger would only burn memory.
pub const MAX_CELL_SIZE: f32 = 256.0;
pub const MAX_FALLOFF_TABLE_SIZE: usize = 65_536;
pub const MAX_BLOBS: usize = 64;
pub const MAX_RADIUS: f32 = 1_000.0;
pub const MAX_PALETTE_LEN: usize = 256;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSettings {
    pub primary: String,
    pub background: String,
    /// Falls back to a translucent variant of `primary`.
    pub glow: Option<String>,
    /// Falls back to translucent variants of `primary`.
    pub shadow: Option<String>,
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            primary: "rgb(100, 180, 255)".to_string(),
            background: "#000000".to_string(),
            glow: None,
            shadow: None,
        }
    }
}

/// Blob population and motion. Speeds and radii are in the user-facing scale and get
/// remapped onto the simulation's working range when a blob is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobBehavior {
    pub count: usize,
    pub min_speed: f32,
    pub max_speed: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// ms
    pub spawn_interval: f32,
    /// ms
    pub lifespan: f32,
    /// ms
    pub fade_in_duration: f32,
    pub wobble_amplitude: f32,
    pub wobble_speed: f32,
    pub rotation_speed: f32,
}

impl Default for BlobBehavior {
    fn default() -> Self {
        Self {
            count: 8,
            min_speed: 6.0,
            max_speed: 12.0,
            min_radius: 60.0,
            max_radius: 140.0,
            spawn_interval: 3000.0,
            lifespan: 30000.0,
            fade_in_duration: 2000.0,
            wobble_amplitude: 0.15,
            wobble_speed: 0.0004,
            rotation_speed: 0.00003,
        }
    }
}

impl BlobBehavior {
    pub fn sanitized(&self) -> Self {
        let finite = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        let d = Self::default();

        let min_speed = finite(self.min_speed, d.min_speed).max(0.0);
        let max_speed = finite(self.max_speed, d.max_speed).max(min_speed);
        let min_radius = finite(self.min_radius, d.min_radius).clamp(4.0, MAX_RADIUS);
        let max_radius = finite(self.max_radius, d.max_radius).clamp(min_radius, MAX_RADIUS);
        let fade_in_duration = finite(self.fade_in_duration, d.fade_in_duration).max(0.0);

        Self {
            count: self.count.clamp(1, MAX_BLOBS),
            min_speed,
            max_speed,
            min_radius,
            max_radius,
            spawn_interval: finite(self.spawn_interval, d.spawn_interval).max(0.0),
            lifespan: finite(self.lifespan, d.lifespan).max(fade_in_duration + 500.0),
            fade_in_duration,
            wobble_amplitude: finite(self.wobble_amplitude, d.wobble_amplitude).max(0.0),
            wobble_speed: finite(self.wobble_speed, d.wobble_speed).max(0.0),
            rotation_speed: finite(self.rotation_speed, d.rotation_speed).max(0.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    /// Minimum ms between composited frames. `None` derives it from `target_fps`.
    pub frame_interval: Option<f32>,
    pub reveal_duration: f32,
    pub reveal_fade: f32,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            frame_interval: Some(42.0),
            reveal_duration: 1200.0,
            reveal_fade: 400.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSettings {
    pub cell_size: f32,
    pub falloff_table_size: usize,
    pub target_fps: f32,
    pub enable_blur: bool,
    /// Build the atlas off the render thread.
    pub offscreen_atlas: bool,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            cell_size: 14.0,
            falloff_table_size: 1024,
            target_fps: 60.0,
            enable_blur: true,
            offscreen_atlas: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: Option<String>,
    pub seed: Option<u64>,
    pub characters: String,
    pub colors: ColorSettings,
    pub blob: BlobBehavior,
    pub animation: AnimationSettings,
    pub performance: PerformanceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: None,
            seed: None,
            characters: " .,:;!~+=xoX#".to_string(),
            colors: ColorSettings::default(),
            blob: BlobBehavior::default(),
            animation: AnimationSettings::default(),
            performance: PerformanceSettings::default(),
        }
    }
}

impl Settings {
    /// Clamp every numeric option into a range that keeps the animation plausible.
    /// Never fails: out-of-range input is corrected, not rejected.
    pub fn sanitized(&self) -> Self {
        let mut s = self.clone();

        let perf = &mut s.performance;
        perf.cell_size = if perf.cell_size.is_finite() {
            perf.cell_size.floor().clamp(6.0, MAX_CELL_SIZE)
        } else {
            14.0
        };
        perf.falloff_table_size = perf.falloff_table_size.clamp(32, MAX_FALLOFF_TABLE_SIZE);
        perf.target_fps = if perf.target_fps.is_finite() {
            perf.target_fps.clamp(1.0, 240.0)
        } else {
            60.0
        };

        s.blob = s.blob.sanitized();

        let anim = &mut s.animation;
        let interval = match anim.frame_interval {
            Some(v) if v.is_finite() && v > 0.0 => v,
            _ => (1000.0 / s.performance.target_fps).round(),
        };
        anim.frame_interval = Some(interval.max(5.0));
        anim.reveal_duration = if anim.reveal_duration.is_finite() {
            anim.reveal_duration.max(0.0)
        } else {
            1200.0
        };
        anim.reveal_fade = if anim.reveal_fade.is_finite() {
            anim.reveal_fade.max(1.0)
        } else {
            400.0
        };

        match s.characters.chars().count() {
            0 => s.characters = Settings::default().characters,
            n if n > MAX_PALETTE_LEN => {
                s.characters = s.characters.chars().take(MAX_PALETTE_LEN).collect();
            }
            _ => {}
        }

        s
    }

    pub fn frame_interval(&self) -> f32 {
        self.animation.frame_interval.unwrap_or(42.0)
    }

    pub fn palette(&self) -> Vec<char> {
        self.characters.chars().collect()
    }
}

pub struct Paths {
    pub settings_path: PathBuf,
}

pub fn project_paths() -> Option<Paths> {
    let proj = ProjectDirs::from("dev", "asciifog", "asciifog")?;
    let dir = proj.config_dir().to_path_buf();
    Some(Paths {
        settings_path: dir.join("settings.json"),
    })
}

/// Missing or unreadable files yield defaults.
pub fn load_settings(path: &Path) -> Settings {
    match read_settings(path) {
        Ok(s) => s,
        Err(err) => {
            if path.exists() {
                tracing::warn!(path = %path.display(), %err, "ignoring settings file");
            }
            Settings::default()
        }
    }
}

pub fn read_settings(path: &Path) -> Result<Settings> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| FogError::Config {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s).map_err(|source| FogError::Config {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(&tmp, data)?;
    // rename replaces an existing target
    fs::rename(&tmp, path)?;
    Ok(())
}
