//! Ambient ASCII fog: soft elliptical blobs drift across a character lattice and are
//! drawn as pre-rasterized glowing glyphs.
//!
//! [`Engine`] is the whole simulation and compositing pipeline. Hosts hand it a
//! [`Surface`] and a monotonic clock; the crate ships a terminal host (`app`) and a
//! headless PNG host (`snapshot`).

pub mod app;
pub mod atlas;
pub mod blob;
pub mod cli;
pub mod color;
pub mod compositor;
pub mod config;
pub mod engine;
pub mod error;
pub mod falloff;
pub mod grid;
pub mod snapshot;
pub mod surface;
pub mod term;
pub mod theme;

pub use atlas::{build_character_lut, AtlasOptions, GlyphAtlas, GlyphImage};
pub use blob::Blob;
pub use compositor::{pick_shade_index, Compositor};
pub use config::Settings;
pub use engine::{Engine, Stats, Viewport};
pub use error::{FogError, Result};
pub use falloff::FalloffTable;
pub use grid::{Lattice, RevealDelays};
pub use surface::{PixelCanvas, Surface};
