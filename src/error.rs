use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FogError {
    /// The drawing surface could not be acquired. Nothing can ever render.
    #[error("drawing surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("invalid settings file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, FogError>;
