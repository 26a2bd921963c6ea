use std::path::PathBuf;

use crate::config::ConfigError;

/// Failures that reject a single render request.
///
/// Every variant ends up as a `400 Bad Request`; the `Display` text is sent back as the body.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("scene is required: pass ?scene=<url> or post the scene YAML as the body")]
    MissingScene,

    #[error("not enough data to construct image: need width, height, lat, lon and zoom, or a /{{z}}/{{x}}/{{y}}.png path")]
    InsufficientView,

    #[error("invalid number for '{field}': {value:?}")]
    BadNumber { field: &'static str, value: String },

    #[error("tile {z}/{x}/{y} is out of range")]
    TileOutOfRange { z: u32, x: u32, y: u32 },

    #[error("could not write scene file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine error: {0}")]
    Engine(String),
}

impl RenderError {
    pub(crate) fn bad_number(field: &'static str, value: &str) -> Self {
        RenderError::BadNumber { field, value: value.to_string() }
    }
}

impl From<anyhow::Error> for RenderError {
    fn from(e: anyhow::Error) -> Self {
        RenderError::Engine(format!("{e:#}"))
    }
}

/// Fatal worker failures. These terminate the process.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("invalid endpoint '{0}': expected tcp://host:port or ipc:///path")]
    InvalidEndpoint(String),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("could not initialize GL context: {0}")]
    ContextInit(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("render pipeline thread terminated")]
    PipelineGone,
}
