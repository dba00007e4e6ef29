use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the host-side model (viewport, numbers, saved views, settings).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid viewport: {0}")]
    InvalidViewport(String),

    #[error("failed to parse number '{input}': {reason}")]
    ParseNumber { input: String, reason: String },

    #[error("malformed saved view record '{0}'")]
    SavedViewFormat(String),

    #[error("unknown saved view '{0}'")]
    UnknownView(String),

    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the shader program boundary.
///
/// Compile and link failures carry the backend's diagnostic text. They leave the
/// program not-ready instead of aborting.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ShaderError {
    #[error("failed to load shader source '{name}': {reason}")]
    Load { name: String, reason: String },

    #[error("include depth exceeded {max} while expanding '{name}'")]
    IncludeDepth { name: String, max: usize },

    #[error("vertex stage failed to compile:\n{0}")]
    VertexCompile(String),

    #[error("fragment stage failed to compile:\n{0}")]
    FragmentCompile(String),

    #[error("program failed to link:\n{0}")]
    Link(String),

    #[error("shader program is not ready")]
    NotReady,
}

/// Every way a tiled capture can fail. Nothing is written to disk when one is returned.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("invalid capture dimensions {width}x{height}")]
    InvalidDimensions { width: u64, height: u64 },

    #[error("tile size must be greater than zero")]
    ZeroTileSize,

    #[error("capture of {width}x{height} exceeds the addressable buffer size")]
    TooLarge { width: u64, height: u64 },

    #[error("out of memory allocating {bytes} bytes for {what}")]
    OutOfMemory { what: &'static str, bytes: usize },

    #[error("gpu error: {0}")]
    Gpu(String),

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error("capture cancelled after {completed}/{total} tiles")]
    Cancelled { completed: usize, total: usize },

    #[error("failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
