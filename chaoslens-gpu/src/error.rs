//! GPU error types.

use chaoslens_core::{CaptureError, ShaderError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("No GPU adapter found")]
    NoAdapter,

    #[error("Failed to create device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("GPU unavailable: {0}")]
    Unavailable(String),

    /// Captured from an error scope around a GPU operation.
    #[error("{operation} failed: {message}")]
    Scope { operation: &'static str, message: String },

    #[error("uniform '{name}' is declared as {declared}, got {given}")]
    UniformType {
        name: String,
        declared: &'static str,
        given: &'static str,
    },

    #[error("tile size {requested} exceeds the device limit of {limit}")]
    TileTooLarge { requested: u32, limit: u32 },
}

impl From<GpuError> for CaptureError {
    fn from(e: GpuError) -> Self {
        CaptureError::Gpu(e.to_string())
    }
}

impl From<GpuError> for ShaderError {
    fn from(e: GpuError) -> Self {
        ShaderError::Link(e.to_string())
    }
}
