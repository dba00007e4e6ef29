//! GPU rendering backend for tiled captures using wgpu.

mod device;
mod error;
pub mod layout;
mod program;
mod quad;
pub mod shaders;
mod surface;
#[cfg(test)]
mod tests;

pub use device::{GpuAvailability, GpuContext};
pub use error::GpuError;
pub use layout::{SlotType, UniformLayout};
pub use program::{WgpuProgram, TILE_FORMAT};
pub use quad::FullscreenQuad;
pub use surface::{padded_bytes_per_row, unpad_rows, GpuTileSurface};
