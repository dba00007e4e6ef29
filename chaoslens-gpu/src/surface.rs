//! Offscreen tile surface: one render texture reused for every tile of a capture.

use std::sync::Arc;

use chaoslens_core::{CaptureError, CaptureTarget, ShaderError, ShaderProgram};

use crate::device::{block_on, GpuContext};
use crate::error::GpuError;
use crate::program::{WgpuProgram, TILE_FORMAT};
use crate::quad::FullscreenQuad;

/// Bytes per row of a `width`-pixel RGBA8 copy, padded to wgpu's row alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    unpadded.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
}

/// Copy `height` rows of `width` pixels out of a padded readback buffer.
pub fn unpad_rows(padded: &[u8], width: u32, height: u32, out: &mut [u8]) {
    let stride = padded_bytes_per_row(width) as usize;
    let row_bytes = width as usize * 4;
    for (row, dest) in out
        .chunks_exact_mut(row_bytes)
        .take(height as usize)
        .enumerate()
    {
        let start = row * stride;
        dest.copy_from_slice(&padded[start..start + row_bytes]);
    }
}

struct Surface {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    readback: wgpu::Buffer,
    size: u32,
}

/// Square render texture plus a mappable readback buffer.
///
/// Texture rows are in render order: row 0 holds the bottom row of the tile,
/// so reading rows top to bottom yields bottom row first.
pub struct GpuTileSurface {
    context: Arc<GpuContext>,
    surface: Option<Surface>,
    drawn: Option<(u32, u32)>,
}

impl GpuTileSurface {
    pub fn new(context: Arc<GpuContext>) -> Self {
        Self {
            context,
            surface: None,
            drawn: None,
        }
    }

    fn surface(&self) -> Result<&Surface, GpuError> {
        self.surface
            .as_ref()
            .ok_or_else(|| GpuError::Unavailable("no tile surface allocated".to_string()))
    }

    fn allocate(&self, tile_size: u32) -> Result<Surface, GpuError> {
        let limit = self.context.max_texture_dimension();
        if tile_size > limit {
            return Err(GpuError::TileTooLarge {
                requested: tile_size,
                limit,
            });
        }

        let device = &self.context.device;
        self.context.scoped("tile surface allocation", || {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("tile_surface"),
                size: wgpu::Extent3d {
                    width: tile_size,
                    height: tile_size,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TILE_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let readback = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("tile_readback"),
                size: padded_bytes_per_row(tile_size) as u64 * tile_size as u64,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            Surface {
                texture,
                view,
                readback,
                size: tile_size,
            }
        })
    }

    fn draw(
        &self,
        program: &WgpuProgram,
        quad: &FullscreenQuad,
        width: u32,
        height: u32,
    ) -> Result<(), CaptureError> {
        let surface = self.surface()?;
        if width > surface.size || height > surface.size {
            return Err(CaptureError::Gpu(format!(
                "viewport {}x{} exceeds surface {}",
                width, height, surface.size
            )));
        }

        let mut draw_result = Ok(());
        self.context.scoped("tile draw", || {
            let mut encoder = self
                .context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("tile_encoder"),
                });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("tile_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &surface.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
                pass.set_scissor_rect(0, 0, width, height);
                draw_result = program.draw(&mut pass, quad);
            }
            self.context.queue.submit(std::iter::once(encoder.finish()));
            self.context.wait_idle();
        })?;
        draw_result.map_err(CaptureError::from)
    }

    fn read(&self, width: u32, height: u32, out: &mut [u8]) -> Result<(), GpuError> {
        let surface = self.surface()?;
        let bytes_per_row = padded_bytes_per_row(width);

        self.context.scoped("tile readback copy", || {
            let mut encoder = self
                .context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("tile_readback_encoder"),
                });
            encoder.copy_texture_to_buffer(
                wgpu::ImageCopyTexture {
                    texture: &surface.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::ImageCopyBuffer {
                    buffer: &surface.readback,
                    layout: wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(bytes_per_row),
                        rows_per_image: Some(height),
                    },
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
            self.context.queue.submit(std::iter::once(encoder.finish()));
        })?;

        let used = bytes_per_row as u64 * height as u64;
        let slice = surface.readback.slice(..used);
        let (tx, rx) = futures_channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.context.wait_idle();

        block_on(rx)
            .map_err(|_| GpuError::Unavailable("Channel closed".into()))?
            .map_err(GpuError::BufferMap)?;

        {
            let view = slice.get_mapped_range();
            unpad_rows(&view, width, height, out);
        }
        surface.readback.unmap();
        Ok(())
    }
}

impl CaptureTarget<WgpuProgram> for GpuTileSurface {
    type Quad = FullscreenQuad;

    fn max_tile_dimension(&self) -> u32 {
        self.context.max_texture_dimension()
    }

    fn begin(&mut self, tile_size: u32) -> Result<(), CaptureError> {
        let surface = self.allocate(tile_size)?;
        log::debug!("allocated {0}x{0} tile surface", tile_size);
        self.surface = Some(surface);
        self.drawn = None;
        Ok(())
    }

    fn draw_tile(
        &mut self,
        program: &mut WgpuProgram,
        quad: &FullscreenQuad,
        width: u32,
        height: u32,
    ) -> Result<(), CaptureError> {
        if !program.is_ready() {
            return Err(ShaderError::NotReady.into());
        }
        self.drawn = None;
        self.draw(program, quad, width, height)?;
        self.drawn = Some((width, height));
        Ok(())
    }

    fn read_tile(&mut self, width: u32, height: u32, out: &mut [u8]) -> Result<(), CaptureError> {
        if self.drawn != Some((width, height)) {
            return Err(CaptureError::Gpu(
                "read does not match the last drawn viewport".to_string(),
            ));
        }
        self.read(width, height, out)?;
        Ok(())
    }

    fn end(&mut self) {
        if let Some(surface) = self.surface.take() {
            surface.texture.destroy();
            surface.readback.destroy();
        }
        self.drawn = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(2048), 8192);
    }

    #[test]
    fn unpadding_drops_row_padding() {
        let width = 3;
        let stride = padded_bytes_per_row(width) as usize;
        let mut padded = vec![0xAAu8; stride * 2];
        padded[..12].copy_from_slice(&[1; 12]);
        padded[stride..stride + 12].copy_from_slice(&[2; 12]);

        let mut out = vec![0u8; 24];
        unpad_rows(&padded, width, 2, &mut out);
        assert_eq!(&out[..12], &[1; 12]);
        assert_eq!(&out[12..], &[2; 12]);
    }
}
