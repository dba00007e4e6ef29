//! Fullscreen quad geometry.

use bytemuck::{Pod, Zeroable};

use crate::device::GpuContext;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
}

/// Triangle strip covering clip space.
const VERTICES: [QuadVertex; 4] = [
    QuadVertex { position: [-1.0, -1.0] },
    QuadVertex { position: [1.0, -1.0] },
    QuadVertex { position: [-1.0, 1.0] },
    QuadVertex { position: [1.0, 1.0] },
];

/// Vertex buffer for a quad covering the current viewport.
pub struct FullscreenQuad {
    buffer: wgpu::Buffer,
}

impl FullscreenQuad {
    pub fn new(context: &GpuContext) -> Self {
        let buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fullscreen_quad"),
            size: std::mem::size_of_val(&VERTICES) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        context
            .queue
            .write_buffer(&buffer, 0, bytemuck::cast_slice(&VERTICES));
        Self { buffer }
    }

    pub fn vertex_count(&self) -> u32 {
        VERTICES.len() as u32
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }

    pub const TOPOLOGY: wgpu::PrimitiveTopology = wgpu::PrimitiveTopology::TriangleStrip;
}
