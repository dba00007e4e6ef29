//! wgpu implementation of the shader program boundary.

use std::borrow::Cow;
use std::sync::Arc;

use chaoslens_core::{ProgramState, ShaderError, ShaderProgram, ShaderSources, SystemKind, UniformValue};

use crate::device::{block_on, GpuContext};
use crate::error::GpuError;
use crate::layout::UniformLayout;
use crate::quad::FullscreenQuad;
use crate::shaders;

/// Color format of every render target a program draws into.
pub const TILE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct Linked {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// A render pipeline built from WGSL sources, with one uniform buffer.
///
/// The vertex module survives fragment recompiles; linking creates a fresh
/// pipeline and a zeroed uniform buffer, which `recompile` then refills from
/// the stored uniform table.
pub struct WgpuProgram {
    context: Arc<GpuContext>,
    state: ProgramState,
    layout: UniformLayout,
    vertex: Option<wgpu::ShaderModule>,
    fragment: Option<wgpu::ShaderModule>,
    linked: Option<Linked>,
}

impl WgpuProgram {
    pub fn new(context: Arc<GpuContext>, sources: ShaderSources, layout: UniformLayout) -> Self {
        Self {
            context,
            state: ProgramState::new(sources),
            layout,
            vertex: None,
            fragment: None,
            linked: None,
        }
    }

    /// Program for one of the embedded systems. Not compiled yet.
    pub fn for_system(context: Arc<GpuContext>, kind: SystemKind) -> Result<Self, ShaderError> {
        Ok(Self::new(
            context,
            shaders::sources_for(kind)?,
            shaders::layout_for(kind),
        ))
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    fn compile_module(
        &self,
        operation: &'static str,
        source: String,
    ) -> Result<wgpu::ShaderModule, GpuError> {
        let device = &self.context.device;
        self.context.scoped(operation, || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(operation),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
            })
        })
    }

    fn build_pipeline(
        &self,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
    ) -> Result<Linked, GpuError> {
        let device = &self.context.device;
        let uniform_size = self.layout.size() as u64;

        self.context.scoped("program link", || {
            let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("params_layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("program_layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("program_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[FullscreenQuad::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: fragment,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TILE_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: FullscreenQuad::TOPOLOGY,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

            let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("params"),
                size: uniform_size,
                usage: wgpu::BufferUsages::UNIFORM
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("params_bind_group"),
                layout: &bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

            Linked {
                pipeline,
                uniform_buffer,
                bind_group,
            }
        })
    }

    /// Contents of the linked program's uniform buffer, as the shader sees them.
    pub fn read_uniform_buffer(&self) -> Result<Vec<u8>, GpuError> {
        let linked = self
            .linked
            .as_ref()
            .ok_or_else(|| GpuError::Unavailable("program is not linked".into()))?;
        let device = &self.context.device;
        let size = self.layout.size() as u64;

        let staging = self.context.scoped("uniform readback", || {
            let staging = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("params_readback"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("params_readback"),
            });
            encoder.copy_buffer_to_buffer(&linked.uniform_buffer, 0, &staging, 0, size);
            self.context.queue.submit(std::iter::once(encoder.finish()));
            staging
        })?;

        let slice = staging.slice(..);
        let (tx, rx) = futures_channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.context.wait_idle();
        block_on(rx)
            .map_err(|_| GpuError::Unavailable("Channel closed".into()))?
            .map_err(GpuError::BufferMap)?;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }

    /// Record a draw of `quad` into `pass`.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, quad: &FullscreenQuad) -> Result<(), ShaderError> {
        let linked = self.linked.as_ref().ok_or(ShaderError::NotReady)?;
        pass.set_pipeline(&linked.pipeline);
        pass.set_bind_group(0, &linked.bind_group, &[]);
        pass.set_vertex_buffer(0, quad.buffer().slice(..));
        pass.draw(0..quad.vertex_count(), 0..1);
        Ok(())
    }
}

impl Clone for WgpuProgram {
    /// An independent program with the same sources, defines and uniforms.
    ///
    /// GPU objects are not shared: a ready program is rebuilt for the copy. A
    /// failed rebuild leaves the copy not-ready.
    fn clone(&self) -> Self {
        let mut copy = Self {
            context: Arc::clone(&self.context),
            state: self.state.clone(),
            layout: self.layout.clone(),
            vertex: None,
            fragment: None,
            linked: None,
        };
        if self.is_ready() {
            if let Err(e) = copy.build() {
                log::warn!("cloned program failed to build: {}", e);
            }
        }
        copy
    }
}

impl std::fmt::Debug for WgpuProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuProgram")
            .field("defines", self.state.defines())
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl ShaderProgram for WgpuProgram {
    fn state(&self) -> &ProgramState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProgramState {
        &mut self.state
    }

    fn upload_uniform(&mut self, name: &str, value: &UniformValue) {
        let Some(linked) = &self.linked else {
            return;
        };
        match self.layout.encode(name, value) {
            Ok(Some((offset, bytes))) => {
                self.context
                    .queue
                    .write_buffer(&linked.uniform_buffer, offset as u64, &bytes);
            }
            Ok(None) => log::trace!("uniform '{}' not used by this shader", name),
            Err(e) => log::warn!("{}", e),
        }
    }

    fn compile_vertex_shader(&mut self) -> Result<(), ShaderError> {
        self.linked = None;
        match self.compile_module("vertex shader", self.state.vertex_source()) {
            Ok(module) => {
                self.vertex = Some(module);
                Ok(())
            }
            Err(e) => {
                self.vertex = None;
                Err(ShaderError::VertexCompile(e.to_string()))
            }
        }
    }

    fn compile_fragment_shader(&mut self) -> Result<(), ShaderError> {
        self.linked = None;
        let source = format!(
            "{}{}",
            self.layout.wgsl_declaration(),
            self.state.fragment_source()
        );
        match self.compile_module("fragment shader", source) {
            Ok(module) => {
                self.fragment = Some(module);
                Ok(())
            }
            Err(e) => {
                self.fragment = None;
                Err(ShaderError::FragmentCompile(e.to_string()))
            }
        }
    }

    fn link(&mut self) -> Result<(), ShaderError> {
        self.linked = None;
        let (Some(vertex), Some(fragment)) = (&self.vertex, &self.fragment) else {
            return Err(ShaderError::Link(
                "both stages must compile before linking".to_string(),
            ));
        };
        let linked = self.build_pipeline(vertex, fragment)?;
        self.linked = Some(linked);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.linked.is_some()
    }

    fn has_vertex_stage(&self) -> bool {
        self.vertex.is_some()
    }
}
