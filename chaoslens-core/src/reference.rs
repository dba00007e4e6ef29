//! CPU rendering backend.
//!
//! Evaluates a coordinate test pattern (or an escape-time Mandelbrot when a
//! `max_iterations` uniform is bound) per pixel, reading the same uniforms a GPU
//! shader would see. Used for headless previews without a GPU and to exercise
//! the capture engine end to end.

use crate::capture::CaptureTarget;
use crate::error::{CaptureError, ShaderError};
use crate::shader::{ProgramState, ShaderProgram, ShaderSources};
use crate::uniform::{UniformTable, UniformValue};

const VERTEX_SOURCE: &str = "fullscreen quad";
const FRAGMENT_SOURCE: &str =
    "coordinate pattern, colors FLOW_COLOR_TYPE, samples SUPER_SAMPLING";

/// Sources containing this token fail to compile.
pub const COMPILE_ERROR_TOKEN: &str = "COMPILE_ERROR";

const CHECKER_SIZE: f64 = 0.25;
const ESCAPE_RADIUS_SQ: f64 = 4.0;

/// Shader program evaluated on the CPU.
#[derive(Clone, Debug)]
pub struct ReferenceProgram {
    state: ProgramState,
    vertex_compiled: bool,
    fragment_compiled: bool,
    linked: bool,
    /// Uniform values as the compiled program holds them.
    bound: UniformTable,
    vertex_compiles: usize,
    fragment_compiles: usize,
}

impl Default for ReferenceProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceProgram {
    pub fn new() -> Self {
        Self::with_sources(ShaderSources::from_strings(VERTEX_SOURCE, FRAGMENT_SOURCE))
    }

    pub fn with_sources(sources: ShaderSources) -> Self {
        Self {
            state: ProgramState::new(sources),
            vertex_compiled: false,
            fragment_compiled: false,
            linked: false,
            bound: UniformTable::new(),
            vertex_compiles: 0,
            fragment_compiles: 0,
        }
    }

    /// Uniforms as currently bound to the linked program.
    pub fn bound_uniforms(&self) -> &UniformTable {
        &self.bound
    }

    pub fn vertex_compiles(&self) -> usize {
        self.vertex_compiles
    }

    pub fn fragment_compiles(&self) -> usize {
        self.fragment_compiles
    }

    fn bound_uvec2(&self, name: &str) -> [u32; 2] {
        match self.bound.get(name) {
            Some(UniformValue::UVec2(v)) => *v,
            _ => [0, 0],
        }
    }

    fn bound_f64(&self, name: &str, fallback: f64) -> f64 {
        match self.bound.get(name) {
            Some(UniformValue::F64(v)) => *v,
            Some(UniformValue::F32(v)) => *v as f64,
            _ => fallback,
        }
    }

    /// Model-space point for a bottom-up fragment coordinate of the current tile.
    pub fn fragment_to_model(&self, frag_x: f64, frag_y: f64) -> (f64, f64) {
        let window = self.bound_uvec2("window_size");
        let offset = self.bound_uvec2("tile_offset");
        let center = match self.bound.get("center") {
            Some(UniformValue::DVec2(c)) => *c,
            _ => [0.0, 0.0],
        };
        let zoom = self.bound_f64("zoom_scale", 1.0);

        let px = frag_x + offset[0] as f64;
        let py = frag_y + offset[1] as f64;
        let scale = zoom / window[0].min(window[1]).max(1) as f64;
        (
            center[0] + scale * (px - window[0] as f64 / 2.0),
            center[1] + scale * (py - window[1] as f64 / 2.0),
        )
    }

    /// Color of one fragment.
    pub fn shade(&self, frag_x: f64, frag_y: f64) -> [u8; 4] {
        let (x, y) = self.fragment_to_model(frag_x, frag_y);
        match self.bound.get("max_iterations") {
            Some(UniformValue::U32(max_iterations)) => escape_time_color(x, y, *max_iterations),
            _ => pattern_color(x, y),
        }
    }
}

fn escape_time_color(cx: f64, cy: f64, max_iterations: u32) -> [u8; 4] {
    let (mut zx, mut zy) = (0.0f64, 0.0f64);
    for n in 0..max_iterations {
        if zx * zx + zy * zy > ESCAPE_RADIUS_SQ {
            let n = n as u64;
            return [(n * 7 % 256) as u8, (n * 13 % 256) as u8, (n * 29 % 256) as u8, 255];
        }
        let next = zx * zx - zy * zy + cx;
        zy = 2.0 * zx * zy + cy;
        zx = next;
    }
    [0, 0, 0, 255]
}

fn pattern_color(x: f64, y: f64) -> [u8; 4] {
    let square_x = (x / CHECKER_SIZE).floor() as i64;
    let square_y = (y / CHECKER_SIZE).floor() as i64;
    let shade = if (square_x + square_y).rem_euclid(2) == 0 { 200 } else { 60 };
    // Quadrant tint makes orientation errors visible.
    let red = if x >= 0.0 { 255 } else { shade };
    let blue = if y >= 0.0 { 255 } else { shade };
    [red, shade, blue, 255]
}

impl ShaderProgram for ReferenceProgram {
    fn state(&self) -> &ProgramState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProgramState {
        &mut self.state
    }

    fn upload_uniform(&mut self, name: &str, value: &UniformValue) {
        self.bound.set(name, value.clone());
    }

    fn compile_vertex_shader(&mut self) -> Result<(), ShaderError> {
        self.linked = false;
        self.vertex_compiles += 1;
        if self.state.vertex_source().contains(COMPILE_ERROR_TOKEN) {
            self.vertex_compiled = false;
            return Err(ShaderError::VertexCompile(format!(
                "unexpected token {COMPILE_ERROR_TOKEN} in vertex source"
            )));
        }
        self.vertex_compiled = true;
        Ok(())
    }

    fn compile_fragment_shader(&mut self) -> Result<(), ShaderError> {
        self.linked = false;
        self.fragment_compiles += 1;
        let source = self.state.fragment_source();
        if source.contains(COMPILE_ERROR_TOKEN) {
            self.fragment_compiled = false;
            return Err(ShaderError::FragmentCompile(format!(
                "unexpected token {COMPILE_ERROR_TOKEN} in fragment source"
            )));
        }
        self.fragment_compiled = true;
        Ok(())
    }

    fn link(&mut self) -> Result<(), ShaderError> {
        if !(self.vertex_compiled && self.fragment_compiled) {
            self.linked = false;
            return Err(ShaderError::Link(
                "both stages must compile before linking".to_string(),
            ));
        }
        // A freshly linked program starts with no uniform values.
        self.bound = UniformTable::new();
        self.linked = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.linked
    }

    fn has_vertex_stage(&self) -> bool {
        self.vertex_compiled
    }
}

/// Marker geometry for the CPU backend; every pixel of the viewport is shaded.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceQuad;

/// Offscreen surface in host memory.
///
/// Rows are stored bottom-up with a stride of the full surface width, as a GPU
/// texture would be.
#[derive(Debug)]
pub struct ReferenceTarget {
    max_tile_dimension: u32,
    surface: Vec<u8>,
    surface_size: u32,
    active: Option<(u32, u32)>,
    draws: usize,
    allocations: usize,
    /// Fail the n-th draw (0-based) with a GPU error.
    pub fail_draw_at: Option<usize>,
}

impl ReferenceTarget {
    pub fn new(max_tile_dimension: u32) -> Self {
        Self {
            max_tile_dimension,
            surface: Vec::new(),
            surface_size: 0,
            active: None,
            draws: 0,
            allocations: 0,
            fail_draw_at: None,
        }
    }

    pub fn draws(&self) -> usize {
        self.draws
    }

    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// True between `begin` and `end`.
    pub fn is_capturing(&self) -> bool {
        !self.surface.is_empty()
    }

    /// Render one full frame the way the interactive loop would, top row first.
    pub fn render_frame(program: &ReferenceProgram, width: u32, height: u32) -> Vec<u8> {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for row in (0..height).rev() {
            for col in 0..width {
                pixels.extend_from_slice(&program.shade(col as f64 + 0.5, row as f64 + 0.5));
            }
        }
        pixels
    }
}

impl CaptureTarget<ReferenceProgram> for ReferenceTarget {
    type Quad = ReferenceQuad;

    fn max_tile_dimension(&self) -> u32 {
        self.max_tile_dimension
    }

    fn begin(&mut self, tile_size: u32) -> Result<(), CaptureError> {
        let bytes = tile_size as usize * tile_size as usize * 4;
        let mut surface = Vec::new();
        surface
            .try_reserve_exact(bytes)
            .map_err(|_| CaptureError::OutOfMemory {
                what: "offscreen surface",
                bytes,
            })?;
        surface.resize(bytes, 0);
        self.surface = surface;
        self.surface_size = tile_size;
        self.allocations += 1;
        Ok(())
    }

    fn draw_tile(
        &mut self,
        program: &mut ReferenceProgram,
        _quad: &ReferenceQuad,
        width: u32,
        height: u32,
    ) -> Result<(), CaptureError> {
        if self.fail_draw_at == Some(self.draws) {
            self.draws += 1;
            return Err(CaptureError::Gpu("injected draw failure".to_string()));
        }
        self.draws += 1;

        if !program.is_ready() {
            return Err(ShaderError::NotReady.into());
        }
        if width > self.surface_size || height > self.surface_size {
            return Err(CaptureError::Gpu(format!(
                "viewport {}x{} exceeds surface {}",
                width, height, self.surface_size
            )));
        }

        self.active = Some((width, height));
        self.surface.fill(0);
        let stride = self.surface_size as usize * 4;
        for row in 0..height {
            for col in 0..width {
                let color = program.shade(col as f64 + 0.5, row as f64 + 0.5);
                let start = row as usize * stride + col as usize * 4;
                self.surface[start..start + 4].copy_from_slice(&color);
            }
        }
        Ok(())
    }

    fn read_tile(&mut self, width: u32, height: u32, out: &mut [u8]) -> Result<(), CaptureError> {
        if self.active != Some((width, height)) {
            return Err(CaptureError::Gpu(
                "read does not match the last drawn viewport".to_string(),
            ));
        }
        let stride = self.surface_size as usize * 4;
        let row_bytes = width as usize * 4;
        for (row, dest) in out.chunks_exact_mut(row_bytes).take(height as usize).enumerate() {
            let start = row * stride;
            dest.copy_from_slice(&self.surface[start..start + row_bytes]);
        }
        Ok(())
    }

    fn end(&mut self) {
        self.surface = Vec::new();
        self.surface_size = 0;
        self.active = None;
    }
}
