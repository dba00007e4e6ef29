//! Render Configuration Model.
//!
//! A [`RenderConfig`] is one system's parameters plus optional cross-cutting
//! mixins, all funnelling into a single owned shader program. Mixins are applied
//! in a fixed order: supersampling, iterative method, system.

pub mod double_pendulum;
pub mod iterative;
pub mod mandelbrot;
pub mod supersampling;

use serde::{Deserialize, Serialize};

pub use double_pendulum::DoublePendulumParams;
pub use iterative::IterativeMethodParams;
pub use mandelbrot::{auto_max_iterations, ColorMap, MandelbrotParams};
pub use supersampling::{SupersamplingMode, SupersamplingParams};

use crate::error::ShaderError;
use crate::shader::ShaderProgram;
use crate::Viewport;

/// One slice of a configuration's parameters.
pub trait ConfigMixin {
    /// Push define-backed fields. Changing a define leaves the program dirty.
    fn init_defines(&self, _program: &mut dyn ShaderProgram) {}

    /// Push every plain parameter as a named uniform.
    fn apply_uniforms(&self, program: &mut dyn ShaderProgram);

    /// Overwrite quality fields with high-quality constants.
    fn apply_screenshot_defaults(&mut self);

    /// Copy quality fields from a compatible screenshot configuration.
    fn copy_quality_from(&mut self, other: &Self)
    where
        Self: Sized;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemKind {
    Mandelbrot,
    DoublePendulum,
}

impl SystemKind {
    pub fn display_name(self) -> &'static str {
        match self {
            SystemKind::Mandelbrot => "Mandelbrot",
            SystemKind::DoublePendulum => "Double Pendulum",
        }
    }
}

impl std::str::FromStr for SystemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mandelbrot" => Ok(SystemKind::Mandelbrot),
            "double-pendulum" | "double_pendulum" | "pendulum" => Ok(SystemKind::DoublePendulum),
            other => Err(format!("unknown system '{other}'")),
        }
    }
}

/// The system-specific mixin; exactly one per configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "system", rename_all = "kebab-case")]
pub enum SystemParams {
    Mandelbrot(MandelbrotParams),
    DoublePendulum(DoublePendulumParams),
}

impl SystemParams {
    pub fn kind(&self) -> SystemKind {
        match self {
            SystemParams::Mandelbrot(_) => SystemKind::Mandelbrot,
            SystemParams::DoublePendulum(_) => SystemKind::DoublePendulum,
        }
    }

    fn as_mixin(&self) -> &dyn ConfigMixin {
        match self {
            SystemParams::Mandelbrot(p) => p,
            SystemParams::DoublePendulum(p) => p,
        }
    }

    fn apply_screenshot_defaults(&mut self) {
        match self {
            SystemParams::Mandelbrot(p) => p.apply_screenshot_defaults(),
            SystemParams::DoublePendulum(p) => p.apply_screenshot_defaults(),
        }
    }
}

/// All parameters of a configuration, without its program.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigParams {
    pub system: SystemParams,
    pub supersampling: Option<SupersamplingParams>,
    pub iterative: Option<IterativeMethodParams>,
}

impl ConfigParams {
    /// Live defaults with the mixins each system is composed of.
    pub fn for_system(kind: SystemKind) -> Self {
        match kind {
            SystemKind::Mandelbrot => Self {
                system: SystemParams::Mandelbrot(MandelbrotParams::default()),
                supersampling: None,
                iterative: None,
            },
            SystemKind::DoublePendulum => Self {
                system: SystemParams::DoublePendulum(DoublePendulumParams::default()),
                supersampling: Some(SupersamplingParams::default()),
                iterative: Some(IterativeMethodParams::default()),
            },
        }
    }

    fn mixins(&self) -> Vec<&dyn ConfigMixin> {
        let mut mixins: Vec<&dyn ConfigMixin> = Vec::with_capacity(3);
        if let Some(ss) = &self.supersampling {
            mixins.push(ss);
        }
        if let Some(it) = &self.iterative {
            mixins.push(it);
        }
        mixins.push(self.system.as_mixin());
        mixins
    }
}

/// A named parameter bundle bound to its own shader program.
///
/// Cloning yields an independent program, provided `P::clone` does.
#[derive(Clone, Debug)]
pub struct RenderConfig<P: ShaderProgram> {
    name: String,
    program: P,
    params: ConfigParams,
}

impl<P: ShaderProgram> RenderConfig<P> {
    /// Bind `params` to `program` and push every define and uniform.
    pub fn new(program: P, params: ConfigParams) -> Self {
        let mut config = Self {
            name: params.system.kind().display_name().to_string(),
            program,
            params,
        };
        config.init_defines();
        config.apply_uniforms();
        config
    }

    pub fn for_system(program: P, kind: SystemKind) -> Self {
        Self::new(program, ConfigParams::for_system(kind))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SystemKind {
        self.params.system.kind()
    }

    pub fn params(&self) -> &ConfigParams {
        &self.params
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut P {
        &mut self.program
    }

    /// Mutate parameters, then resync defines and uniforms.
    ///
    /// Define-backed changes leave the configuration dirty until [`Self::recompile`].
    pub fn update(&mut self, f: impl FnOnce(&mut ConfigParams)) {
        f(&mut self.params);
        self.init_defines();
        self.apply_uniforms();
    }

    pub fn init_defines(&mut self) {
        for mixin in self.params.mixins() {
            mixin.init_defines(&mut self.program);
        }
    }

    pub fn apply_uniforms(&mut self) {
        for mixin in self.params.mixins() {
            mixin.apply_uniforms(&mut self.program);
        }
    }

    /// Push view uniforms: window size, center, zoom scale and a zero tile offset.
    pub fn apply_view(&mut self, viewport: &Viewport) {
        if let SystemParams::Mandelbrot(p) = &mut self.params.system {
            if p.auto_max_iterations {
                p.max_iterations = auto_max_iterations(&viewport.zoom_scale);
                self.program
                    .set_uniform("max_iterations", p.max_iterations.into());
            }
        }

        let program = &mut self.program;
        program.set_uniform(
            "window_size",
            [viewport.window_width, viewport.window_height].into(),
        );
        program.set_uniform(
            "center",
            [viewport.center.0.to_f64(), viewport.center.1.to_f64()].into(),
        );
        program.set_uniform("zoom_scale", viewport.zoom_scale.to_f64().into());
        program.set_uniform("tile_offset", [0u32, 0].into());
    }

    /// Render-space pixel offset added to every fragment coordinate.
    pub fn set_tile_offset(&mut self, offset: (u32, u32)) {
        self.program
            .set_uniform("tile_offset", [offset.0, offset.1].into());
    }

    pub fn needs_recompile(&self) -> bool {
        self.program.needs_recompile()
    }

    pub fn is_ready(&self) -> bool {
        self.program.is_ready() && !self.program.needs_recompile()
    }

    /// Recompile only if a define changed since the last successful build.
    ///
    /// A program whose vertex stage was never compiled gets a full build.
    pub fn recompile_if_needed(&mut self) -> Result<(), ShaderError> {
        if !self.program.has_vertex_stage() {
            self.program.build()?;
        } else if self.program.needs_recompile() || !self.program.is_ready() {
            self.program.recompile()?;
        }
        Ok(())
    }

    pub fn recompile(&mut self) -> Result<(), ShaderError> {
        self.program.recompile()
    }

    /// Overwrite quality fields with high-quality constants.
    pub fn derive_screenshot_defaults(&mut self) {
        if let Some(ss) = &mut self.params.supersampling {
            ss.apply_screenshot_defaults();
        }
        if let Some(it) = &mut self.params.iterative {
            it.apply_screenshot_defaults();
        }
        self.params.system.apply_screenshot_defaults();
        self.init_defines();
        self.apply_uniforms();
    }

    /// Clone into a fresh screenshot configuration with high-quality defaults.
    pub fn to_screenshot_config(&self) -> Self
    where
        P: Clone,
    {
        let mut shot = self.clone();
        shot.derive_screenshot_defaults();
        shot
    }

    /// Take quality fields from a previous screenshot configuration, mixin by
    /// mixin; a mixin `other` lacks falls back to screenshot defaults.
    pub fn sync_from_screenshot_peer(&mut self, other: &Self) {
        match (&mut self.params.supersampling, &other.params.supersampling) {
            (Some(mine), Some(theirs)) => mine.copy_quality_from(theirs),
            (Some(mine), None) => mine.apply_screenshot_defaults(),
            (None, _) => {}
        }

        match (&mut self.params.iterative, &other.params.iterative) {
            (Some(mine), Some(theirs)) => mine.copy_quality_from(theirs),
            (Some(mine), None) => mine.apply_screenshot_defaults(),
            (None, _) => {}
        }

        match (&mut self.params.system, &other.params.system) {
            (SystemParams::Mandelbrot(mine), SystemParams::Mandelbrot(theirs)) => {
                mine.copy_quality_from(theirs)
            }
            (SystemParams::DoublePendulum(mine), SystemParams::DoublePendulum(theirs)) => {
                mine.copy_quality_from(theirs)
            }
            (mine, _) => mine.apply_screenshot_defaults(),
        }

        self.init_defines();
        self.apply_uniforms();
    }

    /// Copy live-only fields from the live configuration, leaving quality fields.
    ///
    /// Fields the live configuration's system does not have are left alone.
    pub fn sync_from_live(&mut self, live: &Self) {
        match (&mut self.params.system, &live.params.system) {
            (SystemParams::Mandelbrot(mine), SystemParams::Mandelbrot(theirs)) => {
                mine.copy_live_from(theirs)
            }
            (SystemParams::DoublePendulum(mine), SystemParams::DoublePendulum(theirs)) => {
                *mine = theirs.clone()
            }
            _ => {
                log::debug!(
                    "live config is {}, screenshot config is {}: nothing to sync",
                    live.name,
                    self.name
                );
            }
        }

        self.init_defines();
        self.apply_uniforms();
    }
}
