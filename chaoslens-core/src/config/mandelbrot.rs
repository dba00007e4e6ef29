use serde::{Deserialize, Serialize};

use super::ConfigMixin;
use crate::shader::ShaderProgram;
use crate::BigFloat;

/// Define selecting the coloring function compiled into the fragment shader.
pub const FLOW_COLOR_TYPE_DEFINE: &str = "FLOW_COLOR_TYPE";

pub const LIVE_MAX_ITERATIONS: u32 = 400;
pub const SCREENSHOT_MAX_ITERATIONS: u32 = 5_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMap {
    Rainbow,
    BlackWhite,
    Glowing,
    #[default]
    RainbowSmooth,
}

impl ColorMap {
    pub const ALL: [ColorMap; 4] = [
        ColorMap::Rainbow,
        ColorMap::BlackWhite,
        ColorMap::Glowing,
        ColorMap::RainbowSmooth,
    ];

    pub fn code(self) -> u32 {
        match self {
            ColorMap::Rainbow => 0,
            ColorMap::BlackWhite => 1,
            ColorMap::Glowing => 2,
            ColorMap::RainbowSmooth => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|map| map.code() == code)
    }
}

/// Escape-time fractal settings.
///
/// `max_iterations` is the quality knob; color settings follow the live view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MandelbrotParams {
    pub max_iterations: u32,
    pub color_accuracy: u32,
    pub color_map: ColorMap,
    /// Derive `max_iterations` from zoom depth on every view change.
    pub auto_max_iterations: bool,
}

impl Default for MandelbrotParams {
    fn default() -> Self {
        Self {
            max_iterations: LIVE_MAX_ITERATIONS,
            color_accuracy: 10,
            color_map: ColorMap::default(),
            auto_max_iterations: false,
        }
    }
}

/// `400 + 100 * -log10(zoom)`, clamped to `[200, 4000]`.
pub fn auto_max_iterations(zoom_scale: &BigFloat) -> u32 {
    let estimate = 400.0 + 100.0 * -zoom_scale.log10_approx();
    estimate.round().clamp(200.0, 4_000.0) as u32
}

impl ConfigMixin for MandelbrotParams {
    fn init_defines(&self, program: &mut dyn ShaderProgram) {
        program.define(FLOW_COLOR_TYPE_DEFINE, &self.color_map.code().to_string());
    }

    fn apply_uniforms(&self, program: &mut dyn ShaderProgram) {
        program.set_uniform("max_iterations", self.max_iterations.into());
        program.set_uniform("color_accuracy", self.color_accuracy.into());
    }

    fn apply_screenshot_defaults(&mut self) {
        self.max_iterations = SCREENSHOT_MAX_ITERATIONS;
        self.auto_max_iterations = false;
    }

    fn copy_quality_from(&mut self, other: &Self) {
        self.max_iterations = other.max_iterations;
        self.auto_max_iterations = other.auto_max_iterations;
    }
}

impl MandelbrotParams {
    /// Take the fields a screenshot inherits from the live view.
    pub fn copy_live_from(&mut self, live: &Self) {
        self.color_accuracy = live.color_accuracy;
        self.color_map = live.color_map;
    }
}
