use serde::{Deserialize, Serialize};

use super::ConfigMixin;
use crate::shader::ShaderProgram;

/// Define selecting the sampling pattern compiled into the fragment shader.
pub const SUPER_SAMPLING_DEFINE: &str = "SUPER_SAMPLING";

/// Anti-aliasing strategy. The numeric codes are what the shader switches on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupersamplingMode {
    Adaptive,
    Off,
    #[default]
    X2,
    X4,
    X6,
    X8,
    X12,
    X16,
    /// 16 progressive multi-jittered samples.
    Pmj16,
    /// 32 progressive multi-jittered samples.
    Pmj32,
}

impl SupersamplingMode {
    pub const ALL: [SupersamplingMode; 10] = [
        SupersamplingMode::Adaptive,
        SupersamplingMode::Off,
        SupersamplingMode::X2,
        SupersamplingMode::X4,
        SupersamplingMode::X6,
        SupersamplingMode::X8,
        SupersamplingMode::X12,
        SupersamplingMode::X16,
        SupersamplingMode::Pmj16,
        SupersamplingMode::Pmj32,
    ];

    pub fn code(self) -> u32 {
        match self {
            SupersamplingMode::Adaptive => 0,
            SupersamplingMode::Off => 1,
            SupersamplingMode::X2 => 2,
            SupersamplingMode::X4 => 4,
            SupersamplingMode::X6 => 6,
            SupersamplingMode::X8 => 8,
            SupersamplingMode::X12 => 12,
            SupersamplingMode::X16 => 16,
            SupersamplingMode::Pmj16 => 1601,
            SupersamplingMode::Pmj32 => 32,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            SupersamplingMode::Adaptive => "Adaptive",
            SupersamplingMode::Off => "Off",
            SupersamplingMode::X2 => "2",
            SupersamplingMode::X4 => "4",
            SupersamplingMode::X6 => "6",
            SupersamplingMode::X8 => "8",
            SupersamplingMode::X12 => "12",
            SupersamplingMode::X16 => "16",
            SupersamplingMode::Pmj16 => "16 (pmj)",
            SupersamplingMode::Pmj32 => "32 (pmj)",
        }
    }
}

/// Supersampling mode plus the tolerances that stop adaptive sampling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupersamplingParams {
    pub mode: SupersamplingMode,
    pub mean_diff_tolerance: f32,
    pub abs_standard_error_tolerance: f32,
    pub rel_standard_error_tolerance: f32,
}

impl Default for SupersamplingParams {
    fn default() -> Self {
        Self {
            mode: SupersamplingMode::X2,
            mean_diff_tolerance: 0.003,
            abs_standard_error_tolerance: 0.004,
            rel_standard_error_tolerance: 0.01,
        }
    }
}

impl ConfigMixin for SupersamplingParams {
    fn init_defines(&self, program: &mut dyn ShaderProgram) {
        program.define(SUPER_SAMPLING_DEFINE, &self.mode.code().to_string());
    }

    fn apply_uniforms(&self, program: &mut dyn ShaderProgram) {
        program.set_uniform("mean_diff_tol", self.mean_diff_tolerance.into());
        program.set_uniform("abs_se_tol", self.abs_standard_error_tolerance.into());
        program.set_uniform("rel_se_tol", self.rel_standard_error_tolerance.into());
    }

    fn apply_screenshot_defaults(&mut self) {
        *self = Self {
            mode: SupersamplingMode::Pmj32,
            ..Self::default()
        };
    }

    fn copy_quality_from(&mut self, other: &Self) {
        // Every supersampling field is a quality field.
        *self = other.clone();
    }
}
