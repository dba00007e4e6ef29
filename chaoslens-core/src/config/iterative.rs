use serde::{Deserialize, Serialize};

use super::ConfigMixin;
use crate::shader::ShaderProgram;

/// Adaptive step-size integrator settings (RK45).
///
/// Tolerances are stored as base-10 exponents; the shader receives `10^exp`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterativeMethodParams {
    pub max_steps: u32,
    /// Consecutive rejected steps allowed before the integrator gives up.
    pub max_same_steps: u32,
    pub min_step_size: f32,
    pub atol_exponent: f32,
    pub rtol_exponent: f32,
}

impl Default for IterativeMethodParams {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            max_same_steps: 30,
            min_step_size: 1e-12,
            atol_exponent: -5.0,
            rtol_exponent: -5.0,
        }
    }
}

impl IterativeMethodParams {
    pub fn atol(&self) -> f32 {
        10f32.powf(self.atol_exponent)
    }

    pub fn rtol(&self) -> f32 {
        10f32.powf(self.rtol_exponent)
    }
}

impl ConfigMixin for IterativeMethodParams {
    fn apply_uniforms(&self, program: &mut dyn ShaderProgram) {
        program.set_uniform("max_steps", self.max_steps.into());
        program.set_uniform("max_same_steps", self.max_same_steps.into());
        program.set_uniform("min_step_size", self.min_step_size.into());
        program.set_uniform("atol", self.atol().into());
        program.set_uniform("rtol", self.rtol().into());
    }

    fn apply_screenshot_defaults(&mut self) {
        *self = Self {
            max_steps: 500_000,
            max_same_steps: 100,
            min_step_size: 1e-25,
            atol_exponent: -11.0,
            rtol_exponent: -11.0,
        };
    }

    fn copy_quality_from(&mut self, other: &Self) {
        *self = other.clone();
    }
}
