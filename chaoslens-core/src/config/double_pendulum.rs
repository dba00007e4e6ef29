use serde::{Deserialize, Serialize};

use super::ConfigMixin;
use crate::shader::ShaderProgram;

/// Physical constants and initial state of the double pendulum.
///
/// Model space is the pair of starting angles; each pixel integrates to `t_end`.
/// Every field here follows the live view, none is a quality setting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoublePendulumParams {
    pub t_end: f32,
    pub v1_start: f32,
    pub v2_start: f32,
    pub gravity: f32,
    pub length1: f32,
    pub length2: f32,
    pub mass1: f32,
    pub mass2: f32,
}

impl Default for DoublePendulumParams {
    fn default() -> Self {
        Self {
            t_end: 3.0,
            v1_start: 0.0,
            v2_start: 0.0,
            gravity: 9.81,
            length1: 1.0,
            length2: 1.0,
            mass1: 1.0,
            mass2: 1.0,
        }
    }
}

impl ConfigMixin for DoublePendulumParams {
    fn apply_uniforms(&self, program: &mut dyn ShaderProgram) {
        program.set_uniform("t_end", self.t_end.into());
        program.set_uniform("v1_start", self.v1_start.into());
        program.set_uniform("v2_start", self.v2_start.into());
        program.set_uniform("gravity", self.gravity.into());
        program.set_uniform("length1", self.length1.into());
        program.set_uniform("length2", self.length2.into());
        program.set_uniform("mass1", self.mass1.into());
        program.set_uniform("mass2", self.mass2.into());
    }

    fn apply_screenshot_defaults(&mut self) {}

    fn copy_quality_from(&mut self, _other: &Self) {}
}
