//! Coordinate Mapper: window pixels to model space and back, zoom and pan.
//!
//! Two pixel conventions are used:
//! - continuous window coordinates (cursor positions), origin top-left, y down
//! - fragment coordinates, origin bottom-left, y up, where the pixel with index
//!   `(i, j)` is sampled at `(i + 0.5, j + 0.5)`
//!
//! Every mapping funnels through [`frag_to_model`], which is also what the shaders
//! evaluate, so the interactive and tiled paths agree bit for bit.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::{BigFloat, Viewport};

/// Factor for one discrete zoom step (scroll wheel, Ctrl+Plus/Minus).
pub const ZOOM_STEP: f64 = 1.1;

/// Zoom speed while a zoom key is held, in factors per second.
pub const ZOOM_PER_SECOND: f64 = 3.0;

/// Model-space size of one pixel.
pub fn pixel_scale(viewport: &Viewport) -> BigFloat {
    let size = BigFloat::with_precision(viewport.window_size() as f64, viewport.precision_bits());
    viewport.zoom_scale.div(&size)
}

/// Map a bottom-up fragment coordinate to model space.
///
/// `model = center + (zoom_scale / window_size) * (frag - window_dimension / 2)`
pub fn frag_to_model(viewport: &Viewport, frag_x: f64, frag_y: f64) -> (BigFloat, BigFloat) {
    let scale = pixel_scale(viewport);
    let precision = viewport.precision_bits();
    let dx = frag_x - viewport.window_width as f64 / 2.0;
    let dy = frag_y - viewport.window_height as f64 / 2.0;

    (
        viewport
            .center
            .0
            .add(&scale.mul(&BigFloat::with_precision(dx, precision))),
        viewport
            .center
            .1
            .add(&scale.mul(&BigFloat::with_precision(dy, precision))),
    )
}

/// Map a continuous window coordinate (top-left origin) to model space.
pub fn pixel_to_model(viewport: &Viewport, x: f64, y: f64) -> (BigFloat, BigFloat) {
    frag_to_model(viewport, x, viewport.window_height as f64 - y)
}

/// Map a bottom-up pixel index to the model-space point at its center.
pub fn sample_to_model(viewport: &Viewport, i: u32, j: u32) -> (BigFloat, BigFloat) {
    frag_to_model(viewport, i as f64 + 0.5, j as f64 + 0.5)
}

/// Map a pixel index inside a tile of a larger image to model space.
///
/// The tile's local fragment coordinate is shifted by its offset, matching the
/// `tile_offset` uniform applied in the shader.
pub fn tile_sample_to_model(
    viewport: &Viewport,
    tile_offset: (u32, u32),
    local_i: u32,
    local_j: u32,
) -> (BigFloat, BigFloat) {
    let frag_x = (local_i as f64 + 0.5) + tile_offset.0 as f64;
    let frag_y = (local_j as f64 + 0.5) + tile_offset.1 as f64;
    frag_to_model(viewport, frag_x, frag_y)
}

/// Inverse of [`pixel_to_model`]: model space to continuous window coordinates.
pub fn model_to_pixel(viewport: &Viewport, model: (&BigFloat, &BigFloat)) -> (f64, f64) {
    let scale = pixel_scale(viewport);
    let fx = model.0.sub(&viewport.center.0).div(&scale).to_f64()
        + viewport.window_width as f64 / 2.0;
    let fy = model.1.sub(&viewport.center.1).div(&scale).to_f64()
        + viewport.window_height as f64 / 2.0;
    (fx, viewport.window_height as f64 - fy)
}

/// Zoom by `factor` keeping the model-space point under `focus` fixed.
///
/// `focus` is a continuous window coordinate. `factor < 1` zooms in.
pub fn zoom_at(viewport: &mut Viewport, focus: (f64, f64), factor: f64) -> Result<(), CoreError> {
    if !(factor.is_finite() && factor > 0.0) {
        return Err(CoreError::InvalidViewport(format!(
            "zoom factor {factor} must be positive and finite"
        )));
    }

    let precision = viewport.precision_bits();
    let scale = pixel_scale(viewport);
    let shift = scale.mul_f64(1.0 - factor);
    let dx = focus.0 - viewport.window_width as f64 / 2.0;
    let dy = (viewport.window_height as f64 - focus.1) - viewport.window_height as f64 / 2.0;

    viewport.center.0 = viewport
        .center
        .0
        .add(&shift.mul(&BigFloat::with_precision(dx, precision)));
    viewport.center.1 = viewport
        .center
        .1
        .add(&shift.mul(&BigFloat::with_precision(dy, precision)));
    viewport.zoom_scale = viewport.zoom_scale.mul_f64(factor);
    viewport.ensure_precision();
    Ok(())
}

/// Drag the view by a window-pixel delta (top-left origin, y down).
pub fn pan(viewport: &mut Viewport, dx: f64, dy: f64) {
    let precision = viewport.precision_bits();
    let scale = pixel_scale(viewport);
    viewport.center.0 = viewport
        .center
        .0
        .sub(&scale.mul(&BigFloat::with_precision(dx, precision)));
    viewport.center.1 = viewport
        .center
        .1
        .add(&scale.mul(&BigFloat::with_precision(dy, precision)));
}

/// Where zoom operations are anchored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusMode {
    /// Zoom toward the pointer.
    #[default]
    Pointer,
    /// Zoom toward the window center, ignoring the pointer.
    LockedToCenter,
}

impl FocusMode {
    pub fn resolve(self, viewport: &Viewport, pointer: (f64, f64)) -> (f64, f64) {
        match self {
            FocusMode::Pointer => pointer,
            FocusMode::LockedToCenter => (
                viewport.window_width as f64 / 2.0,
                viewport.window_height as f64 / 2.0,
            ),
        }
    }
}

/// Factor for one frame of continuous zoom lasting `dt` seconds.
pub fn continuous_zoom_factor(dt: f64, zoom_in: bool) -> f64 {
    if zoom_in {
        ZOOM_PER_SECOND.powf(-dt)
    } else {
        ZOOM_PER_SECOND.powf(dt)
    }
}

/// Factor for one discrete step.
pub fn step_zoom_factor(zoom_in: bool) -> f64 {
    if zoom_in {
        1.0 / ZOOM_STEP
    } else {
        ZOOM_STEP
    }
}
