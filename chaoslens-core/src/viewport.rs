use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::precision::precision_bits_for_viewport;
use crate::BigFloat;

/// Window size plus the model-space region it shows.
///
/// - `zoom_scale`: model-space span of `min(window_width, window_height)` pixels
/// - `center`: model-space point at the middle of the window
///
/// Invariant: `zoom_scale > 0` and both window dimensions are non-zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub window_width: u32,
    pub window_height: u32,
    pub zoom_scale: BigFloat,
    pub center: (BigFloat, BigFloat),
}

impl Viewport {
    /// Validated constructor. Precision is raised if the zoom depth requires it.
    pub fn new(
        window_width: u32,
        window_height: u32,
        zoom_scale: BigFloat,
        center_x: BigFloat,
        center_y: BigFloat,
    ) -> Result<Self, CoreError> {
        let mut viewport = Self {
            window_width,
            window_height,
            zoom_scale,
            center: (center_x, center_y),
        };
        viewport.validate()?;
        viewport.ensure_precision();
        Ok(viewport)
    }

    pub fn from_f64(
        window_width: u32,
        window_height: u32,
        zoom_scale: f64,
        center_x: f64,
        center_y: f64,
    ) -> Result<Self, CoreError> {
        Self::new(
            window_width,
            window_height,
            BigFloat::with_precision(zoom_scale, 64),
            BigFloat::with_precision(center_x, 64),
            BigFloat::with_precision(center_y, 64),
        )
    }

    /// Build from decimal strings, for coordinates beyond f64 precision.
    pub fn from_strings(
        window_width: u32,
        window_height: u32,
        zoom_scale: &str,
        center_x: &str,
        center_y: &str,
    ) -> Result<Self, CoreError> {
        // Every decimal digit written down is worth keeping.
        let digits = zoom_scale.len().max(center_x.len()).max(center_y.len());
        let probe_bits = ((digits as f64 * 3.33).ceil() as usize + 64).next_power_of_two();
        let probe_bits = probe_bits.max(precision_probe_bits(zoom_scale));

        let viewport = Self::new(
            window_width,
            window_height,
            BigFloat::from_string(zoom_scale, probe_bits)?,
            BigFloat::from_string(center_x, probe_bits)?,
            BigFloat::from_string(center_y, probe_bits)?,
        )?;
        Ok(viewport)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(CoreError::InvalidViewport(format!(
                "window size {}x{} must be non-zero",
                self.window_width, self.window_height
            )));
        }
        if !self.zoom_scale.is_positive() {
            return Err(CoreError::InvalidViewport(format!(
                "zoom scale {} must be positive",
                self.zoom_scale
            )));
        }
        Ok(())
    }

    /// Normalisation factor: scale is uniform regardless of aspect ratio.
    pub fn window_size(&self) -> u32 {
        self.window_width.min(self.window_height)
    }

    pub fn precision_bits(&self) -> usize {
        self.zoom_scale.precision_bits()
    }

    /// Raise all values to the precision the current zoom depth needs.
    ///
    /// Precision is never lowered, so zooming back out keeps accumulated digits.
    pub fn ensure_precision(&mut self) {
        let needed = precision_bits_for_viewport(self);
        if needed > self.precision_bits() {
            self.zoom_scale = self.zoom_scale.with_new_precision(needed);
            self.center.0 = self.center.0.with_new_precision(needed);
            self.center.1 = self.center.1.with_new_precision(needed);
        }
    }

    /// Change window dimensions. Center and zoom scale are kept, so the
    /// visible region stays centred.
    pub fn resize(&mut self, window_width: u32, window_height: u32) -> Result<(), CoreError> {
        if window_width == 0 || window_height == 0 {
            return Err(CoreError::InvalidViewport(format!(
                "window size {}x{} must be non-zero",
                window_width, window_height
            )));
        }
        self.window_width = window_width;
        self.window_height = window_height;
        self.ensure_precision();
        Ok(())
    }

    /// Same model-space view rendered at a different resolution.
    pub fn with_window_size(&self, window_width: u32, window_height: u32) -> Result<Self, CoreError> {
        let mut viewport = self.clone();
        viewport.resize(window_width, window_height)?;
        Ok(viewport)
    }
}

/// Enough bits to parse a zoom string without it underflowing to zero.
fn precision_probe_bits(zoom_scale: &str) -> usize {
    let exponent = zoom_scale
        .trim()
        .rsplit_once(['e', 'E'])
        .and_then(|(_, exp)| exp.parse::<i64>().ok())
        .unwrap_or(0);
    let bits = (exponent.unsigned_abs() as f64 * 3.33).ceil() as usize + 128;
    bits.next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================================
    // Construction and validation
    // ============================================================================

    #[test]
    fn from_f64_stores_values() {
        let vp = Viewport::from_f64(1920, 1080, 3.5, -0.5, 0.25).unwrap();
        assert_eq!(vp.window_width, 1920);
        assert_eq!(vp.window_height, 1080);
        assert_eq!(vp.zoom_scale.to_f64(), 3.5);
        assert_eq!(vp.center.0.to_f64(), -0.5);
        assert_eq!(vp.center.1.to_f64(), 0.25);
    }

    #[test]
    fn rejects_non_positive_zoom() {
        assert!(Viewport::from_f64(100, 100, 0.0, 0.0, 0.0).is_err());
        assert!(Viewport::from_f64(100, 100, -1.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn rejects_empty_window() {
        assert!(Viewport::from_f64(0, 100, 1.0, 0.0, 0.0).is_err());
        assert!(Viewport::from_f64(100, 0, 1.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn window_size_is_smaller_dimension() {
        let vp = Viewport::from_f64(1920, 1080, 3.5, 0.0, 0.0).unwrap();
        assert_eq!(vp.window_size(), 1080);
        let vp = Viewport::from_f64(600, 900, 3.5, 0.0, 0.0).unwrap();
        assert_eq!(vp.window_size(), 600);
    }

    #[test]
    fn from_strings_keeps_deep_zoom() {
        let vp = Viewport::from_strings(1000, 1000, "1e-300", "-0.75", "0.1").unwrap();
        assert!(vp.zoom_scale.is_positive());
        assert!(vp.precision_bits() > 1000);
        assert!((vp.zoom_scale.log10_approx() + 300.0).abs() < 1.0);
    }

    #[test]
    fn from_strings_reports_parse_errors() {
        let err = Viewport::from_strings(10, 10, "zoom", "0", "0").unwrap_err();
        assert!(matches!(err, CoreError::ParseNumber { .. }));
    }

    // ============================================================================
    // Resize
    // ============================================================================

    #[test]
    fn resize_keeps_center_and_zoom() {
        let mut vp = Viewport::from_f64(800, 600, 2.0, 0.3, -0.2).unwrap();
        vp.resize(1920, 1080).unwrap();
        assert_eq!(vp.window_width, 1920);
        assert_eq!(vp.zoom_scale.to_f64(), 2.0);
        assert_eq!(vp.center.0.to_f64(), 0.3);
        assert_eq!(vp.center.1.to_f64(), -0.2);
    }

    #[test]
    fn resize_to_zero_is_rejected_and_leaves_viewport_untouched() {
        let mut vp = Viewport::from_f64(800, 600, 2.0, 0.0, 0.0).unwrap();
        assert!(vp.resize(0, 600).is_err());
        assert_eq!(vp.window_width, 800);
    }
}
