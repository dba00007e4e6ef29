//! Precision selection for the viewport's arbitrary precision values.
//!
//! Deeper zooms need more mantissa bits to keep adjacent pixels distinct.

use crate::{BigFloat, Viewport};

/// Margin for rounding error in the mapper's arithmetic.
const SAFETY_BITS: u64 = 64;

/// Floor for every precision we hand out.
pub const MIN_PRECISION_BITS: usize = 64;

/// Precision needed to resolve single pixels at `zoom_scale` spread over
/// `window_size` pixels, for coordinates of magnitude up to `magnitude_log2`.
fn bits_for(zoom_scale: &BigFloat, window_size: u32, magnitude_log2: f64) -> usize {
    let log2_pixel = zoom_scale.log2_approx() - (window_size.max(1) as f64).log2();
    if !log2_pixel.is_finite() {
        return MIN_PRECISION_BITS;
    }

    // ceil(log2(M / pixel)), one extra bit for the |c| + zoom/2 sum
    let log2_ratio = magnitude_log2.max(zoom_scale.log2_approx()) + 1.0 - log2_pixel;
    let bits_from_ratio = log2_ratio.ceil().max(0.0) as u64;

    ((bits_from_ratio + SAFETY_BITS) as usize)
        .next_power_of_two()
        .max(MIN_PRECISION_BITS)
}

/// Bits needed for a zoom scale alone (center assumed near the origin).
pub fn precision_bits_for_zoom(zoom_scale: &BigFloat, window_size: u32) -> usize {
    bits_for(zoom_scale, window_size, 1.0)
}

/// Bits needed for a full viewport, accounting for how far the center is from the origin.
pub fn precision_bits_for_viewport(viewport: &Viewport) -> usize {
    let (cx, cy) = &viewport.center;
    let magnitude = cx.log2_approx().max(cy.log2_approx()).max(1.0);
    bits_for(&viewport.zoom_scale, viewport.window_size(), magnitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_zoom_needs_modest_precision() {
        let bits = precision_bits_for_zoom(&BigFloat::with_precision(3.5, 64), 1080);
        assert!(bits >= 64);
        assert!(bits <= 128);
    }

    #[test]
    fn precision_increases_with_zoom() {
        let shallow = precision_bits_for_zoom(&BigFloat::with_precision(4.0, 64), 1080);
        let deep = precision_bits_for_zoom(&BigFloat::from_string("4e-40", 512).unwrap(), 1080);
        assert!(deep > shallow, "expected {deep} > {shallow}");
    }

    #[test]
    fn extreme_zoom_needs_thousands_of_bits() {
        let zoom = BigFloat::from_string("1e-500", 4096).unwrap();
        let bits = precision_bits_for_zoom(&zoom, 1920);
        assert!(bits >= 1024);
        assert!(bits <= 4096);
    }

    #[test]
    fn result_is_power_of_two() {
        let bits = precision_bits_for_zoom(&BigFloat::with_precision(1e-9, 64), 777);
        assert!(bits.is_power_of_two());
    }

    #[test]
    fn far_center_needs_more_bits() {
        let near = Viewport::from_f64(1000, 1000, 1e-10, 0.0, 0.0).unwrap();
        let far = Viewport::from_f64(1000, 1000, 1e-10, 1e30, 0.0).unwrap();
        assert!(precision_bits_for_viewport(&far) > precision_bits_for_viewport(&near));
    }
}
