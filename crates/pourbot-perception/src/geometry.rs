//! Angle correction for off-axis depth readings.
//!
//! A time-of-flight pixel away from the optical axis reports the slant range
//! to its target, not the perpendicular height below the camera. Given the
//! pixel's horizontal offset from the scan center and a focal-length
//! equivalent `F` (pixels), the viewing angle is `theta = atan(offset / F)`
//! and the perpendicular component is `value * cos(theta)`. The same angle
//! converts a rim-to-rim separation into a true diameter via
//! `v1 * sin(theta1) + v2 * sin(theta2)`.

/// Focal-length equivalent (pixels) of the production sensor, derived from
/// its 240×180 frame and 70° diagonal field of view.
pub const FOCAL_EQUIV_PX: f32 = 225.69;

/// Optical model of the scan geometry.
///
/// A calibration parameter: swap the focal equivalent when the sensor or
/// lens changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpticalGeometry {
    /// Focal-length equivalent in pixels.
    pub focal_equiv_px: f32,
}

impl Default for OpticalGeometry {
    fn default() -> Self {
        Self {
            focal_equiv_px: FOCAL_EQUIV_PX,
        }
    }
}

impl OpticalGeometry {
    /// Pixel offset of `index` from the optical axis of a scan `scan_len`
    /// pixels wide.
    fn axis_offset(self, scan_len: usize, index: usize) -> f32 {
        (scan_len as f32 / 2.0 - index as f32).abs()
    }

    /// Perpendicular height of the reading `value` at pixel `index`,
    /// corrected for its angular offset from the optical axis.
    ///
    /// At the scan center the correction is the identity.
    pub fn corrected_height(self, scan_len: usize, index: usize, value: f32) -> f32 {
        let theta = (self.axis_offset(scan_len, index) / self.focal_equiv_px).atan();
        value * theta.cos()
    }

    /// True cup radius recovered from two rim readings `(v1, i1)` and
    /// `(v2, i2)` on opposite walls.
    ///
    /// Each slant range is projected onto the horizontal through
    /// `sin(theta)`; the two projections sum to the diameter.
    pub fn rim_radius(
        self,
        scan_len: usize,
        (v1, i1): (f32, usize),
        (v2, i2): (f32, usize),
    ) -> f32 {
        let theta1 = (self.axis_offset(scan_len, i1) / self.focal_equiv_px).atan();
        let theta2 = (self.axis_offset(scan_len, i2) / self.focal_equiv_px).atan();
        let diameter = v1 * theta1.sin() + v2 * theta2.sin();
        diameter / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correction_is_identity_at_scan_center() {
        let geo = OpticalGeometry::default();
        // Center index of a 240-px scan is 120: offset 0, cos(atan(0)) = 1.
        let corrected = geo.corrected_height(240, 120, 0.40);
        assert!((corrected - 0.40).abs() < 1e-6);
    }

    #[test]
    fn correction_shrinks_off_axis_readings() {
        let geo = OpticalGeometry::default();
        let at_center = geo.corrected_height(240, 120, 0.40);
        let at_edge = geo.corrected_height(240, 0, 0.40);
        assert!(at_edge < at_center);
        assert!(at_edge > 0.0);
    }

    #[test]
    fn correction_is_symmetric_about_center() {
        let geo = OpticalGeometry::default();
        let left = geo.corrected_height(240, 100, 0.30);
        let right = geo.corrected_height(240, 140, 0.30);
        assert!((left - right).abs() < 1e-6);
    }

    #[test]
    fn rim_radius_zero_for_on_axis_rims() {
        let geo = OpticalGeometry::default();
        // Both rims exactly on the optical axis project to zero diameter.
        let r = geo.rim_radius(240, (0.25, 120), (0.25, 120));
        assert!(r.abs() < 1e-6);
    }

    #[test]
    fn rim_radius_symmetric_pair() {
        let geo = OpticalGeometry::default();
        let r = geo.rim_radius(240, (0.25, 100), (0.25, 140));
        // Offsets of 20 px each: radius = 0.25 * sin(atan(20 / 225.69)).
        let expected = 0.25 * (20.0f32 / FOCAL_EQUIV_PX).atan().sin();
        assert!((r - expected).abs() < 1e-6);
        assert!(r > 0.0);
    }

    #[test]
    fn wider_rim_pair_yields_larger_radius() {
        let geo = OpticalGeometry::default();
        let narrow = geo.rim_radius(240, (0.25, 110), (0.25, 130));
        let wide = geo.rim_radius(240, (0.25, 90), (0.25, 150));
        assert!(wide > narrow);
    }
}
