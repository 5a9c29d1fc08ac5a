//! Geometric liquid-volume estimation.
//!
//! One-shot conversion of a single depth scan into an estimated fill volume
//! in fluid ounces, run once per pour cycle after the cup is centered. The
//! model treats the cup as a frustum-like cylinder: rim height above a
//! locally-probed ground, surface height through the rim gap, and a radius
//! recovered from the two rim walls, all scaled by calibration factors tuned
//! against physical measurement.
//!
//! Known gap: the estimate is not validated for plausibility before the
//! pour. A degenerate scan (no distinguishable rim) produces an implausible
//! but non-crashing number, and the control node pours on it anyway.

use tracing::debug;

use crate::geometry::OpticalGeometry;
use crate::rim::RimDetector;
use crate::scan::DepthScan;

/// Calibration parameters for [`VolumeEstimator`].
///
/// Every empirical constant of the model lives here by name; the defaults
/// are the values calibrated on the production rig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeConfig {
    /// Narrow exclusion radius (pixels) for the precise volumetric rim fix.
    pub fix_exclusion_px: usize,
    /// The ground is probed this many pixels outside each rim wall instead
    /// of at the scan's global maximum, localising the ground reference near
    /// the cup.
    pub ground_probe_offset_px: usize,
    /// Width (pixels) of the window around the scan center searched for the
    /// tallest point under the cup's open mouth.
    pub center_window_px: usize,
    /// Empirical correction on the rim-to-surface height, compensating for
    /// systematic overestimation from the viewing angle.
    pub height_factor: f32,
    /// Empirical scale on the recovered rim radius.
    pub radius_factor: f32,
    /// Frustum-versus-cylinder shape factor.
    pub shape_factor: f32,
    /// Cubic meters to fluid ounces.
    pub cubic_m_to_fl_oz: f32,
    /// First-stage shape/error trim applied to the raw volume.
    pub trim_factor: f32,
    /// Volume (oz) above which the concave overestimation penalty engages.
    pub taper_knee_oz: f32,
    /// Gain of the concave penalty.
    pub taper_gain: f32,
    /// Exponent of the concave penalty.
    pub taper_exponent: f32,
    /// Final calibration factor applied after all other corrections.
    pub calibration_factor: f32,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            fix_exclusion_px: 5,
            ground_probe_offset_px: 5,
            center_window_px: 20,
            height_factor: 0.9,
            radius_factor: 0.78,
            shape_factor: 0.745,
            cubic_m_to_fl_oz: 33_814.023,
            trim_factor: 0.85,
            taper_knee_oz: 10.0,
            taper_gain: 0.05,
            taper_exponent: 1.8,
            calibration_factor: 0.9,
        }
    }
}

/// Converts rim/ground geometry into an estimated liquid volume.
///
/// A pure function of its input scan: re-running on an identical scan yields
/// an identical estimate.
#[derive(Debug, Clone, Copy)]
pub struct VolumeEstimator {
    detector: RimDetector,
    geometry: OpticalGeometry,
    config: VolumeConfig,
}

impl Default for VolumeEstimator {
    fn default() -> Self {
        Self::new(OpticalGeometry::default(), VolumeConfig::default())
    }
}

impl VolumeEstimator {
    /// Build an estimator over the given optical model and calibration.
    pub fn new(geometry: OpticalGeometry, config: VolumeConfig) -> Self {
        Self {
            detector: RimDetector::new(geometry),
            geometry,
            config,
        }
    }

    /// Estimate the fill volume (fluid ounces) from one scan.
    pub fn estimate(&self, scan: &DepthScan) -> f32 {
        if scan.is_empty() {
            return 0.0;
        }
        let n = scan.len();
        let samples = scan.samples();
        let cfg = &self.config;

        // Precise rim fix with the narrow exclusion radius. Heights below
        // use the original, unmasked readings.
        let rims = self.detector.find_rims(scan, cfg.fix_exclusion_px);

        // Local ground: average the corrected heights of the two points just
        // outside each rim wall, rather than the global maximum. This keeps
        // the ground reference near the cup and reduces scan-curvature
        // error.
        let probe_a = rims.first.index.saturating_sub(cfg.ground_probe_offset_px);
        let probe_b = (rims.second.index + cfg.ground_probe_offset_px).min(n - 1);
        let ground = (self.geometry.corrected_height(n, probe_a, samples[probe_a])
            + self.geometry.corrected_height(n, probe_b, samples[probe_b]))
            / 2.0;

        // Tallest point under the cup's open mouth: the liquid surface as
        // seen through the rim gap.
        let half = cfg.center_window_px / 2;
        let start = scan.center_index().saturating_sub(half);
        let end = (scan.center_index() + half).min(n);
        let mut center_height = f32::MIN;
        for (i, &value) in samples.iter().enumerate().take(end).skip(start) {
            let h = ground - self.geometry.corrected_height(n, i, value);
            if h > center_height {
                center_height = h;
            }
        }

        // The rim with the smaller raw reading is the nearer, authoritative
        // wall.
        let rim = if rims.first.value < rims.second.value {
            rims.first
        } else {
            rims.second
        };
        let rim_height = ground - self.geometry.corrected_height(n, rim.index, rim.value);

        let height = (rim_height - center_height) * cfg.height_factor;
        let radius = self.geometry.rim_radius(
            n,
            (rims.first.value, rims.first.index),
            (rims.second.value, rims.second.index),
        ) * cfg.radius_factor;

        let raw = std::f32::consts::PI
            * radius
            * radius
            * height
            * cfg.shape_factor
            * cfg.cubic_m_to_fl_oz;

        let mut volume = raw * cfg.trim_factor;
        if volume > cfg.taper_knee_oz {
            volume -= cfg.taper_gain * (volume - cfg.taper_knee_oz).powf(cfg.taper_exponent);
        }
        volume *= cfg.calibration_factor;

        debug!(
            ground,
            rim_height,
            center_height,
            height,
            radius,
            raw,
            volume,
            "volume estimated"
        );
        volume
    }
}
