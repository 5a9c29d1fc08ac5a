//! Cup-presence and centering decisions.
//!
//! Run continuously while an operator slides the cup around: each evaluation
//! looks at one fresh scan, so the signal tracks the cup between calls.

use tracing::debug;

use crate::geometry::OpticalGeometry;
use crate::rim::RimDetector;
use crate::scan::DepthScan;

/// Outcome of one centering evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CenteringSignal {
    /// No cup: neither rim candidate rises far enough above the ground.
    NotPresent,
    /// A cup is present but its rim midpoint is off the scan center.
    OffCenter,
    /// The rim midpoint is within the centering threshold of the scan
    /// center.
    Centered,
}

/// Tunables for [`CenteringEvaluator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenteringConfig {
    /// A rim must read at least this much nearer than ground (meters) for a
    /// cup to count as present; rejects flat or empty-tray scans.
    pub presence_margin_m: f32,
    /// Maximum pixel offset between the rim midpoint and the scan center
    /// that still counts as centered.
    pub centering_threshold_px: usize,
    /// Wide exclusion radius used while merely checking that two plausible
    /// rims exist (the volumetric fix uses a narrower one).
    pub search_exclusion_px: usize,
}

impl Default for CenteringConfig {
    fn default() -> Self {
        Self {
            presence_margin_m: 0.06,
            centering_threshold_px: 12,
            search_exclusion_px: 15,
        }
    }
}

/// Decides whether a detected cup sits centered under the sensor.
#[derive(Debug, Clone, Copy)]
pub struct CenteringEvaluator {
    detector: RimDetector,
    config: CenteringConfig,
}

impl Default for CenteringEvaluator {
    fn default() -> Self {
        Self::new(OpticalGeometry::default(), CenteringConfig::default())
    }
}

impl CenteringEvaluator {
    /// Build an evaluator over the given optical model and tunables.
    pub fn new(geometry: OpticalGeometry, config: CenteringConfig) -> Self {
        Self {
            detector: RimDetector::new(geometry),
            config,
        }
    }

    /// Evaluate one scan.
    ///
    /// Detects the ground and two rim candidates, gates on the presence
    /// margin, then compares the rim midpoint against the scan center.
    pub fn evaluate(&self, scan: &DepthScan) -> CenteringSignal {
        let ground = self.detector.ground_height(scan);
        let rims = self.detector.find_rims(scan, self.config.search_exclusion_px);

        let present = rims.first.value - ground < -self.config.presence_margin_m
            && rims.second.value - ground < -self.config.presence_margin_m;
        if !present {
            debug!(ground, ?rims, "no cup present");
            return CenteringSignal::NotPresent;
        }

        let midpoint = (rims.first.index + rims.second.index) / 2;
        let offset = midpoint.abs_diff(scan.center_index());
        let signal = if offset < self.config.centering_threshold_px {
            CenteringSignal::Centered
        } else {
            CenteringSignal::OffCenter
        };
        debug!(
            ground,
            midpoint,
            center = scan.center_index(),
            offset,
            ?signal,
            "centering evaluated"
        );
        signal
    }
}
