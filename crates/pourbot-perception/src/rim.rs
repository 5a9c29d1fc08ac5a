//! Ground-height and cup-rim detection within a single depth scan.
//!
//! Seen in cross-section from above, a cup shows up as two sharp local
//! minima (the near walls of the rim) against a farther background (the
//! ground). [`RimDetector`] finds the global minimum as the first rim wall,
//! masks an exclusion window around it so the same wall cannot win twice,
//! and takes the next global minimum as the second wall.

use tracing::trace;

use crate::geometry::OpticalGeometry;
use crate::scan::DepthScan;

/// A single rim-wall candidate: the raw reading and its pixel index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RimPoint {
    /// Raw distance reading in meters.
    pub value: f32,
    /// Pixel index within the scan.
    pub index: usize,
}

/// The two rim-wall candidates of one cup.
///
/// `first` is the global minimum of the scan; `second` is the minimum after
/// the exclusion window around `first` was masked out, so the two indices
/// are always separated by more than the exclusion radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RimPair {
    pub first: RimPoint,
    pub second: RimPoint,
}

/// Finds ground height and rim pairs within a scan.
#[derive(Debug, Clone, Copy)]
pub struct RimDetector {
    geometry: OpticalGeometry,
    /// Sentinel distance (meters) written over masked pixels. Must exceed
    /// any plausible reading so masked pixels can never win the second
    /// minimum search.
    mask_sentinel_m: f32,
}

impl Default for RimDetector {
    fn default() -> Self {
        Self::new(OpticalGeometry::default())
    }
}

impl RimDetector {
    /// Build a detector over the given optical model.
    pub fn new(geometry: OpticalGeometry) -> Self {
        Self {
            geometry,
            mask_sentinel_m: 2.0,
        }
    }

    /// The optical model this detector corrects readings with.
    pub fn geometry(&self) -> OpticalGeometry {
        self.geometry
    }

    /// Camera-corrected height of the background surface.
    ///
    /// Takes the scan's maximum (farthest) reading as the background and
    /// corrects it for its angular offset. Degenerate (empty) scans yield
    /// zero rather than an error; downstream consumers surface the resulting
    /// implausible estimates instead.
    pub fn ground_height(&self, scan: &DepthScan) -> f32 {
        let (index, value) = argmax(scan.samples());
        self.geometry.corrected_height(scan.len(), index, value)
    }

    /// Detect the two rim walls of a cup.
    ///
    /// `exclusion_radius_px` is a per-call-site tunable: a wide radius when
    /// merely checking that two plausible rims exist during centering, a
    /// narrow one for the precise volumetric rim fix. The scan itself is not
    /// modified; masking happens on a working copy.
    pub fn find_rims(&self, scan: &DepthScan, exclusion_radius_px: usize) -> RimPair {
        let mut work = scan.samples().to_vec();

        let (i1, v1) = argmin(&work);
        if !work.is_empty() {
            let lo = i1.saturating_sub(exclusion_radius_px);
            let hi = (i1 + exclusion_radius_px).min(work.len() - 1);
            for sample in &mut work[lo..=hi] {
                *sample = self.mask_sentinel_m;
            }
        }
        let (i2, v2) = argmin(&work);

        trace!(
            v1,
            i1,
            v2,
            i2,
            exclusion_radius_px,
            "rim pair detected"
        );
        RimPair {
            first: RimPoint { value: v1, index: i1 },
            second: RimPoint { value: v2, index: i2 },
        }
    }
}

/// Index and value of the first minimum element; `(0, 0.0)` for an empty
/// slice.
fn argmin(samples: &[f32]) -> (usize, f32) {
    samples
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, bv)) if bv <= v => best,
            _ => Some((i, v)),
        })
        .unwrap_or((0, 0.0))
}

/// Index and value of the first maximum element; `(0, 0.0)` for an empty
/// slice.
fn argmax(samples: &[f32]) -> (usize, f32) {
    samples
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
        .unwrap_or((0, 0.0))
}
