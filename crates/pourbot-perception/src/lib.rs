//! `pourbot-perception` – depth-scan sensing and estimation pipeline.
//!
//! Turns single-row time-of-flight depth scans into the two decisions the
//! dispenser needs: *is a cup centered under the nozzle* and *how much liquid
//! fits in it*.
//!
//! # Modules
//!
//! - [`scan`] – [`DepthScan`][scan::DepthScan] and
//!   [`ScanSource`][scan::ScanSource]: frame acquisition with out-of-range
//!   rejection sampling.
//! - [`geometry`] – angle correction for off-axis readings and rim-pair
//!   radius recovery.
//! - [`rim`] – [`RimDetector`][rim::RimDetector]: ground height and two-wall
//!   cup-rim detection within a scan.
//! - [`centering`] – [`CenteringEvaluator`][centering::CenteringEvaluator]:
//!   presence check plus centered/off-center decision.
//! - [`volume`] – [`VolumeEstimator`][volume::VolumeEstimator]: rim/ground
//!   geometry to an estimated liquid volume in fluid ounces.

pub mod centering;
pub mod geometry;
pub mod rim;
pub mod scan;
pub mod volume;

pub use centering::{CenteringEvaluator, CenteringSignal};
pub use geometry::OpticalGeometry;
pub use rim::{RimDetector, RimPair, RimPoint};
pub use scan::{DepthScan, RetryPolicy, ScanSource};
pub use volume::{VolumeConfig, VolumeEstimator};
