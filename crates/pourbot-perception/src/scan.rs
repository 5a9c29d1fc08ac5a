//! Depth-scan acquisition with out-of-range rejection sampling.
//!
//! [`ScanSource`] wraps a [`DepthCamera`] and produces validated
//! [`DepthScan`]s: the row at `height / 2` of each frame, re-captured until
//! no sample exceeds the configured range ceiling. Readings beyond the
//! ceiling are transient sensor noise on this rig, so a scan containing any
//! is discarded whole rather than patched.

use std::time::Duration;

use pourbot_hal::depth::DepthCamera;
use pourbot_types::DispenserError;
use tracing::{debug, trace};

/// One cross-sectional row of a depth frame, values in meters.
///
/// Length is fixed by the sensor resolution for the lifetime of a session;
/// [`ScanSource`] enforces this across acquisitions.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthScan {
    samples: Vec<f32>,
}

impl DepthScan {
    /// Wrap a row of depth samples.
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// The raw samples in pixel order.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of pixels in the scan.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` when the scan holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Pixel index of the scan center (the optical axis column).
    pub fn center_index(&self) -> usize {
        self.samples.len() / 2
    }
}

/// Retry policy for acquisition loops.
///
/// The production default is unbounded with no backoff: data validity is
/// prioritised over latency in the controlled indoor setting, and callers
/// must not assume bounded acquisition time. Tests bound it so a scripted
/// camera that never produces a clean scan fails fast instead of spinning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum capture attempts per acquisition, `None` for unbounded.
    pub max_attempts: Option<usize>,
    /// Pause between rejected captures.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Bounded policy with no backoff, for tests and bring-up checks.
    pub fn bounded(max_attempts: usize) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            backoff: Duration::ZERO,
        }
    }
}

/// Configuration for [`ScanSource`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSourceConfig {
    /// Any sample beyond this range (meters) rejects the whole scan.
    pub max_range_m: f32,
    /// Capture retry policy applied when a scan is rejected.
    pub retry: RetryPolicy,
}

impl Default for ScanSourceConfig {
    fn default() -> Self {
        Self {
            max_range_m: 0.5,
            retry: RetryPolicy::default(),
        }
    }
}

/// Produces validated [`DepthScan`]s from an owned [`DepthCamera`].
pub struct ScanSource<C: DepthCamera> {
    camera: C,
    config: ScanSourceConfig,
    expected_len: Option<usize>,
}

impl<C: DepthCamera> ScanSource<C> {
    /// Take ownership of `camera` with the default configuration.
    pub fn new(camera: C) -> Self {
        Self::with_config(camera, ScanSourceConfig::default())
    }

    /// Take ownership of `camera` with an explicit configuration.
    pub fn with_config(camera: C, config: ScanSourceConfig) -> Self {
        Self {
            camera,
            config,
            expected_len: None,
        }
    }

    /// Acquire the next valid scan.
    ///
    /// Captures a frame, extracts the row at `height / 2`, and rejects the
    /// sample if any element exceeds the range ceiling, re-capturing per the
    /// retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`DispenserError::SensorFault`] when the camera fails, when
    /// the frame has no center row, when the row length changes mid-session,
    /// or when a bounded retry policy is exhausted.
    pub fn acquire(&mut self) -> Result<DepthScan, DispenserError> {
        let mut attempts = 0usize;
        loop {
            attempts += 1;
            let frame = self.camera.capture()?;
            let row_index = frame.height / 2;
            let row = frame
                .row(row_index)
                .ok_or_else(|| DispenserError::SensorFault {
                    component: self.camera.id().to_string(),
                    details: format!(
                        "frame {}x{} has no row {row_index}",
                        frame.width, frame.height
                    ),
                })?;

            match self.expected_len {
                None => self.expected_len = Some(row.len()),
                Some(expected) if expected != row.len() => {
                    return Err(DispenserError::SensorFault {
                        component: self.camera.id().to_string(),
                        details: format!(
                            "scan length changed mid-session: {} -> {}",
                            expected,
                            row.len()
                        ),
                    });
                }
                Some(_) => {}
            }

            if row.iter().any(|&d| d > self.config.max_range_m) {
                trace!(
                    camera = self.camera.id(),
                    attempt = attempts,
                    max_range_m = self.config.max_range_m,
                    "scan rejected: sample beyond range ceiling"
                );
                if let Some(max) = self.config.retry.max_attempts
                    && attempts >= max
                {
                    return Err(DispenserError::SensorFault {
                        component: self.camera.id().to_string(),
                        details: format!("no valid scan within {max} capture attempts"),
                    });
                }
                if !self.config.retry.backoff.is_zero() {
                    std::thread::sleep(self.config.retry.backoff);
                }
                continue;
            }

            debug!(
                camera = self.camera.id(),
                attempts,
                len = row.len(),
                "scan acquired"
            );
            return Ok(DepthScan::new(row.to_vec()));
        }
    }
}
