//! Generic `DepthCamera` trait and supporting types for time-of-flight
//! depth sensors.

use pourbot_types::DispenserError;

/// A raw depth frame returned by a camera driver.
///
/// Samples are row-major distances in meters, one per pixel.
#[derive(Debug, Clone)]
pub struct DepthFrame {
    /// Frame width in pixels.
    pub width: usize,
    /// Frame height in pixels.
    pub height: usize,
    /// Row-major depth samples (meters), `width * height` long.
    pub data: Vec<f32>,
}

impl DepthFrame {
    /// Borrow one horizontal row of depth samples.
    ///
    /// Returns `None` when `row` is outside the frame or the buffer is
    /// shorter than the advertised dimensions.
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.height {
            return None;
        }
        let start = row * self.width;
        self.data.get(start..start + self.width)
    }
}

/// A depth camera or other single-sensor depth source.
///
/// Drivers implement this trait; the sensing session only ever talks to the
/// trait, so the physical sensor can be swapped for a simulated one without
/// touching the estimation pipeline.
pub trait DepthCamera: Send {
    /// Stable identifier for this camera, e.g. `"tof_overhead"`.
    fn id(&self) -> &str;

    /// Capture and return the next available depth frame.
    ///
    /// # Errors
    ///
    /// Returns [`DispenserError::SensorFault`] if the frame cannot be
    /// captured (e.g. the device is disconnected or the request timed out).
    fn capture(&mut self) -> Result<DepthFrame, DispenserError>;
}
