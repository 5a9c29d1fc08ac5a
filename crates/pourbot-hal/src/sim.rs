//! In-process stub drivers for CI/CD testing without physical hardware.
//!
//! [`SimDepthCamera`] replays scripted depth frames and [`SimActuatorBus`]
//! records every command it is handed, so the full sensing/control stack can
//! run in headless tests and assert on the exact actuator sequence a cycle
//! produced.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use pourbot_types::{ActuatorCommand, DispenserError};
use tracing::debug;

use crate::bus::ActuatorBus;
use crate::depth::{DepthCamera, DepthFrame};

// ────────────────────────────────────────────────────────────────────────────
// Stub depth camera
// ────────────────────────────────────────────────────────────────────────────

/// A simulated depth camera that replays a scripted queue of frames.
///
/// Once the queue is drained the most recent frame is repeated, which models
/// a static scene under a free-running sensor. A camera constructed with no
/// frames faults on capture.
pub struct SimDepthCamera {
    id: String,
    frames: VecDeque<DepthFrame>,
    last: Option<DepthFrame>,
}

impl SimDepthCamera {
    /// Create a simulated camera with an empty frame queue.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            frames: VecDeque::new(),
            last: None,
        }
    }

    /// Queue a full frame for replay.
    pub fn with_frame(mut self, frame: DepthFrame) -> Self {
        self.frames.push_back(frame);
        self
    }

    /// Queue a single-row frame built from one cross-sectional scan.
    ///
    /// The sensing pipeline reads the row at `height / 2`, so a height-1
    /// frame hands it exactly this scan.
    pub fn with_scan(self, scan: Vec<f32>) -> Self {
        let width = scan.len();
        self.with_frame(DepthFrame {
            width,
            height: 1,
            data: scan,
        })
    }
}

impl DepthCamera for SimDepthCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<DepthFrame, DispenserError> {
        if let Some(frame) = self.frames.pop_front() {
            self.last = Some(frame.clone());
            return Ok(frame);
        }
        match &self.last {
            Some(frame) => Ok(frame.clone()),
            None => Err(DispenserError::SensorFault {
                component: self.id.clone(),
                details: "no scripted frames queued".to_string(),
            }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub actuator bus
// ────────────────────────────────────────────────────────────────────────────

/// Shared, inspectable log of every command written to a [`SimActuatorBus`].
///
/// Clones share the same underlying log, so a test can keep a handle while
/// the bus itself moves into a session.
#[derive(Clone, Default)]
pub struct SimBusLog(Arc<Mutex<Vec<ActuatorCommand>>>);

impl SimBusLog {
    /// Snapshot of every command written so far, in write order.
    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.0.lock().expect("sim bus log poisoned").clone()
    }

    fn push(&self, command: ActuatorCommand) {
        self.0.lock().expect("sim bus log poisoned").push(command);
    }
}

/// A simulated actuator bus that records the commands it receives.
/// Always succeeds.
pub struct SimActuatorBus {
    id: String,
    log: SimBusLog,
}

impl SimActuatorBus {
    /// Create a simulated bus with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            log: SimBusLog::default(),
        }
    }

    /// Handle to the shared command log for later inspection.
    pub fn log_handle(&self) -> SimBusLog {
        self.log.clone()
    }
}

impl ActuatorBus for SimActuatorBus {
    fn id(&self) -> &str {
        &self.id
    }

    fn write(&mut self, command: ActuatorCommand) -> Result<(), DispenserError> {
        debug!(bus = %self.id, code = command.code(), ?command, "sim bus write");
        self.log.push(command);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
