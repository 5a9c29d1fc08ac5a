//! `pourbot-hal` – hardware abstraction for the dispenser.
//!
//! The sensing node owns a depth camera and the control node owns the
//! actuator bus; both are reached exclusively through the traits in this
//! crate, so the sessions can be exercised against simulated drivers in
//! headless tests.
//!
//! # Modules
//!
//! - [`depth`] – [`DepthCamera`][depth::DepthCamera]: time-of-flight frame
//!   capture.
//! - [`bus`] – [`ActuatorBus`][bus::ActuatorBus]: discrete command writes to
//!   the hardware controller.
//! - [`sim`] – recording stub drivers for CI/CD testing without physical
//!   hardware.

pub mod bus;
pub mod depth;
pub mod sim;

pub use bus::ActuatorBus;
pub use depth::{DepthCamera, DepthFrame};
