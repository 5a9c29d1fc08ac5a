//! `pourbot-runtime` – the two coordinated dispenser state machines.
//!
//! Each node runs one single-threaded, synchronous state machine: every
//! state blocks on exactly one of sensor acquisition, a link receive, or a
//! fixed-duration pour sleep. The nodes share nothing but the ordered
//! message exchange in `pourbot-protocol`.
//!
//! # Modules
//!
//! - [`sensing`] – [`SensingSession`][sensing::SensingSession]: drives the
//!   acquire→center→estimate loop on the camera node.
//! - [`control`] – [`ControlSession`][control::ControlSession]: drives the
//!   recipe→center-request→pour loop on the actuator node.
//! - [`recipe`] – [`RecipeSource`][recipe::RecipeSource]: pluggable order
//!   intake (file-backed in production, in-memory in tests).

pub mod control;
pub mod recipe;
pub mod sensing;

pub use control::{ControlConfig, ControlSession, ControlState, CycleOutcome, pour_schedule};
pub use recipe::{FileRecipeSource, InMemoryRecipeSource, RecipeSource};
pub use sensing::{SensingSession, SensingState};
