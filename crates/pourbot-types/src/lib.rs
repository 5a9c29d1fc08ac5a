use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of ingredient channels wired to the dispense manifold.
pub const NUM_CHANNELS: usize = 3;

/// An ingredient channel on the dispense manifold.
///
/// The discriminant order matches the physical solenoid channels, so
/// [`Ingredient::channel`] doubles as the index into per-channel calibration
/// tables (flow rates, valve codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ingredient {
    NonDairy,
    Milk,
    Coffee,
}

impl Ingredient {
    /// All channels in ascending solenoid order.
    pub const ALL: [Ingredient; NUM_CHANNELS] =
        [Ingredient::NonDairy, Ingredient::Milk, Ingredient::Coffee];

    /// Physical channel index (0-based) of this ingredient's solenoid.
    pub fn channel(self) -> usize {
        match self {
            Ingredient::NonDairy => 0,
            Ingredient::Milk => 1,
            Ingredient::Coffee => 2,
        }
    }

    /// Parse an ingredient name as it appears in recipe files.
    ///
    /// Returns `None` for unrecognized names; recipe parsing silently skips
    /// those lines rather than failing the order.
    pub fn parse(name: &str) -> Option<Ingredient> {
        match name.trim() {
            "Non-Dairy" => Some(Ingredient::NonDairy),
            "Milk" => Some(Ingredient::Milk),
            "Coffee" => Some(Ingredient::Coffee),
            _ => None,
        }
    }
}

impl std::fmt::Display for Ingredient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ingredient::NonDairy => write!(f, "Non-Dairy"),
            Ingredient::Milk => write!(f, "Milk"),
            Ingredient::Coffee => write!(f, "Coffee"),
        }
    }
}

/// A drink order: fractional proportion in `[0, 1]` per ingredient channel.
///
/// Proportions sum to at most 1 across recognized ingredients; a recipe with
/// all-zero proportions counts as empty (no order pending). Consumed once per
/// pour cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    proportions: [f32; NUM_CHANNELS],
}

impl Recipe {
    /// Create an empty recipe (all proportions zero).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fractional proportion for `ingredient`.
    pub fn set(&mut self, ingredient: Ingredient, fraction: f32) {
        self.proportions[ingredient.channel()] = fraction;
    }

    /// Fractional proportion for `ingredient` (zero if never set).
    pub fn proportion(&self, ingredient: Ingredient) -> f32 {
        self.proportions[ingredient.channel()]
    }

    /// `true` when no ingredient has a nonzero proportion.
    pub fn is_empty(&self) -> bool {
        self.proportions.iter().all(|&p| p == 0.0)
    }

    /// Iterate ingredients with a nonzero proportion in ascending channel
    /// order (the order they are poured).
    pub fn parts(&self) -> impl Iterator<Item = (Ingredient, f32)> + '_ {
        Ingredient::ALL
            .into_iter()
            .map(|i| (i, self.proportions[i.channel()]))
            .filter(|&(_, p)| p != 0.0)
    }
}

/// Strict definition of the discrete commands the hardware controller
/// accepts. `pourbot-hal` translates these into single code bytes on the
/// actuator bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload")]
pub enum ActuatorCommand {
    /// Halt the gantry search motor.
    StopGantry,
    /// Drive the nozzle gantry back to its home position.
    ResetPosition,
    /// Start sweeping the gantry to hunt for a cup.
    BeginSearch,
    /// Energise the solenoid for one ingredient channel.
    OpenValve(Ingredient),
    /// De-energise every solenoid at once.
    CloseAllValves,
}

impl ActuatorCommand {
    /// Wire code byte understood by the hardware controller.
    pub fn code(self) -> u8 {
        match self {
            ActuatorCommand::StopGantry => 0,
            ActuatorCommand::ResetPosition => 1,
            ActuatorCommand::BeginSearch => 2,
            ActuatorCommand::OpenValve(ingredient) => 3 + ingredient.channel() as u8,
            ActuatorCommand::CloseAllValves => 7,
        }
    }
}

/// Global error type spanning sensor faults, actuator-bus faults, link
/// failures, and protocol violations.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum DispenserError {
    #[error("Sensor Fault on {component}: {details}")]
    SensorFault { component: String, details: String },

    #[error("Actuator Bus Fault on {component}: {details}")]
    BusFault { component: String, details: String },

    #[error("Link Error: {0}")]
    Link(String),

    #[error("Protocol Error: {0}")]
    Protocol(String),

    #[error("Recipe Source Error: {0}")]
    Recipe(String),
}
