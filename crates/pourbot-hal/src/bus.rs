//! Generic `ActuatorBus` trait for the discrete-command hardware controller
//! (gantry motor plus ingredient solenoids).

use pourbot_types::{ActuatorCommand, DispenserError};

/// The single-byte command bus to the hardware controller.
///
/// Drivers implement this trait over whatever physical transport the
/// controller speaks (I²C in the production rig). The control session only
/// ever talks to the trait, so the bus can be swapped for a recording stub
/// in tests.
pub trait ActuatorBus: Send {
    /// Stable identifier for this bus, e.g. `"i2c_controller"`.
    fn id(&self) -> &str;

    /// Write one discrete command to the controller.
    ///
    /// # Errors
    ///
    /// Returns [`DispenserError::BusFault`] if the write cannot be applied
    /// (e.g. the controller is not responding).
    fn write(&mut self, command: ActuatorCommand) -> Result<(), DispenserError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pourbot_types::Ingredient;

    struct MockBus {
        id: String,
        written: Vec<ActuatorCommand>,
    }

    impl ActuatorBus for MockBus {
        fn id(&self) -> &str {
            &self.id
        }

        fn write(&mut self, command: ActuatorCommand) -> Result<(), DispenserError> {
            self.written.push(command);
            Ok(())
        }
    }

    #[test]
    fn mock_bus_records_commands() {
        let mut bus = MockBus {
            id: "i2c_controller".to_string(),
            written: Vec::new(),
        };
        assert_eq!(bus.id(), "i2c_controller");

        bus.write(ActuatorCommand::BeginSearch).unwrap();
        bus.write(ActuatorCommand::OpenValve(Ingredient::Milk)).unwrap();
        bus.write(ActuatorCommand::CloseAllValves).unwrap();

        assert_eq!(
            bus.written,
            vec![
                ActuatorCommand::BeginSearch,
                ActuatorCommand::OpenValve(Ingredient::Milk),
                ActuatorCommand::CloseAllValves,
            ]
        );
    }
}
