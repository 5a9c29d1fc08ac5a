//! Payload encoding for the sensing↔control exchange.

use pourbot_types::DispenserError;

/// Centering status byte sent from the sensing node after every evaluation.
///
/// Anything other than `"1"` means keep searching; a not-present cup is
/// reported the same as an off-center one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CenteringStatus {
    NotCentered,
    Centered,
}

impl CenteringStatus {
    /// Wire text for this status.
    pub fn as_text(self) -> &'static str {
        match self {
            CenteringStatus::NotCentered => "0",
            CenteringStatus::Centered => "1",
        }
    }

    /// Interpret a received payload.
    ///
    /// Exactly `"1"` (modulo surrounding whitespace) is centered; every
    /// other byte is consumed as not-centered, per the protocol.
    pub fn parse(text: &str) -> CenteringStatus {
        if text.trim() == "1" {
            CenteringStatus::Centered
        } else {
            CenteringStatus::NotCentered
        }
    }
}

/// Encode a volume estimate (fluid ounces) as decimal text.
pub fn encode_volume(oz: f32) -> String {
    oz.to_string()
}

/// Parse a received volume payload.
///
/// # Errors
///
/// Returns [`DispenserError::Protocol`] when the payload is not decimal
/// text. This is fatal for the cycle: the control node must not derive pour
/// timings from it.
pub fn parse_volume(text: &str) -> Result<f32, DispenserError> {
    text.trim()
        .parse::<f32>()
        .map_err(|e| DispenserError::Protocol(format!("malformed volume payload {text:?}: {e}")))
}
