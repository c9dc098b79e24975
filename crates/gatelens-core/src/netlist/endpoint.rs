//! Endpoints: the binding of a net to one gate pin.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::GateId;
use crate::library::PinDirection;

/// Role a pin plays on a net.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinRole {
    /// The pin drives the net.
    Source,
    /// The pin is driven by the net.
    Destination,
}

impl PinRole {
    /// Whether a pin of the given direction may take this role.
    pub fn accepts(self, direction: PinDirection) -> bool {
        match self {
            PinRole::Source => matches!(direction, PinDirection::Output | PinDirection::InOut),
            PinRole::Destination => matches!(direction, PinDirection::Input | PinDirection::InOut),
        }
    }
}

impl fmt::Display for PinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinRole::Source => write!(f, "source"),
            PinRole::Destination => write!(f, "destination"),
        }
    }
}

/// A `(gate, pin)` pair connected to a net.
///
/// Endpoints are plain values; whether one is a source or a destination is
/// given by the net list it appears in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub gate: GateId,
    pub pin: String,
}

impl Endpoint {
    pub fn new(gate: GateId, pin: impl Into<String>) -> Self {
        Self {
            gate,
            pin: pin.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.gate, self.pin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_accepts_direction() {
        assert!(PinRole::Source.accepts(PinDirection::Output));
        assert!(PinRole::Source.accepts(PinDirection::InOut));
        assert!(!PinRole::Source.accepts(PinDirection::Input));
        assert!(PinRole::Destination.accepts(PinDirection::Input));
        assert!(!PinRole::Destination.accepts(PinDirection::Internal));
    }
}
