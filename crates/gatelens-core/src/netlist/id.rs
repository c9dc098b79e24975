//! Integer handles for netlist objects.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! handle_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// The raw 64-bit handle.
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $prefix, self.0)
            }
        }
    };
}

handle_id!(
    /// Handle of a gate, unique within one netlist.
    GateId,
    "gate"
);

handle_id!(
    /// Handle of a net, unique within one netlist.
    NetId,
    "net"
);

handle_id!(
    /// Handle of a module, unique within one netlist.
    ModuleId,
    "module"
);
