//! Core data model for the gatelens netlist analysis framework.
//!
//! A [`Netlist`](netlist::Netlist) owns every gate, net and module of one
//! design in id-keyed arenas. Gates reference nets and modules only through
//! integer handles, so all traversal goes through the owning netlist and a
//! removal invalidates a handle in one place.
//!
//! Every structural mutation is broadcast through the hooks in [`event`]
//! after it has been fully applied.

pub mod error;
pub mod event;
pub mod hash;
pub mod library;
pub mod netlist;
pub mod registry;

pub use error::ErrorKind;
pub use event::{
    guarded, CallbackError, CallbackFailure, CallbackHook, CallbackResult, EventHandlers,
};
pub use library::{GateLibrary, GateType, PinDef, PinDirection, PinType};
pub use netlist::endpoint::{Endpoint, PinRole};
pub use netlist::gate::Gate;
pub use netlist::module::Module;
pub use netlist::net::Net;
pub use netlist::{GateId, ModuleId, NetId, Netlist, NetlistError};
pub use registry::{BackendRegistry, RegistryError, Selector};
