//! Gate library loading for gatelens.
//!
//! [`GateLibraryManager`] reads gate library files through registered
//! [`GateLibraryParser`] backends and caches the results by canonical path.
//! The built-in [`HglReader`] handles the JSON `.hgl` format.

mod error;
pub mod hgl;
pub mod manager;

pub use error::LibraryError;
pub use hgl::{parse_hgl, HglReader};
pub use manager::{GateLibraryManager, GateLibraryParser};
