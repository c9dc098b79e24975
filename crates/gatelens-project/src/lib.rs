//! Project persistence for gatelens.
//!
//! A project file stores one netlist as JSON together with free-form
//! sections written by plugins. [`FileManager`] saves and loads project
//! files, runs the registered plugin callbacks, and routes imports of other
//! formats to the HDL parser manager.

pub mod config;
pub mod document;
mod error;
pub mod file_manager;
mod serialize;

pub use config::ProjectSettings;
pub use document::DocNode;
pub use error::ProjectError;
pub use file_manager::{FileManager, LoadOutcome};
pub use serialize::{FORMAT_TAG, FORMAT_VERSION};
