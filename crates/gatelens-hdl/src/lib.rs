//! HDL front and back ends for gatelens.
//!
//! Concrete hardware-description grammars live outside this crate. What it
//! provides is the plumbing they plug into:
//!
//! - [`TokenStream`]: a cursor over pre-lexed tokens for hand-written parsers
//! - [`ParserManager`]: picks a registered [`HdlParser`] for a file and
//!   builds a [`Netlist`](gatelens_core::Netlist) from it
//! - [`WriterManager`]: the same for [`HdlWriter`] backends

mod error;
pub mod parser;
pub mod token;
pub mod writer;

pub use error::HdlError;
pub use parser::{HdlParser, ParserManager};
pub use token::{Token, TokenStream};
pub use writer::{HdlWriter, WriterManager};
