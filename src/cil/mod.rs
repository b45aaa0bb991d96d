//! The target side of the pipeline: a CLR-flavored managed instruction set
//!
//! [`graph`] owns the append-only graph of translated types and their members, [`instruction`]
//! is the closed instruction set method bodies are translated into, and [`module`] serializes a
//! completed batch into a module image. Nothing in this crate reads the image back; it is an
//! output format only.

pub mod graph;
pub mod instruction;
pub mod module;

mod attributes;
mod binary_format;

pub use attributes::*;
pub use binary_format::*;
