//! Translate JVM class files into a managed IL module
//!
//! The pipeline has three layers:
//!
//!   - [`jvm`] parses class files into a faithful structural view
//!   - [`translate`] converts batches of parsed classes into a type graph, renaming as it goes
//!   - [`cil`] holds the output-side type graph, instruction set, and image writer

pub mod cil;
pub mod jvm;
pub mod translate;
pub mod util;
