//! The converter: turns parsed class files into types and bodies in the target graph
//!
//! [`ModuleTranslator`] drives a whole batch through three phases (declare shells, wire members,
//! emit bodies), [`MemberResolver`] finds fields and methods through the inheritance graph, and
//! [`MethodTranslator`] rewrites one method body at a time.

mod errors;
mod function;
mod members;
mod module;
mod renamer;
mod settings;

pub use errors::*;
pub use function::*;
pub use members::*;
pub use module::*;
pub use renamer::*;
pub use settings::*;
