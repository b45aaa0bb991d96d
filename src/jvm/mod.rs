//! The JVM side of the pipeline: decoding `.class` files
//!
//! [`class_file`] materializes the binary format (constant pool, fields, methods, attributes),
//! [`descriptors`] resolves field/method descriptor strings into structured type references, and
//! [`bytecode`] provides the opcode-level cursor used when translating method bodies.

pub mod bytecode;
pub mod class_file;

mod access_flags;
mod descriptors;
mod names;

pub use access_flags::*;
pub use descriptors::*;
pub use names::*;

/// Errors produced while decoding a class file
///
/// Any of these aborts the current file (or the current lookup) but never the whole batch.
#[derive(Debug)]
pub enum Error {
    /// Structurally invalid input: bad magic, truncated stream, trailing garbage
    MalformedClassFile(String),

    /// Constant pool entry starts with a tag byte we don't know
    UnknownConstantTag(u8),

    /// Constant pool lookup of index 0, an out-of-range index, or the unusable index following
    /// an 8-byte constant
    InvalidConstantPoolIndex(u16),

    /// Constant pool entry exists but has the wrong variant for this lookup
    ConstantTypeMismatch { index: u16, expected: &'static str },

    /// Attribute declared a length that does not match the bytes its body actually occupies
    MalformedAttribute {
        attribute: String,
        declared: u32,
        consumed: u32,
    },

    /// Field or method descriptor string that doesn't follow the descriptor grammar
    MalformedDescriptor(String),

    /// Class or member name containing illegal characters
    MalformedName(String),

    IoError(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
