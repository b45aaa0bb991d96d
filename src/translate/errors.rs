use crate::jvm;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// The class file itself could not be decoded
    ClassFile(jvm::Error),

    /// Opcode outside the supported translation set
    UnsupportedOpcode { opcode: u8, offset: usize },

    /// Member lookup exhausted the owner, its superclasses, and its interfaces
    MemberNotFound {
        owner: String,
        name: String,
        descriptor: String,
    },

    /// An instruction names a class the type graph cannot represent
    MissingClass(String),

    /// Branch lands outside the method or in the middle of an instruction
    BadBranchTarget { offset: i64 },

    /// `invokedynamic` site indexes past the end of the `BootstrapMethods` table
    MissingBootstrapMethod(u16),

    /// `ldc`-family instruction against a pool entry that cannot be pushed
    NotLoadableConstant(u16),

    /// Two classes in the batch share a name
    DuplicateClass(String),
}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::ClassFile(err)
    }
}

/// Where in the batch a failure occurred
///
/// A diagnostic with no method means the whole class was skipped; one with a method means only
/// that body fell back to a stub.
#[derive(Debug)]
pub struct Diagnostic {
    /// Class name as it appeared in the input
    pub class: String,

    /// Method name and descriptor, when the failure was method-scoped
    pub method: Option<String>,

    pub error: Error,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            None => write!(f, "{}: {:?}", self.class, self.error),
            Some(method) => write!(f, "{}.{}: {:?}", self.class, method, self.error),
        }
    }
}

/// Failures accumulated over one batch
///
/// Translation never aborts the batch: every failure is scoped to a class or a method and
/// recorded here, and the caller decides what partial output is worth.
#[derive(Debug, Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics(vec![])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub(crate) fn push_class(&mut self, class: &str, error: Error) {
        self.0.push(Diagnostic {
            class: String::from(class),
            method: None,
            error,
        });
    }

    pub(crate) fn push_method(&mut self, class: &str, method: String, error: Error) {
        self.0.push(Diagnostic {
            class: String::from(class),
            method: Some(method),
            error,
        });
    }
}
