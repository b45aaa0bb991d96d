use super::Error;
use std::borrow::Cow;
use std::fmt::{Debug, Error as FmtError, Formatter};

/// Name of a class or interface, with `/`-separated package segments
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct BinaryName(Cow<'static, str>);

/// Name of a field or method
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct UnqualifiedName(Cow<'static, str>);

impl UnqualifiedName {
    /// Instance initializer (maps to the target runtime's constructor)
    pub const INIT: UnqualifiedName = UnqualifiedName(Cow::Borrowed("<init>"));

    /// Static initializer (maps to the target runtime's class constructor)
    pub const CLINIT: UnqualifiedName = UnqualifiedName(Cow::Borrowed("<clinit>"));

    pub fn check_valid(name: &str) -> Result<(), Error> {
        if name.is_empty() {
            Err(Error::MalformedName(String::from(
                "unqualified name is empty",
            )))
        } else if name != "<init>" && name != "<clinit>" && name.contains(['.', ';', '[', '/']) {
            Err(Error::MalformedName(format!(
                "unqualified name '{}' contains an illegal character",
                name
            )))
        } else {
            Ok(())
        }
    }

    pub fn from_string(name: String) -> Result<UnqualifiedName, Error> {
        Self::check_valid(&name)?;
        Ok(UnqualifiedName(Cow::Owned(name)))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }
}

impl BinaryName {
    /// Root of the source type hierarchy; classes without an explicit super extend this
    pub const OBJECT: BinaryName = BinaryName(Cow::Borrowed("java/lang/Object"));

    pub fn check_valid(name: &str) -> Result<(), Error> {
        if name.is_empty() {
            Err(Error::MalformedName(String::from("binary name is empty")))
        } else {
            name.split('/')
                .try_for_each(UnqualifiedName::check_valid)
        }
    }

    pub fn from_string(name: String) -> Result<BinaryName, Error> {
        Self::check_valid(&name)?;
        Ok(BinaryName(Cow::Owned(name)))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }

    /// Package segments followed by the simple class name
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.as_str().split('/')
    }
}

impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
