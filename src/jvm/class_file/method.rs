use super::{Attribute, ClassReader, CodeAttribute, ConstantPool, ParameterInfo};
use crate::jvm::{
    BinaryName, Error, MethodAccessFlags, MethodDescriptor, ParseDescriptor, UnqualifiedName,
};

/// Method as declared in a class file
#[derive(Debug)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub attributes: Vec<Attribute>,
}

impl Method {
    pub fn read(reader: &mut ClassReader, constants: &ConstantPool) -> Result<Method, Error> {
        let access_flags = MethodAccessFlags::from_bits_truncate(reader.read_u16()?);
        let name =
            UnqualifiedName::from_string(String::from(constants.get_utf8(reader.read_u16()?)?))?;
        let descriptor = MethodDescriptor::parse(constants.get_utf8(reader.read_u16()?)?)?;
        let attributes = Attribute::read_table(reader, constants)?;
        Ok(Method {
            access_flags,
            name,
            descriptor,
            attributes,
        })
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_instance_initializer(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }

    pub fn is_class_initializer(&self) -> bool {
        self.name == UnqualifiedName::CLINIT
    }

    /// The method's `Code` attribute (absent on `abstract` and `native` methods)
    pub fn code(&self) -> Option<&CodeAttribute> {
        self.attributes.iter().find_map(|attribute| match attribute {
            Attribute::Code(code) => Some(code),
            _ => None,
        })
    }

    /// Entries of the `MethodParameters` attribute, if present
    pub fn parameter_info(&self) -> Option<&[ParameterInfo]> {
        self.attributes.iter().find_map(|attribute| match attribute {
            Attribute::MethodParameters(parameters) => Some(parameters.as_slice()),
            _ => None,
        })
    }
}
