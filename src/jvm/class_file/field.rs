use super::{Attribute, ClassReader, ConstantPool};
use crate::jvm::{
    BinaryName, Error, FieldAccessFlags, FieldType, ParseDescriptor, UnqualifiedName,
};

/// Field as declared in a class file
#[derive(Debug)]
pub struct Field {
    pub access_flags: FieldAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
    pub attributes: Vec<Attribute>,
}

impl Field {
    pub fn read(reader: &mut ClassReader, constants: &ConstantPool) -> Result<Field, Error> {
        let access_flags = FieldAccessFlags::from_bits_truncate(reader.read_u16()?);
        let name =
            UnqualifiedName::from_string(String::from(constants.get_utf8(reader.read_u16()?)?))?;
        let descriptor = FieldType::parse(constants.get_utf8(reader.read_u16()?)?)?;
        let attributes = Attribute::read_table(reader, constants)?;
        Ok(Field {
            access_flags,
            name,
            descriptor,
            attributes,
        })
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }

    /// Pool index of the `ConstantValue` attribute, if the field has one
    pub fn constant_value(&self) -> Option<u16> {
        self.attributes.iter().find_map(|attribute| match attribute {
            Attribute::ConstantValue { value } => Some(*value),
            _ => None,
        })
    }
}
