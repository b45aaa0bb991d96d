use super::{Attribute, BootstrapMethod, ClassReader, ConstantPool, Field, Method};
use crate::jvm::{BinaryName, ClassAccessFlags, Error};

/// The expected first four bytes of any class file
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Parsed class file
///
/// This is a faithful, structural view of the input: names are resolved through the constant
/// pool and descriptors are parsed, but nothing is renamed or linked yet.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.1
#[derive(Debug)]
pub struct ClassFile {
    pub version: Version,
    pub constants: ConstantPool,
    pub access_flags: ClassAccessFlags,
    pub this_class: BinaryName,

    /// Absent only for `java/lang/Object` itself
    pub super_class: Option<BinaryName>,

    pub interfaces: Vec<BinaryName>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

/// Class file format version
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Version {
    pub minor: u16,
    pub major: u16,
}

impl ClassFile {
    /// Parse a class file from its bytes
    ///
    /// The whole input must be consumed; trailing bytes mean the input is not a class file (or
    /// that the parser lost track, which should surface loudly either way).
    pub fn parse(bytes: &[u8]) -> Result<ClassFile, Error> {
        let mut reader = ClassReader::new(bytes);

        let magic = reader.read_u32()?;
        if magic != MAGIC {
            return Err(Error::MalformedClassFile(format!(
                "bad magic number {:#010x}",
                magic
            )));
        }
        let version = Version {
            minor: reader.read_u16()?,
            major: reader.read_u16()?,
        };

        let constants = ConstantPool::read(&mut reader)?;

        let access_flags = ClassAccessFlags::from_bits_truncate(reader.read_u16()?);
        let this_class = constants.get_class_name(reader.read_u16()?)?;
        let super_class = match reader.read_u16()? {
            0 => None,
            index => Some(constants.get_class_name(index)?),
        };

        let interface_count = reader.read_u16()?;
        let interfaces = (0..interface_count)
            .map(|_| constants.get_class_name(reader.read_u16()?))
            .collect::<Result<Vec<BinaryName>, Error>>()?;

        let field_count = reader.read_u16()?;
        let fields = (0..field_count)
            .map(|_| Field::read(&mut reader, &constants))
            .collect::<Result<Vec<Field>, Error>>()?;

        let method_count = reader.read_u16()?;
        let methods = (0..method_count)
            .map(|_| Method::read(&mut reader, &constants))
            .collect::<Result<Vec<Method>, Error>>()?;

        let attributes = Attribute::read_table(&mut reader, &constants)?;

        if !reader.is_done() {
            return Err(Error::MalformedClassFile(format!(
                "{} trailing bytes after class file end",
                reader.remaining()
            )));
        }

        Ok(ClassFile {
            version,
            constants,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    /// The class-level `BootstrapMethods` table, if any `invokedynamic` sites exist
    pub fn bootstrap_methods(&self) -> Option<&[BootstrapMethod]> {
        self.attributes.iter().find_map(|attribute| match attribute {
            Attribute::BootstrapMethods(methods) => Some(methods.as_slice()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 52];
        match ClassFile::parse(&bytes) {
            Err(Error::MalformedClassFile(message)) => {
                assert!(message.contains("0xdeadbeef"), "message was {:?}", message)
            }
            other => panic!("expected MalformedClassFile, got {:?}", other),
        }
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(matches!(
            ClassFile::parse(&[0xca, 0xfe]),
            Err(Error::MalformedClassFile(_))
        ));
    }
}
