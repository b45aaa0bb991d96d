use super::ClassReader;
use crate::jvm::{BinaryName, Error, UnqualifiedName};
use crate::util::{Offset, OffsetVec, Width};

/// Constant pool of one class file
///
/// Indexing starts at 1 and 8-byte constants (`Long`, `Double`) occupy two indices, with the
/// second one unusable. [`OffsetVec`] models exactly that, so lookups reject both index 0 and
/// the phantom index after a wide constant.
#[derive(Debug)]
pub struct ConstantPool {
    constants: OffsetVec<Constant>,
}

impl ConstantPool {
    /// Parse the `constant_pool_count` and entries that follow it
    pub fn read(reader: &mut ClassReader) -> Result<ConstantPool, Error> {
        let count = reader.read_u16()?;
        let mut constants: OffsetVec<Constant> = OffsetVec::new_starting_at(Offset(1));
        while constants.offset_len().0 < count as usize {
            constants.push(Constant::read(reader)?);
        }
        if constants.offset_len().0 != count as usize {
            return Err(Error::MalformedClassFile(format!(
                "constant pool ends at index {} but declared {} entries",
                constants.offset_len().0,
                count
            )));
        }
        Ok(ConstantPool { constants })
    }

    /// Number of pool entries (8-byte constants counted once)
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Look up any constant by its 1-based index
    pub fn get(&self, index: u16) -> Result<&Constant, Error> {
        self.constants
            .get_offset(Offset(index as usize))
            .ok()
            .ok_or(Error::InvalidConstantPoolIndex(index))
    }

    pub fn get_utf8(&self, index: u16) -> Result<&str, Error> {
        match self.get(index)? {
            Constant::Utf8(string) => Ok(string),
            _ => Err(Error::ConstantTypeMismatch {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Resolve a `Class` constant into the class name it references
    pub fn get_class_name(&self, index: u16) -> Result<BinaryName, Error> {
        match self.get(index)? {
            Constant::Class { name } => {
                BinaryName::from_string(String::from(self.get_utf8(*name)?))
            }
            _ => Err(Error::ConstantTypeMismatch {
                index,
                expected: "Class",
            }),
        }
    }

    /// Raw name string of a `Class` constant, without binary name validation
    ///
    /// Member references against array types carry descriptors like `[I` in the class slot, which
    /// are not valid binary names.
    pub fn get_class_string(&self, index: u16) -> Result<&str, Error> {
        match self.get(index)? {
            Constant::Class { name } => self.get_utf8(*name),
            _ => Err(Error::ConstantTypeMismatch {
                index,
                expected: "Class",
            }),
        }
    }

    /// Resolve a `NameAndType` constant into its name and descriptor strings
    pub fn get_name_and_type(&self, index: u16) -> Result<(&str, &str), Error> {
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.get_utf8(*name)?, self.get_utf8(*descriptor)?))
            }
            _ => Err(Error::ConstantTypeMismatch {
                index,
                expected: "NameAndType",
            }),
        }
    }

    /// Resolve a `FieldRef` constant into owner name, field name, and descriptor string
    pub fn get_field_ref(&self, index: u16) -> Result<MemberRef, Error> {
        match self.get(index)? {
            Constant::FieldRef {
                class,
                name_and_type,
            } => self.resolve_member(*class, *name_and_type),
            _ => Err(Error::ConstantTypeMismatch {
                index,
                expected: "FieldRef",
            }),
        }
    }

    /// Resolve a `MethodRef` or `InterfaceMethodRef` constant
    pub fn get_method_ref(&self, index: u16) -> Result<MemberRef, Error> {
        match self.get(index)? {
            Constant::MethodRef {
                class,
                name_and_type,
            } => self.resolve_member(*class, *name_and_type),
            _ => Err(Error::ConstantTypeMismatch {
                index,
                expected: "MethodRef",
            }),
        }
    }

    /// Resolve an `InvokeDynamic` constant into its bootstrap index and name/descriptor
    pub fn get_invoke_dynamic(&self, index: u16) -> Result<(u16, MemberName), Error> {
        match self.get(index)? {
            Constant::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => {
                let (name, descriptor) = self.get_name_and_type(*name_and_type)?;
                let name = UnqualifiedName::from_string(String::from(name))?;
                Ok((
                    *bootstrap_method,
                    MemberName {
                        name,
                        descriptor: String::from(descriptor),
                    },
                ))
            }
            _ => Err(Error::ConstantTypeMismatch {
                index,
                expected: "InvokeDynamic",
            }),
        }
    }

    /// Resolve a `MethodHandle` constant into its kind and the member it points at
    pub fn get_method_handle(&self, index: u16) -> Result<(HandleKind, MemberRef), Error> {
        match self.get(index)? {
            Constant::MethodHandle { kind, member } => {
                let member = match kind {
                    HandleKind::GetField
                    | HandleKind::GetStatic
                    | HandleKind::PutField
                    | HandleKind::PutStatic => self.get_field_ref(*member)?,
                    _ => self.get_method_ref(*member)?,
                };
                Ok((*kind, member))
            }
            _ => Err(Error::ConstantTypeMismatch {
                index,
                expected: "MethodHandle",
            }),
        }
    }

    fn resolve_member(&self, class: u16, name_and_type: u16) -> Result<MemberRef, Error> {
        let class_name = String::from(self.get_class_string(class)?);
        let (name, descriptor) = self.get_name_and_type(name_and_type)?;
        let name = UnqualifiedName::from_string(String::from(name))?;
        Ok(MemberRef {
            class_name,
            member: MemberName {
                name,
                descriptor: String::from(descriptor),
            },
        })
    }
}

/// Name and descriptor of a referenced member
#[derive(Debug)]
pub struct MemberName {
    pub name: UnqualifiedName,
    pub descriptor: String,
}

/// Fully resolved member reference
///
/// The class slot is kept as a raw string since member references against array types (eg.
/// `[I.clone`) are legal and not binary names.
#[derive(Debug)]
pub struct MemberRef {
    pub class_name: String,
    pub member: MemberName,
}

/// Constants as in the constant pool
///
/// Indices stored inside a constant refer back into the same pool and are only resolved on
/// demand (a pool is allowed to contain entries nothing references).
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone)]
pub enum Constant {
    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the null character
    /// `\u{0000}` and the encoding of supplementary characters is different). The bytes are
    /// decoded into a regular string as the pool is read.
    Utf8(String),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Class or an interface
    Class { name: u16 },

    /// Constant object of type `java.lang.String`
    String { utf8: u16 },

    /// Field
    FieldRef { class: u16, name_and_type: u16 },

    /// Method (this combines `Methodref` and `InterfaceMethodref`)
    MethodRef { class: u16, name_and_type: u16 },

    /// Name and a type (eg. for a field or a method)
    NameAndType { name: u16, descriptor: u16 },

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        kind: HandleKind,

        /// Depending on the handle kind, this points to different things:
        ///
        ///   - `FieldRef` for `GetField`, `GetStatic`, `PutField`, `PutStatic`
        ///   - `MethodRef` for the rest
        member: u16,
    },

    /// Method type
    MethodType { descriptor: u16 },

    /// Dynamically-computed constant
    Dynamic {
        bootstrap_method: u16,
        name_and_type: u16,
    },

    /// Dynamically-computed call site
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        name_and_type: u16,
    },

    /// Module declaration (only in `module-info` classes)
    Module { name: u16 },

    /// Package exported or opened by a module
    Package { name: u16 },
}

impl Constant {
    pub fn read(reader: &mut ClassReader) -> Result<Constant, Error> {
        let constant = match reader.read_u8()? {
            1 => {
                let length = reader.read_u16()?;
                let bytes = reader.read_bytes(length as usize)?;
                Constant::Utf8(decode_modified_utf8(&bytes)?)
            }
            3 => Constant::Integer(reader.read_i32()?),
            4 => Constant::Float(reader.read_f32()?),
            5 => Constant::Long(reader.read_i64()?),
            6 => Constant::Double(reader.read_f64()?),
            7 => Constant::Class {
                name: reader.read_u16()?,
            },
            8 => Constant::String {
                utf8: reader.read_u16()?,
            },
            9 => Constant::FieldRef {
                class: reader.read_u16()?,
                name_and_type: reader.read_u16()?,
            },
            10 | 11 => Constant::MethodRef {
                class: reader.read_u16()?,
                name_and_type: reader.read_u16()?,
            },
            12 => Constant::NameAndType {
                name: reader.read_u16()?,
                descriptor: reader.read_u16()?,
            },
            15 => Constant::MethodHandle {
                kind: HandleKind::read(reader)?,
                member: reader.read_u16()?,
            },
            16 => Constant::MethodType {
                descriptor: reader.read_u16()?,
            },
            17 => Constant::Dynamic {
                bootstrap_method: reader.read_u16()?,
                name_and_type: reader.read_u16()?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap_method: reader.read_u16()?,
                name_and_type: reader.read_u16()?,
            },
            19 => Constant::Module {
                name: reader.read_u16()?,
            },
            20 => Constant::Package {
                name: reader.read_u16()?,
            },
            other => return Err(Error::UnknownConstantTag(other)),
        };
        Ok(constant)
    }
}

/// Almost all constants have width 1, except for `Constant::Long` and `Constant::Double`. Quoting
/// the JVM specification:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file. If a
/// > CONSTANT_Long_info or CONSTANT_Double_info structure is the item in the constant_pool table
/// > at index n, then the next usable item in the pool is located at index n+2. The constant_pool
/// > index n+1 must be valid but is considered unusable.
/// >
/// > In retrospect, making 8-byte constants take two constant pool entries was a poor choice.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Type of method handle
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-5.html#jvms-5.4.3.5-220
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl HandleKind {
    fn read(reader: &mut ClassReader) -> Result<HandleKind, Error> {
        let kind = match reader.read_u8()? {
            1 => HandleKind::GetField,
            2 => HandleKind::GetStatic,
            3 => HandleKind::PutField,
            4 => HandleKind::PutStatic,
            5 => HandleKind::InvokeVirtual,
            6 => HandleKind::InvokeStatic,
            7 => HandleKind::InvokeSpecial,
            8 => HandleKind::NewInvokeSpecial,
            9 => HandleKind::InvokeInterface,
            other => {
                return Err(Error::MalformedClassFile(format!(
                    "invalid method handle kind {}",
                    other
                )))
            }
        };
        Ok(kind)
    }
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u{0000}` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String, Error> {
    let bad = |at: usize| {
        Error::MalformedClassFile(format!("invalid modified UTF-8 sequence at byte {}", at))
    };

    // Decode to UTF-16 code units first; surrogate pairs are paired up below
    let mut units: Vec<u16> = vec![];
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 & 0b1000_0000 == 0 {
            if b0 == 0 {
                return Err(bad(i));
            }
            units.push(b0 as u16);
            i += 1;
        } else if b0 & 0b1110_0000 == 0b1100_0000 {
            let b1 = *bytes.get(i + 1).ok_or_else(|| bad(i))?;
            if b1 & 0b1100_0000 != 0b1000_0000 {
                return Err(bad(i));
            }
            units.push(((b0 as u16 & 0x1F) << 6) | (b1 as u16 & 0x3F));
            i += 2;
        } else if b0 & 0b1111_0000 == 0b1110_0000 {
            let b1 = *bytes.get(i + 1).ok_or_else(|| bad(i))?;
            let b2 = *bytes.get(i + 2).ok_or_else(|| bad(i))?;
            if b1 & 0b1100_0000 != 0b1000_0000 || b2 & 0b1100_0000 != 0b1000_0000 {
                return Err(bad(i));
            }
            units.push(
                ((b0 as u16 & 0x0F) << 12) | ((b1 as u16 & 0x3F) << 6) | (b2 as u16 & 0x3F),
            );
            i += 3;
        } else {
            return Err(bad(i));
        }
    }

    String::from_utf16(&units)
        .map_err(|_| Error::MalformedClassFile(String::from("unpaired surrogate in Utf8 constant")))
}

#[cfg(test)]
mod test {
    use super::*;

    fn pool_from_bytes(count: u16, entries: &[u8]) -> Result<ConstantPool, Error> {
        let mut bytes = count.to_be_bytes().to_vec();
        bytes.extend_from_slice(entries);
        ConstantPool::read(&mut ClassReader::new(&bytes))
    }

    #[test]
    fn wide_constants_take_two_indices() {
        // #1 = Long 7, #3 = Utf8 "x" (index 2 is the phantom slot)
        let pool = pool_from_bytes(
            4,
            &[
                5, 0, 0, 0, 0, 0, 0, 0, 7, // Long
                1, 0, 1, b'x', // Utf8
            ],
        )
        .unwrap();

        assert_eq!(pool.len(), 2);
        assert!(matches!(pool.get(1), Ok(Constant::Long(7))));
        assert!(matches!(pool.get(2), Err(Error::InvalidConstantPoolIndex(2))));
        assert_eq!(pool.get_utf8(3).unwrap(), "x");
    }

    #[test]
    fn index_zero_and_out_of_range_are_invalid() {
        let pool = pool_from_bytes(2, &[1, 0, 1, b'x']).unwrap();
        assert!(matches!(pool.get(0), Err(Error::InvalidConstantPoolIndex(0))));
        assert!(matches!(pool.get(2), Err(Error::InvalidConstantPoolIndex(2))));
    }

    #[test]
    fn type_mismatch_is_reported() {
        let pool = pool_from_bytes(2, &[3, 0, 0, 0, 42]).unwrap();
        assert!(matches!(
            pool.get_utf8(1),
            Err(Error::ConstantTypeMismatch {
                index: 1,
                expected: "Utf8"
            })
        ));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(matches!(
            pool_from_bytes(2, &[99, 0, 0]),
            Err(Error::UnknownConstantTag(99))
        ));
    }

    #[test]
    fn interface_method_refs_resolve_like_method_refs() {
        // #1 = Utf8 "demo/Face", #2 = Class #1, #3 = Utf8 "name", #4 = Utf8 "()V",
        // #5 = NameAndType #3 #4, #6 = InterfaceMethodRef #2 #5
        let mut entries: Vec<u8> = vec![];
        entries.extend_from_slice(&[1, 0, 9]);
        entries.extend_from_slice(b"demo/Face");
        entries.extend_from_slice(&[7, 0, 1]);
        entries.extend_from_slice(&[1, 0, 4]);
        entries.extend_from_slice(b"name");
        entries.extend_from_slice(&[1, 0, 3]);
        entries.extend_from_slice(b"()V");
        entries.extend_from_slice(&[12, 0, 3, 0, 4]);
        entries.extend_from_slice(&[11, 0, 2, 0, 5]);
        let pool = pool_from_bytes(7, &entries).unwrap();

        let reference = pool.get_method_ref(6).unwrap();
        assert_eq!(reference.class_name, "demo/Face");
        assert_eq!(reference.member.name.as_str(), "name");
        assert_eq!(reference.member.descriptor, "()V");
    }

    #[test]
    fn decodes_modified_utf8() {
        assert_eq!(decode_modified_utf8(&[102, 111, 111]).unwrap(), "foo");

        // Null byte uses the two-byte form
        assert_eq!(decode_modified_utf8(&[97, 192, 128, 97]).unwrap(), "a\x00a");

        // Two- and three-byte forms
        assert_eq!(decode_modified_utf8(&[196, 132]).unwrap(), "Ą");
        assert_eq!(decode_modified_utf8(&[224, 164, 133]).unwrap(), "अ");

        // Supplementary characters come in as surrogate pairs
        assert_eq!(
            decode_modified_utf8(&[237, 160, 128, 237, 176, 128]).unwrap(),
            "\u{10000}"
        );
    }

    #[test]
    fn rejects_invalid_modified_utf8() {
        // Embedded raw null
        assert!(decode_modified_utf8(&[97, 0]).is_err());

        // Truncated two-byte sequence
        assert!(decode_modified_utf8(&[196]).is_err());

        // Four-byte standard UTF-8 is not part of the modified encoding
        assert!(decode_modified_utf8(&[0xf0, 0x90, 0x80, 0x80]).is_err());

        // Unpaired high surrogate
        assert!(decode_modified_utf8(&[237, 160, 128]).is_err());
    }
}
