use super::{ClassReader, ConstantPool};
use crate::jvm::Error;

/// Attribute of a class, field, method, or `Code` block
///
/// Attributes the translation pipeline has no use for (`LineNumberTable`, `Signature`,
/// `SourceFile`, annotations, ...) are kept as uninterpreted bytes so the rest of the file can
/// still be checked against its declared length.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7
#[derive(Debug)]
pub enum Attribute {
    /// `ConstantValue`, the initial value of a `static final` field (a pool index)
    ConstantValue { value: u16 },

    /// `Code`, the body of a non-abstract non-native method
    Code(CodeAttribute),

    /// `Exceptions`, the checked exceptions a method declares (pool indices of `Class` constants)
    Exceptions { exceptions: Vec<u16> },

    /// `BootstrapMethods`, the class-level table `invokedynamic` instructions index into
    BootstrapMethods(Vec<BootstrapMethod>),

    /// `MethodParameters`, source-level parameter names when compiled with `-parameters`
    MethodParameters(Vec<ParameterInfo>),

    /// Anything else, kept as raw bytes
    Unknown { name: String, info: Vec<u8> },
}

impl Attribute {
    /// Read one attribute, checking its body against the declared length
    ///
    /// Interpreted attributes must consume exactly the bytes their header declared; a mismatch
    /// means either a corrupt file or a parser bug, and neither should go unnoticed.
    pub fn read(reader: &mut ClassReader, constants: &ConstantPool) -> Result<Attribute, Error> {
        let name = String::from(constants.get_utf8(reader.read_u16()?)?);
        let length = reader.read_u32()?;
        let mut body = reader.sub_reader(length as usize)?;

        let attribute = match name.as_str() {
            "ConstantValue" => Attribute::ConstantValue {
                value: body.read_u16()?,
            },
            "Code" => Attribute::Code(CodeAttribute::read(&mut body, constants)?),
            "Exceptions" => {
                let count = body.read_u16()?;
                let exceptions = (0..count)
                    .map(|_| body.read_u16())
                    .collect::<Result<Vec<u16>, Error>>()?;
                Attribute::Exceptions { exceptions }
            }
            "BootstrapMethods" => {
                let count = body.read_u16()?;
                let methods = (0..count)
                    .map(|_| BootstrapMethod::read(&mut body))
                    .collect::<Result<Vec<BootstrapMethod>, Error>>()?;
                Attribute::BootstrapMethods(methods)
            }
            "MethodParameters" => {
                let count = body.read_u8()?;
                let parameters = (0..count)
                    .map(|_| ParameterInfo::read(&mut body))
                    .collect::<Result<Vec<ParameterInfo>, Error>>()?;
                Attribute::MethodParameters(parameters)
            }
            _ => {
                let info = body.read_bytes(body.remaining())?;
                Attribute::Unknown {
                    name: name.clone(),
                    info,
                }
            }
        };

        if !body.is_done() {
            return Err(Error::MalformedAttribute {
                attribute: name,
                declared: length,
                consumed: body.position() as u32,
            });
        }
        Ok(attribute)
    }

    /// Read an `attributes_count`-prefixed attribute table
    pub fn read_table(
        reader: &mut ClassReader,
        constants: &ConstantPool,
    ) -> Result<Vec<Attribute>, Error> {
        let count = reader.read_u16()?;
        (0..count).map(|_| Attribute::read(reader, constants)).collect()
    }
}

/// Body of a `Code` attribute
///
/// The code array stays as raw bytes here; decoding it is the translation phase's job, and
/// methods that never translate successfully should not pay for it.
#[derive(Debug)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionHandler>,
    pub attributes: Vec<Attribute>,
}

impl CodeAttribute {
    fn read(reader: &mut ClassReader, constants: &ConstantPool) -> Result<CodeAttribute, Error> {
        let max_stack = reader.read_u16()?;
        let max_locals = reader.read_u16()?;
        let code_length = reader.read_u32()?;
        let code = reader.read_bytes(code_length as usize)?;
        let handler_count = reader.read_u16()?;
        let exception_table = (0..handler_count)
            .map(|_| ExceptionHandler::read(reader))
            .collect::<Result<Vec<ExceptionHandler>, Error>>()?;
        let attributes = Attribute::read_table(reader, constants)?;
        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }
}

/// Entry in the exception table of a `Code` attribute
///
/// Start/end/handler are byte offsets into the code array; `catch_type` is a `Class` pool index,
/// or 0 for a catch-all (`finally`) handler.
#[derive(Debug)]
pub struct ExceptionHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

impl ExceptionHandler {
    fn read(reader: &mut ClassReader) -> Result<ExceptionHandler, Error> {
        Ok(ExceptionHandler {
            start_pc: reader.read_u16()?,
            end_pc: reader.read_u16()?,
            handler_pc: reader.read_u16()?,
            catch_type: reader.read_u16()?,
        })
    }
}

/// Entry in a `BootstrapMethods` attribute
#[derive(Debug)]
pub struct BootstrapMethod {
    /// Pool index of a `MethodHandle` constant
    pub method_handle: u16,

    /// Pool indices of loadable constants passed to the bootstrap method
    pub arguments: Vec<u16>,
}

impl BootstrapMethod {
    fn read(reader: &mut ClassReader) -> Result<BootstrapMethod, Error> {
        let method_handle = reader.read_u16()?;
        let argument_count = reader.read_u16()?;
        let arguments = (0..argument_count)
            .map(|_| reader.read_u16())
            .collect::<Result<Vec<u16>, Error>>()?;
        Ok(BootstrapMethod {
            method_handle,
            arguments,
        })
    }
}

/// Entry in a `MethodParameters` attribute
#[derive(Debug)]
pub struct ParameterInfo {
    /// Pool index of the parameter name, or 0 for no name
    pub name: u16,
    pub access_flags: u16,
}

impl ParameterInfo {
    fn read(reader: &mut ClassReader) -> Result<ParameterInfo, Error> {
        Ok(ParameterInfo {
            name: reader.read_u16()?,
            access_flags: reader.read_u16()?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_pool() -> ConstantPool {
        // #1 = Utf8 "ConstantValue", #2 = Utf8 "Whatever"
        let mut bytes = vec![0, 3];
        bytes.extend_from_slice(&[1, 0, 13]);
        bytes.extend_from_slice(b"ConstantValue");
        bytes.extend_from_slice(&[1, 0, 8]);
        bytes.extend_from_slice(b"Whatever");
        ConstantPool::read(&mut ClassReader::new(&bytes)).unwrap()
    }

    #[test]
    fn parses_constant_value() {
        let constants = test_pool();
        let bytes = [0, 1, 0, 0, 0, 2, 0, 9];
        let attribute = Attribute::read(&mut ClassReader::new(&bytes), &constants).unwrap();
        assert!(matches!(attribute, Attribute::ConstantValue { value: 9 }));
    }

    #[test]
    fn unknown_attributes_keep_raw_bytes() {
        let constants = test_pool();
        let bytes = [0, 2, 0, 0, 0, 3, 0xaa, 0xbb, 0xcc];
        let attribute = Attribute::read(&mut ClassReader::new(&bytes), &constants).unwrap();
        match attribute {
            Attribute::Unknown { name, info } => {
                assert_eq!(name, "Whatever");
                assert_eq!(info, vec![0xaa, 0xbb, 0xcc]);
            }
            other => panic!("expected Unknown attribute, got {:?}", other),
        }
    }

    #[test]
    fn declared_length_must_match_consumed() {
        let constants = test_pool();
        // ConstantValue declares 4 bytes but its body is always 2
        let bytes = [0, 1, 0, 0, 0, 4, 0, 9, 0, 0];
        match Attribute::read(&mut ClassReader::new(&bytes), &constants) {
            Err(Error::MalformedAttribute {
                attribute,
                declared: 4,
                consumed: 2,
            }) => assert_eq!(attribute, "ConstantValue"),
            other => panic!("expected MalformedAttribute, got {:?}", other),
        }
    }
}
