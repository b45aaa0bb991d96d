//! Serializing a completed batch into a module image
//!
//! The image is the pipeline's terminal output: a flat, token-based encoding of every type in
//! the graph, definitions with their members and bodies, references as name-only shells. Tokens
//! are 1-based positions in the image's own tables, so the format is self-contained and carries
//! no graph pointers.

use crate::cil::graph::{ConstantValue, FieldData, MethodData, TypeData};
use crate::cil::instruction::{
    ArrayKind, BranchKind, ComparisonBias, EqComparison, Instruction, MethodBody, OrdComparison,
    Target,
};
use crate::cil::Serialize;
use crate::jvm::RenderDescriptor;
use crate::util::RefId;
use byteorder::WriteBytesExt;
use std::collections::HashMap;
use std::io::{Error as IoError, ErrorKind, Result};

/// First four bytes of a module image
pub const MAGIC: u32 = 0x4D4C_4943;

const FORMAT_VERSION: u16 = 1;

/// A finished output module, ready to serialize
pub struct Module<'g> {
    pub name: String,

    /// Every type the image mentions, definitions and references alike
    pub types: Vec<&'g TypeData<'g>>,
}

impl<'g> Module<'g> {
    pub fn new(name: String) -> Module<'g> {
        Module {
            name,
            types: vec![],
        }
    }

    /// Write the image
    ///
    /// An unpatched branch target in a body is a translation bug, and surfaces here as an
    /// `InvalidData` error rather than a corrupt image.
    pub fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        let tokens = TokenTable::assign(&self.types);

        MAGIC.serialize(writer)?;
        FORMAT_VERSION.serialize(writer)?;
        self.name.serialize(writer)?;

        // Type table: names and flags first, so member rows can refer to any type token
        (self.types.len() as u32).serialize(writer)?;
        for typ in &self.types {
            typ.namespace.serialize(writer)?;
            typ.name.serialize(writer)?;
            typ.attributes.bits().serialize(writer)?;
            (typ.is_definition as u8).serialize(writer)?;
        }

        for &typ in &self.types {
            self.serialize_type(typ, &tokens, writer)?;
        }
        Ok(())
    }

    fn serialize_type<W: WriteBytesExt>(
        &self,
        typ: &'g TypeData<'g>,
        tokens: &TokenTable<'g>,
        writer: &mut W,
    ) -> Result<()> {
        match typ.superclass.get() {
            None => 0u32.serialize(writer)?,
            Some(superclass) => tokens.type_token(superclass)?.serialize(writer)?,
        }

        (typ.interfaces.len() as u32).serialize(writer)?;
        for i in 0..typ.interfaces.len() {
            tokens.type_token(&typ.interfaces[i])?.serialize(writer)?;
        }

        // References are name-only shells; only definitions carry member rows
        if !typ.is_definition {
            return Ok(());
        }

        (typ.fields.len() as u32).serialize(writer)?;
        for i in 0..typ.fields.len() {
            self.serialize_field(&typ.fields[i], writer)?;
        }

        (typ.methods.len() as u32).serialize(writer)?;
        for i in 0..typ.methods.len() {
            self.serialize_method(&typ.methods[i], tokens, writer)?;
        }
        Ok(())
    }

    fn serialize_field<W: WriteBytesExt>(
        &self,
        field: &'g FieldData<'g>,
        writer: &mut W,
    ) -> Result<()> {
        field.name.serialize(writer)?;
        field.attributes.bits().serialize(writer)?;
        field.descriptor.render().serialize(writer)?;
        match &field.initial_value {
            None => 0u8.serialize(writer)?,
            Some(ConstantValue::Integer(value)) => {
                1u8.serialize(writer)?;
                value.serialize(writer)?;
            }
            Some(ConstantValue::Long(value)) => {
                2u8.serialize(writer)?;
                value.serialize(writer)?;
            }
            Some(ConstantValue::Float(value)) => {
                3u8.serialize(writer)?;
                value.serialize(writer)?;
            }
            Some(ConstantValue::Double(value)) => {
                4u8.serialize(writer)?;
                value.serialize(writer)?;
            }
            Some(ConstantValue::String(value)) => {
                5u8.serialize(writer)?;
                value.serialize(writer)?;
            }
        }
        Ok(())
    }

    fn serialize_method<W: WriteBytesExt>(
        &self,
        method: &'g MethodData<'g>,
        tokens: &TokenTable<'g>,
        writer: &mut W,
    ) -> Result<()> {
        method.name.serialize(writer)?;
        method.attributes.bits().serialize(writer)?;
        method.descriptor.render().serialize(writer)?;
        method.parameter_names.serialize(writer)?;

        let body = method.body.borrow();
        match body.as_ref() {
            None => 0u8.serialize(writer)?,
            Some(body) => {
                1u8.serialize(writer)?;
                self.serialize_body(body, tokens, writer)?;
            }
        }
        Ok(())
    }

    fn serialize_body<W: WriteBytesExt>(
        &self,
        body: &MethodBody<'g>,
        tokens: &TokenTable<'g>,
        writer: &mut W,
    ) -> Result<()> {
        body.max_stack.serialize(writer)?;

        (body.locals.len() as u32).serialize(writer)?;
        for local in &body.locals {
            local.render().serialize(writer)?;
        }

        (body.instructions.len() as u32).serialize(writer)?;
        for instruction in &body.instructions {
            serialize_instruction(instruction, tokens, writer)?;
        }
        Ok(())
    }
}

/// Tokens assigned to graph nodes for one serialization pass
///
/// Tokens are 1-based; 0 is reserved for "none". Methods and fields are numbered globally in
/// type order, matching the order their rows appear in the image.
struct TokenTable<'g> {
    types: HashMap<RefId<'g, TypeData<'g>>, u32>,
    methods: HashMap<RefId<'g, MethodData<'g>>, u32>,
    fields: HashMap<RefId<'g, FieldData<'g>>, u32>,
}

impl<'g> TokenTable<'g> {
    fn assign(types: &[&'g TypeData<'g>]) -> TokenTable<'g> {
        let mut table = TokenTable {
            types: HashMap::new(),
            methods: HashMap::new(),
            fields: HashMap::new(),
        };
        for typ in types {
            let next = table.types.len() as u32 + 1;
            table.types.insert(RefId(*typ), next);
            for i in 0..typ.fields.len() {
                let next = table.fields.len() as u32 + 1;
                table.fields.insert(RefId(&typ.fields[i]), next);
            }
            for i in 0..typ.methods.len() {
                let next = table.methods.len() as u32 + 1;
                table.methods.insert(RefId(&typ.methods[i]), next);
            }
        }
        table
    }

    fn type_token(&self, typ: &'g TypeData<'g>) -> Result<u32> {
        self.types
            .get(&RefId(typ))
            .copied()
            .ok_or_else(|| unregistered("type", &typ.full_name()))
    }

    fn method_token(&self, method: &'g MethodData<'g>) -> Result<u32> {
        self.methods
            .get(&RefId(method))
            .copied()
            .ok_or_else(|| unregistered("method", &method.name))
    }

    fn field_token(&self, field: &'g FieldData<'g>) -> Result<u32> {
        self.fields
            .get(&RefId(field))
            .copied()
            .ok_or_else(|| unregistered("field", &field.name))
    }
}

fn unregistered(what: &str, name: &str) -> IoError {
    IoError::new(
        ErrorKind::InvalidData,
        format!("{} {} is not part of the module", what, name),
    )
}

fn serialize_instruction<'g, W: WriteBytesExt>(
    instruction: &Instruction<'g>,
    tokens: &TokenTable<'g>,
    writer: &mut W,
) -> Result<()> {
    let target_index = |target: &Target| -> Result<u32> {
        match target {
            Target::Instruction(index) => Ok(*index as u32),
            Target::Offset(offset) => Err(IoError::new(
                ErrorKind::InvalidData,
                format!("unpatched branch target at source offset {}", offset),
            )),
        }
    };

    match instruction {
        Instruction::Nop => 0x00u8.serialize(writer)?,
        Instruction::LoadArg(index) => {
            0x01u8.serialize(writer)?;
            index.serialize(writer)?;
        }
        Instruction::StoreArg(index) => {
            0x02u8.serialize(writer)?;
            index.serialize(writer)?;
        }
        Instruction::LoadLocal(index) => {
            0x03u8.serialize(writer)?;
            index.serialize(writer)?;
        }
        Instruction::StoreLocal(index) => {
            0x04u8.serialize(writer)?;
            index.serialize(writer)?;
        }
        Instruction::PushInt(value) => {
            0x05u8.serialize(writer)?;
            value.serialize(writer)?;
        }
        Instruction::PushLong(value) => {
            0x06u8.serialize(writer)?;
            value.serialize(writer)?;
        }
        Instruction::PushFloat(value) => {
            0x07u8.serialize(writer)?;
            value.serialize(writer)?;
        }
        Instruction::PushDouble(value) => {
            0x08u8.serialize(writer)?;
            value.serialize(writer)?;
        }
        Instruction::PushString(value) => {
            0x09u8.serialize(writer)?;
            value.serialize(writer)?;
        }
        Instruction::PushNull => 0x0au8.serialize(writer)?,
        Instruction::Add => 0x10u8.serialize(writer)?,
        Instruction::Sub => 0x11u8.serialize(writer)?,
        Instruction::Mul => 0x12u8.serialize(writer)?,
        Instruction::Div => 0x13u8.serialize(writer)?,
        Instruction::Rem => 0x14u8.serialize(writer)?,
        Instruction::Neg => 0x15u8.serialize(writer)?,
        Instruction::And => 0x16u8.serialize(writer)?,
        Instruction::Or => 0x17u8.serialize(writer)?,
        Instruction::Xor => 0x18u8.serialize(writer)?,
        Instruction::Shl => 0x19u8.serialize(writer)?,
        Instruction::Shr => 0x1au8.serialize(writer)?,
        Instruction::ShrUn => 0x1bu8.serialize(writer)?,
        Instruction::ConvI1 => 0x20u8.serialize(writer)?,
        Instruction::ConvU2 => 0x21u8.serialize(writer)?,
        Instruction::ConvI2 => 0x22u8.serialize(writer)?,
        Instruction::ConvI4 => 0x23u8.serialize(writer)?,
        Instruction::ConvI8 => 0x24u8.serialize(writer)?,
        Instruction::ConvR4 => 0x25u8.serialize(writer)?,
        Instruction::ConvR8 => 0x26u8.serialize(writer)?,
        Instruction::Compare(bias) => {
            0x27u8.serialize(writer)?;
            let bias: u8 = match bias {
                ComparisonBias::None => 0,
                ComparisonBias::Negative => 1,
                ComparisonBias::Positive => 2,
            };
            bias.serialize(writer)?;
        }
        Instruction::Dup => 0x28u8.serialize(writer)?,
        Instruction::Pop => 0x29u8.serialize(writer)?,
        Instruction::Branch { kind, target } => {
            0x30u8.serialize(writer)?;
            branch_kind_byte(kind).serialize(writer)?;
            target_index(target)?.serialize(writer)?;
        }
        Instruction::NewInstance(typ) => {
            0x40u8.serialize(writer)?;
            tokens.type_token(typ)?.serialize(writer)?;
        }
        Instruction::NewArray(element) => {
            0x41u8.serialize(writer)?;
            element.render().serialize(writer)?;
        }
        Instruction::ArrayLength => 0x42u8.serialize(writer)?,
        Instruction::ArrayLoad(kind) => {
            0x43u8.serialize(writer)?;
            array_kind_byte(kind).serialize(writer)?;
        }
        Instruction::ArrayStore(kind) => {
            0x44u8.serialize(writer)?;
            array_kind_byte(kind).serialize(writer)?;
        }
        Instruction::CastClass(typ) => {
            0x45u8.serialize(writer)?;
            tokens.type_token(typ)?.serialize(writer)?;
        }
        Instruction::InstanceOf(typ) => {
            0x46u8.serialize(writer)?;
            tokens.type_token(typ)?.serialize(writer)?;
        }
        Instruction::Throw => 0x47u8.serialize(writer)?,
        Instruction::GetField(field) => {
            0x50u8.serialize(writer)?;
            tokens.field_token(field)?.serialize(writer)?;
        }
        Instruction::PutField(field) => {
            0x51u8.serialize(writer)?;
            tokens.field_token(field)?.serialize(writer)?;
        }
        Instruction::GetStatic(field) => {
            0x52u8.serialize(writer)?;
            tokens.field_token(field)?.serialize(writer)?;
        }
        Instruction::PutStatic(field) => {
            0x53u8.serialize(writer)?;
            tokens.field_token(field)?.serialize(writer)?;
        }
        Instruction::Call(method) => {
            0x60u8.serialize(writer)?;
            tokens.method_token(method)?.serialize(writer)?;
        }
        Instruction::CallVirt(method) => {
            0x61u8.serialize(writer)?;
            tokens.method_token(method)?.serialize(writer)?;
        }
        Instruction::Ret => 0x70u8.serialize(writer)?,
    }
    Ok(())
}

fn branch_kind_byte(kind: &BranchKind) -> u8 {
    let ord = |comparison: &OrdComparison| -> u8 {
        match comparison {
            OrdComparison::Eq => 0,
            OrdComparison::Ne => 1,
            OrdComparison::Lt => 2,
            OrdComparison::Ge => 3,
            OrdComparison::Gt => 4,
            OrdComparison::Le => 5,
        }
    };
    match kind {
        BranchKind::Goto => 0x00,
        BranchKind::If(comparison) => 0x10 | ord(comparison),
        BranchKind::IfICmp(comparison) => 0x20 | ord(comparison),
        BranchKind::IfACmp(EqComparison::Eq) => 0x30,
        BranchKind::IfACmp(EqComparison::Ne) => 0x31,
        BranchKind::IfNull => 0x40,
        BranchKind::IfNonNull => 0x41,
    }
}

fn array_kind_byte(kind: &ArrayKind) -> u8 {
    match kind {
        ArrayKind::Byte => 0,
        ArrayKind::Char => 1,
        ArrayKind::Short => 2,
        ArrayKind::Int => 3,
        ArrayKind::Long => 4,
        ArrayKind::Float => 5,
        ArrayKind::Double => 6,
        ArrayKind::Object => 7,
    }
}
