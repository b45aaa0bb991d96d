use super::{Error, MemberResolver};
use crate::cil::graph::{MethodData, TypeData};
use crate::cil::instruction::{
    ArrayKind, BranchKind, ComparisonBias, EqComparison, Instruction, MethodBody, OrdComparison,
    Target,
};
use crate::jvm::bytecode::{op, BytecodeCursor, PrimitiveArrayType};
use crate::jvm::class_file::{
    BootstrapMethod, CodeAttribute, Constant, ConstantPool, HandleKind, MemberRef,
};
use crate::jvm::{
    BaseType, BinaryName, Error as ClassFileError, FieldType, ParseDescriptor, UnqualifiedName,
};
use crate::util::{Offset, OffsetResult, OffsetVec};
use std::collections::HashMap;

/// Translates the body of one method
///
/// Works in two passes over the code array: a forward decode that maps every source byte offset
/// to the index of the instruction it produced, then a patch pass that rewrites branch targets
/// from byte offsets to instruction indices.
pub struct MethodTranslator<'a, 'g> {
    constants: &'a ConstantPool,
    bootstrap_methods: Option<&'a [BootstrapMethod]>,
    resolver: &'a MemberResolver<'a, 'g>,

    instructions: Vec<Instruction<'g>>,
    offset_to_index: HashMap<usize, usize>,

    /// Indices of instructions whose branch target is still a byte offset
    unpatched_branches: Vec<usize>,

    /// Argument slots: receiver (for instance methods) followed by the declared parameters,
    /// wide parameters taking two slots
    arguments: OffsetVec<FieldType<&'g TypeData<'g>>>,

    /// Non-argument local slots, keyed by the slot offset past the arguments; types are fixed
    /// by the opcode category of each slot's first use
    locals: OffsetVec<FieldType<&'g TypeData<'g>>>,
}

/// Opcode category a local slot access comes from (`iload` vs `lload` vs `aload`, ...)
#[derive(Copy, Clone)]
enum LocalKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl<'a, 'g> MethodTranslator<'a, 'g> {
    pub fn new(
        constants: &'a ConstantPool,
        bootstrap_methods: Option<&'a [BootstrapMethod]>,
        resolver: &'a MemberResolver<'a, 'g>,
        method: &'g MethodData<'g>,
    ) -> MethodTranslator<'a, 'g> {
        let mut arguments: OffsetVec<FieldType<&'g TypeData<'g>>> = OffsetVec::new();
        if method.has_this() {
            arguments.push(FieldType::object(method.owner));
        }
        for parameter in &method.descriptor.parameters {
            arguments.push(*parameter);
        }
        let locals = OffsetVec::new_starting_at(arguments.offset_len());

        MethodTranslator {
            constants,
            bootstrap_methods,
            resolver,
            instructions: vec![],
            offset_to_index: HashMap::new(),
            unpatched_branches: vec![],
            arguments,
            locals,
        }
    }

    /// Translate a `Code` attribute into a method body
    pub fn translate(mut self, code: &CodeAttribute) -> Result<MethodBody<'g>, Error> {
        let mut cursor = BytecodeCursor::new(&code.code);
        while !cursor.is_done() {
            let offset = cursor.position();
            self.offset_to_index.insert(offset, self.instructions.len());
            self.translate_instruction(&mut cursor, offset)?;
        }
        self.patch_branches()?;

        Ok(MethodBody {
            max_stack: code.max_stack,
            locals: self.locals.iter().map(|(_, _, typ)| *typ).collect(),
            instructions: self.instructions,
        })
    }

    /// Rewrite every `Target::Offset` into the index of the instruction at that offset
    fn patch_branches(&mut self) -> Result<(), Error> {
        for index in self.unpatched_branches.drain(..) {
            if let Instruction::Branch { target, .. } = &mut self.instructions[index] {
                if let Target::Offset(offset) = *target {
                    match self.offset_to_index.get(&(offset as usize)) {
                        Some(instruction_index) => {
                            *target = Target::Instruction(*instruction_index)
                        }
                        None => {
                            return Err(Error::BadBranchTarget {
                                offset: offset as i64,
                            })
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn push(&mut self, instruction: Instruction<'g>) {
        self.instructions.push(instruction);
    }

    fn push_branch(&mut self, kind: BranchKind, source_offset: usize, relative: i64) -> Result<(), Error> {
        let target = source_offset as i64 + relative;
        if target < 0 || target > u16::MAX as i64 {
            return Err(Error::BadBranchTarget { offset: target });
        }
        self.unpatched_branches.push(self.instructions.len());
        self.push(Instruction::Branch {
            kind,
            target: Target::Offset(target as u16),
        });
        Ok(())
    }

    /// Translate the load of a frame slot into an argument or local load
    fn load_slot(&mut self, slot: u16, kind: LocalKind) -> Result<(), Error> {
        let instruction = match self.slot_index(slot, kind)? {
            SlotIndex::Argument(index) => Instruction::LoadArg(index),
            SlotIndex::Local(index) => Instruction::LoadLocal(index),
        };
        self.push(instruction);
        Ok(())
    }

    fn store_slot(&mut self, slot: u16, kind: LocalKind) -> Result<(), Error> {
        let instruction = match self.slot_index(slot, kind)? {
            SlotIndex::Argument(index) => Instruction::StoreArg(index),
            SlotIndex::Local(index) => Instruction::StoreLocal(index),
        };
        self.push(instruction);
        Ok(())
    }

    /// Resolve a frame slot to an argument or local index
    ///
    /// Slots below the argument width map onto arguments, adjusting for wide parameters taking
    /// two slots. Higher slots are locals, registered on first use with the type implied by the
    /// accessing opcode; a gap left by skipping slots is padded with reference-typed locals so
    /// indices stay dense.
    fn slot_index(&mut self, slot: u16, kind: LocalKind) -> Result<SlotIndex, Error> {
        let offset = Offset(slot as usize);
        if offset < self.arguments.offset_len() {
            return match self.arguments.get_offset(offset) {
                OffsetResult::Ok(index, _) => Ok(SlotIndex::Argument(index as u16)),
                _ => Err(Error::ClassFile(ClassFileError::MalformedClassFile(format!(
                    "frame slot {} lands in the middle of a wide argument",
                    slot
                )))),
            };
        }

        match self.locals.get_offset(offset) {
            OffsetResult::Ok(index, _) => Ok(SlotIndex::Local(index as u16)),
            OffsetResult::InvalidOffset(_) => {
                Err(Error::ClassFile(ClassFileError::MalformedClassFile(format!(
                    "frame slot {} lands in the middle of a wide local",
                    slot
                ))))
            }
            OffsetResult::TooLarge => {
                let object = FieldType::object(self.resolver.reference_type(&BinaryName::OBJECT));
                while self.locals.offset_len().0 < slot as usize {
                    self.locals.push(object);
                }
                self.locals.push(self.local_type(kind));
                Ok(SlotIndex::Local((self.locals.len() - 1) as u16))
            }
        }
    }

    fn local_type(&self, kind: LocalKind) -> FieldType<&'g TypeData<'g>> {
        match kind {
            LocalKind::Int => FieldType::int(),
            LocalKind::Long => FieldType::long(),
            LocalKind::Float => FieldType::float(),
            LocalKind::Double => FieldType::double(),
            LocalKind::Reference => {
                FieldType::object(self.resolver.reference_type(&BinaryName::OBJECT))
            }
        }
    }

    /// Push a loadable constant from the pool (`ldc` family)
    fn load_constant(&mut self, index: u16) -> Result<(), Error> {
        let instruction = match self.constants.get(index).map_err(Error::ClassFile)? {
            Constant::Integer(value) => Instruction::PushInt(*value),
            Constant::Float(value) => Instruction::PushFloat(*value),
            Constant::Long(value) => Instruction::PushLong(*value),
            Constant::Double(value) => Instruction::PushDouble(*value),
            Constant::String { utf8 } => {
                let string = self.constants.get_utf8(*utf8).map_err(Error::ClassFile)?;
                Instruction::PushString(String::from(string))
            }
            _ => return Err(Error::NotLoadableConstant(index)),
        };
        self.push(instruction);
        Ok(())
    }

    fn field_op(
        &mut self,
        index: u16,
        make: impl FnOnce(&'g crate::cil::graph::FieldData<'g>) -> Instruction<'g>,
    ) -> Result<(), Error> {
        let reference = self.constants.get_field_ref(index).map_err(Error::ClassFile)?;
        let owner = self.resolver.reference_class(&reference.class_name)?;
        let field = self.resolver.resolve_field(
            owner,
            &reference.member.name,
            &reference.member.descriptor,
        )?;
        self.push(make(field));
        Ok(())
    }

    fn method_call(&mut self, reference: &MemberRef, virtual_call: bool) -> Result<(), Error> {
        let owner = self.resolver.reference_class(&reference.class_name)?;
        let method = self.resolver.resolve_method(
            owner,
            &reference.member.name,
            &reference.member.descriptor,
        )?;
        self.push(if virtual_call {
            Instruction::CallVirt(method)
        } else {
            Instruction::Call(method)
        });
        Ok(())
    }

    /// Resolve a class-operand instruction (`new`, `checkcast`, `instanceof`)
    fn class_operand(&mut self, index: u16) -> Result<&'g TypeData<'g>, Error> {
        let name = self
            .constants
            .get_class_string(index)
            .map_err(Error::ClassFile)?;
        self.resolver.reference_class(name)
    }

    /// Element type of an `anewarray` operand, which may itself be an array class
    fn array_element_type(&mut self, index: u16) -> Result<FieldType<&'g TypeData<'g>>, Error> {
        let name = self
            .constants
            .get_class_string(index)
            .map_err(Error::ClassFile)?;
        if name.starts_with('[') {
            let element: FieldType<BinaryName> =
                FieldType::parse(name).map_err(Error::ClassFile)?;
            Ok(element.map(|class| self.resolver.reference_type(class)))
        } else {
            Ok(FieldType::object(self.resolver.reference_class(name)?))
        }
    }

    /// Dispatch an `invokedynamic` site through its bootstrap method's handle
    fn invoke_dynamic(&mut self, index: u16) -> Result<(), Error> {
        let (bootstrap_index, _site) = self
            .constants
            .get_invoke_dynamic(index)
            .map_err(Error::ClassFile)?;
        let bootstrap = self
            .bootstrap_methods
            .and_then(|methods| methods.get(bootstrap_index as usize))
            .ok_or(Error::MissingBootstrapMethod(bootstrap_index))?;
        let (kind, member) = self
            .constants
            .get_method_handle(bootstrap.method_handle)
            .map_err(Error::ClassFile)?;

        // Static bootstrap arguments go on the stack first, in table order
        for &argument in &bootstrap.arguments {
            self.load_constant(argument)?;
        }

        match kind {
            HandleKind::GetField => self.handle_field(&member, Instruction::GetField),
            HandleKind::GetStatic => self.handle_field(&member, Instruction::GetStatic),
            HandleKind::PutField => self.handle_field(&member, Instruction::PutField),
            HandleKind::PutStatic => self.handle_field(&member, Instruction::PutStatic),
            HandleKind::InvokeStatic | HandleKind::InvokeSpecial => {
                self.method_call(&member, false)
            }
            HandleKind::InvokeVirtual | HandleKind::InvokeInterface => {
                self.method_call(&member, true)
            }
            HandleKind::NewInvokeSpecial => {
                let owner = self.resolver.reference_class(&member.class_name)?;
                let constructor = self.resolver.resolve_method(
                    owner,
                    &UnqualifiedName::INIT,
                    &member.member.descriptor,
                )?;
                self.push(Instruction::NewInstance(owner));
                self.push(Instruction::Call(constructor));
                Ok(())
            }
        }
    }

    fn handle_field(
        &mut self,
        member: &MemberRef,
        make: impl FnOnce(&'g crate::cil::graph::FieldData<'g>) -> Instruction<'g>,
    ) -> Result<(), Error> {
        let owner = self.resolver.reference_class(&member.class_name)?;
        let field =
            self.resolver
                .resolve_field(owner, &member.member.name, &member.member.descriptor)?;
        self.push(make(field));
        Ok(())
    }

    fn translate_instruction(
        &mut self,
        cursor: &mut BytecodeCursor,
        offset: usize,
    ) -> Result<(), Error> {
        let opcode = cursor.read_u8().map_err(Error::ClassFile)?;
        match opcode {
            op::NOP => self.push(Instruction::Nop),

            // Constants
            op::ACONST_NULL => self.push(Instruction::PushNull),
            op::ICONST_M1..=op::ICONST_5 => {
                self.push(Instruction::PushInt(opcode as i32 - op::ICONST_0 as i32))
            }
            op::LCONST_0 | op::LCONST_1 => {
                self.push(Instruction::PushLong((opcode - op::LCONST_0) as i64))
            }
            op::FCONST_0 | op::FCONST_1 | op::FCONST_2 => {
                self.push(Instruction::PushFloat((opcode - op::FCONST_0) as f32))
            }
            op::DCONST_0 | op::DCONST_1 => {
                self.push(Instruction::PushDouble((opcode - op::DCONST_0) as f64))
            }
            op::BIPUSH => {
                let value = cursor.read_i8().map_err(Error::ClassFile)?;
                self.push(Instruction::PushInt(value as i32));
            }
            op::SIPUSH => {
                let value = cursor.read_i16().map_err(Error::ClassFile)?;
                self.push(Instruction::PushInt(value as i32));
            }
            op::LDC => {
                let index = cursor.read_u8().map_err(Error::ClassFile)?;
                self.load_constant(index as u16)?;
            }
            op::LDC_W | op::LDC2_W => {
                let index = cursor.read_u16().map_err(Error::ClassFile)?;
                self.load_constant(index)?;
            }

            // Slot loads
            op::ILOAD => {
                let slot = cursor.read_u8().map_err(Error::ClassFile)?;
                self.load_slot(slot as u16, LocalKind::Int)?;
            }
            op::LLOAD => {
                let slot = cursor.read_u8().map_err(Error::ClassFile)?;
                self.load_slot(slot as u16, LocalKind::Long)?;
            }
            op::FLOAD => {
                let slot = cursor.read_u8().map_err(Error::ClassFile)?;
                self.load_slot(slot as u16, LocalKind::Float)?;
            }
            op::DLOAD => {
                let slot = cursor.read_u8().map_err(Error::ClassFile)?;
                self.load_slot(slot as u16, LocalKind::Double)?;
            }
            op::ALOAD => {
                let slot = cursor.read_u8().map_err(Error::ClassFile)?;
                self.load_slot(slot as u16, LocalKind::Reference)?;
            }
            op::ILOAD_0..=op::ILOAD_3 => {
                self.load_slot((opcode - op::ILOAD_0) as u16, LocalKind::Int)?
            }
            op::LLOAD_0..=op::LLOAD_3 => {
                self.load_slot((opcode - op::LLOAD_0) as u16, LocalKind::Long)?
            }
            op::FLOAD_0..=op::FLOAD_3 => {
                self.load_slot((opcode - op::FLOAD_0) as u16, LocalKind::Float)?
            }
            op::DLOAD_0..=op::DLOAD_3 => {
                self.load_slot((opcode - op::DLOAD_0) as u16, LocalKind::Double)?
            }
            op::ALOAD_0..=op::ALOAD_3 => {
                self.load_slot((opcode - op::ALOAD_0) as u16, LocalKind::Reference)?
            }

            // Array loads
            op::IALOAD => self.push(Instruction::ArrayLoad(ArrayKind::Int)),
            op::LALOAD => self.push(Instruction::ArrayLoad(ArrayKind::Long)),
            op::FALOAD => self.push(Instruction::ArrayLoad(ArrayKind::Float)),
            op::DALOAD => self.push(Instruction::ArrayLoad(ArrayKind::Double)),
            op::AALOAD => self.push(Instruction::ArrayLoad(ArrayKind::Object)),
            op::BALOAD => self.push(Instruction::ArrayLoad(ArrayKind::Byte)),
            op::CALOAD => self.push(Instruction::ArrayLoad(ArrayKind::Char)),
            op::SALOAD => self.push(Instruction::ArrayLoad(ArrayKind::Short)),

            // Slot stores
            op::ISTORE => {
                let slot = cursor.read_u8().map_err(Error::ClassFile)?;
                self.store_slot(slot as u16, LocalKind::Int)?;
            }
            op::LSTORE => {
                let slot = cursor.read_u8().map_err(Error::ClassFile)?;
                self.store_slot(slot as u16, LocalKind::Long)?;
            }
            op::FSTORE => {
                let slot = cursor.read_u8().map_err(Error::ClassFile)?;
                self.store_slot(slot as u16, LocalKind::Float)?;
            }
            op::DSTORE => {
                let slot = cursor.read_u8().map_err(Error::ClassFile)?;
                self.store_slot(slot as u16, LocalKind::Double)?;
            }
            op::ASTORE => {
                let slot = cursor.read_u8().map_err(Error::ClassFile)?;
                self.store_slot(slot as u16, LocalKind::Reference)?;
            }
            op::ISTORE_0..=op::ISTORE_3 => {
                self.store_slot((opcode - op::ISTORE_0) as u16, LocalKind::Int)?
            }
            op::LSTORE_0..=op::LSTORE_3 => {
                self.store_slot((opcode - op::LSTORE_0) as u16, LocalKind::Long)?
            }
            op::FSTORE_0..=op::FSTORE_3 => {
                self.store_slot((opcode - op::FSTORE_0) as u16, LocalKind::Float)?
            }
            op::DSTORE_0..=op::DSTORE_3 => {
                self.store_slot((opcode - op::DSTORE_0) as u16, LocalKind::Double)?
            }
            op::ASTORE_0..=op::ASTORE_3 => {
                self.store_slot((opcode - op::ASTORE_0) as u16, LocalKind::Reference)?
            }

            // Array stores
            op::IASTORE => self.push(Instruction::ArrayStore(ArrayKind::Int)),
            op::LASTORE => self.push(Instruction::ArrayStore(ArrayKind::Long)),
            op::FASTORE => self.push(Instruction::ArrayStore(ArrayKind::Float)),
            op::DASTORE => self.push(Instruction::ArrayStore(ArrayKind::Double)),
            op::AASTORE => self.push(Instruction::ArrayStore(ArrayKind::Object)),
            op::BASTORE => self.push(Instruction::ArrayStore(ArrayKind::Byte)),
            op::CASTORE => self.push(Instruction::ArrayStore(ArrayKind::Char)),
            op::SASTORE => self.push(Instruction::ArrayStore(ArrayKind::Short)),

            // Stack manipulation (the shape-dependent forms need stack typing we don't track)
            op::POP => self.push(Instruction::Pop),
            op::POP2 => {
                // Two slots, two pops
                self.push(Instruction::Pop);
                self.push(Instruction::Pop);
            }
            op::DUP => self.push(Instruction::Dup),

            // Arithmetic
            op::IADD | op::LADD | op::FADD | op::DADD => self.push(Instruction::Add),
            op::ISUB | op::LSUB | op::FSUB | op::DSUB => self.push(Instruction::Sub),
            op::IMUL | op::LMUL | op::FMUL | op::DMUL => self.push(Instruction::Mul),
            op::IDIV | op::LDIV | op::FDIV | op::DDIV => self.push(Instruction::Div),
            op::IREM | op::LREM | op::FREM | op::DREM => self.push(Instruction::Rem),
            op::INEG | op::LNEG | op::FNEG | op::DNEG => self.push(Instruction::Neg),
            op::ISHL | op::LSHL => self.push(Instruction::Shl),
            op::ISHR | op::LSHR => self.push(Instruction::Shr),
            op::IUSHR | op::LUSHR => self.push(Instruction::ShrUn),
            op::IAND | op::LAND => self.push(Instruction::And),
            op::IOR | op::LOR => self.push(Instruction::Or),
            op::IXOR | op::LXOR => self.push(Instruction::Xor),
            op::IINC => {
                let slot = cursor.read_u8().map_err(Error::ClassFile)? as u16;
                let amount = cursor.read_i8().map_err(Error::ClassFile)?;
                self.load_slot(slot, LocalKind::Int)?;
                self.push(Instruction::PushInt(amount as i32));
                self.push(Instruction::Add);
                self.store_slot(slot, LocalKind::Int)?;
            }

            // Conversions
            op::I2L | op::F2L | op::D2L => self.push(Instruction::ConvI8),
            op::I2F | op::L2F | op::D2F => self.push(Instruction::ConvR4),
            op::I2D | op::L2D | op::F2D => self.push(Instruction::ConvR8),
            op::L2I | op::F2I | op::D2I => self.push(Instruction::ConvI4),
            op::I2B => self.push(Instruction::ConvI1),
            op::I2C => self.push(Instruction::ConvU2),
            op::I2S => self.push(Instruction::ConvI2),

            // Three-way comparisons
            op::LCMP => self.push(Instruction::Compare(ComparisonBias::None)),
            op::FCMPL | op::DCMPL => self.push(Instruction::Compare(ComparisonBias::Negative)),
            op::FCMPG | op::DCMPG => self.push(Instruction::Compare(ComparisonBias::Positive)),

            // Branches
            op::IFEQ..=op::IFLE => {
                let relative = cursor.read_i16().map_err(Error::ClassFile)?;
                let comparison = ord_comparison(opcode - op::IFEQ);
                self.push_branch(BranchKind::If(comparison), offset, relative as i64)?;
            }
            op::IF_ICMPEQ..=op::IF_ICMPLE => {
                let relative = cursor.read_i16().map_err(Error::ClassFile)?;
                let comparison = ord_comparison(opcode - op::IF_ICMPEQ);
                self.push_branch(BranchKind::IfICmp(comparison), offset, relative as i64)?;
            }
            op::IF_ACMPEQ | op::IF_ACMPNE => {
                let relative = cursor.read_i16().map_err(Error::ClassFile)?;
                let comparison = if opcode == op::IF_ACMPEQ {
                    EqComparison::Eq
                } else {
                    EqComparison::Ne
                };
                self.push_branch(BranchKind::IfACmp(comparison), offset, relative as i64)?;
            }
            op::GOTO => {
                let relative = cursor.read_i16().map_err(Error::ClassFile)?;
                self.push_branch(BranchKind::Goto, offset, relative as i64)?;
            }
            op::GOTO_W => {
                let relative = cursor.read_i32().map_err(Error::ClassFile)?;
                self.push_branch(BranchKind::Goto, offset, relative as i64)?;
            }
            op::IFNULL => {
                let relative = cursor.read_i16().map_err(Error::ClassFile)?;
                self.push_branch(BranchKind::IfNull, offset, relative as i64)?;
            }
            op::IFNONNULL => {
                let relative = cursor.read_i16().map_err(Error::ClassFile)?;
                self.push_branch(BranchKind::IfNonNull, offset, relative as i64)?;
            }

            // Returns all collapse to one instruction; the value (if any) rides the stack
            op::IRETURN..=op::RETURN => self.push(Instruction::Ret),

            // Field access
            op::GETSTATIC => {
                let index = cursor.read_u16().map_err(Error::ClassFile)?;
                self.field_op(index, Instruction::GetStatic)?;
            }
            op::PUTSTATIC => {
                let index = cursor.read_u16().map_err(Error::ClassFile)?;
                self.field_op(index, Instruction::PutStatic)?;
            }
            op::GETFIELD => {
                let index = cursor.read_u16().map_err(Error::ClassFile)?;
                self.field_op(index, Instruction::GetField)?;
            }
            op::PUTFIELD => {
                let index = cursor.read_u16().map_err(Error::ClassFile)?;
                self.field_op(index, Instruction::PutField)?;
            }

            // Calls
            op::INVOKEVIRTUAL => {
                let index = cursor.read_u16().map_err(Error::ClassFile)?;
                let reference = self.constants.get_method_ref(index).map_err(Error::ClassFile)?;
                // `clone` on a primitive array class has no member to resolve; the reference
                // on the stack passes through unchanged
                if reference.class_name.starts_with('[') {
                    self.push(Instruction::Nop);
                } else {
                    self.method_call(&reference, true)?;
                }
            }
            op::INVOKESPECIAL | op::INVOKESTATIC => {
                let index = cursor.read_u16().map_err(Error::ClassFile)?;
                let reference = self.constants.get_method_ref(index).map_err(Error::ClassFile)?;
                self.method_call(&reference, false)?;
            }
            op::INVOKEINTERFACE => {
                let index = cursor.read_u16().map_err(Error::ClassFile)?;
                // Historical count and padding bytes
                cursor.read_u8().map_err(Error::ClassFile)?;
                cursor.read_u8().map_err(Error::ClassFile)?;
                let reference = self.constants.get_method_ref(index).map_err(Error::ClassFile)?;
                self.method_call(&reference, true)?;
            }
            op::INVOKEDYNAMIC => {
                let index = cursor.read_u16().map_err(Error::ClassFile)?;
                cursor.read_u16().map_err(Error::ClassFile)?;
                self.invoke_dynamic(index)?;
            }

            // Objects and arrays
            op::NEW => {
                let index = cursor.read_u16().map_err(Error::ClassFile)?;
                let typ = self.class_operand(index)?;
                self.push(Instruction::NewInstance(typ));
            }
            op::NEWARRAY => {
                let atype = cursor.read_u8().map_err(Error::ClassFile)?;
                let base = PrimitiveArrayType::from_byte(atype).ok_or_else(|| {
                    Error::ClassFile(ClassFileError::MalformedClassFile(format!(
                        "invalid newarray element type {}",
                        atype
                    )))
                })?;
                self.push(Instruction::NewArray(FieldType::Base(primitive_base(base))));
            }
            op::ANEWARRAY => {
                let index = cursor.read_u16().map_err(Error::ClassFile)?;
                let element = self.array_element_type(index)?;
                self.push(Instruction::NewArray(element));
            }
            op::ARRAYLENGTH => self.push(Instruction::ArrayLength),
            op::ATHROW => self.push(Instruction::Throw),
            op::CHECKCAST => {
                let index = cursor.read_u16().map_err(Error::ClassFile)?;
                let typ = self.class_operand(index)?;
                self.push(Instruction::CastClass(typ));
            }
            op::INSTANCEOF => {
                let index = cursor.read_u16().map_err(Error::ClassFile)?;
                let typ = self.class_operand(index)?;
                self.push(Instruction::InstanceOf(typ));
            }

            // Everything else: subroutines, switches, shape-dependent stack ops, monitors,
            // wide-index forms, multi-dimensional allocation
            _ => {
                return Err(Error::UnsupportedOpcode { opcode, offset });
            }
        }
        Ok(())
    }
}

enum SlotIndex {
    Argument(u16),
    Local(u16),
}

fn ord_comparison(offset_from_eq: u8) -> OrdComparison {
    match offset_from_eq {
        0 => OrdComparison::Eq,
        1 => OrdComparison::Ne,
        2 => OrdComparison::Lt,
        3 => OrdComparison::Ge,
        4 => OrdComparison::Gt,
        _ => OrdComparison::Le,
    }
}

fn primitive_base(typ: PrimitiveArrayType) -> BaseType {
    match typ {
        PrimitiveArrayType::Boolean => BaseType::Boolean,
        PrimitiveArrayType::Char => BaseType::Char,
        PrimitiveArrayType::Float => BaseType::Float,
        PrimitiveArrayType::Double => BaseType::Double,
        PrimitiveArrayType::Byte => BaseType::Byte,
        PrimitiveArrayType::Short => BaseType::Short,
        PrimitiveArrayType::Int => BaseType::Int,
        PrimitiveArrayType::Long => BaseType::Long,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cil::graph::{TypeGraph, TypeGraphArenas};
    use crate::cil::MethodAttributes;
    use crate::jvm::class_file::ClassReader;
    use crate::jvm::MethodDescriptor;
    use crate::translate::ClrRenamer;
    use std::cell::RefCell;

    fn empty_pool() -> ConstantPool {
        ConstantPool::read(&mut ClassReader::new(&[0x00, 0x01])).unwrap()
    }

    fn code(bytes: &[u8]) -> CodeAttribute {
        CodeAttribute {
            max_stack: 4,
            max_locals: 8,
            code: bytes.to_vec(),
            exception_table: vec![],
            attributes: vec![],
        }
    }

    fn static_method<'g>(
        graph: &'g TypeGraph<'g>,
        resolver: &MemberResolver<'_, 'g>,
        parameters: Vec<FieldType<&'g TypeData<'g>>>,
    ) -> &'g MethodData<'g> {
        let owner = resolver
            .reference_type(&BinaryName::from_string(String::from("demo/Runner")).unwrap());
        graph.add_method(MethodData {
            owner,
            name: String::from("run"),
            source_name: UnqualifiedName::from_string(String::from("run")).unwrap(),
            attributes: MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            descriptor: MethodDescriptor {
                parameters,
                return_type: None,
            },
            parameter_names: vec![],
            body: RefCell::new(None),
        })
    }

    #[test]
    fn iinc_expands_to_load_add_store() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let renamer = ClrRenamer;
        let resolver = MemberResolver::new(&graph, &renamer);
        let pool = empty_pool();
        let method = static_method(&graph, &resolver, vec![FieldType::int()]);

        // iinc 0, 7; return
        let translator = MethodTranslator::new(&pool, None, &resolver, method);
        let body = translator
            .translate(&code(&[op::IINC, 0x00, 0x07, op::RETURN]))
            .unwrap();

        assert_eq!(
            body.instructions,
            vec![
                Instruction::LoadArg(0),
                Instruction::PushInt(7),
                Instruction::Add,
                Instruction::StoreArg(0),
                Instruction::Ret,
            ],
        );
    }

    #[test]
    fn wide_arguments_take_two_slots() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let renamer = ClrRenamer;
        let resolver = MemberResolver::new(&graph, &renamer);
        let pool = empty_pool();
        let method = static_method(
            &graph,
            &resolver,
            vec![FieldType::long(), FieldType::int()],
        );

        // The int parameter sits in slot 2, past the two-slot long
        let translator = MethodTranslator::new(&pool, None, &resolver, method);
        let body = translator
            .translate(&code(&[op::ILOAD_2, op::POP, op::RETURN]))
            .unwrap();

        assert_eq!(
            body.instructions,
            vec![Instruction::LoadArg(1), Instruction::Pop, Instruction::Ret],
        );
    }

    #[test]
    fn second_slot_of_a_wide_argument_is_malformed() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let renamer = ClrRenamer;
        let resolver = MemberResolver::new(&graph, &renamer);
        let pool = empty_pool();
        let method = static_method(&graph, &resolver, vec![FieldType::long()]);

        let translator = MethodTranslator::new(&pool, None, &resolver, method);
        let err = translator
            .translate(&code(&[op::ILOAD_1, op::POP, op::RETURN]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ClassFile(ClassFileError::MalformedClassFile(_))
        ));
    }

    #[test]
    fn branches_get_patched_to_instruction_indices() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let renamer = ClrRenamer;
        let resolver = MemberResolver::new(&graph, &renamer);
        let pool = empty_pool();
        let method = static_method(&graph, &resolver, vec![FieldType::int()]);

        //  0: iload_0
        //  1: ifeq 7
        //  4: iconst_1
        //  5: goto 0
        //  8: return
        let translator = MethodTranslator::new(&pool, None, &resolver, method);
        let body = translator
            .translate(&code(&[
                op::ILOAD_0,
                op::IFEQ,
                0x00,
                0x07,
                op::ICONST_1,
                op::GOTO,
                0xff,
                0xfb,
                op::RETURN,
            ]))
            .unwrap();

        assert_eq!(
            body.instructions,
            vec![
                Instruction::LoadArg(0),
                Instruction::Branch {
                    kind: BranchKind::If(OrdComparison::Eq),
                    target: Target::Instruction(4),
                },
                Instruction::PushInt(1),
                Instruction::Branch {
                    kind: BranchKind::Goto,
                    target: Target::Instruction(0),
                },
                Instruction::Ret,
            ],
        );
    }

    #[test]
    fn branch_into_the_middle_of_an_instruction_is_rejected() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let renamer = ClrRenamer;
        let resolver = MemberResolver::new(&graph, &renamer);
        let pool = empty_pool();
        let method = static_method(&graph, &resolver, vec![]);

        // goto lands on the second operand byte of itself
        let translator = MethodTranslator::new(&pool, None, &resolver, method);
        let err = translator
            .translate(&code(&[op::GOTO, 0x00, 0x02, op::RETURN]))
            .unwrap_err();
        assert!(matches!(err, Error::BadBranchTarget { offset: 2 }));
    }

    #[test]
    fn locals_are_typed_by_first_use() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let renamer = ClrRenamer;
        let resolver = MemberResolver::new(&graph, &renamer);
        let pool = empty_pool();
        let method = static_method(&graph, &resolver, vec![]);

        // lconst_0; lstore_0; fconst_0; fstore_2; return
        let translator = MethodTranslator::new(&pool, None, &resolver, method);
        let body = translator
            .translate(&code(&[
                op::LCONST_0,
                op::LSTORE_0,
                op::FCONST_0,
                op::FSTORE_2,
                op::RETURN,
            ]))
            .unwrap();

        assert_eq!(body.locals, vec![FieldType::long(), FieldType::float()]);
        assert_eq!(
            body.instructions,
            vec![
                Instruction::PushLong(0),
                Instruction::StoreLocal(0),
                Instruction::PushFloat(0.0),
                Instruction::StoreLocal(1),
                Instruction::Ret,
            ],
        );
    }

    #[test]
    fn pop2_lowers_to_two_pops() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let renamer = ClrRenamer;
        let resolver = MemberResolver::new(&graph, &renamer);
        let pool = empty_pool();
        let method = static_method(&graph, &resolver, vec![]);

        // lconst_0; pop2; return
        let translator = MethodTranslator::new(&pool, None, &resolver, method);
        let body = translator
            .translate(&code(&[op::LCONST_0, op::POP2, op::RETURN]))
            .unwrap();

        assert_eq!(
            body.instructions,
            vec![
                Instruction::PushLong(0),
                Instruction::Pop,
                Instruction::Pop,
                Instruction::Ret,
            ],
        );
    }

    #[test]
    fn bootstrap_arguments_precede_the_dispatched_call() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let renamer = ClrRenamer;
        let resolver = MemberResolver::new(&graph, &renamer);

        // #1 = Utf8 "demo/Runner", #2 = Class #1, #3 = Utf8 "run", #4 = Utf8 "()V",
        // #5 = NameAndType #3 #4, #6 = MethodRef #2 #5, #7 = MethodHandle invokestatic #6,
        // #8 = Utf8 "hello", #9 = String #8, #10 = InvokeDynamic bootstrap 0 #5
        let mut bytes: Vec<u8> = vec![0, 11];
        bytes.extend_from_slice(&[1, 0, 11]);
        bytes.extend_from_slice(b"demo/Runner");
        bytes.extend_from_slice(&[7, 0, 1]);
        bytes.extend_from_slice(&[1, 0, 3]);
        bytes.extend_from_slice(b"run");
        bytes.extend_from_slice(&[1, 0, 3]);
        bytes.extend_from_slice(b"()V");
        bytes.extend_from_slice(&[12, 0, 3, 0, 4]);
        bytes.extend_from_slice(&[10, 0, 2, 0, 5]);
        bytes.extend_from_slice(&[15, 6, 0, 6]);
        bytes.extend_from_slice(&[1, 0, 5]);
        bytes.extend_from_slice(b"hello");
        bytes.extend_from_slice(&[8, 0, 8]);
        bytes.extend_from_slice(&[18, 0, 0, 0, 5]);
        let pool = ConstantPool::read(&mut ClassReader::new(&bytes)).unwrap();

        let method = static_method(&graph, &resolver, vec![]);
        let bootstrap_methods = vec![BootstrapMethod {
            method_handle: 7,
            arguments: vec![9],
        }];

        // invokedynamic #10; return
        let translator =
            MethodTranslator::new(&pool, Some(bootstrap_methods.as_slice()), &resolver, method);
        let body = translator
            .translate(&code(&[op::INVOKEDYNAMIC, 0x00, 0x0a, 0x00, 0x00, op::RETURN]))
            .unwrap();

        assert_eq!(
            body.instructions,
            vec![
                Instruction::PushString(String::from("hello")),
                Instruction::Call(method),
                Instruction::Ret,
            ],
        );
    }

    #[test]
    fn shape_dependent_stack_ops_are_unsupported() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let renamer = ClrRenamer;
        let resolver = MemberResolver::new(&graph, &renamer);
        let pool = empty_pool();
        let method = static_method(&graph, &resolver, vec![]);

        let translator = MethodTranslator::new(&pool, None, &resolver, method);
        let err = translator
            .translate(&code(&[op::ICONST_0, op::ICONST_1, op::SWAP, op::RETURN]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedOpcode { opcode: op::SWAP, offset: 2 }
        ));
    }
}
