//! The closed instruction set of the output module
//!
//! Instructions are stack-machine operations, close enough to the source bytecode that one
//! source instruction usually maps to one output instruction. Member operands point directly
//! into the type graph rather than going through a constant pool.

use crate::cil::graph::{FieldData, MethodData, TypeData};
use crate::jvm::FieldType;

/// Translated body of one method
#[derive(Debug)]
pub struct MethodBody<'g> {
    /// Operand stack budget, carried over from the source method
    pub max_stack: u16,

    /// Types of the local variable slots, in ascending slot order
    pub locals: Vec<FieldType<&'g TypeData<'g>>>,

    pub instructions: Vec<Instruction<'g>>,
}

impl<'g> MethodBody<'g> {
    /// Fallback body for methods whose translation failed
    pub fn stub() -> MethodBody<'g> {
        MethodBody {
            max_stack: 0,
            locals: vec![],
            instructions: vec![Instruction::Ret],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction<'g> {
    Nop,

    /// Load an argument (argument 0 is the receiver for instance methods)
    LoadArg(u16),
    StoreArg(u16),
    LoadLocal(u16),
    StoreLocal(u16),

    PushInt(i32),
    PushLong(i64),
    PushFloat(f32),
    PushDouble(f64),
    PushString(String),
    PushNull,

    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    ShrUn,

    ConvI1,
    ConvU2,
    ConvI2,
    ConvI4,
    ConvI8,
    ConvR4,
    ConvR8,

    /// Three-way comparison pushing -1/0/1 (`lcmp` and the float/double compare family)
    Compare(ComparisonBias),

    Dup,
    Pop,

    Branch { kind: BranchKind, target: Target },

    /// Allocate an uninitialized instance; the `Call` of a `.ctor` that follows initializes it
    NewInstance(&'g TypeData<'g>),

    /// Allocate an array; the element type is on the instruction, the length on the stack
    NewArray(FieldType<&'g TypeData<'g>>),
    ArrayLength,
    ArrayLoad(ArrayKind),
    ArrayStore(ArrayKind),

    CastClass(&'g TypeData<'g>),
    InstanceOf(&'g TypeData<'g>),
    Throw,

    GetField(&'g FieldData<'g>),
    PutField(&'g FieldData<'g>),
    GetStatic(&'g FieldData<'g>),
    PutStatic(&'g FieldData<'g>),

    /// Direct (non-virtual) call: static methods, constructors, `invokespecial`
    Call(&'g MethodData<'g>),

    /// Virtual dispatch: `invokevirtual` and `invokeinterface`
    CallVirt(&'g MethodData<'g>),

    Ret,
}

/// Branch target
///
/// Targets start life as source byte offsets while a body is being translated and are patched
/// into instruction indices once every offset's instruction is known. A serialized body never
/// contains an `Offset` target.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Target {
    /// Byte offset into the source code array (pre-patch only)
    Offset(u16),

    /// Index into the body's instruction vector
    Instruction(usize),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BranchKind {
    Goto,

    /// Compare one int against zero
    If(OrdComparison),

    /// Compare two ints
    IfICmp(OrdComparison),

    /// Compare two references
    IfACmp(EqComparison),

    IfNull,
    IfNonNull,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OrdComparison {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum EqComparison {
    Eq,
    Ne,
}

/// Which NaN ordering a float/double comparison uses
///
/// `lcmp` has no NaN case and uses `None`; the `fcmpl`/`fcmpg` split decides whether NaN
/// compares as less-than or greater-than.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ComparisonBias {
    None,
    Negative,
    Positive,
}

/// Element category of an array load/store
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ArrayKind {
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Object,
}
