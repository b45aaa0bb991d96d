//! Graph of translated types and their members
//!
//! When translating a batch of classes, it is convenient to maintain one unified graph of all of
//! the types and members in the output module. Members can then refer to each other directly by
//! reference, which makes forward and cyclic references within a batch free: a shell for every
//! type exists before anything points at it.
//!
//! All nodes live in arenas so references between them share the single graph lifetime `'g`.
//! Member lists are append-only frozen vectors, and a type's superclass is behind a `Cell` since
//! it is wired a phase after the type itself is declared.

use crate::cil::instruction::MethodBody;
use crate::cil::{FieldAttributes, MethodAttributes, TypeAttributes};
use crate::jvm::{
    BinaryName, FieldType, MethodDescriptor, RenderDescriptor, UnqualifiedName,
};
use elsa::map::FrozenMap;
use elsa::FrozenVec;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::fmt::Debug;
use typed_arena::Arena;

/// Backing arenas for one [`TypeGraph`]
///
/// Kept separate from the graph so the graph can hand out `&'g` references into them.
pub struct TypeGraphArenas<'g> {
    type_arena: Arena<TypeData<'g>>,
    method_arena: Arena<MethodData<'g>>,
    field_arena: Arena<FieldData<'g>>,
}

impl<'g> TypeGraphArenas<'g> {
    pub fn new() -> Self {
        TypeGraphArenas {
            type_arena: Arena::new(),
            method_arena: Arena::new(),
            field_arena: Arena::new(),
        }
    }
}

impl<'g> Default for TypeGraphArenas<'g> {
    fn default() -> Self {
        TypeGraphArenas::new()
    }
}

pub struct TypeGraph<'g> {
    arenas: &'g TypeGraphArenas<'g>,

    /// Lookup by the name the type had on the JVM side
    by_source_name: FrozenMap<&'g BinaryName, &'g TypeData<'g>>,

    /// All types, in insertion order (definitions and references)
    types: FrozenVec<&'g TypeData<'g>>,
}

impl<'g> TypeGraph<'g> {
    /// New empty graph
    pub fn new(arenas: &'g TypeGraphArenas<'g>) -> Self {
        TypeGraph {
            arenas,
            by_source_name: FrozenMap::new(),
            types: FrozenVec::new(),
        }
    }

    pub fn lookup_type(&'g self, name: &BinaryName) -> Option<&'g TypeData<'g>> {
        self.by_source_name.get(name)
    }

    /// Add a new type to the graph
    ///
    /// The caller is responsible for checking the name is not already taken.
    pub fn add_type(&self, data: TypeData<'g>) -> &'g TypeData<'g> {
        let data = &*self.arenas.type_arena.alloc(data);
        self.by_source_name.insert(&data.source_name, data);
        self.types.push(data);
        data
    }

    /// Add a method to the graph and to its owning type
    pub fn add_method(&self, method: MethodData<'g>) -> &'g MethodData<'g> {
        let data = &*self.arenas.method_arena.alloc(method);
        data.owner.methods.push(data);
        data
    }

    /// Add a field to the graph and to its owning type
    pub fn add_field(&self, field: FieldData<'g>) -> &'g FieldData<'g> {
        let data = &*self.arenas.field_arena.alloc(field);
        data.owner.fields.push(data);
        data
    }

    /// All types in insertion order
    pub fn types(&'g self) -> impl Iterator<Item = &'g TypeData<'g>> + 'g {
        (0..self.types.len()).map(move |i| &self.types[i])
    }

    /// Pre-declare the runtime types every batch depends on
    ///
    /// The root object type always exists as a reference, so a translated class can wire a base
    /// type even when `java/lang/Object` is not part of the batch, and `invokespecial` against
    /// `Object.<init>` resolves like any other member.
    pub fn insert_runtime_types(&self) -> RuntimeLibrary<'g> {
        let object = self.add_type(TypeData {
            source_name: BinaryName::OBJECT,
            namespace: String::from("Java.Lang"),
            name: String::from("Object"),
            attributes: TypeAttributes::PUBLIC,
            is_definition: false,
            superclass: Cell::new(None),
            interfaces: FrozenVec::new(),
            methods: FrozenVec::new(),
            fields: FrozenVec::new(),
        });
        let object_ctor = self.add_method(MethodData {
            owner: object,
            name: String::from(".ctor"),
            source_name: UnqualifiedName::INIT,
            attributes: MethodAttributes::PUBLIC
                | MethodAttributes::HIDE_BY_SIG
                | MethodAttributes::SPECIAL_NAME
                | MethodAttributes::RT_SPECIAL_NAME,
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
            parameter_names: vec![],
            body: RefCell::new(None),
        });
        RuntimeLibrary {
            object,
            object_ctor,
        }
    }
}

/// References to the pre-declared runtime types of [`TypeGraph::insert_runtime_types`]
pub struct RuntimeLibrary<'g> {
    pub object: &'g TypeData<'g>,
    pub object_ctor: &'g MethodData<'g>,
}

/// A type in the output module
///
/// A *definition* is a type the batch declares in full; a *reference* is a shell standing in for
/// a type that lives outside the batch. References have no members beyond the ones resolution
/// pre-seeds (see [`TypeGraph::insert_runtime_types`]).
pub struct TypeData<'g> {
    /// Name the type had on the JVM side (the graph lookup key)
    pub source_name: BinaryName,

    /// Dot-separated namespace in the output module (may be empty)
    pub namespace: String,

    /// Simple name in the output module
    pub name: String,

    pub attributes: TypeAttributes,

    pub is_definition: bool,

    /// Wired one phase after declaration; `None` only for the root object type
    pub superclass: Cell<Option<&'g TypeData<'g>>>,

    pub interfaces: FrozenVec<&'g TypeData<'g>>,
    pub methods: FrozenVec<&'g MethodData<'g>>,
    pub fields: FrozenVec<&'g FieldData<'g>>,
}

impl<'g> TypeData<'g> {
    pub fn is_interface(&self) -> bool {
        self.attributes.contains(TypeAttributes::INTERFACE)
    }

    /// Namespace-qualified name, as diagnostics print it
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

impl<'g> PartialEq for TypeData<'g> {
    fn eq(&self, other: &TypeData<'g>) -> bool {
        self.source_name == other.source_name
    }
}

impl<'g> Eq for TypeData<'g> {}

impl<'g> RenderDescriptor for TypeData<'g> {
    fn render_to(&self, write_to: &mut String) {
        self.source_name.render_to(write_to)
    }
}

impl<'a, 'g> RenderDescriptor for &'a TypeData<'g> {
    fn render_to(&self, write_to: &mut String) {
        self.source_name.render_to(write_to)
    }
}

impl<'g> Debug for TypeData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// A method in the output module
pub struct MethodData<'g> {
    pub owner: &'g TypeData<'g>,

    /// Name in the output module (`<init>` and `<clinit>` become `.ctor` and `.cctor`)
    pub name: String,

    /// Name the method had on the JVM side (the member resolution key)
    pub source_name: UnqualifiedName,

    pub attributes: MethodAttributes,

    /// Signature, with class references resolved into the graph
    ///
    /// Rendering this gives back the JVM descriptor string, which is what member resolution
    /// matches on.
    pub descriptor: MethodDescriptor<&'g TypeData<'g>>,

    /// One name per declared parameter (the receiver is not included)
    pub parameter_names: Vec<String>,

    /// Filled in during the emit phase; stays `None` for bodiless methods
    pub body: RefCell<Option<MethodBody<'g>>>,
}

impl<'g> MethodData<'g> {
    pub fn is_static(&self) -> bool {
        self.attributes.contains(MethodAttributes::STATIC)
    }

    /// Does the method take a receiver argument?
    pub fn has_this(&self) -> bool {
        !self.is_static()
    }
}

impl<'g> PartialEq for MethodData<'g> {
    fn eq(&self, other: &MethodData<'g>) -> bool {
        self.owner == other.owner
            && self.source_name == other.source_name
            && self.descriptor == other.descriptor
    }
}

impl<'g> Debug for MethodData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "{}::{}:{}",
            self.owner.full_name(),
            self.name,
            self.descriptor.render(),
        ))
    }
}

/// A field in the output module
pub struct FieldData<'g> {
    /// Note: this is a pointer back to the owning type (so don't derive `Debug`)
    pub owner: &'g TypeData<'g>,

    pub name: String,

    /// Name the field had on the JVM side (the member resolution key)
    pub source_name: UnqualifiedName,

    pub attributes: FieldAttributes,

    pub descriptor: FieldType<&'g TypeData<'g>>,

    /// Initial value from a `ConstantValue` attribute, if the field had one
    pub initial_value: Option<ConstantValue>,
}

impl<'g> FieldData<'g> {
    pub fn is_static(&self) -> bool {
        self.attributes.contains(FieldAttributes::STATIC)
    }
}

impl<'g> PartialEq for FieldData<'g> {
    fn eq(&self, other: &FieldData<'g>) -> bool {
        self.owner == other.owner
            && self.source_name == other.source_name
            && self.descriptor == other.descriptor
    }
}

impl<'g> Debug for FieldData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "{}::{}:{}",
            self.owner.full_name(),
            self.name,
            self.descriptor.render(),
        ))
    }
}

/// A loadable constant attached to a field initializer
#[derive(Clone, PartialEq, Debug)]
pub enum ConstantValue {
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}
