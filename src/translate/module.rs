use super::{Diagnostics, Error, MemberResolver, MethodTranslator, Settings};
use crate::cil::graph::{
    ConstantValue, FieldData, MethodData, RuntimeLibrary, TypeData, TypeGraph,
};
use crate::cil::instruction::MethodBody;
use crate::cil::module::Module;
use crate::cil::{FieldAttributes, MethodAttributes, TypeAttributes};
use crate::jvm;
use crate::jvm::class_file::{ClassFile, Constant, ConstantPool, Method};
use crate::jvm::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags, RenderDescriptor};
use std::cell::{Cell, RefCell};

use elsa::FrozenVec;

/// Translates a batch of class files into one output module
///
/// Classes go through three phases. First every class is *declared*, so the graph knows all the
/// names the batch defines. Then each class is *wired*: its base type, interfaces, fields, and
/// method signatures are resolved into the graph, which may pull in reference shells for types
/// outside the batch. Only then are method bodies *emitted*, when every member an instruction
/// could name is already in the graph.
///
/// A failure in the wire phase skips the class; a failure in the emit phase stubs out the one
/// method. Either way the failure lands in [`Diagnostics`] and the rest of the batch proceeds.
pub struct ModuleTranslator<'g> {
    settings: Settings,
    graph: &'g TypeGraph<'g>,
    runtime: RuntimeLibrary<'g>,
    classes: Vec<ClassFile>,
    diagnostics: Diagnostics,
}

impl<'g> ModuleTranslator<'g> {
    pub fn new(settings: Settings, graph: &'g TypeGraph<'g>) -> ModuleTranslator<'g> {
        let runtime = graph.insert_runtime_types();
        ModuleTranslator {
            settings,
            graph,
            runtime,
            classes: vec![],
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn runtime(&self) -> &RuntimeLibrary<'g> {
        &self.runtime
    }

    /// Parse a class file and queue it for translation
    pub fn include(&mut self, class_bytes: &[u8]) -> Result<(), jvm::Error> {
        self.classes.push(ClassFile::parse(class_bytes)?);
        Ok(())
    }

    /// Translate everything queued so far
    ///
    /// Always produces a module; consult the diagnostics to find out what got skipped or
    /// stubbed along the way.
    pub fn translate(self) -> (Module<'g>, Diagnostics) {
        let ModuleTranslator {
            settings,
            graph,
            runtime: _,
            classes,
            mut diagnostics,
        } = self;
        let resolver = MemberResolver::new(graph, &*settings.renamer);

        // Declare phase: every batch-defined name enters the graph before any resolution runs
        let mut declared: Vec<Option<&'g TypeData<'g>>> = Vec::with_capacity(classes.len());
        for class in &classes {
            if graph.lookup_type(&class.this_class).is_some() {
                let name = String::from(class.this_class.as_str());
                diagnostics.push_class(&name, Error::DuplicateClass(name.clone()));
                declared.push(None);
                continue;
            }
            log::trace!("Declaring {:?}", class.this_class);
            let (namespace, simple_name) = settings.renamer.rename_type(&class.this_class);
            declared.push(Some(graph.add_type(TypeData {
                source_name: class.this_class.clone(),
                namespace,
                name: simple_name,
                attributes: type_attributes(class),
                is_definition: true,
                superclass: Cell::new(None),
                interfaces: FrozenVec::new(),
                methods: FrozenVec::new(),
                fields: FrozenVec::new(),
            })));
        }

        // Wire phase: supertypes, fields, and method signatures
        let mut wired: Vec<Option<Vec<&'g MethodData<'g>>>> = Vec::with_capacity(classes.len());
        for (class, data) in classes.iter().zip(&mut declared) {
            let methods = match *data {
                None => None,
                Some(typ) => match wire_class(graph, &resolver, &settings, class, typ) {
                    Ok(methods) => Some(methods),
                    Err(error) => {
                        log::warn!("Skipping {:?} ({:?})", class.this_class, error);
                        diagnostics.push_class(class.this_class.as_str(), error);
                        *data = None;
                        None
                    }
                },
            };
            wired.push(methods);
        }

        // Emit phase: method bodies, each failing on its own
        for (class, methods) in classes.iter().zip(&wired) {
            if let Some(methods) = methods {
                emit_bodies(&resolver, class, methods, &mut diagnostics);
            }
        }

        let module = Module {
            name: settings.module_name,
            types: graph.types().collect(),
        };
        (module, diagnostics)
    }
}

/// Resolve one class's supertypes and declare its members into the graph
fn wire_class<'g>(
    graph: &'g TypeGraph<'g>,
    resolver: &MemberResolver<'_, 'g>,
    settings: &Settings,
    class: &ClassFile,
    typ: &'g TypeData<'g>,
) -> Result<Vec<&'g MethodData<'g>>, Error> {
    if let Some(super_class) = &class.super_class {
        typ.superclass.set(Some(resolver.reference_type(super_class)));
    }
    for interface in &class.interfaces {
        typ.interfaces.push(resolver.reference_type(interface));
    }

    for field in &class.fields {
        let initial_value = match field.constant_value() {
            Some(index) => Some(constant_value(&class.constants, index)?),
            None => None,
        };
        graph.add_field(FieldData {
            owner: typ,
            name: settings.renamer.rename_field(&field.name),
            source_name: field.name.clone(),
            attributes: field_attributes(field.access_flags),
            descriptor: field.descriptor.map(|class| resolver.reference_type(class)),
            initial_value,
        });
    }

    let mut methods = Vec::with_capacity(class.methods.len());
    for method in &class.methods {
        methods.push(graph.add_method(MethodData {
            owner: typ,
            name: settings.renamer.rename_method(&method.name),
            source_name: method.name.clone(),
            attributes: method_attributes(method),
            descriptor: method
                .descriptor
                .map(|class| resolver.reference_type(class)),
            parameter_names: parameter_names(settings, &class.constants, method)?,
            body: RefCell::new(None),
        }));
    }
    Ok(methods)
}

/// Translate the bodies of one wired class
fn emit_bodies<'g>(
    resolver: &MemberResolver<'_, 'g>,
    class: &ClassFile,
    methods: &[&'g MethodData<'g>],
    diagnostics: &mut Diagnostics,
) {
    let bootstrap_methods = class.bootstrap_methods();
    for (declaration, &data) in class.methods.iter().zip(methods) {
        let code = match declaration.code() {
            Some(code) => code,
            None => continue,
        };
        let translator =
            MethodTranslator::new(&class.constants, bootstrap_methods, resolver, data);
        let body = match translator.translate(code) {
            Ok(body) => body,
            Err(error) => {
                log::warn!("Stubbing {:?} ({:?})", data, error);
                diagnostics.push_method(
                    class.this_class.as_str(),
                    format!("{}:{}", declaration.name.as_str(), declaration.descriptor.render()),
                    error,
                );
                MethodBody::stub()
            }
        };
        *data.body.borrow_mut() = Some(body);
    }
}

fn type_attributes(class: &ClassFile) -> TypeAttributes {
    let flags = class.access_flags;
    let mut attributes = TypeAttributes::empty();
    if flags.contains(ClassAccessFlags::PUBLIC) {
        attributes |= TypeAttributes::PUBLIC;
    }
    if flags.contains(ClassAccessFlags::FINAL) {
        attributes |= TypeAttributes::SEALED;
    }
    if flags.contains(ClassAccessFlags::INTERFACE) {
        attributes |= TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT;
    } else if flags.contains(ClassAccessFlags::ABSTRACT) {
        attributes |= TypeAttributes::ABSTRACT;
    }

    // No static initializer means field initialization can be deferred
    if !class.methods.iter().any(Method::is_class_initializer) {
        attributes |= TypeAttributes::BEFORE_FIELD_INIT;
    }
    attributes
}

fn field_attributes(flags: FieldAccessFlags) -> FieldAttributes {
    let mut attributes = if flags.contains(FieldAccessFlags::PRIVATE) {
        FieldAttributes::PRIVATE
    } else if flags.contains(FieldAccessFlags::PROTECTED) {
        FieldAttributes::FAMILY
    } else if flags.contains(FieldAccessFlags::PUBLIC) {
        FieldAttributes::PUBLIC
    } else {
        FieldAttributes::ASSEMBLY
    };
    if flags.contains(FieldAccessFlags::STATIC) {
        attributes |= FieldAttributes::STATIC;
    }
    if flags.contains(FieldAccessFlags::FINAL) {
        attributes |= FieldAttributes::INIT_ONLY;
    }
    attributes
}

fn method_attributes(method: &Method) -> MethodAttributes {
    let flags = method.access_flags;
    let mut attributes = if flags.contains(MethodAccessFlags::PRIVATE) {
        MethodAttributes::PRIVATE
    } else if flags.contains(MethodAccessFlags::PROTECTED) {
        MethodAttributes::FAMILY
    } else if flags.contains(MethodAccessFlags::PUBLIC) {
        MethodAttributes::PUBLIC
    } else {
        MethodAttributes::ASSEMBLY
    };
    attributes |= MethodAttributes::HIDE_BY_SIG;
    if flags.contains(MethodAccessFlags::STATIC) {
        attributes |= MethodAttributes::STATIC;
    }
    if flags.contains(MethodAccessFlags::FINAL) {
        attributes |= MethodAttributes::FINAL;
    }
    if flags.contains(MethodAccessFlags::ABSTRACT) {
        attributes |= MethodAttributes::ABSTRACT;
    }
    if method.is_instance_initializer() || method.is_class_initializer() {
        attributes |= MethodAttributes::SPECIAL_NAME | MethodAttributes::RT_SPECIAL_NAME;
    } else if !method.is_static()
        && !flags.contains(MethodAccessFlags::PRIVATE)
        && !flags.contains(MethodAccessFlags::FINAL)
    {
        attributes |= MethodAttributes::VIRTUAL;
    }
    attributes
}

/// Map a `ConstantValue` attribute's pool entry into a field initializer
fn constant_value(constants: &ConstantPool, index: u16) -> Result<ConstantValue, Error> {
    let value = match constants.get(index).map_err(Error::ClassFile)? {
        Constant::Integer(value) => ConstantValue::Integer(*value),
        Constant::Long(value) => ConstantValue::Long(*value),
        Constant::Float(value) => ConstantValue::Float(*value),
        Constant::Double(value) => ConstantValue::Double(*value),
        Constant::String { utf8 } => {
            ConstantValue::String(String::from(constants.get_utf8(*utf8)?))
        }
        _ => return Err(Error::NotLoadableConstant(index)),
    };
    Ok(value)
}

/// One name per declared parameter, from `MethodParameters` when present
fn parameter_names(
    settings: &Settings,
    constants: &ConstantPool,
    method: &Method,
) -> Result<Vec<String>, Error> {
    let info = method.parameter_info();
    (0..method.descriptor.parameters.len())
        .map(|i| {
            if let Some(parameter) = info.and_then(|info| info.get(i)) {
                if parameter.name != 0 {
                    return Ok(String::from(constants.get_utf8(parameter.name)?));
                }
            }
            Ok(format!("{}{}", settings.parameter_name_prefix, i))
        })
        .collect()
}
