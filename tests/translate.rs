//! End-to-end checks: assemble small class files by hand, run a batch through the translator,
//! and inspect the resulting graph and image.

use class2cil::cil::graph::{MethodData, TypeData, TypeGraph, TypeGraphArenas};
use class2cil::cil::instruction::Instruction;
use class2cil::cil::module::Module;
use class2cil::jvm;
use class2cil::jvm::bytecode::op;
use class2cil::translate::{Diagnostics, ModuleTranslator, Settings};

const ACC_PUBLIC: u16 = 0x0001;
const ACC_STATIC: u16 = 0x0008;
const ACC_SUPER: u16 = 0x0020;

/// Builds up a constant pool entry by entry
struct PoolBuilder {
    bytes: Vec<u8>,
    count: u16,
}

impl PoolBuilder {
    fn new() -> PoolBuilder {
        PoolBuilder {
            bytes: vec![],
            count: 1,
        }
    }

    fn next_index(&mut self) -> u16 {
        let index = self.count;
        self.count += 1;
        index
    }

    fn utf8(&mut self, text: &str) -> u16 {
        self.bytes.push(1);
        self.bytes.extend((text.len() as u16).to_be_bytes());
        self.bytes.extend(text.as_bytes());
        self.next_index()
    }

    fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        self.bytes.push(7);
        self.bytes.extend(name.to_be_bytes());
        self.next_index()
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.bytes.push(12);
        self.bytes.extend(name.to_be_bytes());
        self.bytes.extend(descriptor.to_be_bytes());
        self.next_index()
    }

    fn method_ref(&mut self, class: u16, name_and_type: u16) -> u16 {
        self.bytes.push(10);
        self.bytes.extend(class.to_be_bytes());
        self.bytes.extend(name_and_type.to_be_bytes());
        self.next_index()
    }
}

/// Builds a whole class file
struct ClassAssembler {
    pool: PoolBuilder,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    methods: Vec<Vec<u8>>,
}

impl ClassAssembler {
    fn new(access_flags: u16, name: &str, super_name: Option<&str>) -> ClassAssembler {
        let mut pool = PoolBuilder::new();
        let this_class = pool.class(name);
        let super_class = match super_name {
            Some(super_name) => pool.class(super_name),
            None => 0,
        };
        ClassAssembler {
            pool,
            access_flags,
            this_class,
            super_class,
            methods: vec![],
        }
    }

    /// Add a method with a `Code` attribute
    fn method(&mut self, access_flags: u16, name: &str, descriptor: &str, code: &[u8]) {
        let name = self.pool.utf8(name);
        let descriptor = self.pool.utf8(descriptor);
        let code_name = self.pool.utf8("Code");

        let mut method = vec![];
        method.extend(access_flags.to_be_bytes());
        method.extend(name.to_be_bytes());
        method.extend(descriptor.to_be_bytes());
        method.extend(1u16.to_be_bytes());
        method.extend(code_name.to_be_bytes());
        method.extend((12 + code.len() as u32).to_be_bytes());
        method.extend(4u16.to_be_bytes()); // max_stack
        method.extend(8u16.to_be_bytes()); // max_locals
        method.extend((code.len() as u32).to_be_bytes());
        method.extend(code);
        method.extend(0u16.to_be_bytes()); // exception table
        method.extend(0u16.to_be_bytes()); // attributes
        self.methods.push(method);
    }

    fn bytes(self) -> Vec<u8> {
        let mut bytes = vec![0xca, 0xfe, 0xba, 0xbe, 0x00, 0x00, 0x00, 0x34];
        bytes.extend(self.pool.count.to_be_bytes());
        bytes.extend(self.pool.bytes);
        bytes.extend(self.access_flags.to_be_bytes());
        bytes.extend(self.this_class.to_be_bytes());
        bytes.extend(self.super_class.to_be_bytes());
        bytes.extend(0u16.to_be_bytes()); // interfaces
        bytes.extend(0u16.to_be_bytes()); // fields
        bytes.extend((self.methods.len() as u16).to_be_bytes());
        for method in self.methods {
            bytes.extend(method);
        }
        bytes.extend(0u16.to_be_bytes()); // class attributes
        bytes
    }
}

fn translate_batch<'g>(
    graph: &'g TypeGraph<'g>,
    batch: &[Vec<u8>],
) -> (Module<'g>, Diagnostics) {
    let mut translator = ModuleTranslator::new(Settings::new("test"), graph);
    for class_bytes in batch {
        translator.include(class_bytes).unwrap();
    }
    translator.translate()
}

fn find_type<'g>(module: &Module<'g>, name: &str) -> &'g TypeData<'g> {
    module
        .types
        .iter()
        .copied()
        .find(|typ| typ.name == name)
        .unwrap_or_else(|| panic!("no type named {}", name))
}

fn find_method<'g>(typ: &'g TypeData<'g>, name: &str) -> &'g MethodData<'g> {
    (0..typ.methods.len())
        .map(|i| &typ.methods[i])
        .find(|method| method.name == name)
        .unwrap_or_else(|| panic!("no method named {} on {:?}", name, typ))
}

fn body_of<'g>(method: &MethodData<'g>) -> Vec<Instruction<'g>> {
    method
        .body
        .borrow()
        .as_ref()
        .unwrap_or_else(|| panic!("{:?} has no body", method))
        .instructions
        .clone()
}

#[test]
fn parses_a_hello_world_class() {
    let mut assembler =
        ClassAssembler::new(ACC_PUBLIC | ACC_SUPER, "HelloWorld", Some("java/lang/Object"));
    assembler.method(ACC_PUBLIC, "<init>", "()V", &[op::RETURN]);
    assembler.method(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        &[op::RETURN],
    );

    let class = jvm::class_file::ClassFile::parse(&assembler.bytes()).unwrap();
    assert_eq!(
        class.access_flags,
        jvm::ClassAccessFlags::PUBLIC | jvm::ClassAccessFlags::SUPER,
    );
    assert_eq!(class.this_class.as_str(), "HelloWorld");
    assert_eq!(
        class.super_class.as_ref().map(|name| name.as_str()),
        Some("java/lang/Object"),
    );
    assert!(class.interfaces.is_empty());
    assert!(class.fields.is_empty());
    let method_names: Vec<&str> = class
        .methods
        .iter()
        .map(|method| method.name.as_str())
        .collect();
    assert_eq!(method_names, vec!["<init>", "main"]);
}

#[test]
fn translates_a_constructor() {
    let mut assembler =
        ClassAssembler::new(ACC_PUBLIC | ACC_SUPER, "demo/Hello", Some("java/lang/Object"));
    let init = assembler.pool.name_and_type("<init>", "()V");
    let super_class = assembler.super_class;
    let super_ctor = assembler.pool.method_ref(super_class, init);
    assembler.method(
        ACC_PUBLIC,
        "<init>",
        "()V",
        &[
            op::ALOAD_0,
            op::INVOKESPECIAL,
            (super_ctor >> 8) as u8,
            super_ctor as u8,
            op::RETURN,
        ],
    );

    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let (module, diagnostics) = translate_batch(&graph, &[assembler.bytes()]);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    let hello = find_type(&module, "Hello");
    assert_eq!(hello.namespace, "Demo");
    assert!(hello.is_definition);

    let object = hello.superclass.get().unwrap();
    assert_eq!(object.namespace, "Java.Lang");
    assert!(!object.is_definition);

    let ctor = find_method(hello, ".ctor");
    let object_ctor = find_method(object, ".ctor");
    assert_eq!(
        body_of(ctor),
        vec![
            Instruction::LoadArg(0),
            Instruction::Call(object_ctor),
            Instruction::Ret,
        ],
    );
}

#[test]
fn forward_references_resolve_within_a_batch() {
    let base = ClassAssembler::new(ACC_PUBLIC | ACC_SUPER, "demo/Base", Some("java/lang/Object"));
    let derived = ClassAssembler::new(ACC_PUBLIC | ACC_SUPER, "demo/Derived", Some("demo/Base"));

    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);

    // Derived is declared first, so its super is a forward reference at wire time
    let (module, diagnostics) = translate_batch(&graph, &[derived.bytes(), base.bytes()]);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    let derived = find_type(&module, "Derived");
    let base = derived.superclass.get().unwrap();
    assert_eq!(base.name, "Base");
    assert!(base.is_definition);
}

#[test]
fn types_outside_the_batch_become_reference_shells() {
    let class = ClassAssembler::new(
        ACC_PUBLIC | ACC_SUPER,
        "demo/Numbers",
        Some("java/util/ArrayList"),
    );

    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let (module, diagnostics) = translate_batch(&graph, &[class.bytes()]);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    let list = find_type(&module, "ArrayList");
    assert_eq!(list.namespace, "Java.Util");
    assert!(!list.is_definition);
}

#[test]
fn an_unsupported_method_fails_without_taking_its_class_down() {
    let mut assembler =
        ClassAssembler::new(ACC_PUBLIC | ACC_SUPER, "demo/Mixed", Some("java/lang/Object"));
    assembler.method(
        ACC_PUBLIC | ACC_STATIC,
        "fine",
        "()I",
        &[op::ICONST_3, op::IRETURN],
    );
    assembler.method(
        ACC_PUBLIC | ACC_STATIC,
        "uses_swap",
        "()V",
        &[op::ICONST_0, op::ICONST_1, op::SWAP, op::POP, op::POP, op::RETURN],
    );

    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let (module, diagnostics) = translate_batch(&graph, &[assembler.bytes()]);

    assert_eq!(diagnostics.len(), 1);
    let diagnostic = diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.class, "demo/Mixed");
    assert_eq!(diagnostic.method.as_deref(), Some("uses_swap:()V"));

    let mixed = find_type(&module, "Mixed");
    assert_eq!(
        body_of(find_method(mixed, "fine")),
        vec![Instruction::PushInt(3), Instruction::Ret],
    );
    // The failing method keeps its slot, with a stubbed-out body
    assert_eq!(body_of(find_method(mixed, "uses_swap")), vec![Instruction::Ret]);
}

#[test]
fn wide_parameters_shift_argument_indices() {
    let mut assembler =
        ClassAssembler::new(ACC_PUBLIC | ACC_SUPER, "demo/Wide", Some("java/lang/Object"));
    // The second parameter occupies slot 2, past the two-slot long
    assembler.method(
        ACC_PUBLIC | ACC_STATIC,
        "second",
        "(JI)I",
        &[op::ILOAD_2, op::IRETURN],
    );

    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let (module, diagnostics) = translate_batch(&graph, &[assembler.bytes()]);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    let wide = find_type(&module, "Wide");
    assert_eq!(
        body_of(find_method(wide, "second")),
        vec![Instruction::LoadArg(1), Instruction::Ret],
    );
}

#[test]
fn duplicate_classes_are_skipped() {
    let first = ClassAssembler::new(ACC_PUBLIC | ACC_SUPER, "demo/Twin", Some("java/lang/Object"));
    let second = ClassAssembler::new(ACC_PUBLIC | ACC_SUPER, "demo/Twin", Some("java/lang/Object"));

    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let (module, diagnostics) = translate_batch(&graph, &[first.bytes(), second.bytes()]);

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics.iter().next().unwrap().class, "demo/Twin");
    assert_eq!(
        module.types.iter().filter(|typ| typ.name == "Twin").count(),
        1,
    );
}

#[test]
fn include_rejects_non_class_input() {
    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let mut translator = ModuleTranslator::new(Settings::new("test"), &graph);
    assert!(matches!(
        translator.include(&[0xde, 0xad, 0xbe, 0xef]),
        Err(jvm::Error::MalformedClassFile(_))
    ));
}

#[test]
fn image_starts_with_the_magic_number() {
    let class =
        ClassAssembler::new(ACC_PUBLIC | ACC_SUPER, "demo/Empty", Some("java/lang/Object"));

    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let (module, diagnostics) = translate_batch(&graph, &[class.bytes()]);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    let mut image = vec![];
    module.serialize(&mut image).unwrap();
    assert_eq!(&image[..4], b"CILM");
}
