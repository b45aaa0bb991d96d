use super::{BinaryName, Error};
use crate::util::Width;
use std::iter::Peekable;
use std::str::Chars;

/// Render a structured type back into its descriptor string
///
/// The renderer is what member resolution keys on: two members match when their rendered
/// descriptors match.
pub trait RenderDescriptor {
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    fn render_to(&self, write_to: &mut String);
}

/// Parse a descriptor with a single left-to-right scan, no backtracking
pub trait ParseDescriptor: Sized {
    fn parse(source: &str) -> Result<Self, Error> {
        let mut chars = source.chars().peekable();
        let ret = Self::parse_from(&mut chars)?;
        match chars.next() {
            None => Ok(ret),
            Some(c) => Err(Error::MalformedDescriptor(format!(
                "unexpected leftover input '{}' in '{}'",
                c, source
            ))),
        }
    }

    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error>;
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

/// `long` and `double` occupy two frame slots; everything else occupies one
impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Double | BaseType::Long => 2,
            _ => 1,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        let c = match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        };
        write_to.push(c);
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        let typ = match source.next() {
            Some('B') => BaseType::Byte,
            Some('C') => BaseType::Char,
            Some('D') => BaseType::Double,
            Some('F') => BaseType::Float,
            Some('I') => BaseType::Int,
            Some('J') => BaseType::Long,
            Some('S') => BaseType::Short,
            Some('Z') => BaseType::Boolean,
            Some(c) => {
                return Err(Error::MalformedDescriptor(format!(
                    "invalid base type character '{}'",
                    c
                )))
            }
            None => {
                return Err(Error::MalformedDescriptor(String::from(
                    "missing base type character",
                )))
            }
        };
        Ok(typ)
    }
}

/// Reference type, generic in how classes are represented
///
/// While decoding, `Class` is a [`BinaryName`]; once the type graph is built it becomes a
/// graph id so the same structure flows through the whole pipeline.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType<Class> {
    Object(Class),
    ObjectArray(ArrayType<Class>),
    PrimitiveArray(ArrayType<BaseType>),
}

/// Array type: a run of `[` dimensions over an element type
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType<T> {
    /// Dimensions beyond the first (`A[]` has 0, `A[][][]` has 2)
    pub additional_dimensions: usize,

    /// Underlying element type
    pub element_type: T,
}

impl<T> ArrayType<T> {
    pub fn map<T2>(&self, map_element: impl FnOnce(&T) -> T2) -> ArrayType<T2> {
        ArrayType {
            additional_dimensions: self.additional_dimensions,
            element_type: map_element(&self.element_type),
        }
    }
}

impl<T: RenderDescriptor> RenderDescriptor for ArrayType<T> {
    fn render_to(&self, write_to: &mut String) {
        for _ in 0..=self.additional_dimensions {
            write_to.push('[');
        }
        self.element_type.render_to(write_to);
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        write_to.push_str(self.as_str());
        write_to.push(';');
    }
}

impl ParseDescriptor for BinaryName {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        match source.next() {
            Some('L') => {
                let mut class_name = String::new();
                loop {
                    match source.next() {
                        None => {
                            return Err(Error::MalformedDescriptor(format!(
                                "missing terminator for 'L{}'",
                                class_name
                            )))
                        }
                        Some(';') => return BinaryName::from_string(class_name),
                        Some(c) => class_name.push(c),
                    }
                }
            }
            _ => Err(Error::MalformedDescriptor(String::from(
                "expected object type to start with 'L'",
            ))),
        }
    }
}

impl<C: RenderDescriptor> RenderDescriptor for RefType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            RefType::Object(cls) => cls.render_to(write_to),
            RefType::ObjectArray(arr) => arr.render_to(write_to),
            RefType::PrimitiveArray(arr) => arr.render_to(write_to),
        }
    }
}

impl<C: ParseDescriptor> ParseDescriptor for RefType<C> {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        match source.peek().copied() {
            Some('L') => Ok(RefType::Object(C::parse_from(source)?)),
            Some('[') => {
                let mut additional_dimensions = 0;
                source.next();
                while source.next_if_eq(&'[').is_some() {
                    additional_dimensions += 1;
                }
                if let Some('L') = source.peek().copied() {
                    Ok(RefType::ObjectArray(ArrayType {
                        additional_dimensions,
                        element_type: C::parse_from(source)?,
                    }))
                } else {
                    Ok(RefType::PrimitiveArray(ArrayType {
                        additional_dimensions,
                        element_type: BaseType::parse_from(source)?,
                    }))
                }
            }
            Some(c) => Err(Error::MalformedDescriptor(format!(
                "invalid reference type character '{}'",
                c
            ))),
            None => Err(Error::MalformedDescriptor(String::from(
                "missing reference type",
            ))),
        }
    }
}

impl<C> RefType<C> {
    pub fn map<C2>(&self, map_class: impl FnOnce(&C) -> C2) -> RefType<C2> {
        match self {
            RefType::Object(cls) => RefType::Object(map_class(cls)),
            RefType::ObjectArray(arr) => RefType::ObjectArray(arr.map(map_class)),
            RefType::PrimitiveArray(arr) => RefType::PrimitiveArray(*arr),
        }
    }
}

/// Type of a field, parameter, return value, or local variable
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType<Class> {
    Base(BaseType),
    Ref(RefType<Class>),
}

impl<C> Width for FieldType<C> {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Ref(_) => 1,
        }
    }
}

impl<C> FieldType<C> {
    pub const fn object(class: C) -> FieldType<C> {
        FieldType::Ref(RefType::Object(class))
    }

    pub const fn int() -> FieldType<C> {
        FieldType::Base(BaseType::Int)
    }

    pub const fn long() -> FieldType<C> {
        FieldType::Base(BaseType::Long)
    }

    pub const fn float() -> FieldType<C> {
        FieldType::Base(BaseType::Float)
    }

    pub const fn double() -> FieldType<C> {
        FieldType::Base(BaseType::Double)
    }

    pub fn map<C2>(&self, map_class: impl FnOnce(&C) -> C2) -> FieldType<C2> {
        match self {
            FieldType::Base(base_type) => FieldType::Base(*base_type),
            FieldType::Ref(ref_type) => FieldType::Ref(ref_type.map(map_class)),
        }
    }
}

impl<C: RenderDescriptor> RenderDescriptor for FieldType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Ref(reference_type) => reference_type.render_to(write_to),
        }
    }
}

impl<C: ParseDescriptor> ParseDescriptor for FieldType<C> {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        match source.peek().copied() {
            Some('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => {
                BaseType::parse_from(source).map(FieldType::Base)
            }
            Some('L' | '[') => RefType::parse_from(source).map(FieldType::Ref),
            Some(c) => Err(Error::MalformedDescriptor(format!(
                "invalid field type character '{}'",
                c
            ))),
            None => Err(Error::MalformedDescriptor(String::from(
                "missing field type",
            ))),
        }
    }
}

/// Signature of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor<Class> {
    pub parameters: Vec<FieldType<Class>>,

    /// `None` is `void`
    pub return_type: Option<FieldType<Class>>,
}

impl<C> MethodDescriptor<C> {
    /// Number of frame slots the parameters occupy, counting the receiver when present
    pub fn parameter_slots(&self, has_this_param: bool) -> usize {
        let receiver = if has_this_param { 1 } else { 0 };
        receiver + self.parameters.iter().map(Width::width).sum::<usize>()
    }

    pub fn map<C2>(&self, mut map_class: impl FnMut(&C) -> C2) -> MethodDescriptor<C2> {
        MethodDescriptor {
            parameters: self
                .parameters
                .iter()
                .map(|param| param.map(&mut map_class))
                .collect(),
            return_type: self.return_type.as_ref().map(|ret| ret.map(&mut map_class)),
        }
    }
}

impl<C: RenderDescriptor> RenderDescriptor for MethodDescriptor<C> {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        };
    }
}

impl<C: ParseDescriptor> ParseDescriptor for MethodDescriptor<C> {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, Error> {
        if source.next() != Some('(') {
            return Err(Error::MalformedDescriptor(String::from(
                "expected '(' to open a method descriptor",
            )));
        }

        let mut parameters = vec![];
        while source.peek().copied() != Some(')') {
            parameters.push(FieldType::<C>::parse_from(source)?);
        }
        source.next();

        let return_type = if source.peek().copied() == Some('V') {
            source.next();
            None
        } else {
            Some(FieldType::<C>::parse_from(source)?)
        };

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fmt::Debug;

    fn round_trip<T: RenderDescriptor + ParseDescriptor + Debug + Eq>(rendered: &str, parsed: T) {
        assert_eq!(rendered, parsed.render());
        assert_eq!(T::parse(rendered).unwrap(), parsed);
    }

    fn object(name: &str) -> FieldType<BinaryName> {
        FieldType::object(BinaryName::from_string(String::from(name)).unwrap())
    }

    #[test]
    fn base_types() {
        round_trip("B", BaseType::Byte);
        round_trip("C", BaseType::Char);
        round_trip("D", BaseType::Double);
        round_trip("F", BaseType::Float);
        round_trip("I", BaseType::Int);
        round_trip("J", BaseType::Long);
        round_trip("S", BaseType::Short);
        round_trip("Z", BaseType::Boolean);
    }

    #[test]
    fn field_types() {
        round_trip("I", FieldType::<BinaryName>::int());
        round_trip("Ljava/lang/Object;", object("java/lang/Object"));
        round_trip(
            "[[[D",
            FieldType::<BinaryName>::Ref(RefType::PrimitiveArray(ArrayType {
                additional_dimensions: 2,
                element_type: BaseType::Double,
            })),
        );
        round_trip(
            "[Ljava/lang/String;",
            FieldType::Ref(RefType::ObjectArray(ArrayType {
                additional_dimensions: 0,
                element_type: BinaryName::from_string(String::from("java/lang/String")).unwrap(),
            })),
        );
    }

    #[test]
    fn method_descriptors() {
        round_trip(
            "(IJLjava/lang/String;[D)V",
            MethodDescriptor {
                parameters: vec![
                    FieldType::int(),
                    FieldType::long(),
                    object("java/lang/String"),
                    FieldType::Ref(RefType::PrimitiveArray(ArrayType {
                        additional_dimensions: 0,
                        element_type: BaseType::Double,
                    })),
                ],
                return_type: None,
            },
        );
        round_trip(
            "()V",
            MethodDescriptor {
                parameters: Vec::<FieldType<BinaryName>>::new(),
                return_type: None,
            },
        );
    }

    #[test]
    fn parameter_slots_count_wide_types_twice() {
        let descriptor: MethodDescriptor<BinaryName> =
            MethodDescriptor::parse("(JI)V").unwrap();
        assert_eq!(descriptor.parameter_slots(false), 3);
        assert_eq!(descriptor.parameter_slots(true), 4);
    }

    #[test]
    fn rejects_leftover_input() {
        assert!(FieldType::<BinaryName>::parse("II").is_err());
        assert!(MethodDescriptor::<BinaryName>::parse("(I)VX").is_err());
        assert!(FieldType::<BinaryName>::parse("Ljava/lang/Missing").is_err());
    }
}
