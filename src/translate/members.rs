use super::{Error, Renamer};
use crate::cil::graph::{FieldData, MethodData, TypeData, TypeGraph};
use crate::cil::TypeAttributes;
use crate::jvm::{BinaryName, RenderDescriptor, UnqualifiedName};
use crate::util::RefId;
use std::cell::Cell;
use std::collections::HashSet;

use elsa::FrozenVec;

/// Finds members through the inheritance graph
///
/// Also the single place where types outside the batch enter the graph: any class name the batch
/// refers to but does not define gets a reference shell on first use, so signatures can always
/// be wired. Members of reference shells are unknown, so member lookup on them fails with
/// [`Error::MemberNotFound`] rather than guessing.
pub struct MemberResolver<'a, 'g> {
    graph: &'g TypeGraph<'g>,
    renamer: &'a dyn Renamer,
}

impl<'a, 'g> MemberResolver<'a, 'g> {
    pub fn new(graph: &'g TypeGraph<'g>, renamer: &'a dyn Renamer) -> MemberResolver<'a, 'g> {
        MemberResolver { graph, renamer }
    }

    /// Look up a type, declaring a reference shell if the batch doesn't define it
    pub fn reference_type(&self, name: &BinaryName) -> &'g TypeData<'g> {
        if let Some(typ) = self.graph.lookup_type(name) {
            return typ;
        }
        let (namespace, simple_name) = self.renamer.rename_type(name);
        self.graph.add_type(TypeData {
            source_name: name.clone(),
            namespace,
            name: simple_name,
            attributes: TypeAttributes::PUBLIC,
            is_definition: false,
            superclass: Cell::new(None),
            interfaces: FrozenVec::new(),
            methods: FrozenVec::new(),
            fields: FrozenVec::new(),
        })
    }

    /// Resolve the owner of a member reference
    ///
    /// Member references against array classes are the caller's problem (only the `clone`
    /// pass-through is meaningful there); any other unrepresentable owner is a missing class.
    pub fn reference_class(&self, name: &str) -> Result<&'g TypeData<'g>, Error> {
        match BinaryName::from_string(String::from(name)) {
            Ok(name) => Ok(self.reference_type(&name)),
            Err(_) => Err(Error::MissingClass(String::from(name))),
        }
    }

    /// Find a method by source name and descriptor
    ///
    /// Search order: the owner itself, then its superclass chain, then a depth-first walk of
    /// interfaces. First exact name + descriptor match wins.
    pub fn resolve_method(
        &self,
        owner: &'g TypeData<'g>,
        name: &UnqualifiedName,
        descriptor: &str,
    ) -> Result<&'g MethodData<'g>, Error> {
        let direct = |typ: &'g TypeData<'g>| -> Option<&'g MethodData<'g>> {
            (0..typ.methods.len()).map(|i| &typ.methods[i]).find(|m| {
                m.source_name == *name && m.descriptor.render() == descriptor
            })
        };

        let mut superclasses = Some(owner);
        while let Some(typ) = superclasses {
            if let Some(found) = direct(typ) {
                return Ok(found);
            }
            superclasses = typ.superclass.get();
        }

        // Interfaces of the whole superclass chain, depth first
        let mut visited: HashSet<RefId<'g, TypeData<'g>>> = HashSet::new();
        let mut to_visit: Vec<&'g TypeData<'g>> = vec![];
        let mut superclasses = Some(owner);
        while let Some(typ) = superclasses {
            for i in (0..typ.interfaces.len()).rev() {
                to_visit.push(&typ.interfaces[i]);
            }
            superclasses = typ.superclass.get();
        }
        while let Some(interface) = to_visit.pop() {
            if !visited.insert(RefId(interface)) {
                continue;
            }
            if let Some(found) = direct(interface) {
                return Ok(found);
            }
            for i in (0..interface.interfaces.len()).rev() {
                to_visit.push(&interface.interfaces[i]);
            }
        }

        Err(Error::MemberNotFound {
            owner: String::from(owner.source_name.as_str()),
            name: String::from(name.as_str()),
            descriptor: String::from(descriptor),
        })
    }

    /// Find a field by source name and descriptor, using the same search order as methods
    pub fn resolve_field(
        &self,
        owner: &'g TypeData<'g>,
        name: &UnqualifiedName,
        descriptor: &str,
    ) -> Result<&'g FieldData<'g>, Error> {
        let direct = |typ: &'g TypeData<'g>| -> Option<&'g FieldData<'g>> {
            (0..typ.fields.len()).map(|i| &typ.fields[i]).find(|f| {
                f.source_name == *name && f.descriptor.render() == descriptor
            })
        };

        let mut superclasses = Some(owner);
        while let Some(typ) = superclasses {
            if let Some(found) = direct(typ) {
                return Ok(found);
            }
            superclasses = typ.superclass.get();
        }

        let mut visited: HashSet<RefId<'g, TypeData<'g>>> = HashSet::new();
        let mut to_visit: Vec<&'g TypeData<'g>> = vec![owner];
        while let Some(typ) = to_visit.pop() {
            if !visited.insert(RefId(typ)) {
                continue;
            }
            if let Some(found) = direct(typ) {
                return Ok(found);
            }
            for i in (0..typ.interfaces.len()).rev() {
                to_visit.push(&typ.interfaces[i]);
            }
        }

        Err(Error::MemberNotFound {
            owner: String::from(owner.source_name.as_str()),
            name: String::from(name.as_str()),
            descriptor: String::from(descriptor),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cil::graph::{MethodData, TypeGraphArenas};
    use crate::cil::MethodAttributes;
    use crate::jvm::MethodDescriptor;
    use crate::translate::ClrRenamer;
    use std::cell::RefCell;

    fn binary_name(name: &str) -> BinaryName {
        BinaryName::from_string(String::from(name)).unwrap()
    }

    fn unqualified(name: &str) -> UnqualifiedName {
        UnqualifiedName::from_string(String::from(name)).unwrap()
    }

    fn add_type<'g>(
        resolver: &MemberResolver<'_, 'g>,
        name: &str,
        superclass: Option<&'g TypeData<'g>>,
    ) -> &'g TypeData<'g> {
        let typ = resolver.reference_type(&binary_name(name));
        typ.superclass.set(superclass);
        typ
    }

    fn add_method<'g>(
        graph: &'g TypeGraph<'g>,
        owner: &'g TypeData<'g>,
        name: &str,
    ) -> &'g MethodData<'g> {
        graph.add_method(MethodData {
            owner,
            name: String::from(name),
            source_name: unqualified(name),
            attributes: MethodAttributes::PUBLIC,
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
            parameter_names: vec![],
            body: RefCell::new(None),
        })
    }

    #[test]
    fn finds_members_up_the_superclass_chain() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let renamer = ClrRenamer;
        let resolver = MemberResolver::new(&graph, &renamer);

        let base = add_type(&resolver, "demo/Base", None);
        let derived = add_type(&resolver, "demo/Derived", Some(base));
        let inherited = add_method(&graph, base, "greet");

        let found = resolver
            .resolve_method(derived, &unqualified("greet"), "()V")
            .unwrap();
        assert!(std::ptr::eq(found, inherited));
    }

    #[test]
    fn searches_interfaces_depth_first() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let renamer = ClrRenamer;
        let resolver = MemberResolver::new(&graph, &renamer);

        let iface = add_type(&resolver, "demo/Named", None);
        let class = add_type(&resolver, "demo/Thing", None);
        class.interfaces.push(iface);
        let named = add_method(&graph, iface, "name");

        let found = resolver
            .resolve_method(class, &unqualified("name"), "()V")
            .unwrap();
        assert!(std::ptr::eq(found, named));
    }

    #[test]
    fn exhausted_search_reports_member_not_found() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let renamer = ClrRenamer;
        let resolver = MemberResolver::new(&graph, &renamer);

        let class = add_type(&resolver, "demo/Thing", None);
        let err = resolver
            .resolve_method(class, &unqualified("missing"), "()V")
            .unwrap_err();
        assert!(matches!(err, Error::MemberNotFound { .. }));
    }

    #[test]
    fn array_owners_are_missing_classes() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let renamer = ClrRenamer;
        let resolver = MemberResolver::new(&graph, &renamer);

        assert!(matches!(
            resolver.reference_class("[I"),
            Err(Error::MissingClass(_))
        ));
    }
}
