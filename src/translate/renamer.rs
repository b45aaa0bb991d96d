use crate::jvm::{BinaryName, UnqualifiedName};

/// Maps source names onto names in the output module
pub trait Renamer {
    /// Split and rename a class name into a namespace (possibly empty) and a simple name
    fn rename_type(&self, name: &BinaryName) -> (String, String);

    /// Rename a method (initializers get runtime-special names)
    fn rename_method(&self, name: &UnqualifiedName) -> String;

    /// Rename a field
    fn rename_field(&self, name: &UnqualifiedName) -> String;
}

/// Renames into the target runtime's conventions
///
/// Package segments become a dot-separated namespace with each segment capitalized
/// (`java/lang/Object` becomes `Java.Lang` + `Object`). A class with no package gets an empty
/// namespace. `<init>` and `<clinit>` become `.ctor` and `.cctor`; everything else keeps its
/// name.
pub struct ClrRenamer;

impl ClrRenamer {
    fn capitalize(segment: &str) -> String {
        let mut chars = segment.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => first.to_uppercase().chain(chars).collect(),
        }
    }
}

impl Renamer for ClrRenamer {
    fn rename_type(&self, name: &BinaryName) -> (String, String) {
        let mut segments: Vec<String> = name.segments().map(Self::capitalize).collect();
        let simple = segments.pop().unwrap_or_default();
        (segments.join("."), simple)
    }

    fn rename_method(&self, name: &UnqualifiedName) -> String {
        if *name == UnqualifiedName::INIT {
            String::from(".ctor")
        } else if *name == UnqualifiedName::CLINIT {
            String::from(".cctor")
        } else {
            String::from(name.as_str())
        }
    }

    fn rename_field(&self, name: &UnqualifiedName) -> String {
        String::from(name.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn binary_name(name: &str) -> BinaryName {
        BinaryName::from_string(String::from(name)).unwrap()
    }

    #[test]
    fn packages_become_capitalized_namespaces() {
        let renamer = ClrRenamer;
        assert_eq!(
            renamer.rename_type(&binary_name("java/lang/Object")),
            (String::from("Java.Lang"), String::from("Object"))
        );
        assert_eq!(
            renamer.rename_type(&binary_name("com/example/fooBar")),
            (String::from("Com.Example"), String::from("FooBar"))
        );
    }

    #[test]
    fn packageless_classes_get_an_empty_namespace() {
        let renamer = ClrRenamer;
        assert_eq!(
            renamer.rename_type(&binary_name("Main")),
            (String::new(), String::from("Main"))
        );
    }

    #[test]
    fn initializers_get_runtime_special_names() {
        let renamer = ClrRenamer;
        assert_eq!(renamer.rename_method(&UnqualifiedName::INIT), ".ctor");
        assert_eq!(renamer.rename_method(&UnqualifiedName::CLINIT), ".cctor");
        assert_eq!(
            renamer.rename_method(
                &UnqualifiedName::from_string(String::from("toString")).unwrap()
            ),
            "toString"
        );
    }
}
