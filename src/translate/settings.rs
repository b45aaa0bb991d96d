use super::{ClrRenamer, Renamer};

pub struct Settings {
    /// Name of the output module
    pub module_name: String,

    /// Prefix for synthesized parameter names (eg. `obj` gives `obj0`, `obj1`, ...)
    ///
    /// Used when a method carries no `MethodParameters` attribute.
    pub parameter_name_prefix: String,

    /// Renaming strategy for types and members
    pub renamer: Box<dyn Renamer>,
}

impl Settings {
    pub fn new(module_name: impl Into<String>) -> Settings {
        Settings {
            module_name: module_name.into(),
            parameter_name_prefix: String::from("obj"),
            renamer: Box::new(ClrRenamer),
        }
    }
}
