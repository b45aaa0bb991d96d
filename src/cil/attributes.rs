use bitflags::bitflags;

bitflags! {
    /// Attributes on an emitted type
    ///
    /// Values follow the ECMA-335 `TypeAttributes` encoding. Visibility is a small enum packed
    /// into the low bits, so `PUBLIC` is a value rather than a single flag bit.
    pub struct TypeAttributes: u32 {
        const PUBLIC = 0x0000_0001;
        const INTERFACE = 0x0000_0020;
        const ABSTRACT = 0x0000_0080;
        const SEALED = 0x0000_0100;
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

bitflags! {
    /// Attributes on an emitted field (ECMA-335 `FieldAttributes` encoding)
    pub struct FieldAttributes: u16 {
        const PRIVATE = 0x0001;
        const ASSEMBLY = 0x0003;
        const FAMILY = 0x0004;
        const PUBLIC = 0x0006;
        const STATIC = 0x0010;
        const INIT_ONLY = 0x0020;
    }
}

bitflags! {
    /// Attributes on an emitted method (ECMA-335 `MethodAttributes` encoding)
    ///
    /// Constructors (`.ctor`/`.cctor`) carry `SPECIAL_NAME | RT_SPECIAL_NAME` and are never
    /// virtual.
    pub struct MethodAttributes: u16 {
        const PRIVATE = 0x0001;
        const ASSEMBLY = 0x0003;
        const FAMILY = 0x0004;
        const PUBLIC = 0x0006;
        const STATIC = 0x0010;
        const FINAL = 0x0020;
        const VIRTUAL = 0x0040;
        const HIDE_BY_SIG = 0x0080;
        const ABSTRACT = 0x0400;
        const SPECIAL_NAME = 0x0800;
        const RT_SPECIAL_NAME = 0x1000;
    }
}
