use crate::error::ShadowError;
use crate::value::Value;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Name used for constructor signatures.
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Name and parameter types of a platform method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    name: &'static str,
    params: &'static [&'static str],
}

impl MethodSignature {
    /// Signature carried by constructor invocations.
    pub const CONSTRUCTOR: MethodSignature = MethodSignature::constructor(&[]);

    pub const fn new(name: &'static str, params: &'static [&'static str]) -> Self {
        Self { name, params }
    }

    pub const fn constructor(params: &'static [&'static str]) -> Self {
        Self { name: CONSTRUCTOR_NAME, params }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn params(&self) -> &'static [&'static str] {
        self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }
}

impl Display for MethodSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(","))
    }
}

/// Static field exposed for reflective access by declaring class.
#[derive(Debug)]
pub struct StaticField {
    pub name: &'static str,
    pub get: fn() -> Value,
    pub set: Option<fn(Value) -> Result<(), ShadowError>>,
}

/// Immutable metadata describing a platform class.
///
/// Instances are `static` items; identity is the fully qualified name. The
/// superclass link forms the chain that shadow resolution and reflective
/// lookups walk.
#[derive(Debug)]
pub struct ClassInfo {
    name: &'static str,
    superclass: Option<&'static ClassInfo>,
    methods: &'static [MethodSignature],
    fields: &'static [&'static str],
    static_fields: &'static [StaticField],
}

impl ClassInfo {
    pub const fn new(name: &'static str) -> Self {
        Self { name, superclass: None, methods: &[], fields: &[], static_fields: &[] }
    }

    pub const fn extends(self, superclass: &'static ClassInfo) -> Self {
        Self {
            name: self.name,
            superclass: Some(superclass),
            methods: self.methods,
            fields: self.fields,
            static_fields: self.static_fields,
        }
    }

    pub const fn with_methods(self, methods: &'static [MethodSignature]) -> Self {
        Self {
            name: self.name,
            superclass: self.superclass,
            methods,
            fields: self.fields,
            static_fields: self.static_fields,
        }
    }

    pub const fn with_fields(self, fields: &'static [&'static str]) -> Self {
        Self {
            name: self.name,
            superclass: self.superclass,
            methods: self.methods,
            fields,
            static_fields: self.static_fields,
        }
    }

    pub const fn with_static_fields(self, static_fields: &'static [StaticField]) -> Self {
        Self {
            name: self.name,
            superclass: self.superclass,
            methods: self.methods,
            fields: self.fields,
            static_fields,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn superclass(&self) -> Option<&'static ClassInfo> {
        self.superclass
    }

    pub fn declared_methods(&self) -> &'static [MethodSignature] {
        self.methods
    }

    pub fn declared_fields(&self) -> &'static [&'static str] {
        self.fields
    }

    /// This class followed by its superclasses, nearest first.
    pub fn ancestry(&'static self) -> impl Iterator<Item = &'static ClassInfo> {
        std::iter::successors(Some(self), |class| class.superclass)
    }

    pub fn is_subclass_of(&'static self, other: &ClassInfo) -> bool {
        self.ancestry().any(|class| class == other)
    }

    /// Returns the class in the chain that declares `signature`.
    pub fn declaring_class(&'static self, signature: &MethodSignature) -> Option<&'static ClassInfo> {
        self.ancestry().find(|class| class.methods.contains(signature))
    }

    pub fn find_method(&'static self, name: &str, arity: usize) -> Option<&'static MethodSignature> {
        self.ancestry()
            .flat_map(|class| class.methods.iter())
            .find(|signature| signature.name == name && signature.arity() == arity)
    }

    pub fn field_owner(&'static self, field: &str) -> Option<&'static ClassInfo> {
        self.ancestry().find(|class| class.fields.contains(&field))
    }

    pub fn find_static_field(&'static self, name: &str) -> Option<&'static StaticField> {
        self.ancestry()
            .flat_map(|class| class.static_fields.iter())
            .find(|field| field.name == name)
    }
}

impl PartialEq for ClassInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ClassInfo {}

impl Hash for ClassInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Display for ClassInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicI64, Ordering};

    const DRAW: MethodSignature = MethodSignature::new("draw", &["Canvas"]);
    const SET_TEXT: MethodSignature = MethodSignature::new("setText", &["String"]);

    static COUNTER: AtomicI64 = AtomicI64::new(3);

    fn read_counter() -> Value {
        Value::Int(COUNTER.load(Ordering::SeqCst))
    }

    static BASE: ClassInfo = ClassInfo::new("test.Base")
        .with_methods(&[DRAW])
        .with_fields(&["mFlags"])
        .with_static_fields(&[StaticField { name: "sCount", get: read_counter, set: None }]);
    static DERIVED: ClassInfo =
        ClassInfo::new("test.Derived").extends(&BASE).with_methods(&[SET_TEXT]);

    #[rstest]
    fn ancestry_walks_nearest_first() {
        let names: Vec<_> = DERIVED.ancestry().map(ClassInfo::name).collect();
        assert_eq!(names, vec!["test.Derived", "test.Base"]);
        assert!(DERIVED.is_subclass_of(&BASE));
        assert!(!BASE.is_subclass_of(&DERIVED));
    }

    #[rstest]
    fn inherited_members_resolve_to_declaring_class() {
        assert_eq!(DERIVED.declaring_class(&DRAW).map(ClassInfo::name), Some("test.Base"));
        assert_eq!(DERIVED.find_method("setText", 1), Some(&SET_TEXT));
        assert!(DERIVED.find_method("setText", 2).is_none());
        assert_eq!(DERIVED.field_owner("mFlags").map(ClassInfo::name), Some("test.Base"));
        let field = DERIVED.find_static_field("sCount").expect("static field");
        assert_eq!((field.get)(), Value::Int(3));
    }

    #[rstest]
    fn signature_display_lists_parameters() {
        assert_eq!(DRAW.to_string(), "draw(Canvas)");
        assert_eq!(MethodSignature::constructor(&[]).to_string(), "<init>()");
        assert!(MethodSignature::constructor(&["int"]).is_constructor());
    }
}
