//! Small platform classes and shadows for this crate's unit tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use umbra_core::{
    ClassInfo, MethodSignature, ObjectHeader, PlatformClass, RealObject, Reflect, Shadow, ShadowClass, ShadowError,
    StaticField, Value, arg, register_shadow,
};

pub const GET_LABEL: MethodSignature = MethodSignature::new("getLabel", &[]);
pub const SET_LABEL: MethodSignature = MethodSignature::new("setLabel", &["String"]);
pub const AREA: MethodSignature = MethodSignature::new("area", &["int"]);
pub const UNDECLARED: MethodSignature = MethodSignature::new("undeclared", &[]);

static INSTANCES: AtomicI64 = AtomicI64::new(0);

fn read_instances() -> Value {
    Value::Int(INSTANCES.load(Ordering::SeqCst))
}

fn write_instances(value: Value) -> Result<(), ShadowError> {
    INSTANCES.store(value.as_int()?, Ordering::SeqCst);
    Ok(())
}

pub static BASE: ClassInfo = ClassInfo::new("test.Base")
    .with_methods(&[GET_LABEL, SET_LABEL])
    .with_fields(&["mLabel", "mConstructed"])
    .with_static_fields(&[
        StaticField { name: "sInstances", get: read_instances, set: Some(write_instances) },
        StaticField { name: "sKind", get: kind, set: None },
    ]);
pub static DERIVED: ClassInfo = ClassInfo::new("test.Derived").extends(&BASE).with_methods(&[AREA]);
pub static BOOTSTRAPPED: ClassInfo = ClassInfo::new("test.Bootstrapped").with_methods(&[GET_LABEL]);

fn kind() -> Value {
    Value::from("base")
}

#[derive(Default)]
pub struct Base {
    header: ObjectHeader,
    label: Mutex<String>,
    constructed: AtomicI64,
}

impl Base {
    pub fn get_label(self: &Arc<Self>) -> Result<String, ShadowError> {
        self.dispatch(&GET_LABEL, Vec::new(), |this, _| Ok(Value::from(this.label.lock().unwrap().clone())))?
            .try_into()
    }

    pub fn set_label(self: &Arc<Self>, label: &str) -> Result<(), ShadowError> {
        self.dispatch(&SET_LABEL, vec![Value::from(label)], |this, args| {
            *this.label.lock().unwrap() = arg(args, 0)?.as_str()?.to_owned();
            Ok(Value::Unit)
        })?
        .into_unit()
    }

    pub fn undeclared(self: &Arc<Self>) -> Result<Value, ShadowError> {
        self.dispatch(&UNDECLARED, Vec::new(), |_, _| Ok(Value::Unit))
    }

    pub fn constructed(&self) -> i64 {
        self.constructed.load(Ordering::SeqCst)
    }
}

impl Reflect for Base {
    fn class(&self) -> &'static ClassInfo {
        &BASE
    }

    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn read_field(&self, name: &str) -> Option<Value> {
        match name {
            "mLabel" => Some(Value::from(self.label.lock().unwrap().clone())),
            "mConstructed" => Some(Value::Int(self.constructed())),
            _ => None,
        }
    }

    fn write_field(&self, name: &str, value: Value) -> Option<Result<(), ShadowError>> {
        match name {
            "mLabel" => Some(value.as_str().map(|label| *self.label.lock().unwrap() = label.to_owned())),
            _ => None,
        }
    }

    fn invoke_declared(
        self: Arc<Self>,
        signature: &'static MethodSignature,
        args: &[Value],
    ) -> Option<Result<Value, ShadowError>> {
        match signature.name() {
            "getLabel" => Some(self.get_label().map(Value::from)),
            "setLabel" => Some(arg(args, 0).and_then(Value::as_str).and_then(|label| self.set_label(label)).map(Value::from)),
            _ => None,
        }
    }
}

impl PlatformClass for Base {
    fn class_info() -> &'static ClassInfo {
        &BASE
    }

    fn construct(self: &Arc<Self>, args: &[Value]) -> Result<(), ShadowError> {
        self.constructed.fetch_add(1, Ordering::SeqCst);
        if let Some(label) = args.first() {
            *self.label.lock().unwrap() = label.as_str()?.to_owned();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct Derived {
    header: ObjectHeader,
    side: AtomicI64,
}

impl Derived {
    pub fn area(self: &Arc<Self>, scale: i64) -> Result<i64, ShadowError> {
        self.dispatch(&AREA, vec![Value::Int(scale)], |this, args| {
            let side = this.side.load(Ordering::SeqCst);
            Ok(Value::Int(side * side * arg(args, 0)?.as_int()?))
        })?
        .try_into()
    }
}

impl Reflect for Derived {
    fn class(&self) -> &'static ClassInfo {
        &DERIVED
    }

    fn header(&self) -> &ObjectHeader {
        &self.header
    }
}

impl PlatformClass for Derived {
    fn class_info() -> &'static ClassInfo {
        &DERIVED
    }

    fn construct(self: &Arc<Self>, _args: &[Value]) -> Result<(), ShadowError> {
        self.side.store(3, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct Bootstrapped {
    header: ObjectHeader,
}

impl Bootstrapped {
    pub fn get_label(self: &Arc<Self>) -> Result<String, ShadowError> {
        self.dispatch(&GET_LABEL, Vec::new(), |_, _| Ok(Value::from("real")))?.try_into()
    }
}

impl Reflect for Bootstrapped {
    fn class(&self) -> &'static ClassInfo {
        &BOOTSTRAPPED
    }

    fn header(&self) -> &ObjectHeader {
        &self.header
    }
}

impl PlatformClass for Bootstrapped {
    fn class_info() -> &'static ClassInfo {
        &BOOTSTRAPPED
    }
}

#[derive(Debug)]
pub struct ShadowBase {
    pub real: RealObject,
    pub calls: Mutex<Vec<&'static str>>,
}

impl Shadow for ShadowBase {
    fn create(real: RealObject) -> Self {
        Self { real, calls: Mutex::new(Vec::new()) }
    }
}

impl ShadowBase {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

/// Prefixes labels with `shadow:` and records its constructor.
pub fn base_shadow(name: &'static str) -> ShadowClass {
    ShadowClass::builder::<ShadowBase>(name, &BASE)
        .constructor(|shadow, call| {
            shadow.calls.lock().unwrap().push("<init>");
            let bound_before_body = shadow.real.downcast::<Base>().is_none_or(|base| base.constructed() == 0);
            assert!(bound_before_body);
            call.call_real_with_original_args().map(drop)
        })
        .method(GET_LABEL, |shadow, call| {
            shadow.calls.lock().unwrap().push("getLabel");
            let real = call.call_real(&[])?;
            Ok(Value::from(format!("shadow:{}", real.as_str()?)))
        })
        .build()
}

#[derive(Debug)]
pub struct ShadowDerived;

impl Shadow for ShadowDerived {
    fn create(_real: RealObject) -> Self {
        ShadowDerived
    }
}

/// Doubles the scale before delegating to the real `area`.
pub fn derived_shadow() -> ShadowClass {
    ShadowClass::builder::<ShadowDerived>("DerivedShadow", &DERIVED)
        .method(AREA, |_, call| {
            let scale: i64 = call.arg_as(0)?;
            call.call_real(&[Value::Int(scale * 2)])
        })
        .build()
}

#[derive(Debug)]
pub struct ShadowBootstrapped;

impl Shadow for ShadowBootstrapped {
    fn create(_real: RealObject) -> Self {
        ShadowBootstrapped
    }
}

fn bootstrap_shadow() -> ShadowClass {
    ShadowClass::builder::<ShadowBootstrapped>("BootstrapShadow", &BOOTSTRAPPED)
        .method(GET_LABEL, |_, _| Ok(Value::from("bootstrap")))
        .build()
}

register_shadow!(bootstrap_shadow);
