//! Named access to private platform state.
//!
//! Every helper checks the name against the declared [`ClassInfo`] chain
//! before touching the object, so a typo in a shadow fails loudly with a
//! reflection error naming the member and the class.

use std::sync::Arc;
use tracing::trace;
use umbra_core::{ClassInfo, Reflect, ShadowError, Value};

pub fn get_field<T: Reflect + ?Sized>(object: &T, name: &str) -> Result<Value, ShadowError> {
    let class = object.class();
    declared_field(class, name)?;
    object.read_field(name).ok_or_else(|| ShadowError::missing_field(class.name(), name))
}

pub fn set_field<T: Reflect + ?Sized>(object: &T, name: &str, value: Value) -> Result<(), ShadowError> {
    let class = object.class();
    declared_field(class, name)?;
    trace!(class = class.name(), field = name, "reflective field write");
    object.write_field(name, value).unwrap_or_else(|| Err(read_only(class, name)))
}

/// Invokes the declared method `name` taking `args.len()` arguments.
///
/// The call goes through the object's own method, so interception applies.
pub fn call_method<T: Reflect + ?Sized>(object: &Arc<T>, name: &str, args: &[Value]) -> Result<Value, ShadowError> {
    let class = object.class();
    let signature =
        class.find_method(name, args.len()).ok_or_else(|| ShadowError::missing_method(class.name(), name, args.len()))?;
    Arc::clone(object)
        .invoke_declared(signature, args)
        .unwrap_or_else(|| Err(ShadowError::missing_method(class.name(), name, args.len())))
}

pub fn get_static_field(class: &'static ClassInfo, name: &str) -> Result<Value, ShadowError> {
    let field = class.find_static_field(name).ok_or_else(|| ShadowError::missing_field(class.name(), name))?;
    Ok((field.get)())
}

pub fn set_static_field(class: &'static ClassInfo, name: &str, value: Value) -> Result<(), ShadowError> {
    let field = class.find_static_field(name).ok_or_else(|| ShadowError::missing_field(class.name(), name))?;
    let set = field.set.ok_or_else(|| read_only(class, name))?;
    set(value)
}

fn declared_field(class: &'static ClassInfo, name: &str) -> Result<&'static ClassInfo, ShadowError> {
    class.field_owner(name).ok_or_else(|| ShadowError::missing_field(class.name(), name))
}

fn read_only(class: &ClassInfo, name: &str) -> ShadowError {
    ShadowError::ReadOnlyField { class: class.name().to_owned(), field: name.to_owned() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ShadowRuntime;
    use crate::settings::SandboxSettings;
    use crate::test_classes::{BASE, Base, DERIVED, base_shadow};
    use rstest::{fixture, rstest};
    use serial_test::serial;
    use umbra_core::{ApiRange, ErrorKind};

    #[fixture]
    fn runtime() -> Arc<ShadowRuntime> {
        ShadowRuntime::new(&SandboxSettings::default()).unwrap()
    }

    #[rstest]
    fn fields_read_and_write_private_state(runtime: Arc<ShadowRuntime>) {
        let base = runtime.construct::<Base>(vec![Value::from("before")]).unwrap();
        assert_eq!(get_field(&*base, "mLabel").unwrap(), Value::from("before"));
        set_field(&*base, "mLabel", Value::from("after")).unwrap();
        assert_eq!(base.get_label().unwrap(), "after");
        assert_eq!(get_field(&*base, "mConstructed").unwrap(), Value::Int(1));
    }

    #[rstest]
    #[case("mMissing")]
    #[case("label")]
    fn unknown_fields_are_reflection_errors(runtime: Arc<ShadowRuntime>, #[case] name: &str) {
        let base = runtime.construct::<Base>(Vec::new()).unwrap();
        let err = get_field(&*base, name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reflection);
        assert!(err.to_string().contains(name));
        assert!(err.to_string().contains("test.Base"));
    }

    #[rstest]
    fn declared_but_unwritable_field(runtime: Arc<ShadowRuntime>) {
        let base = runtime.construct::<Base>(Vec::new()).unwrap();
        let err = set_field(&*base, "mConstructed", Value::Int(7)).unwrap_err();
        assert!(matches!(err, ShadowError::ReadOnlyField { .. }));
    }

    #[rstest]
    fn call_method_goes_through_interception(runtime: Arc<ShadowRuntime>) {
        runtime.register(base_shadow("ShadowBase"), ApiRange::ALL).unwrap();
        let base = runtime.construct::<Base>(vec![Value::from("x")]).unwrap();
        call_method(&base, "setLabel", &[Value::from("y")]).unwrap();
        assert_eq!(call_method(&base, "getLabel", &[]).unwrap(), Value::from("shadow:y"));

        let erased: Arc<dyn Reflect> = base;
        assert_eq!(call_method(&erased, "getLabel", &[]).unwrap(), Value::from("shadow:y"));
    }

    #[rstest]
    #[case("draw", 0)]
    #[case("getLabel", 1)]
    fn unknown_methods_name_the_arity(runtime: Arc<ShadowRuntime>, #[case] name: &str, #[case] arity: usize) {
        let base = runtime.construct::<Base>(Vec::new()).unwrap();
        let args = vec![Value::Int(0); arity];
        let err = call_method(&base, name, &args).unwrap_err();
        assert!(matches!(err, ShadowError::MissingMethod { arity: a, .. } if a == arity));
    }

    #[rstest]
    #[serial]
    fn static_fields_are_shared_state() {
        set_static_field(&BASE, "sInstances", Value::Int(5)).unwrap();
        assert_eq!(get_static_field(&DERIVED, "sInstances").unwrap(), Value::Int(5));
        set_static_field(&DERIVED, "sInstances", Value::Int(0)).unwrap();
        assert_eq!(get_static_field(&BASE, "sInstances").unwrap(), Value::Int(0));
    }

    #[rstest]
    #[serial]
    fn static_field_errors() {
        assert_eq!(get_static_field(&BASE, "sKind").unwrap(), Value::from("base"));
        let err = set_static_field(&BASE, "sKind", Value::from("other")).unwrap_err();
        assert!(matches!(err, ShadowError::ReadOnlyField { .. }));
        let err = get_static_field(&BASE, "sMissing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reflection);
        let err = set_static_field(&BASE, "sInstances", Value::from("five")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
