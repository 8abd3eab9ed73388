use crate::class::{ClassInfo, MethodSignature};
use crate::error::ShadowError;
use crate::shadow::ShadowInstance;
use crate::value::Value;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, OnceLock, Weak};

/// Erasure helpers available on every platform object.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Reflective capability exposed by platform objects.
///
/// This is the single seam shadows use to read or write private platform
/// state and to invoke methods by name. Field and method names must also be
/// declared on the object's [`ClassInfo`]; the helpers in the runtime check
/// the declaration first and fail on unknown names.
pub trait Reflect: AsAny {
    fn class(&self) -> &'static ClassInfo;

    fn header(&self) -> &ObjectHeader;

    fn read_field(&self, _name: &str) -> Option<Value> {
        None
    }

    fn write_field(&self, _name: &str, _value: Value) -> Option<Result<(), ShadowError>> {
        None
    }

    fn invoke_declared(
        self: Arc<Self>,
        _signature: &'static MethodSignature,
        _args: &[Value],
    ) -> Option<Result<Value, ShadowError>> {
        None
    }
}

/// Hook that runs the real (unshadowed) implementation with explicit arguments.
pub type RealHook<'a> = &'a dyn Fn(&[Value]) -> Result<Value, ShadowError>;

/// Receives every intercepted call made on platform objects attached to it.
pub trait ClassHandler: Send + Sync {
    fn invoke(
        &self,
        receiver: &Arc<dyn Reflect>,
        signature: &'static MethodSignature,
        args: Vec<Value>,
        real: RealHook<'_>,
    ) -> Result<Value, ShadowError>;

    fn shadow_for(&self, receiver: &Arc<dyn Reflect>) -> Result<ShadowInstance, ShadowError>;
}

/// Per-object link to the class handler that intercepts its calls.
///
/// Holds the handler weakly: objects outliving their runtime fall back to
/// plain real dispatch.
#[derive(Default)]
pub struct ObjectHeader {
    handler: OnceLock<Weak<dyn ClassHandler>>,
}

impl ObjectHeader {
    /// Attaches the handler. Returns `false` if one was attached already.
    pub fn attach(&self, handler: Weak<dyn ClassHandler>) -> bool {
        self.handler.set(handler).is_ok()
    }

    pub fn handler(&self) -> Option<Arc<dyn ClassHandler>> {
        self.handler.get().and_then(Weak::upgrade)
    }

    pub fn is_attached(&self) -> bool {
        self.handler.get().is_some()
    }
}

impl Debug for ObjectHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectHeader").field("attached", &self.is_attached()).finish()
    }
}

/// A class from the simulated platform surface.
///
/// `Default` is the allocation step: it produces the instance in its
/// zero state before any constructor body runs. [`PlatformClass::construct`]
/// is the real constructor body.
pub trait PlatformClass: Reflect + Default + Sized {
    fn class_info() -> &'static ClassInfo;

    fn construct(self: &Arc<Self>, _args: &[Value]) -> Result<(), ShadowError> {
        Ok(())
    }

    /// Routes a method call through the attached class handler.
    ///
    /// `real` is the unshadowed body; the handler decides whether it runs.
    fn dispatch<F>(
        self: &Arc<Self>,
        signature: &'static MethodSignature,
        args: Vec<Value>,
        real: F,
    ) -> Result<Value, ShadowError>
    where
        F: Fn(&Arc<Self>, &[Value]) -> Result<Value, ShadowError>,
    {
        let real_hook = |args: &[Value]| real(self, args);
        match self.header().handler() {
            Some(handler) => {
                let receiver: Arc<dyn Reflect> = Arc::clone(self) as Arc<dyn Reflect>;
                handler.invoke(&receiver, signature, args, &real_hook)
            }
            None => real_hook(&args),
        }
    }
}

/// Weak handle from a shadow back to the instance it stands in for.
#[derive(Clone)]
pub struct RealObject {
    class: &'static ClassInfo,
    instance: Weak<dyn Reflect>,
}

impl RealObject {
    pub fn new(instance: &Arc<dyn Reflect>) -> Self {
        Self { class: instance.class(), instance: Arc::downgrade(instance) }
    }

    pub fn class(&self) -> &'static ClassInfo {
        self.class
    }

    pub fn upgrade(&self) -> Option<Arc<dyn Reflect>> {
        self.instance.upgrade()
    }

    pub fn downcast<T: Reflect>(&self) -> Option<Arc<T>> {
        let strong = self.instance.upgrade()?;
        AsAny::into_any(strong).downcast::<T>().ok()
    }

    pub fn is_alive(&self) -> bool {
        self.instance.strong_count() > 0
    }
}

impl Debug for RealObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealObject")
            .field("class", &self.class.name())
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Looks up the shadow bound to `real`, typed as `S`.
///
/// The lookup goes through the class handler the instance was constructed
/// with, so no ambient registry is consulted.
pub fn shadow_of<S, T>(real: &Arc<T>) -> Result<Arc<S>, ShadowError>
where
    S: Any + Send + Sync,
    T: Reflect,
{
    let class = real.class();
    let handler = real
        .header()
        .handler()
        .ok_or_else(|| ShadowError::NoShadowBound { class: class.name().to_owned() })?;
    let receiver: Arc<dyn Reflect> = Arc::clone(real) as Arc<dyn Reflect>;
    handler.shadow_for(&receiver)?.downcast::<S>(class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    static PLAIN: ClassInfo = ClassInfo::new("test.Plain");
    const ECHO: MethodSignature = MethodSignature::new("echo", &["int"]);

    #[derive(Default)]
    struct Plain {
        header: ObjectHeader,
    }

    impl Reflect for Plain {
        fn class(&self) -> &'static ClassInfo {
            &PLAIN
        }

        fn header(&self) -> &ObjectHeader {
            &self.header
        }
    }

    impl PlatformClass for Plain {
        fn class_info() -> &'static ClassInfo {
            &PLAIN
        }
    }

    #[rstest]
    fn detached_objects_run_real_code() {
        let plain = Arc::new(Plain::default());
        let result = plain
            .dispatch(&ECHO, vec![Value::Int(4)], |_, args| Ok(Value::Int(args[0].as_int()? * 2)))
            .unwrap();
        assert_eq!(result, Value::Int(8));
    }

    #[rstest]
    fn detached_objects_have_no_shadow() {
        let plain = Arc::new(Plain::default());
        let err = shadow_of::<u8, _>(&plain).unwrap_err();
        assert!(matches!(err, ShadowError::NoShadowBound { class } if class == "test.Plain"));
    }

    #[rstest]
    fn real_object_does_not_keep_instance_alive() {
        let plain: Arc<dyn Reflect> = Arc::new(Plain::default());
        let handle = RealObject::new(&plain);
        assert!(handle.downcast::<Plain>().is_some());
        drop(plain);
        assert!(!handle.is_alive());
        assert!(handle.upgrade().is_none());
    }
}
