use crate::api::ApiLevel;
use crate::class::{ClassInfo, MethodSignature};
use crate::error::ShadowError;
use crate::object::{RealHook, RealObject};
use crate::value::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

/// A replacement implementation for a platform class.
///
/// Shadows are created once per real instance and receive a weak handle to
/// it. Handlers only get `&self`, so shadows keep their mutable state behind
/// their own locks or atomics and may call back into the platform freely.
pub trait Shadow: Any + Send + Sync {
    fn create(real: RealObject) -> Self
    where
        Self: Sized;
}

/// One intercepted call as seen by a shadow handler.
pub struct Invocation<'a> {
    class: &'static ClassInfo,
    signature: &'static MethodSignature,
    api_level: ApiLevel,
    args: Vec<Value>,
    real: RealHook<'a>,
}

impl<'a> Invocation<'a> {
    pub fn new(
        class: &'static ClassInfo,
        signature: &'static MethodSignature,
        api_level: ApiLevel,
        args: Vec<Value>,
        real: RealHook<'a>,
    ) -> Self {
        Self { class, signature, api_level, args, real }
    }

    /// Runtime class of the receiver.
    pub fn class(&self) -> &'static ClassInfo {
        self.class
    }

    pub fn signature(&self) -> &'static MethodSignature {
        self.signature
    }

    pub fn api_level(&self) -> ApiLevel {
        self.api_level
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Result<&Value, ShadowError> {
        self.args.get(index).ok_or_else(|| self.argument_error(index, ShadowError::ValueMismatch {
            expected: "argument",
            actual: "nothing",
        }))
    }

    /// Converts argument `index` into `T`.
    pub fn arg_as<T>(&self, index: usize) -> Result<T, ShadowError>
    where
        T: TryFrom<Value, Error = ShadowError>,
    {
        let value = self.arg(index)?.clone();
        T::try_from(value).map_err(|err| self.argument_error(index, err))
    }

    /// Runs the real implementation with explicit arguments.
    pub fn call_real(&self, args: &[Value]) -> Result<Value, ShadowError> {
        (self.real)(args)
    }

    pub fn call_real_with_original_args(&self) -> Result<Value, ShadowError> {
        (self.real)(&self.args)
    }

    fn argument_error(&self, index: usize, source: ShadowError) -> ShadowError {
        ShadowError::ArgumentMismatch {
            signature: self.signature.to_string(),
            index,
            source: Box::new(source),
        }
    }
}

impl Debug for Invocation<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("class", &self.class.name())
            .field("signature", &self.signature)
            .field("api_level", &self.api_level)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// A shadow instance with its concrete type erased.
#[derive(Clone)]
pub struct ShadowInstance {
    class_name: &'static str,
    instance: Arc<dyn Any + Send + Sync>,
}

impl ShadowInstance {
    pub fn new(class_name: &'static str, instance: Arc<dyn Any + Send + Sync>) -> Self {
        Self { class_name, instance }
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self.instance.as_ref()
    }

    pub fn downcast<S: Any + Send + Sync>(&self, real_class: &ClassInfo) -> Result<Arc<S>, ShadowError> {
        Arc::clone(&self.instance).downcast::<S>().map_err(|_| ShadowError::ShadowTypeMismatch {
            class: real_class.name().to_owned(),
            actual: self.class_name.to_owned(),
        })
    }

    pub fn ptr_eq(&self, other: &ShadowInstance) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}

impl Debug for ShadowInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShadowInstance({} @ {:p})", self.class_name, Arc::as_ptr(&self.instance))
    }
}

type ErasedHandler =
    Arc<dyn Fn(&(dyn Any + Send + Sync), &Invocation<'_>) -> Result<Value, ShadowError> + Send + Sync>;
type Factory = Box<dyn Fn(RealObject) -> Arc<dyn Any + Send + Sync> + Send + Sync>;

/// Descriptor of a shadow type: how to create it and which calls it handles.
pub struct ShadowClass {
    name: &'static str,
    shadowed: &'static ClassInfo,
    factory: Factory,
    constructor: Option<ErasedHandler>,
    methods: HashMap<MethodSignature, ErasedHandler>,
}

impl ShadowClass {
    pub fn builder<S: Shadow>(name: &'static str, shadowed: &'static ClassInfo) -> ShadowClassBuilder<S> {
        ShadowClassBuilder {
            name,
            shadowed,
            constructor: None,
            methods: HashMap::new(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The class this shadow was written for.
    pub fn shadowed(&self) -> &'static ClassInfo {
        self.shadowed
    }

    pub fn implements(&self, signature: &MethodSignature) -> bool {
        self.methods.contains_key(signature)
    }

    pub fn implemented_methods(&self) -> impl Iterator<Item = &MethodSignature> {
        self.methods.keys()
    }

    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    pub fn instantiate(&self, real: RealObject) -> ShadowInstance {
        ShadowInstance::new(self.name, (self.factory)(real))
    }

    /// Runs the method handler for the invocation's signature, if there is one.
    pub fn invoke(&self, shadow: &ShadowInstance, invocation: &Invocation<'_>) -> Option<Result<Value, ShadowError>> {
        let handler = self.methods.get(invocation.signature())?;
        Some(handler(shadow.as_any(), invocation))
    }

    /// Runs the constructor handler, if there is one.
    pub fn construct(
        &self,
        shadow: &ShadowInstance,
        invocation: &Invocation<'_>,
    ) -> Option<Result<(), ShadowError>> {
        let handler = self.constructor.as_ref()?;
        Some(handler(shadow.as_any(), invocation).map(drop))
    }
}

impl Debug for ShadowClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<String> = self.methods.keys().map(ToString::to_string).collect();
        methods.sort();
        f.debug_struct("ShadowClass")
            .field("name", &self.name)
            .field("shadowed", &self.shadowed.name())
            .field("constructor", &self.constructor.is_some())
            .field("methods", &methods)
            .finish_non_exhaustive()
    }
}

pub struct ShadowClassBuilder<S> {
    name: &'static str,
    shadowed: &'static ClassInfo,
    constructor: Option<ErasedHandler>,
    methods: HashMap<MethodSignature, ErasedHandler>,
    _marker: PhantomData<fn() -> S>,
}

impl<S: Shadow> ShadowClassBuilder<S> {
    /// Replaces the real constructor body. The handler can still run it via
    /// [`Invocation::call_real`].
    #[must_use]
    pub fn constructor<F>(mut self, handler: F) -> Self
    where
        F: Fn(&S, &Invocation<'_>) -> Result<(), ShadowError> + Send + Sync + 'static,
    {
        self.constructor = Some(erase::<S, _>(move |shadow, call| handler(shadow, call).map(|()| Value::Unit)));
        self
    }

    #[must_use]
    pub fn method<F>(mut self, signature: MethodSignature, handler: F) -> Self
    where
        F: Fn(&S, &Invocation<'_>) -> Result<Value, ShadowError> + Send + Sync + 'static,
    {
        self.methods.insert(signature, erase::<S, _>(handler));
        self
    }

    pub fn build(self) -> ShadowClass {
        trace!(shadow = self.name, class = self.shadowed.name(), methods = self.methods.len(), "shadow class built");
        ShadowClass {
            name: self.name,
            shadowed: self.shadowed,
            factory: Box::new(|real| Arc::new(S::create(real)) as Arc<dyn Any + Send + Sync>),
            constructor: self.constructor,
            methods: self.methods,
        }
    }
}

fn erase<S, F>(handler: F) -> ErasedHandler
where
    S: Shadow,
    F: Fn(&S, &Invocation<'_>) -> Result<Value, ShadowError> + Send + Sync + 'static,
{
    Arc::new(move |shadow: &(dyn Any + Send + Sync), call: &Invocation<'_>| {
        let typed = shadow.downcast_ref::<S>().ok_or_else(|| ShadowError::ShadowTypeMismatch {
            class: call.class().name().to_owned(),
            actual: std::any::type_name::<S>().to_owned(),
        })?;
        handler(typed, call)
    })
}
