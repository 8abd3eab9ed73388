use crate::binder::InstanceBinder;
use crate::dispatch::{DispatchKind, DispatchPlan, Dispatcher};
use crate::registry::ShadowRegistry;
use crate::settings::SandboxSettings;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};
use umbra_core::{
    ApiLevel, ApiRange, ClassHandler, ClassInfo, Invocation, MethodSignature, PlatformClass, RealHook, RealObject,
    Reflect, ShadowClass, ShadowError, ShadowInstance, Value,
};

/// Owns the registry, the instance binder and the dispatch cache, and
/// intercepts every call on the platform objects it constructs.
///
/// Objects hold the runtime weakly through their header, so dropping the
/// runtime turns them back into plain real objects.
pub struct ShadowRuntime {
    this: Weak<ShadowRuntime>,
    registry: ShadowRegistry,
    binder: InstanceBinder,
    dispatcher: Dispatcher,
    api_level: AtomicU32,
}

impl ShadowRuntime {
    pub fn new(settings: &SandboxSettings) -> Result<Arc<Self>, ShadowError> {
        let registry = ShadowRegistry::with_bootstrap()?;
        debug!(registrations = registry.len(), api_level = settings.api_level, "shadow runtime created");
        Ok(Arc::new_cyclic(|this| Self {
            this: this.clone(),
            registry,
            binder: InstanceBinder::new(settings.prune_interval),
            dispatcher: Dispatcher::new(),
            api_level: AtomicU32::new(settings.api_level),
        }))
    }

    /// Allocates and constructs a platform object.
    ///
    /// When a shadow class resolves for `T`, its shadow is created and bound
    /// before any constructor code runs. A shadow constructor handler then
    /// replaces the real constructor body; otherwise the real body runs.
    pub fn construct<T: PlatformClass>(&self, args: Vec<Value>) -> Result<Arc<T>, ShadowError> {
        let instance = Arc::new(T::default());
        let handler: Weak<dyn ClassHandler> = self.this.clone();
        instance.header().attach(handler);

        let class = T::class_info();
        let level = self.api_level();
        let Some(shadow_class) = self.registry.resolve(class, level) else {
            trace!(class = class.name(), "constructing unshadowed instance");
            instance.construct(&args)?;
            return Ok(instance);
        };

        let erased: Arc<dyn Reflect> = Arc::clone(&instance) as Arc<dyn Reflect>;
        let shadow = shadow_class.instantiate(RealObject::new(&erased));
        self.binder.bind(&erased, Arc::clone(&shadow_class), shadow.clone())?;
        trace!(class = class.name(), shadow = shadow_class.name(), "shadow bound before construction");

        {
            let real = |args: &[Value]| instance.construct(args).map(|()| Value::Unit);
            let invocation = Invocation::new(class, &MethodSignature::CONSTRUCTOR, level, args, &real);
            match shadow_class.construct(&shadow, &invocation) {
                Some(result) => result?,
                None => invocation.call_real_with_original_args()?.into_unit()?,
            }
        }
        Ok(instance)
    }

    /// The shadow bound to `instance`, typed as `S`.
    pub fn shadow_of<S, T>(&self, instance: &Arc<T>) -> Result<Arc<S>, ShadowError>
    where
        S: Any + Send + Sync,
        T: Reflect,
    {
        self.binder.shadow_of::<S, T>(instance)
    }

    /// The shadow class whose shadow is bound to `instance`.
    pub fn shadow_class_of<T: Reflect>(&self, instance: &Arc<T>) -> Result<Arc<ShadowClass>, ShadowError> {
        let erased: Arc<dyn Reflect> = Arc::clone(instance) as Arc<dyn Reflect>;
        Ok(self.binder.lookup(&erased)?.shadow_class)
    }

    /// Current dispatch plan for `signature` on `class`.
    pub fn dispatch_plan(
        &self,
        class: &'static ClassInfo,
        signature: &MethodSignature,
    ) -> Result<DispatchPlan, ShadowError> {
        self.dispatcher.plan(&self.registry, class, signature, self.api_level())
    }

    pub fn register(&self, shadow: ShadowClass, range: ApiRange) -> Result<(), ShadowError> {
        let class = shadow.shadowed();
        self.registry.register(class, Arc::new(shadow), range)
    }

    /// Removes the class's registrations. Instances constructed afterwards
    /// are unshadowed, and calls on existing instances run real code.
    pub fn unregister(&self, class: &ClassInfo) -> usize {
        self.registry.unregister(class)
    }

    pub fn api_level(&self) -> ApiLevel {
        ApiLevel(self.api_level.load(Ordering::Acquire))
    }

    /// Changes the API level used for shadow resolution of new instances.
    /// Instances already bound keep dispatching to their own shadow class.
    pub fn set_api_level(&self, level: ApiLevel) {
        self.api_level.store(level.get(), Ordering::Release);
    }

    pub fn registry(&self) -> &ShadowRegistry {
        &self.registry
    }

    pub fn binder(&self) -> &InstanceBinder {
        &self.binder
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Releases every binding, restores the bootstrap registrations and drops
    /// cached plans.
    pub fn reset(&self) -> Result<(), ShadowError> {
        self.binder.reset();
        self.registry.reset()?;
        self.dispatcher.clear();
        debug!("shadow runtime reset");
        Ok(())
    }
}

impl ClassHandler for ShadowRuntime {
    fn invoke(
        &self,
        receiver: &Arc<dyn Reflect>,
        signature: &'static MethodSignature,
        args: Vec<Value>,
        real: RealHook<'_>,
    ) -> Result<Value, ShadowError> {
        let class = receiver.class();
        let level = self.api_level();
        let plan = self.dispatcher.plan(&self.registry, class, signature, level)?;
        if plan.kind() == DispatchKind::RealOnly {
            return real(&args);
        }
        let Ok(bound) = self.binder.lookup(receiver) else {
            trace!(class = class.name(), %signature, "receiver constructed without shadow; running real code");
            return real(&args);
        };
        // The bound shadow class decides, not the one resolving at the current level.
        if !bound.shadow_class.implements(signature) {
            return real(&args);
        }

        let invocation = Invocation::new(class, signature, level, args, real);
        match bound.shadow_class.invoke(&bound.shadow, &invocation) {
            Some(result) => result,
            None => invocation.call_real_with_original_args(),
        }
    }

    fn shadow_for(&self, receiver: &Arc<dyn Reflect>) -> Result<ShadowInstance, ShadowError> {
        Ok(self.binder.lookup(receiver)?.shadow)
    }
}

impl Debug for ShadowRuntime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowRuntime")
            .field("api_level", &self.api_level())
            .field("registry", &self.registry)
            .field("binder", &self.binder)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
