use std::any::Any;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, trace};
use umbra_core::{ClassInfo, Reflect, ShadowClass, ShadowError, ShadowInstance};

/// The shadow bound to one real instance, with the class that created it.
#[derive(Clone, Debug)]
pub struct BoundShadow {
    pub shadow_class: Arc<ShadowClass>,
    pub shadow: ShadowInstance,
}

struct Binding {
    instance: Weak<dyn Reflect>,
    class: &'static ClassInfo,
    bound: BoundShadow,
}

impl Binding {
    fn is_alive(&self) -> bool {
        self.instance.strong_count() > 0
    }
}

struct BinderState {
    bindings: HashMap<usize, Binding>,
    binds_since_prune: usize,
}

/// Associates each real instance with exactly one shadow for its lifetime.
///
/// Entries are keyed by the instance address and hold the instance weakly.
/// An entry whose instance died is stale: it is replaced when the address
/// is reused and swept by [`InstanceBinder::prune`], which also runs every
/// `prune_interval` binds.
pub struct InstanceBinder {
    state: Mutex<BinderState>,
    prune_interval: usize,
}

impl InstanceBinder {
    pub fn new(prune_interval: usize) -> Self {
        Self {
            state: Mutex::new(BinderState { bindings: HashMap::new(), binds_since_prune: 0 }),
            prune_interval: prune_interval.max(1),
        }
    }

    pub fn bind(
        &self,
        instance: &Arc<dyn Reflect>,
        shadow_class: Arc<ShadowClass>,
        shadow: ShadowInstance,
    ) -> Result<(), ShadowError> {
        let class = instance.class();
        let mut state = self.lock();
        if let Some(existing) = state.bindings.get(&address(instance))
            && existing.is_alive()
        {
            return Err(ShadowError::AlreadyBound {
                class: class.name().to_owned(),
                shadow: existing.bound.shadow_class.name().to_owned(),
            });
        }
        trace!(class = class.name(), shadow = shadow_class.name(), "binding shadow");
        let binding = Binding {
            instance: Arc::downgrade(instance),
            class,
            bound: BoundShadow { shadow_class, shadow },
        };
        state.bindings.insert(address(instance), binding);
        state.binds_since_prune += 1;
        if state.binds_since_prune >= self.prune_interval {
            prune_locked(&mut state);
        }
        Ok(())
    }

    /// The shadow bound to `instance`, always the same one while it lives.
    pub fn lookup(&self, instance: &Arc<dyn Reflect>) -> Result<BoundShadow, ShadowError> {
        self.lock()
            .bindings
            .get(&address(instance))
            .filter(|binding| binding.is_alive())
            .map(|binding| binding.bound.clone())
            .ok_or_else(|| ShadowError::NoShadowBound { class: instance.class().name().to_owned() })
    }

    /// Typed lookup; a shadow of another type is a lookup error.
    pub fn shadow_of<S, T>(&self, instance: &Arc<T>) -> Result<Arc<S>, ShadowError>
    where
        S: Any + Send + Sync,
        T: Reflect,
    {
        let erased: Arc<dyn Reflect> = Arc::clone(instance) as Arc<dyn Reflect>;
        self.lookup(&erased)?.shadow.downcast::<S>(instance.class())
    }

    pub fn is_bound(&self, instance: &Arc<dyn Reflect>) -> bool {
        self.lookup(instance).is_ok()
    }

    /// Drops entries whose instance has died. Returns how many were removed.
    pub fn prune(&self) -> usize {
        prune_locked(&mut self.lock())
    }

    /// Releases every binding.
    pub fn reset(&self) {
        let released = {
            let mut state = self.lock();
            state.binds_since_prune = 0;
            std::mem::take(&mut state.bindings)
        };
        debug!(released = released.len(), "instance bindings released");
    }

    /// Number of entries, stale ones included until pruned.
    pub fn len(&self) -> usize {
        self.lock().bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, BinderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for InstanceBinder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        let mut classes: Vec<&str> = state.bindings.values().map(|binding| binding.class.name()).collect();
        classes.sort_unstable();
        f.debug_struct("InstanceBinder")
            .field("bindings", &classes)
            .field("prune_interval", &self.prune_interval)
            .finish()
    }
}

fn prune_locked(state: &mut BinderState) -> usize {
    let before = state.bindings.len();
    state.bindings.retain(|_, binding| binding.is_alive());
    state.binds_since_prune = 0;
    let removed = before - state.bindings.len();
    if removed > 0 {
        trace!(removed, "pruned stale bindings");
    }
    removed
}

fn address(instance: &Arc<dyn Reflect>) -> usize {
    Arc::as_ptr(instance).cast::<()>().addr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_classes::{Base, ShadowBase, base_shadow};
    use rstest::{fixture, rstest};
    use umbra_core::{ErrorKind, RealObject};

    #[fixture]
    fn binder() -> InstanceBinder {
        InstanceBinder::new(4)
    }

    fn bind_new(binder: &InstanceBinder) -> (Arc<dyn Reflect>, ShadowInstance) {
        let instance: Arc<dyn Reflect> = Arc::new(Base::default());
        let class = Arc::new(base_shadow("ShadowBase"));
        let shadow = class.instantiate(RealObject::new(&instance));
        binder.bind(&instance, class, shadow.clone()).unwrap();
        (instance, shadow)
    }

    #[rstest]
    fn lookup_returns_the_same_shadow(binder: InstanceBinder) {
        let (instance, shadow) = bind_new(&binder);
        assert!(binder.lookup(&instance).unwrap().shadow.ptr_eq(&shadow));
        assert!(binder.lookup(&instance).unwrap().shadow.ptr_eq(&shadow));
    }

    #[rstest]
    fn second_bind_is_a_lookup_error(binder: InstanceBinder) {
        let (instance, shadow) = bind_new(&binder);
        let class = Arc::new(base_shadow("Other"));
        let err = binder.bind(&instance, class, shadow).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
        assert!(matches!(err, ShadowError::AlreadyBound { shadow, .. } if shadow == "ShadowBase"));
    }

    #[rstest]
    fn unbound_instance_has_no_shadow(binder: InstanceBinder) {
        let instance: Arc<dyn Reflect> = Arc::new(Base::default());
        assert!(matches!(binder.lookup(&instance), Err(ShadowError::NoShadowBound { .. })));
    }

    #[rstest]
    fn typed_lookup_checks_the_shadow_type(binder: InstanceBinder) {
        let base = Arc::new(Base::default());
        let erased: Arc<dyn Reflect> = Arc::clone(&base) as Arc<dyn Reflect>;
        let class = Arc::new(base_shadow("ShadowBase"));
        binder.bind(&erased, Arc::clone(&class), class.instantiate(RealObject::new(&erased))).unwrap();

        assert!(binder.shadow_of::<ShadowBase, _>(&base).is_ok());
        let err = binder.shadow_of::<String, _>(&base).unwrap_err();
        assert!(matches!(err, ShadowError::ShadowTypeMismatch { .. }));
    }

    #[rstest]
    fn dead_instances_are_pruned(binder: InstanceBinder) {
        let (kept, _) = bind_new(&binder);
        let (dropped, _) = bind_new(&binder);
        drop(dropped);
        assert_eq!(binder.len(), 2);
        assert_eq!(binder.prune(), 1);
        assert!(binder.is_bound(&kept));
    }

    #[rstest]
    fn pruning_runs_every_interval(binder: InstanceBinder) {
        for _ in 0..3 {
            let (instance, _) = bind_new(&binder);
            drop(instance);
        }
        let (_live, _) = bind_new(&binder);
        assert!(binder.len() <= 1);
    }

    #[rstest]
    fn reset_releases_everything(binder: InstanceBinder) {
        let (instance, _) = bind_new(&binder);
        binder.reset();
        assert!(binder.is_empty());
        assert!(!binder.is_bound(&instance));
    }
}
