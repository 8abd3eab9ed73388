use crate::registry::ShadowRegistry;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, trace};
use umbra_core::{ApiLevel, ClassInfo, MethodSignature, ShadowClass, ShadowError};

/// How calls to one method of one class are routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DispatchKind {
    /// No shadow is registered for the class.
    RealOnly,
    /// A shadow exists but does not override the method.
    DelegateToReal,
    /// The bound shadow's handler receives the call.
    ShadowControlled,
}

impl Display for DispatchKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DispatchKind::RealOnly => "real-only",
            DispatchKind::DelegateToReal => "delegate-to-real",
            DispatchKind::ShadowControlled => "shadow-controlled",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug)]
pub enum DispatchPlan {
    RealOnly,
    DelegateToReal { shadow: Arc<ShadowClass> },
    ShadowControlled { shadow: Arc<ShadowClass> },
}

impl DispatchPlan {
    pub fn kind(&self) -> DispatchKind {
        match self {
            DispatchPlan::RealOnly => DispatchKind::RealOnly,
            DispatchPlan::DelegateToReal { .. } => DispatchKind::DelegateToReal,
            DispatchPlan::ShadowControlled { .. } => DispatchKind::ShadowControlled,
        }
    }

    pub fn shadow_class(&self) -> Option<&Arc<ShadowClass>> {
        match self {
            DispatchPlan::RealOnly => None,
            DispatchPlan::DelegateToReal { shadow } | DispatchPlan::ShadowControlled { shadow } => Some(shadow),
        }
    }
}

type PlanKey = (&'static str, MethodSignature, ApiLevel);

#[derive(Default)]
struct PlanCache {
    generation: u64,
    plans: HashMap<PlanKey, DispatchPlan>,
}

/// Computes and caches dispatch plans per class, signature and API level.
///
/// The cache is tied to a registry generation and is dropped wholesale as
/// soon as the registry changes.
#[derive(Default)]
pub struct Dispatcher {
    cache: Mutex<PlanCache>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(
        &self,
        registry: &ShadowRegistry,
        class: &'static ClassInfo,
        signature: &MethodSignature,
        level: ApiLevel,
    ) -> Result<DispatchPlan, ShadowError> {
        let generation = registry.generation();
        let key = (class.name(), *signature, level);
        {
            let mut cache = self.lock();
            if cache.generation != generation {
                cache.plans.clear();
                cache.generation = generation;
            } else if let Some(plan) = cache.plans.get(&key) {
                return Ok(plan.clone());
            }
        }

        let plan = compute(registry, class, signature, level)?;
        trace!(class = class.name(), %signature, %level, kind = %plan.kind(), "dispatch plan computed");
        let mut cache = self.lock();
        if cache.generation == generation {
            cache.plans.insert(key, plan.clone());
        }
        Ok(plan)
    }

    /// Drops every cached plan.
    pub fn clear(&self) {
        self.lock().plans.clear();
    }

    pub fn cached_plans(&self) -> usize {
        self.lock().plans.len()
    }

    fn lock(&self) -> MutexGuard<'_, PlanCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for Dispatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let cache = self.lock();
        f.debug_struct("Dispatcher")
            .field("generation", &cache.generation)
            .field("cached_plans", &cache.plans.len())
            .finish()
    }
}

fn compute(
    registry: &ShadowRegistry,
    class: &'static ClassInfo,
    signature: &MethodSignature,
    level: ApiLevel,
) -> Result<DispatchPlan, ShadowError> {
    let shadow = registry.resolve(class, level);
    let overridden = shadow.as_ref().is_some_and(|shadow| shadow.implements(signature));
    if !overridden && class.declaring_class(signature).is_none() {
        let err = ShadowError::UnresolvedDispatch { class: class.name().to_owned(), signature: signature.to_string() };
        error!(%err, "dispatch failed");
        return Err(err);
    }
    Ok(match shadow {
        None => DispatchPlan::RealOnly,
        Some(shadow) if overridden => DispatchPlan::ShadowControlled { shadow },
        Some(shadow) => DispatchPlan::DelegateToReal { shadow },
    })
}
