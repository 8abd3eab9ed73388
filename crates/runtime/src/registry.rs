use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error};
use umbra_core::{ApiLevel, ApiRange, ClassInfo, ShadowClass, ShadowError, shadow_registrations};

#[derive(Clone)]
struct Registration {
    shadow: Arc<ShadowClass>,
    range: ApiRange,
}

/// Which shadow class stands in for a real class at a given API level.
///
/// At most one registration of a class matches any API level: overlapping
/// ranges are rejected. Every mutation bumps [`ShadowRegistry::generation`],
/// which keys cached dispatch plans.
pub struct ShadowRegistry {
    classes: RwLock<HashMap<&'static str, Vec<Registration>>>,
    generation: AtomicU64,
}

impl ShadowRegistry {
    /// Empty registry without bootstrap registrations.
    pub fn new() -> Self {
        Self { classes: RwLock::new(HashMap::new()), generation: AtomicU64::new(0) }
    }

    /// Registry preloaded with every shadow submitted through `register_shadow!`.
    pub fn with_bootstrap() -> Result<Self, ShadowError> {
        let registry = Self::new();
        registry.load_bootstrap()?;
        Ok(registry)
    }

    pub fn register(
        &self,
        class: &'static ClassInfo,
        shadow: Arc<ShadowClass>,
        range: ApiRange,
    ) -> Result<(), ShadowError> {
        if range.is_empty() {
            let err = ShadowError::InvalidApiRange {
                class: class.name().to_owned(),
                shadow: shadow.name().to_owned(),
                range,
            };
            error!(%err, "rejected shadow registration");
            return Err(err);
        }

        let mut classes = self.write();
        let registrations = classes.entry(class.name()).or_default();
        if let Some(existing) = registrations.iter().find(|existing| existing.range.overlaps(&range)) {
            let err = ShadowError::OverlappingRegistration {
                class: class.name().to_owned(),
                shadow: shadow.name().to_owned(),
                existing: existing.shadow.name().to_owned(),
                range,
            };
            error!(%err, "rejected shadow registration");
            return Err(err);
        }
        debug!(class = class.name(), shadow = shadow.name(), %range, "shadow registered");
        registrations.push(Registration { shadow, range });
        self.bump();
        Ok(())
    }

    /// Drops every registration of `class`. Returns how many were removed.
    pub fn unregister(&self, class: &ClassInfo) -> usize {
        let removed = self.write().remove(class.name()).map_or(0, |registrations| registrations.len());
        if removed > 0 {
            debug!(class = class.name(), removed, "shadow registrations removed");
            self.bump();
        }
        removed
    }

    /// The shadow class for `class` at `level`, looking at supertypes when
    /// the class itself has no matching registration.
    pub fn resolve(&self, class: &'static ClassInfo, level: ApiLevel) -> Option<Arc<ShadowClass>> {
        let classes = self.read();
        class.ancestry().find_map(|candidate| find_in(&classes, candidate, level))
    }

    /// Like [`ShadowRegistry::resolve`] but ignoring supertypes.
    pub fn resolve_exact(&self, class: &ClassInfo, level: ApiLevel) -> Option<Arc<ShadowClass>> {
        find_in(&self.read(), class, level)
    }

    /// Registered shadow names and ranges for `class`.
    pub fn registrations_for(&self, class: &ClassInfo) -> Vec<(&'static str, ApiRange)> {
        self.read()
            .get(class.name())
            .map(|registrations| {
                registrations.iter().map(|registration| (registration.shadow.name(), registration.range)).collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops everything and reloads the bootstrap registrations.
    pub fn reset(&self) -> Result<(), ShadowError> {
        self.write().clear();
        self.bump();
        self.load_bootstrap()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn load_bootstrap(&self) -> Result<(), ShadowError> {
        for registration in shadow_registrations() {
            let shadow = (registration.shadow)();
            let class = shadow.shadowed();
            self.register(class, Arc::new(shadow), registration.range)?;
        }
        Ok(())
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<&'static str, Vec<Registration>>> {
        self.classes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<&'static str, Vec<Registration>>> {
        self.classes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ShadowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ShadowRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowRegistry")
            .field("registrations", &self.len())
            .field("generation", &self.generation())
            .finish()
    }
}

fn find_in(
    classes: &HashMap<&'static str, Vec<Registration>>,
    class: &ClassInfo,
    level: ApiLevel,
) -> Option<Arc<ShadowClass>> {
    classes
        .get(class.name())?
        .iter()
        .find(|registration| registration.range.contains(level))
        .map(|registration| Arc::clone(&registration.shadow))
}
