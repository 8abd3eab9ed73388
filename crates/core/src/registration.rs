use crate::api::ApiRange;
use crate::shadow::ShadowClass;

/// Inventory registration entry for a bootstrap shadow.
///
/// Bootstrap registrations are persistent: the runtime reloads them every
/// time its registry is reset.
pub struct ShadowRegistration {
    pub shadow: fn() -> ShadowClass,
    pub range: ApiRange,
}

inventory::collect!(ShadowRegistration);

/// Iterate over all shadows submitted through [`register_shadow!`](crate::register_shadow).
pub fn shadow_registrations() -> impl Iterator<Item = &'static ShadowRegistration> {
    inventory::iter::<ShadowRegistration>.into_iter()
}

/// Register a shadow class for every API level, or for an explicit range.
#[macro_export]
macro_rules! register_shadow {
    ($shadow:expr) => {
        $crate::register_shadow!($shadow, $crate::ApiRange::ALL);
    };
    ($shadow:expr, $range:expr) => {
        inventory::submit! {
            $crate::registration::ShadowRegistration { shadow: $shadow, range: $range }
        }
    };
}
