//! Shadow runtime for the Umbra substrate.
//!
//! [`ShadowRuntime`] resolves shadow classes, binds one shadow per
//! constructed instance and routes intercepted calls. [`Sandbox`] composes
//! it with a [`umbra_looper::LooperEnvironment`] into the state one test
//! runs against.

mod binder;
mod dispatch;
mod error;
pub mod reflection;
mod registry;
mod runtime;
mod sandbox;
mod settings;

#[cfg(test)]
mod test_classes;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use binder::{BoundShadow, InstanceBinder};
pub use dispatch::{DispatchKind, DispatchPlan, Dispatcher};
pub use error::SandboxError;
pub use reflection::{call_method, get_field, get_static_field, set_field, set_static_field};
pub use registry::ShadowRegistry;
pub use runtime::ShadowRuntime;
pub use sandbox::Sandbox;
pub use settings::{
    DEFAULT_PRUNE_INTERVAL, ENV_API_LEVEL, ENV_PAUSED, ENV_START_TIME_MS, SandboxOverrides, SandboxSettings,
    SettingsError,
};
