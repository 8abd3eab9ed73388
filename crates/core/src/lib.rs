//! Core types of the Umbra shadowing substrate.
//!
//! Platform classes describe themselves with a static [`ClassInfo`], carry an
//! [`ObjectHeader`] and route calls through [`PlatformClass::dispatch`].
//! Shadow implementations are described by [`ShadowClass`] and registered
//! either at runtime or through [`register_shadow!`].

pub mod api;
pub mod class;
pub mod error;
pub mod object;
pub mod registration;
pub mod shadow;
pub mod value;

pub use api::{ApiLevel, ApiRange};
pub use class::{CONSTRUCTOR_NAME, ClassInfo, MethodSignature, StaticField};
pub use error::{ErrorKind, ShadowError};
pub use object::{AsAny, ClassHandler, ObjectHeader, PlatformClass, RealHook, RealObject, Reflect, shadow_of};
pub use registration::{ShadowRegistration, shadow_registrations};
pub use shadow::{Invocation, Shadow, ShadowClass, ShadowClassBuilder, ShadowInstance};
pub use value::{Value, arg};
