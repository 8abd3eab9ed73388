use crate::error::SandboxError;
use crate::runtime::ShadowRuntime;
use crate::settings::SandboxSettings;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;
use umbra_core::{PlatformClass, Reflect, Value};
use umbra_looper::{Looper, LooperEnvironment};

/// Everything one test runs against: a shadow runtime and a looper
/// environment whose main thread is the thread that created the sandbox.
#[derive(Debug)]
pub struct Sandbox {
    settings: SandboxSettings,
    runtime: Arc<ShadowRuntime>,
    loopers: Arc<LooperEnvironment>,
}

impl Sandbox {
    /// Sandbox configured from the `UMBRA_*` environment variables.
    pub fn new() -> Result<Self, SandboxError> {
        Self::with_settings(SandboxSettings::from_env()?)
    }

    pub fn with_settings(settings: SandboxSettings) -> Result<Self, SandboxError> {
        let runtime = ShadowRuntime::new(&settings)?;
        let loopers = LooperEnvironment::new(settings.looper_config());
        debug!(api_level = settings.api_level, paused = settings.main_looper_paused, "sandbox created");
        Ok(Self { settings, runtime, loopers })
    }

    pub fn settings(&self) -> &SandboxSettings {
        &self.settings
    }

    pub fn runtime(&self) -> &Arc<ShadowRuntime> {
        &self.runtime
    }

    pub fn loopers(&self) -> &Arc<LooperEnvironment> {
        &self.loopers
    }

    pub fn main_looper(&self) -> Arc<Looper> {
        self.loopers.main_looper()
    }

    pub fn construct<T: PlatformClass>(&self, args: Vec<Value>) -> Result<Arc<T>, SandboxError> {
        Ok(self.runtime.construct::<T>(args)?)
    }

    pub fn shadow_of<S, T>(&self, instance: &Arc<T>) -> Result<Arc<S>, SandboxError>
    where
        S: Any + Send + Sync,
        T: Reflect,
    {
        Ok(self.runtime.shadow_of::<S, T>(instance)?)
    }

    /// Returns the sandbox to its initial state between tests: background
    /// loopers quit, the main looper gets a fresh scheduler, and the runtime
    /// drops its bindings and non-bootstrap registrations.
    pub fn reset(&self) -> Result<(), SandboxError> {
        self.loopers.reset_thread_loopers()?;
        self.runtime.reset()?;
        self.runtime.set_api_level(self.settings.level());
        debug!("sandbox reset");
        Ok(())
    }
}
