use crate::settings::SettingsError;
use thiserror::Error;
use umbra_core::{ErrorKind, ShadowError};
use umbra_looper::LooperError;

/// Any failure surfaced by a [`crate::Sandbox`].
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error(transparent)]
    Shadow(#[from] ShadowError),
    #[error(transparent)]
    Looper(#[from] LooperError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl SandboxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::Shadow(err) => err.kind(),
            SandboxError::Looper(err) => err.kind(),
            SandboxError::Settings(err) => err.kind(),
        }
    }
}
