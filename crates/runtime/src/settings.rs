use serde::{Deserialize, Serialize};
use thiserror::Error;
use umbra_core::{ApiLevel, ErrorKind};
use umbra_looper::LooperConfig;

pub const ENV_API_LEVEL: &str = "UMBRA_API_LEVEL";
pub const ENV_START_TIME_MS: &str = "UMBRA_START_TIME_MS";
pub const ENV_PAUSED: &str = "UMBRA_PAUSED";

/// Default number of binds between automatic sweeps of dead bindings.
pub const DEFAULT_PRUNE_INTERVAL: usize = 256;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid sandbox settings: {0}")]
    Json(#[from] serde_json::Error),
    #[error("environment variable {var} has invalid value `{value}`")]
    InvalidVariable { var: &'static str, value: String },
}

impl SettingsError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Per-sandbox configuration: API level, virtual clock origin and looper mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    pub api_level: u32,
    pub start_time_ms: u64,
    pub main_looper_paused: bool,
    pub idle_constantly: bool,
    pub prune_interval: usize,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            api_level: ApiLevel::DEFAULT.get(),
            start_time_ms: 0,
            main_looper_paused: false,
            idle_constantly: false,
            prune_interval: DEFAULT_PRUNE_INTERVAL,
        }
    }
}

impl SandboxSettings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Defaults with the `UMBRA_*` process environment variables applied.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_env_with(|var| std::env::var(var).ok())
    }

    /// Like [`SandboxSettings::from_env`] with a custom variable lookup.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        if let Some(value) = lookup(ENV_API_LEVEL) {
            settings.api_level = parse_number(ENV_API_LEVEL, &value)?;
        }
        if let Some(value) = lookup(ENV_START_TIME_MS) {
            settings.start_time_ms = parse_number(ENV_START_TIME_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_PAUSED) {
            settings.main_looper_paused = parse_bool(ENV_PAUSED, &value)?;
        }
        Ok(settings)
    }

    #[must_use]
    pub fn apply(mut self, overrides: &SandboxOverrides) -> Self {
        if let Some(api_level) = overrides.api_level {
            self.api_level = api_level;
        }
        if let Some(start_time_ms) = overrides.start_time_ms {
            self.start_time_ms = start_time_ms;
        }
        if let Some(paused) = overrides.main_looper_paused {
            self.main_looper_paused = paused;
        }
        if let Some(idle_constantly) = overrides.idle_constantly {
            self.idle_constantly = idle_constantly;
        }
        if let Some(prune_interval) = overrides.prune_interval {
            self.prune_interval = prune_interval;
        }
        self
    }

    pub fn level(&self) -> ApiLevel {
        ApiLevel(self.api_level)
    }

    pub fn looper_config(&self) -> LooperConfig {
        LooperConfig::new()
            .start_time_ms(self.start_time_ms)
            .paused(self.main_looper_paused)
            .idle_constantly(self.idle_constantly)
    }
}

/// Selective changes on top of loaded [`SandboxSettings`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SandboxOverrides {
    pub api_level: Option<u32>,
    pub start_time_ms: Option<u64>,
    pub main_looper_paused: Option<bool>,
    pub idle_constantly: Option<bool>,
    pub prune_interval: Option<usize>,
}

impl SandboxOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_level(mut self, api_level: u32) -> Self {
        self.api_level = Some(api_level);
        self
    }

    pub fn start_time_ms(mut self, start_time_ms: u64) -> Self {
        self.start_time_ms = Some(start_time_ms);
        self
    }

    pub fn main_looper_paused(mut self, paused: bool) -> Self {
        self.main_looper_paused = Some(paused);
        self
    }

    pub fn idle_constantly(mut self, idle_constantly: bool) -> Self {
        self.idle_constantly = Some(idle_constantly);
        self
    }

    pub fn prune_interval(mut self, prune_interval: usize) -> Self {
        self.prune_interval = Some(prune_interval);
        self
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, SettingsError> {
    value.trim().parse().map_err(|_| SettingsError::InvalidVariable { var, value: value.to_owned() })
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, SettingsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(SettingsError::InvalidVariable { var, value: value.to_owned() }),
    }
}
