use crate::Sandbox;
use crate::settings::SandboxSettings;
use rstest::fixture;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static LOGGING: Once = Once::new();

/// Installs a fmt subscriber writing to the test output, filtered by
/// `RUST_LOG` (default `warn`). Safe to call from every test.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}

/// rstest fixture: fresh sandbox with default settings and test logging.
#[fixture]
pub fn sandbox() -> Sandbox {
    init_test_logging();
    Sandbox::with_settings(SandboxSettings::default()).expect("sandbox")
}
