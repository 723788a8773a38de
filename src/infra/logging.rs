//! Tracing subscriber setup for the `cfgp` binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoLocal;

/// Environment variable holding the log filter (`EnvFilter` syntax).
pub const LOG_ENV: &str = "CFGPATCH_LOG";

/// Filter used when `CFGPATCH_LOG` is unset or invalid.
pub fn default_directive(quiet: bool) -> &'static str {
    if quiet { "error" } else { "warn" }
}

/// Install a stderr subscriber once. Later calls are no-ops.
pub fn init(quiet: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(quiet)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(ChronoLocal::rfc_3339())
        .try_init();
}
