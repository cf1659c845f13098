use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_ENV: &str = "POLICYRAG_LOG";

/// Installs the global subscriber. Filter directives come from
/// `POLICYRAG_LOG` (default `info`); output goes to stderr so stdout stays
/// clean for JSON. A second call is a no-op.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
