use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Variable holding the log filter directive
pub const LOG_ENV: &str = "NESTLE_LOG";

/// Install the stderr subscriber
///
/// `NESTLE_LOG` wins over `verbose`; without either the level is info.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    // a second init (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init();
}
