use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Diagnostics go to stderr so stdout stays clean for reports. `RUST_LOG`
/// overrides the default filter.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "taskbook=debug" } else { "taskbook=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
