use tracing_subscriber::EnvFilter;

/// Log to stderr so rendered weather on stdout stays clean.
/// `RUST_LOG=citycast_core=debug` shows lookups and state transitions.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
