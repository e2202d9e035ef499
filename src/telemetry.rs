use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Respects `RUST_LOG`, otherwise logs `info` and above for
/// this crate. Output goes to stderr so stdout stays reserved for reports.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("suinfra=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
