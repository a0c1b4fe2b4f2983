pub mod batch;
pub mod collapse;
pub mod config;
pub mod duplicates;
pub mod history;
pub mod merge;

/// Install the fmt subscriber used by every binary; `RUST_LOG` overrides.
pub fn init_logging(default_filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
}
