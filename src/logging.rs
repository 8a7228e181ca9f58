//! Tracing setup for the `taxii` binary.
//!
//! Filtering follows `RUST_LOG`; without it, this crate logs at `info` and
//! everything else at `warn`. Output goes to stderr so command output on
//! stdout stays clean.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "warn,taxii_bridge=info";

pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A second init keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
}
