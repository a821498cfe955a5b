use std::io;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a stderr tracing subscriber for applications using the client.
///
/// Use RUST_LOG to control the level (e.g., RUST_LOG=classification_core=debug).
/// Does nothing if a global subscriber is already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init();
}
