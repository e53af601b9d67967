//! Diagnostic logging to stderr.
//!
//! Reads `RUST_LOG`; defaults to `warn` so normal runs print only the
//! generated document and any errors. Pipeline errors are reported by the
//! commands themselves and are logged at `debug` only.
//!
//! ```bash
//! RUST_LOG=fleetform_core=debug fleetform generate
//! ```

use std::io::IsTerminal;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .compact(),
        )
        .init();
}
