//! Log output for the binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a fmt subscriber. `RUST_LOG`, when set, wins over `level`.
///
/// Returns false if a global subscriber was already installed.
pub fn init(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .is_ok()
}

/// Our own crate logs at `level`; everything else only warns.
fn default_directive(level: &str) -> String {
    format!("warn,microrouter={}", level)
}
