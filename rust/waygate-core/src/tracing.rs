//! Helpers to wrangle logging across Waygate crates.
//! NOTE: [initialize_tracing] should only ever be called in tests or
//! binaries; a library should only concern itself with instrumentation.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Crates considered when no `RUST_LOG` directive is present.
pub static WAYGATE_LOG_LEVEL_CRATES: &[&str] = &[
    "waygate_core",
    "waygate_gateway",
    "waygate_authorizer",
    "waygate_authserver",
    "waygate_resource",
    "waygate_client",
    "tower_http",
];

/// Install a process-global `tracing` subscriber.
///
/// Honors `RUST_LOG` when set; otherwise enables `info` for the Waygate
/// crates and quiets everything else. Safe to call repeatedly (tests do).
pub fn initialize_tracing() {
    static INITIALIZE: Once = Once::new();

    INITIALIZE.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directives = WAYGATE_LOG_LEVEL_CRATES
                .iter()
                .map(|name| format!("{}=info", name))
                .collect::<Vec<String>>()
                .join(",");
            EnvFilter::new(directives)
        });

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}
