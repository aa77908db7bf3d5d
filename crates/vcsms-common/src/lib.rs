pub mod error;
pub mod helpers;
pub mod identity;

pub use error::IdentityError;
pub use helpers::constant_time_eq;
pub use identity::ServerIdentity;

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber reading its filter from `RUST_LOG`.
pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// Install a `tracing` subscriber, falling back to `default_level` when
/// `RUST_LOG` is unset.
pub fn init_tracing_with_default(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
