pub mod config;
pub mod error;

pub use self::config::{
    Config, NotificationConfig, RescheduleMode, StoreBackend, StoreConfig, SurfaceKind,
    ValidationResult,
};
pub use self::error::{
    AppError, ConfigError, DatabaseError, NetworkError, NotificationError, StoreError,
};

use anyhow::Result;

/// Initialize logging for the process.
///
/// Honors `RUST_LOG`, falling back to `info`. Calling it twice is harmless;
/// the second subscriber install is ignored.
pub fn init() -> Result<()> {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    if installed.is_ok() {
        tracing::info!("Agenda core initialized");
    }
    Ok(())
}
