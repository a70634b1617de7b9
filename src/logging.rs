//! Logging setup
//!
//! Console output filtered by `RUST_LOG` (default `fleet_authz=info`). When
//! `FLEET_AUTHZ_LOG_DIR` is set, JSON lines are also written to a daily
//! rolling file in that directory.

use anyhow::Result;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable naming the log directory
pub const LOG_DIR_ENV: &str = "FLEET_AUTHZ_LOG_DIR";

const DEFAULT_FILTER: &str = "fleet_authz=info";
const LOG_FILE_PREFIX: &str = "fleet-authz.log";

// Keeps the file writer flushing until process exit.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber
///
/// Fails if a subscriber is already installed.
pub fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer),
            )
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()?;

    Ok(())
}
