//! Receipt-to-expense reconciliation, spending categorization and budget reporting.

pub mod budgets;
pub mod categorizer;
pub mod db;
pub mod error;
pub mod extractor;
pub mod fmt;
pub mod models;
pub mod processor;
pub mod receipts;
pub mod reconciler;
pub mod reports;
pub mod reviewer;
pub mod settings;
pub mod sink;
pub mod store;
pub mod summary;
pub mod validate;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Environment variable holding the log filter, e.g. `spendwise=debug`.
pub const LOG_ENV: &str = "SPENDWISE_LOG";

/// Install the global tracing subscriber once. Logs go to stderr.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("spendwise=warn"));

        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    });
}
