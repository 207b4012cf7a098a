//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::AppEnv;

const DEFAULT_FILTER: &str = "info,alert_watch=debug";

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init(environment: AppEnv) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match environment {
        AppEnv::Production => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .init(),
        AppEnv::Development => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}
