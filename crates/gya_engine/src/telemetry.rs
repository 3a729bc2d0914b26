//! Tracing subscriber setup
//!
//! Libraries only emit `tracing` events; the binary installs the
//! subscriber once, here.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::EngineError;

/// Builds the level filter, preferring `RUST_LOG` over the configured level
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber
///
/// # Errors
///
/// `EngineError::Telemetry` when a global subscriber is already set.
pub fn init_tracing(log_level: &str, json: bool) -> Result<(), EngineError> {
    let registry = tracing_subscriber::registry().with(env_filter(log_level));

    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    result.map_err(|e| EngineError::Telemetry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_falls_back() {
        let filter = env_filter("not a [valid directive");
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn test_second_init_is_an_error() {
        let _ = init_tracing("warn", false);
        assert!(matches!(init_tracing("warn", true), Err(EngineError::Telemetry(_))));
    }
}
