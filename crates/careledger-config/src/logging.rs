//! Tracing subscriber setup for hosts embedding careledger.

use tracing_subscriber::EnvFilter;

use crate::{ConfigError, LoggingConfig};

/// Installs a global `tracing` subscriber for `config`.
///
/// `RUST_LOG`, when set, takes precedence over the configured filter. A
/// subscriber installed earlier (by the host or another test) is left in
/// place.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    let directive = select_directive(std::env::var(EnvFilter::DEFAULT_ENV).ok(), config);
    let filter = parse_filter(&directive)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(err) = installed {
        tracing::debug!(error = %err, "Tracing subscriber already installed");
    }
    Ok(())
}

/// The non-empty `RUST_LOG` value if there is one, else the configured filter.
fn select_directive(env: Option<String>, config: &LoggingConfig) -> String {
    env.filter(|directive| !directive.is_empty())
        .unwrap_or_else(|| config.filter.clone())
}

fn parse_filter(directive: &str) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(directive).map_err(|err| ConfigError::LogFilter {
        filter: directive.to_string(),
        reason: err.to_string(),
    })
}
