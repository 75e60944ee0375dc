//! Configuration management for careledger
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (CARELEDGER_* prefix, `__` between section and key)
//! 2. careledger.local.toml (gitignored, local overrides)
//! 3. careledger.toml (git-tracked, deployment config)
//! 4. ~/.config/careledger/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use careledger_types::Role;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod logging;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use logging::init_tracing;
pub use paths::Paths;

/// Largest accepted `consent.max_expiry_days` (one hundred years).
pub const MAX_EXPIRY_DAYS_LIMIT: u32 = 36_500;

/// Main careledger configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CareledgerConfig {
    pub identity: IdentityConfig,
    pub consent: ConsentConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

/// How caller roles are read from verified credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Credential attribute holding the caller's role
    pub role_attribute: String,
    /// Role assumed when the credential carries no role attribute
    pub default_role: Role,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            role_attribute: "role".to_string(),
            default_role: Role::Patient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentConfig {
    /// Longest grant a patient may issue, in days
    pub max_expiry_days: u32,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            max_expiry_days: 3650,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Composite-key object type under which audit entries are stored
    pub namespace: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            namespace: "audit".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"careledger=debug,info"`
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            with_target: true,
        }
    }
}

impl CareledgerConfig {
    /// Parse a single TOML document, without layering
    pub fn from_toml_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: PathBuf::from(path),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::ParseError {
            path: PathBuf::from(path),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Create a development configuration
    pub fn development() -> Self {
        Self {
            logging: LoggingConfig {
                filter: "debug".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Create a production configuration
    pub fn production() -> Self {
        Self {
            logging: LoggingConfig {
                filter: "info".to_string(),
                json: true,
                with_target: false,
            },
            ..Default::default()
        }
    }

    /// Reject settings the core cannot operate with
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.identity.role_attribute.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "identity.role_attribute must not be empty".to_string(),
            ));
        }
        if !(1..=MAX_EXPIRY_DAYS_LIMIT).contains(&self.consent.max_expiry_days) {
            return Err(ConfigError::ValidationError(format!(
                "consent.max_expiry_days must be between 1 and {MAX_EXPIRY_DAYS_LIMIT}, got {}",
                self.consent.max_expiry_days
            )));
        }
        if self.audit.namespace.is_empty() || self.audit.namespace.contains('\u{0}') {
            return Err(ConfigError::ValidationError(format!(
                "audit.namespace {:?} is not a valid key namespace",
                self.audit.namespace
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = CareledgerConfig::default();
        assert_eq!(config.identity.role_attribute, "role");
        assert_eq!(config.identity.default_role, Role::Patient);
        assert_eq!(config.consent.max_expiry_days, 3650);
        assert_eq!(config.audit.namespace, "audit");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_development_config() {
        let config = CareledgerConfig::development();
        assert_eq!(config.logging.filter, "debug");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_production_config() {
        let config = CareledgerConfig::production();
        assert!(config.logging.json);
        assert!(!config.logging.with_target);
    }

    #[test]
    fn test_validation_rejects_unusable_settings() {
        let mut config = CareledgerConfig::default();
        config.consent.max_expiry_days = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = CareledgerConfig::default();
        config.consent.max_expiry_days = MAX_EXPIRY_DAYS_LIMIT;
        assert!(config.validate().is_ok());
        config.consent.max_expiry_days = MAX_EXPIRY_DAYS_LIMIT + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
        config.consent.max_expiry_days = u32::MAX;
        assert!(config.validate().is_err());

        let mut config = CareledgerConfig::default();
        config.audit.namespace = String::new();
        assert!(config.validate().is_err());

        let mut config = CareledgerConfig::default();
        config.identity.role_attribute = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("careledger.toml");
        std::fs::write(
            &path,
            r#"
[identity]
role_attribute = "hf.role"
default_role = "doctor"

[consent]
max_expiry_days = 90
"#,
        )
        .expect("Failed to write config");

        let config = CareledgerConfig::from_toml_file(&path).expect("Failed to parse config");
        assert_eq!(config.identity.role_attribute, "hf.role");
        assert_eq!(config.identity.default_role, Role::Doctor);
        assert_eq!(config.consent.max_expiry_days, 90);
        assert_eq!(config.audit.namespace, "audit");
    }

    #[test]
    fn test_from_toml_file_reports_parse_errors() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("careledger.toml");
        std::fs::write(&path, "[identity]\ndefault_role = \"nurse\"\n")
            .expect("Failed to write config");

        let result = CareledgerConfig::from_toml_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
