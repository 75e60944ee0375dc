//! Configuration loader with multi-source merging

use crate::{CareledgerConfig, Paths};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "CARELEDGER".to_string(),
            user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "CARELEDGER")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/careledger/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<CareledgerConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = CareledgerConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/careledger/config.toml)
        if self.user_config {
            if let Ok(user_config_file) = Paths::new().user_config_file() {
                if user_config_file.exists() {
                    debug!(path = %user_config_file.display(), "Loading user config");
                    builder = builder.add_source(
                        config::File::from(user_config_file)
                            .required(false)
                            .format(config::FileFormat::Toml),
                    );
                }
            }
        }

        // 3. Deployment config (careledger.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            debug!(path = %project_config_file.display(), "Loading deployment config");
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (careledger.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            debug!(path = %local_config_file.display(), "Loading local config");
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (CARELEDGER_CONSENT__MAX_EXPIRY_DAYS=90)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let careledger_config: CareledgerConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        careledger_config
            .validate()
            .context("Configuration failed validation")?;

        Ok(careledger_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> CareledgerConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careledger_types::Role;
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(dir)
            .with_env_prefix("CARELEDGER_LOADER_TEST")
            .without_user_config()
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config, CareledgerConfig::default());
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[identity]
role_attribute = "hf.role"
default_role = "doctor"

[consent]
max_expiry_days = 365

[audit]
namespace = "trail"
"#;
        fs::write(project_dir.join("careledger.toml"), config_content)
            .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.identity.role_attribute, "hf.role");
        assert_eq!(config.identity.default_role, Role::Doctor);
        assert_eq!(config.consent.max_expiry_days, 365);
        assert_eq!(config.audit.namespace, "trail");
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("careledger.toml"),
            r#"
[consent]
max_expiry_days = 365
"#,
        )
        .expect("Failed to write project config");

        fs::write(
            project_dir.join("careledger.local.toml"),
            r#"
[consent]
max_expiry_days = 30
"#,
        )
        .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.consent.max_expiry_days, 30);
    }

    #[test]
    fn test_invalid_settings_fail_to_load() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("careledger.toml"),
            r#"
[consent]
max_expiry_days = 0
"#,
        )
        .expect("Failed to write project config");

        assert!(loader(project_dir).load().is_err());
        assert_eq!(
            loader(project_dir).load_or_default(),
            CareledgerConfig::default()
        );
    }

    // Environment overrides are not exercised here: the process environment is
    // shared between parallel tests. They take the form
    //
    // CARELEDGER_CONSENT__MAX_EXPIRY_DAYS=90
    // CARELEDGER_LOGGING__JSON=true
}
