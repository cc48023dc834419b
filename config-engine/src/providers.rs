//! Configuration sources: optional YAML file, `CLINIC__*` environment, and a
//! few bare variables kept for deployments that predate the prefixed scheme.

use crate::error::Result;
use crate::settings::AppConfig;
use config::{Config, Environment as EnvSource, File, FileFormat};
use std::path::Path;
use tracing::{debug, info};

/// Environment prefix for structured overrides, e.g. `CLINIC__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "CLINIC";

/// Bare variables mapped onto configuration keys
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("APP_ENV", "server.environment"),
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_DATABASE", "database.database"),
    ("DB_USERNAME", "database.username"),
    ("DB_PASSWORD", "database.password"),
    ("TENANT_DB_PASSWORD", "tenancy.tenant_db_password"),
    ("JWT_SECRET", "jwt.secret"),
    ("ONESIGNAL_APP_ID", "onesignal.app_id"),
    ("ONESIGNAL_REST_API_KEY", "onesignal.api_key"),
];

/// Where configuration is read from
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<String>,
    load_dotenv: bool,
    legacy_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            file: None,
            load_dotenv: true,
            legacy_env: true,
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a YAML file; a missing file is not an error
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_dotenv(mut self, enabled: bool) -> Self {
        self.load_dotenv = enabled;
        self
    }

    pub fn with_legacy_env(mut self, enabled: bool) -> Self {
        self.legacy_env = enabled;
        self
    }

    /// Build the final configuration.
    ///
    /// Precedence, lowest first: defaults, file, `CLINIC__*`, bare variables.
    pub fn load(&self) -> Result<AppConfig> {
        if self.load_dotenv {
            match dotenvy::dotenv() {
                Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
                Err(e) if e.not_found() => debug!("No .env file found"),
                Err(e) => debug!(error = %e, "Ignoring unreadable .env file"),
            }
        }

        let mut builder = Config::builder();

        if let Some(path) = &self.file {
            let exists = Path::new(path).exists();
            info!(path = %path, exists, "Loading configuration file");
            builder = builder.add_source(File::new(path, FileFormat::Yaml).required(false));
        }

        builder = builder.add_source(
            EnvSource::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("server.allowed_origins"),
        );

        if self.legacy_env {
            for (var, key) in LEGACY_ENV_KEYS {
                let value = std::env::var(var).ok().filter(|v| !v.is_empty());
                builder = builder.set_override_option(*key, value)?;
            }
        }

        let config: AppConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string only, without touching the environment
    pub fn from_yaml_str(yaml: &str) -> Result<AppConfig> {
        let config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = ConfigLoader::new()
            .with_file("does/not/exist.yaml")
            .with_dotenv(false)
            .with_legacy_env(false)
            .load()
            .unwrap();
        assert_eq!(config.database.database, "clinic_central");
        assert!(!config.tenancy.auto_migrate);
    }

    #[test]
    fn test_file_values_are_read() {
        let path = std::env::temp_dir().join(format!("clinic-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "tenancy:\n  database_prefix: dental\n").unwrap();
        let config = ConfigLoader::new()
            .with_file(path.to_string_lossy())
            .with_dotenv(false)
            .with_legacy_env(false)
            .load()
            .unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.tenancy.database_prefix, "dental");
    }
}
