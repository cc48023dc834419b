//! Configuration for the clinic engine.
//!
//! Values come from, in increasing precedence:
//! - built-in defaults
//! - an optional YAML file (`config/clinic-server.yaml`)
//! - `CLINIC__SECTION__KEY` environment variables (a `.env` file is loaded first)
//! - bare variables such as `TENANT_DB_PASSWORD` or `JWT_SECRET`
//!
//! # Example
//!
//! ```rust
//! use config_engine::ConfigLoader;
//!
//! let config = ConfigLoader::from_yaml_str("server:\n  port: 9000\n").unwrap();
//! assert_eq!(config.server.port, 9000);
//! assert_eq!(config.tenancy.database_prefix, "tenant");
//! ```

pub mod error;
pub mod providers;
pub mod settings;
pub mod validation;

pub use error::*;
pub use providers::*;
pub use settings::*;
pub use validation::validate;

/// Load and validate configuration in one step
pub fn load(path: &str) -> Result<AppConfig> {
    let config = ConfigLoader::new().with_file(path).load()?;
    validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const SAMPLE: &str = r#"
server:
  port: 8181
  environment: production
  allowed_origins: ["https://app.clinic.iq"]
database:
  host: db.internal
  database: central
  username: clinic
  password: s3cret
tenancy:
  database_prefix: clinic_
  tenant_db_password: tenant-pass
jwt:
  secret: "0123456789abcdef0123456789abcdef"
  ttl_minutes: 30
"#;

    #[test]
    fn test_yaml_overrides_defaults() {
        let config = ConfigLoader::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.server.port, 8181);
        assert_eq!(config.server.environment, Environment::Production);
        assert_eq!(config.database.password(), "s3cret");
        assert_eq!(config.tenancy.database_prefix, "clinic_");
        assert_eq!(config.tenancy.database_suffix, "");
        assert_eq!(
            config.tenancy.tenant_db_password.as_ref().map(|s| s.expose_secret().as_str()),
            Some("tenant-pass")
        );
        assert_eq!(config.jwt.ttl_minutes, 30);
        assert_eq!(config.jwt.refresh_ttl_minutes, 20_160);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_struct_defaults_fill_partial_documents() {
        // Plain serde, without the layered loader: every section and field
        // left out of the document comes from the serde defaults
        let direct: AppConfig = serde_yaml::from_str(SAMPLE).unwrap();
        let loaded = ConfigLoader::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(direct.server.port, loaded.server.port);
        assert_eq!(direct.server.host, "0.0.0.0");
        assert_eq!(direct.database.max_connections, loaded.database.max_connections);
        assert_eq!(direct.jwt.refresh_ttl_minutes, 20_160);
        assert_eq!(direct.onesignal.base_url, "https://onesignal.com/api/v1");
        assert_eq!(direct.logging.level, "info");

        let empty: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(empty.database.database, "clinic_central");
        assert!(empty.jwt.secret.expose_secret().is_empty());
    }

    #[test]
    fn test_defaults_need_jwt_secret() {
        let config = AppConfig::default();
        assert!(matches!(validate(&config), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_short_secret_rejected_in_production() {
        let mut config = ConfigLoader::from_yaml_str(SAMPLE).unwrap();
        config.jwt.secret = secrecy::SecretString::new("short".to_string());
        assert!(matches!(validate(&config), Err(ConfigError::ValidationError(_))));

        config.server.environment = Environment::Local;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_onesignal_enabled_requires_keys() {
        let mut config = ConfigLoader::from_yaml_str(SAMPLE).unwrap();
        config.onesignal.enabled = true;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_environment_capabilities() {
        assert!(Environment::Local.manages_databases());
        assert!(Environment::Testing.uses_central_credentials());
        assert!(!Environment::Production.manages_databases());
        assert!(Environment::Staging.is_production());
        assert_eq!("prod".parse::<Environment>(), Ok(Environment::Production));
        assert!("mars".parse::<Environment>().is_err());
    }

    #[test]
    fn test_masked_url_hides_password() {
        let config = ConfigLoader::from_yaml_str(SAMPLE).unwrap();
        let url = config.database.masked_url();
        assert!(!url.contains("s3cret"));
        assert!(url.contains("db.internal:5432/central"));
    }
}
