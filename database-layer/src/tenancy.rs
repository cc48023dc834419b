//! Derivation of per-tenant connection parameters.
//!
//! Host and port always come from the central configuration. The database
//! name and credentials depend on the tenant row and on the environment:
//! local-like environments reuse the central login, production-like ones
//! log in as a per-tenant user.

use crate::error::{DatabaseError, DatabaseResult};
use crate::tenant::Tenant;
use config_engine::{DatabaseSettings, Environment, TenancySettings};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgConnectOptions;

/// Everything needed to open a pool against one tenant database
#[derive(Debug, Clone)]
pub struct TenantConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: SecretString,
    pub max_connections: u32,
}

impl TenantConnectionConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(self.password.expose_secret())
            .database(&self.database)
    }

    /// Identity used to decide whether a cached pool is still valid. The
    /// password enters only as a digest.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.password.expose_secret().as_bytes());
        format!(
            "{}@{}:{}/{}#{:x}",
            self.username, self.host, self.port, self.database, digest
        )
    }
}

/// Resolves connection parameters for tenants
#[derive(Debug, Clone)]
pub struct TenantConnectionResolver {
    central: DatabaseSettings,
    tenancy: TenancySettings,
    environment: Environment,
}

impl TenantConnectionResolver {
    pub fn new(central: DatabaseSettings, tenancy: TenancySettings, environment: Environment) -> Self {
        Self {
            central,
            tenancy,
            environment,
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn central(&self) -> &DatabaseSettings {
        &self.central
    }

    pub fn tenancy(&self) -> &TenancySettings {
        &self.tenancy
    }

    /// `prefix + id + suffix` unless the tenant names its database explicitly
    pub fn database_name(&self, tenant: &Tenant) -> String {
        match tenant.db_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => format!(
                "{}{}{}",
                self.tenancy.database_prefix, tenant.id, self.tenancy.database_suffix
            ),
        }
    }

    pub fn resolve(&self, tenant: &Tenant) -> DatabaseResult<TenantConnectionConfig> {
        let database = self.database_name(tenant);
        validate_identifier(&database)?;

        let (username, password) = if self.environment.uses_central_credentials() {
            (self.central.username.clone(), self.central.password.clone())
        } else {
            let username = tenant
                .db_username
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| database.clone());
            let password = match tenant.db_password.as_deref().filter(|p| !p.is_empty()) {
                Some(explicit) => SecretString::new(explicit.to_string()),
                None => self
                    .tenancy
                    .tenant_db_password
                    .clone()
                    .unwrap_or_else(|| self.central.password.clone()),
            };
            (username, password)
        };

        Ok(TenantConnectionConfig {
            host: self.central.host.clone(),
            port: self.central.port,
            database,
            username,
            password,
            max_connections: self.tenancy.pool_max_connections,
        })
    }
}

/// Database names end up in DDL statements, so only `[A-Za-z0-9_]` is accepted
pub fn validate_identifier(name: &str) -> DatabaseResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DatabaseError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn central() -> DatabaseSettings {
        DatabaseSettings {
            host: "db.internal".to_string(),
            port: 6432,
            username: "landlord".to_string(),
            password: SecretString::new("central-pass".to_string()),
            ..DatabaseSettings::default()
        }
    }

    fn resolver(environment: Environment, tenant_password: Option<&str>) -> TenantConnectionResolver {
        let tenancy = TenancySettings {
            tenant_db_password: tenant_password.map(|p| SecretString::new(p.to_string())),
            ..TenancySettings::default()
        };
        TenantConnectionResolver::new(central(), tenancy, environment)
    }

    #[test]
    fn test_password_change_changes_fingerprint() {
        let tenant = Tenant::new("alnoor", "Al Noor");
        let before = resolver(Environment::Production, Some("first")).resolve(&tenant).unwrap();
        let after = resolver(Environment::Production, Some("second")).resolve(&tenant).unwrap();
        assert_eq!(before.username, after.username);
        assert_ne!(before.fingerprint(), after.fingerprint());
        assert!(!before.fingerprint().contains("first"));
        assert_eq!(
            before.fingerprint(),
            resolver(Environment::Production, Some("first")).resolve(&tenant).unwrap().fingerprint()
        );
    }

    #[test]
    fn test_local_uses_central_credentials() {
        let config = resolver(Environment::Local, Some("ignored"))
            .resolve(&Tenant::new("alnoor", "Al Noor"))
            .unwrap();
        assert_eq!(config.database, "tenantalnoor");
        assert_eq!(config.username, "landlord");
        assert_eq!(config.password.expose_secret(), "central-pass");
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6432);
    }

    #[test]
    fn test_production_derives_user_from_database() {
        let config = resolver(Environment::Production, Some("shared-tenant-pass"))
            .resolve(&Tenant::new("alnoor", "Al Noor"))
            .unwrap();
        assert_eq!(config.username, "tenantalnoor");
        assert_eq!(config.password.expose_secret(), "shared-tenant-pass");
    }

    #[test]
    fn test_production_falls_back_to_central_password() {
        let config = resolver(Environment::Production, None)
            .resolve(&Tenant::new("alnoor", "Al Noor"))
            .unwrap();
        assert_eq!(config.password.expose_secret(), "central-pass");
    }

    #[test]
    fn test_explicit_tenant_overrides_win() {
        let mut tenant = Tenant::new("alnoor", "Al Noor");
        tenant.db_name = Some("u123_alnoor".to_string());
        tenant.db_username = Some("u123_user".to_string());
        tenant.db_password = Some("own-pass".to_string());

        let config = resolver(Environment::Production, Some("shared")).resolve(&tenant).unwrap();
        assert_eq!(config.database, "u123_alnoor");
        assert_eq!(config.username, "u123_user");
        assert_eq!(config.password.expose_secret(), "own-pass");
        assert_eq!(config.fingerprint(), "u123_user@db.internal:6432/u123_alnoor");
    }

    #[test]
    fn test_prefix_and_suffix() {
        let tenancy = TenancySettings {
            database_prefix: "clinic_".to_string(),
            database_suffix: "_db".to_string(),
            ..TenancySettings::default()
        };
        let resolver = TenantConnectionResolver::new(central(), tenancy, Environment::Testing);
        assert_eq!(resolver.database_name(&Tenant::new("7", "Seven")), "clinic_7_db");
    }

    #[test]
    fn test_rejects_unsafe_names() {
        let err = resolver(Environment::Local, None)
            .resolve(&Tenant::new("x\"; DROP DATABASE central; --", "Evil"))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidIdentifier(_)));
        assert!(validate_identifier("tenant_ok_1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("has-dash").is_err());
    }
}
