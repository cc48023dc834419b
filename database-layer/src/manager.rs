//! Creation and removal of tenant databases.
//!
//! Only local-like environments issue DDL. In production the hosting panel
//! provisions databases and users, so create and drop only log and `exists`
//! assumes the database is there.

use crate::error::{DatabaseError, DatabaseResult};
use crate::tenancy::{validate_identifier, TenantConnectionResolver};
use crate::tenant::Tenant;
use sqlx::PgPool;
use tracing::{info, warn};

pub struct TenantDatabaseManager {
    central: PgPool,
    resolver: TenantConnectionResolver,
}

impl TenantDatabaseManager {
    pub fn new(central: PgPool, resolver: TenantConnectionResolver) -> Self {
        Self { central, resolver }
    }

    fn manages_databases(&self) -> bool {
        self.resolver.environment().manages_databases()
    }

    pub async fn create_database(&self, tenant: &Tenant) -> DatabaseResult<()> {
        let database = self.resolver.database_name(tenant);
        validate_identifier(&database)?;

        if !self.manages_databases() {
            info!(
                tenant_id = %tenant.id,
                database = %database,
                environment = self.resolver.environment().as_str(),
                "Skipping CREATE DATABASE; tenant databases are provisioned externally"
            );
            return Ok(());
        }

        if self.database_exists(&database).await? {
            info!(tenant_id = %tenant.id, database = %database, "Tenant database already exists");
            return Ok(());
        }

        sqlx::query(&create_database_sql(&database))
            .execute(&self.central)
            .await
            .map_err(|e| DatabaseError::ProvisioningFailed(format!("{database}: {e}")))?;
        info!(tenant_id = %tenant.id, database = %database, "Created tenant database");
        Ok(())
    }

    pub async fn delete_database(&self, tenant: &Tenant) -> DatabaseResult<()> {
        let database = self.resolver.database_name(tenant);
        validate_identifier(&database)?;

        if !self.manages_databases() {
            warn!(
                tenant_id = %tenant.id,
                database = %database,
                "Skipping DROP DATABASE; remove the database through the hosting panel"
            );
            return Ok(());
        }

        sqlx::query(&drop_database_sql(&database))
            .execute(&self.central)
            .await
            .map_err(|e| DatabaseError::ProvisioningFailed(format!("{database}: {e}")))?;
        info!(tenant_id = %tenant.id, database = %database, "Dropped tenant database");
        Ok(())
    }

    pub async fn exists(&self, tenant: &Tenant) -> DatabaseResult<bool> {
        if !self.manages_databases() {
            return Ok(true);
        }
        let database = self.resolver.database_name(tenant);
        self.database_exists(&database).await
    }

    async fn database_exists(&self, database: &str) -> DatabaseResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
                .bind(database)
                .fetch_one(&self.central)
                .await?;
        Ok(exists)
    }
}

/// Callers must pass a name accepted by [`validate_identifier`]
fn create_database_sql(database: &str) -> String {
    format!("CREATE DATABASE \"{database}\" ENCODING 'UTF8'")
}

fn drop_database_sql(database: &str) -> String {
    format!("DROP DATABASE IF EXISTS \"{database}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_engine::{DatabaseSettings, Environment, TenancySettings};
    use sqlx::postgres::PgPoolOptions;

    fn manager(environment: Environment) -> TenantDatabaseManager {
        let settings = DatabaseSettings {
            port: 1,
            ..DatabaseSettings::default()
        };
        let central = PgPoolOptions::new()
            .connect_lazy_with(crate::connection::connect_options(&settings, "postgres"));
        TenantDatabaseManager::new(
            central,
            TenantConnectionResolver::new(settings, TenancySettings::default(), environment),
        )
    }

    #[test]
    fn test_ddl_quotes_name() {
        assert_eq!(create_database_sql("tenant_a"), "CREATE DATABASE \"tenant_a\" ENCODING 'UTF8'");
        assert_eq!(drop_database_sql("tenant_a"), "DROP DATABASE IF EXISTS \"tenant_a\"");
    }

    #[tokio::test]
    async fn test_production_is_a_no_op() {
        let manager = manager(Environment::Production);
        let tenant = Tenant::new("alnoor", "Al Noor");
        manager.create_database(&tenant).await.unwrap();
        manager.delete_database(&tenant).await.unwrap();
        assert!(manager.exists(&tenant).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_name_rejected_before_ddl() {
        let manager = manager(Environment::Local);
        let err = manager
            .create_database(&Tenant::new("bad name", "Bad"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidIdentifier(_)));
    }
}
