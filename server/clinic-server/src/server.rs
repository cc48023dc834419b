use config_engine::AppConfig;
use database_layer::{
    migrate, DatabasePool, PgTenantDirectory, TenantConnectionResolver, TenantDatabaseManager,
    TenantDirectory, TenantPoolManager,
};
use error_common::{ClinicError, Result};
use push_service::PushProvider;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::auth::TokenService;

/// Main clinic server state, shared by every handler
#[derive(Clone)]
pub struct ClinicServer {
    /// Loaded configuration
    pub config: Arc<AppConfig>,
    /// Central (landlord) database pool
    pub central: DatabasePool,
    /// Tenant registry
    pub tenants: Arc<dyn TenantDirectory>,
    /// Cached per-tenant pools
    pub pools: Arc<TenantPoolManager>,
    /// Tenant database create/drop
    pub databases: Arc<TenantDatabaseManager>,
    /// JWT issuing and revocation
    pub tokens: Arc<TokenService>,
    /// Push notification delivery
    pub push: Arc<dyn PushProvider>,
    pub started_at: Instant,
}

impl ClinicServer {
    /// Connect to the central database, run its migrations and wire up
    /// the tenant machinery
    pub async fn new(config: AppConfig) -> Result<Self> {
        let central = DatabasePool::connect(&config.database)
            .await
            .map_err(|e| ClinicError::DatabaseError(e.to_string()))?;

        migrate::run_central_migrations(central.pool())
            .await
            .map_err(|e| ClinicError::DatabaseError(e.to_string()))?;

        let push = push_service::provider_from_settings(&config.onesignal)
            .map_err(|e| ClinicError::ConfigError(e.to_string()))?;

        let tenants: Arc<dyn TenantDirectory> = Arc::new(PgTenantDirectory::new(central.pool().clone()));

        info!(
            environment = config.server.environment.as_str(),
            push_provider = push.name(),
            "Clinic server state initialized"
        );

        Ok(Self::from_parts(config, central, tenants, push))
    }

    /// Assemble the state from already built parts. Tests use this with a
    /// lazily connected central pool and an in-memory tenant directory.
    pub fn from_parts(
        config: AppConfig,
        central: DatabasePool,
        tenants: Arc<dyn TenantDirectory>,
        push: Arc<dyn PushProvider>,
    ) -> Self {
        let resolver = TenantConnectionResolver::new(
            config.database.clone(),
            config.tenancy.clone(),
            config.server.environment,
        );
        let databases = TenantDatabaseManager::new(central.pool().clone(), resolver.clone());
        let tokens = TokenService::new(&config.jwt);

        Self {
            config: Arc::new(config),
            central,
            tenants,
            pools: Arc::new(TenantPoolManager::new(resolver)),
            databases: Arc::new(databases),
            tokens: Arc::new(tokens),
            push,
            started_at: Instant::now(),
        }
    }

    /// Release every pool on shutdown
    pub async fn shutdown(&self) {
        self.pools.close_all().await;
        self.central.close().await;
    }
}
