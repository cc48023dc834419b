//! Per-tenant connection pools.
//!
//! Tenant pools are created lazily on first use and cached by tenant id.
//! A request never swaps a shared connection: it receives a
//! [`TenantConnection`] bound to its own tenant's pool, and releasing that
//! handle at the end of the request is the revert.

use crate::error::DatabaseResult;
use crate::migrate;
use crate::tenancy::{TenantConnectionConfig, TenantConnectionResolver};
use crate::tenant::Tenant;
use dashmap::DashMap;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Clone)]
struct CachedPool {
    fingerprint: String,
    pool: PgPool,
    migrated: bool,
}

/// Request-scoped access to one tenant database
#[derive(Clone)]
pub struct TenantConnection {
    inner: Arc<TenantScope>,
}

struct TenantScope {
    tenant: Arc<Tenant>,
    database: String,
    pool: PgPool,
    opened_at: Instant,
}

impl Drop for TenantScope {
    fn drop(&mut self) {
        debug!(
            tenant_id = %self.tenant.id,
            database = %self.database,
            held_ms = u64::try_from(self.opened_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Tenant connection released"
        );
    }
}

impl TenantConnection {
    pub fn tenant(&self) -> &Tenant {
        &self.inner.tenant
    }

    pub fn tenant_id(&self) -> &str {
        &self.inner.tenant.id
    }

    pub fn database(&self) -> &str {
        &self.inner.database
    }

    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }
}

impl std::fmt::Debug for TenantConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantConnection")
            .field("tenant_id", &self.tenant_id())
            .field("database", &self.database())
            .finish()
    }
}

/// Cache of tenant pools keyed by tenant id
pub struct TenantPoolManager {
    resolver: TenantConnectionResolver,
    pools: DashMap<String, CachedPool>,
}

impl TenantPoolManager {
    pub fn new(resolver: TenantConnectionResolver) -> Self {
        Self {
            resolver,
            pools: DashMap::new(),
        }
    }

    pub fn resolver(&self) -> &TenantConnectionResolver {
        &self.resolver
    }

    /// Bind a request to `tenant`'s database.
    ///
    /// Reuses the cached pool unless the tenant's credentials changed since
    /// it was opened. With `tenancy.auto_migrate` the tenant schema is
    /// brought up to date the first time a pool is opened.
    pub async fn bootstrap(&self, tenant: Tenant) -> DatabaseResult<TenantConnection> {
        let config = self.resolver.resolve(&tenant)?;
        let fingerprint = config.fingerprint();

        let cached = self
            .pools
            .get(&tenant.id)
            .filter(|entry| entry.fingerprint == fingerprint)
            .map(|entry| entry.clone());

        let cached = match cached {
            Some(cached) => cached,
            None => {
                let pool = self.open_pool(&config);
                info!(
                    tenant_id = %tenant.id,
                    database = %config.database,
                    username = %config.username,
                    "Opened tenant pool"
                );
                let fresh = CachedPool {
                    fingerprint,
                    pool,
                    migrated: false,
                };
                if let Some(stale) = self.pools.insert(tenant.id.clone(), fresh.clone()) {
                    warn!(tenant_id = %tenant.id, "Tenant credentials changed, replacing pool");
                    stale.pool.close().await;
                }
                fresh
            }
        };

        if self.resolver.tenancy().auto_migrate && !cached.migrated {
            migrate::run_tenant_migrations(&cached.pool).await?;
            if let Some(mut entry) = self.pools.get_mut(&tenant.id) {
                entry.migrated = true;
            }
        }

        Ok(TenantConnection {
            inner: Arc::new(TenantScope {
                database: config.database,
                tenant: Arc::new(tenant),
                pool: cached.pool,
                opened_at: Instant::now(),
            }),
        })
    }

    fn open_pool(&self, config: &TenantConnectionConfig) -> PgPool {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(0)
            .acquire_timeout(Duration::from_secs(self.resolver.central().acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(self.resolver.tenancy().pool_idle_timeout_secs))
            .connect_lazy_with(config.connect_options())
    }

    /// Evict and close a tenant's pool, e.g. after its credentials or
    /// database were changed. Returns false when nothing was cached.
    pub async fn purge(&self, tenant_id: &str) -> bool {
        match self.pools.remove(tenant_id) {
            Some((_, cached)) => {
                cached.pool.close().await;
                info!(tenant_id = %tenant_id, "Purged tenant pool");
                true
            }
            None => false,
        }
    }

    /// Ids of tenants with an open pool
    pub fn active_tenants(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.pools.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub async fn close_all(&self) {
        let ids = self.active_tenants();
        for id in ids {
            self.purge(&id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_engine::{DatabaseSettings, Environment, TenancySettings};

    fn manager() -> TenantPoolManager {
        let central = DatabaseSettings {
            port: 1,
            ..DatabaseSettings::default()
        };
        TenantPoolManager::new(TenantConnectionResolver::new(
            central,
            TenancySettings::default(),
            Environment::Local,
        ))
    }

    #[tokio::test]
    async fn test_bootstrap_caches_pool_per_tenant() {
        let manager = manager();
        let first = manager.bootstrap(Tenant::new("alnoor", "Al Noor")).await.unwrap();
        let second = manager.bootstrap(Tenant::new("alnoor", "Al Noor")).await.unwrap();
        manager.bootstrap(Tenant::new("smile", "Smile")).await.unwrap();

        assert_eq!(first.database(), "tenantalnoor");
        assert_eq!(second.tenant_id(), "alnoor");
        assert_eq!(manager.active_tenants(), vec!["alnoor".to_string(), "smile".to_string()]);
    }

    #[tokio::test]
    async fn test_connection_outlives_purge() {
        let manager = manager();
        let connection = manager.bootstrap(Tenant::new("alnoor", "Al Noor")).await.unwrap();

        assert!(manager.purge("alnoor").await);
        assert!(!manager.purge("alnoor").await);
        assert!(manager.active_tenants().is_empty());
        assert_eq!(connection.tenant().name, "Al Noor");
    }

    #[tokio::test]
    async fn test_changed_database_replaces_pool() {
        let manager = manager();
        manager.bootstrap(Tenant::new("alnoor", "Al Noor")).await.unwrap();

        let mut moved = Tenant::new("alnoor", "Al Noor");
        moved.db_name = Some("alnoor_v2".to_string());
        let connection = manager.bootstrap(moved).await.unwrap();

        assert_eq!(connection.database(), "alnoor_v2");
        assert_eq!(manager.active_tenants().len(), 1);
    }
}
