// Central database connection management
use crate::error::{DatabaseError, DatabaseResult};
use config_engine::DatabaseSettings;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Connection options for `database` on the central server
pub fn connect_options(settings: &DatabaseSettings, database: &str) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.username)
        .password(settings.password())
        .database(database)
}

/// Pool for the central (landlord) database: tenants, domains, clinics, users
#[derive(Clone)]
pub struct DatabasePool {
    pool: Arc<PgPool>,
}

impl DatabasePool {
    /// Connect eagerly, failing fast when the central database is unreachable
    pub async fn connect(settings: &DatabaseSettings) -> DatabaseResult<Self> {
        let pool = Self::pool_options(settings)
            .connect_with(connect_options(settings, &settings.database))
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        info!(url = %settings.masked_url(), "Central database pool created");

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Build the pool without opening a connection; the first query connects
    pub fn connect_lazy(settings: &DatabaseSettings) -> Self {
        let pool = Self::pool_options(settings)
            .connect_lazy_with(connect_options(settings, &settings.database));
        Self { pool: Arc::new(pool) }
    }

    fn pool_options(settings: &DatabaseSettings) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
    }

    /// Get the underlying PgPool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the pool is healthy
    pub async fn is_healthy(&self) -> bool {
        match sqlx::query("SELECT 1").fetch_one(self.pool.as_ref()).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Database health check failed: {}", e);
                false
            }
        }
    }

    /// Close the pool
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Central database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lazy_pool_does_not_connect() {
        let settings = DatabaseSettings {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..DatabaseSettings::default()
        };
        let pool = DatabasePool::connect_lazy(&settings);
        assert_eq!(pool.pool().size(), 0);
    }
}
