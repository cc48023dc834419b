//! Database access for the clinic engine.
//!
//! One central database holds the tenant registry and the cross-clinic user
//! directory; every clinic (tenant) has its own database with an identical
//! schema. This crate provides:
//!
//! - [`DatabasePool`] for the central database
//! - [`TenantDirectory`] to look tenants up
//! - [`TenantConnectionResolver`] to derive a tenant's database name and credentials
//! - [`TenantPoolManager`] to hand each request a [`TenantConnection`]
//! - [`TenantDatabaseManager`] to create and drop tenant databases
//! - embedded migrations and default seed data
//!
//! # Example
//!
//! ```rust,no_run
//! use config_engine::AppConfig;
//! use database_layer::{Tenant, TenantConnectionResolver, TenantPoolManager};
//!
//! # async fn run(config: AppConfig) -> database_layer::DatabaseResult<()> {
//! let resolver = TenantConnectionResolver::new(
//!     config.database.clone(),
//!     config.tenancy.clone(),
//!     config.server.environment,
//! );
//! let pools = TenantPoolManager::new(resolver);
//!
//! let connection = pools.bootstrap(Tenant::new("alnoor", "Al Noor Dental")).await?;
//! let patients: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patients")
//!     .fetch_one(connection.pool())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod manager;
pub mod migrate;
pub mod pool_manager;
pub mod seed;
pub mod tenancy;
pub mod tenant;

pub use connection::DatabasePool;
pub use error::*;
pub use manager::TenantDatabaseManager;
pub use pool_manager::{TenantConnection, TenantPoolManager};
pub use tenancy::{validate_identifier, TenantConnectionConfig, TenantConnectionResolver};
pub use tenant::{Domain, NewTenant, PgTenantDirectory, StaticTenantDirectory, Tenant, TenantChanges, TenantDirectory};
