// Embedded schema migrations for the central and tenant databases
use crate::error::DatabaseResult;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

pub static CENTRAL_MIGRATOR: Migrator = sqlx::migrate!("../migrations/central");
pub static TENANT_MIGRATOR: Migrator = sqlx::migrate!("../migrations/tenant");

pub async fn run_central_migrations(pool: &PgPool) -> DatabaseResult<()> {
    CENTRAL_MIGRATOR.run(pool).await?;
    info!(migrations = CENTRAL_MIGRATOR.iter().count(), "Central schema up to date");
    Ok(())
}

pub async fn run_tenant_migrations(pool: &PgPool) -> DatabaseResult<()> {
    TENANT_MIGRATOR.run(pool).await?;
    info!(migrations = TENANT_MIGRATOR.iter().count(), "Tenant schema up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_embedded_in_order() {
        let versions: Vec<i64> = TENANT_MIGRATOR.iter().map(|m| m.version).collect();
        assert!(versions.len() >= 9);
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
        assert!(CENTRAL_MIGRATOR.iter().count() >= 1);
    }
}
