use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    #[error("Invalid database identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Tenant provisioning failed: {0}")]
    ProvisioningFailed(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationError(err.to_string())
    }
}

impl DatabaseError {
    /// Postgres unique-violation (SQLSTATE 23505)
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::SqlxError(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505")
        )
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
