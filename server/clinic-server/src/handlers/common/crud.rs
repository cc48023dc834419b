//! Shared CRUD helpers
//!
//! Clinic tables soft-delete through `deleted_at`. [`Resource`] ties a row
//! type to its table so handlers can fetch, 404 and soft-delete it without
//! repeating the same statements.

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};

use crate::error::{ApiError, ApiResult};

/// A row type stored in one soft-deleting table
pub trait Resource: for<'r> FromRow<'r, PgRow> + Send + Unpin {
    /// The database table name
    const TABLE: &'static str;
    /// Column list selected for this type
    const COLUMNS: &'static str;
    /// Name used in "... not found" messages
    const NAME: &'static str;
}

/// Lookup tables without `deleted_at`
fn has_soft_delete(table: &str) -> bool {
    !matches!(table, "statuses" | "from_where_comes")
}

fn live_clause(table: &str) -> &'static str {
    if has_soft_delete(table) {
        " AND deleted_at IS NULL"
    } else {
        ""
    }
}

/// Fetch a live row by id
pub async fn find_live<T: Resource>(pool: &PgPool, id: i64) -> Result<Option<T>, sqlx::Error> {
    sqlx::query_as::<_, T>(&format!(
        "SELECT {} FROM {} WHERE id = $1{}",
        T::COLUMNS,
        T::TABLE,
        live_clause(T::TABLE)
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Fetch a live row by id or fail with `404 <NAME> not found`
pub async fn get_live<T: Resource>(pool: &PgPool, id: i64) -> ApiResult<T> {
    find_live::<T>(pool, id).await?.ok_or_else(|| ApiError::not_found(T::NAME))
}

/// Soft delete a row; `404` when it does not exist or is already deleted
pub async fn soft_delete<T: Resource>(pool: &PgPool, id: i64) -> ApiResult<()> {
    let rows_affected = sqlx::query(&format!(
        "UPDATE {} SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        T::TABLE
    ))
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();

    if rows_affected == 0 {
        Err(ApiError::not_found(T::NAME))
    } else {
        Ok(())
    }
}

/// Whether `table` holds a live row with `id`
pub async fn exists_live(pool: &PgPool, table: &str, id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(&format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1{})",
        table,
        live_clause(table)
    ))
    .bind(id)
    .fetch_one(pool)
    .await
}

/// Reject a foreign key that points nowhere with a `422` on `field`
pub async fn require_exists(pool: &PgPool, table: &str, id: i64, field: &str, message: &str) -> ApiResult<()> {
    if exists_live(pool, table, id).await? {
        Ok(())
    } else {
        Err(ApiError::field(field, message))
    }
}

/// Optional variant of [`require_exists`]
pub async fn require_optional(
    pool: &PgPool,
    table: &str,
    id: Option<i64>,
    field: &str,
    message: &str,
) -> ApiResult<()> {
    match id {
        Some(id) => require_exists(pool, table, id, field, message).await,
        None => Ok(()),
    }
}

/// Reject a value another live row of `table` already holds in `column`
pub async fn require_unique(
    pool: &PgPool,
    table: &str,
    column: &str,
    value: &str,
    except_id: Option<i64>,
    message: &str,
) -> ApiResult<()> {
    let taken: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS (SELECT 1 FROM {table} WHERE {column} = $1 AND ($2::BIGINT IS NULL OR id <> $2){})",
        live_clause(table)
    ))
    .bind(value)
    .bind(except_id)
    .fetch_one(pool)
    .await?;

    if taken {
        Err(ApiError::field(column, message))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_tables_have_no_soft_delete() {
        assert_eq!(live_clause("statuses"), "");
        assert_eq!(live_clause("from_where_comes"), "");
        assert_eq!(live_clause("patients"), " AND deleted_at IS NULL");
    }
}
