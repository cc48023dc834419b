//! Query builder utilities for consistent SQL query construction
//!
//! Every list endpoint filters the same rows twice: once for the page and
//! once for the total. [`PaginatedQuery`] keeps both statements in step so
//! a filter can never apply to one and not the other.
//!
//! Column names are pushed as SQL text and must come from code, never from
//! the request; values are always bound.

use crate::types::PaginationParams;
use reporting_engine::DoctorScope;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// `asc` (any case) sorts ascending; anything else descending
    pub fn parse_or_desc(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Paginated query builder for consistent query construction
///
/// ```rust,ignore
/// let mut query = PaginatedQuery::new("p.*", "FROM patients p WHERE p.deleted_at IS NULL");
/// query
///     .filter_scope("p.doctor_id", auth.doctor_scope())
///     .filter_search(&["p.name", "p.phone"], params.search.as_deref())
///     .order_by("p.created_at", SortDirection::Desc);
///
/// let (patients, total) = query.fetch_page::<Patient>(db.pool(), &params.pagination).await?;
/// ```
pub struct PaginatedQuery {
    select: QueryBuilder<'static, Postgres>,
    count: QueryBuilder<'static, Postgres>,
    order: Option<String>,
}

impl PaginatedQuery {
    /// `from` holds the FROM clause, joins and a WHERE clause that further
    /// filters extend with `AND`
    pub fn new(columns: &str, from: &str) -> Self {
        Self {
            select: QueryBuilder::new(format!("SELECT {} {}", columns, from)),
            count: QueryBuilder::new(format!("SELECT COUNT(*) {}", from)),
            order: None,
        }
    }

    fn push_both(&mut self, sql: &str) {
        self.select.push(sql);
        self.count.push(sql);
    }

    fn bind_both<T>(&mut self, value: T)
    where
        T: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + Clone + 'static,
    {
        self.select.push_bind(value.clone());
        self.count.push_bind(value);
    }

    /// Add an equality filter (only if value is Some)
    pub fn filter_eq<T>(&mut self, column: &str, value: Option<T>) -> &mut Self
    where
        T: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + Clone + 'static,
    {
        if let Some(val) = value {
            self.push_both(&format!(" AND {} = ", column));
            self.bind_both(val);
        }
        self
    }

    /// Lower bound filter, inclusive
    pub fn filter_gte<T>(&mut self, column: &str, value: Option<T>) -> &mut Self
    where
        T: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + Clone + 'static,
    {
        if let Some(val) = value {
            self.push_both(&format!(" AND {} >= ", column));
            self.bind_both(val);
        }
        self
    }

    /// Upper bound filter, inclusive
    pub fn filter_lte<T>(&mut self, column: &str, value: Option<T>) -> &mut Self
    where
        T: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + Clone + 'static,
    {
        if let Some(val) = value {
            self.push_both(&format!(" AND {} <= ", column));
            self.bind_both(val);
        }
        self
    }

    /// Case-insensitive substring match over any of `columns`
    pub fn filter_search(&mut self, columns: &[&str], term: Option<&str>) -> &mut Self {
        let term = match term.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return self,
        };
        if columns.is_empty() {
            return self;
        }
        let pattern = format!("%{}%", term);
        self.push_both(" AND (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                self.push_both(" OR ");
            }
            self.push_both(&format!("{}::text ILIKE ", column));
            self.bind_both(pattern.clone());
        }
        self.push_both(")");
        self
    }

    /// Restrict to one doctor's rows when the caller is scoped
    pub fn filter_scope(&mut self, column: &str, scope: DoctorScope) -> &mut Self {
        self.filter_eq(column, scope.doctor_id())
    }

    /// Set ORDER BY; applied when the query is fetched
    pub fn order_by(&mut self, column: &str, direction: SortDirection) -> &mut Self {
        self.order = Some(format!("{} {}", column, direction.as_sql()));
        self
    }

    /// ORDER BY a client-chosen column, restricted to `allowed`
    pub fn order_by_allowed(
        &mut self,
        requested: Option<&str>,
        allowed: &[&str],
        default: &str,
        direction: SortDirection,
    ) -> &mut Self {
        let column = requested
            .and_then(|r| allowed.iter().find(|a| **a == r))
            .copied()
            .unwrap_or(default);
        self.order_by(column, direction)
    }

    fn push_order(&mut self) {
        if let Some(order) = self.order.take() {
            self.select.push(" ORDER BY ");
            self.select.push(order);
        }
    }

    /// SQL of the row statement, for diagnostics and tests
    pub fn select_sql(&self) -> &str {
        self.select.sql()
    }

    /// SQL of the count statement
    pub fn count_sql(&self) -> &str {
        self.count.sql()
    }

    /// Fetch one page and the total number of matching rows
    pub async fn fetch_page<T>(
        mut self,
        pool: &PgPool,
        pagination: &PaginationParams,
    ) -> Result<(Vec<T>, i64), sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let total: i64 = self.count.build().fetch_one(pool).await?.try_get(0)?;

        self.push_order();
        self.select.push(" LIMIT ");
        self.select.push_bind(pagination.limit());
        self.select.push(" OFFSET ");
        self.select.push_bind(pagination.offset());

        let rows = self.select.build_query_as::<T>().fetch_all(pool).await?;
        Ok((rows, total))
    }

    /// Fetch every matching row, for unpaginated listings
    pub async fn fetch_all<T>(mut self, pool: &PgPool) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        self.push_order();
        self.select.build_query_as::<T>().fetch_all(pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patients() -> PaginatedQuery {
        PaginatedQuery::new("p.*", "FROM patients p WHERE p.deleted_at IS NULL")
    }

    #[test]
    fn test_filters_apply_to_both_statements() {
        let mut query = patients();
        query
            .filter_eq("p.doctor_id", Some(4_i64))
            .filter_gte("p.created_at", Some(chrono::NaiveDate::MIN));
        assert_eq!(
            query.select_sql(),
            "SELECT p.* FROM patients p WHERE p.deleted_at IS NULL AND p.doctor_id = $1 AND p.created_at >= $2"
        );
        assert_eq!(
            query.count_sql(),
            "SELECT COUNT(*) FROM patients p WHERE p.deleted_at IS NULL AND p.doctor_id = $1 AND p.created_at >= $2"
        );
    }

    #[test]
    fn test_none_adds_nothing() {
        let mut query = patients();
        query
            .filter_eq("p.doctor_id", None::<i64>)
            .filter_search(&["p.name"], Some("   "))
            .filter_scope("p.doctor_id", DoctorScope::All);
        assert_eq!(query.count_sql(), "SELECT COUNT(*) FROM patients p WHERE p.deleted_at IS NULL");
    }

    #[test]
    fn test_search_spans_columns() {
        let mut query = patients();
        query.filter_search(&["p.name", "p.phone"], Some("ali"));
        assert!(query
            .select_sql()
            .ends_with("AND (p.name::text ILIKE $1 OR p.phone::text ILIKE $2)"));
    }

    #[test]
    fn test_scope_restricts_doctor() {
        let mut query = patients();
        query.filter_scope("p.doctor_id", DoctorScope::Doctor(9));
        assert!(query.count_sql().ends_with("AND p.doctor_id = $1"));
    }

    #[test]
    fn test_order_only_touches_select() {
        let mut query = patients();
        query.order_by_allowed(Some("name; DROP TABLE"), &["name", "created_at"], "created_at", SortDirection::Asc);
        query.push_order();
        assert!(query.select_sql().ends_with("ORDER BY created_at ASC"));
        assert!(!query.count_sql().contains("ORDER BY"));
    }

    #[test]
    fn test_sort_direction() {
        assert_eq!(SortDirection::parse_or_desc(Some("ASC")), SortDirection::Asc);
        assert_eq!(SortDirection::parse_or_desc(Some("sideways")), SortDirection::Desc);
        assert_eq!(SortDirection::parse_or_desc(None), SortDirection::Desc);
    }
}
