//! Clinic expenses and their categories.
//!
//! An expense line costs `COALESCE(quantity, 1) * price`; statistics use
//! the same formula as the financial reports.

use axum::{
    extract::Path,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::error::{api_message, ApiError, ApiResponse};
use crate::handlers::common::crud::{self, Resource};
use crate::middleware::{AuthContext, TenantDb};
use crate::types::de::{optional_bool, optional_date, optional_number};
use crate::types::{PaginationParams, Query};
use crate::utils::query_builder::{PaginatedQuery, SortDirection};
use crate::validation::RequestValidation;
use crate::{validate_field, validate_length};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ExpenseCategory {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const CATEGORY_COLUMNS: &str = "id, name, description, is_active, created_at, updated_at";

impl Resource for ExpenseCategory {
    const TABLE: &'static str = "clinic_expense_categories";
    const COLUMNS: &'static str = CATEGORY_COLUMNS;
    const NAME: &'static str = "Expense category";
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Expense {
    pub id: i64,
    pub name: String,
    pub quantity: Option<i64>,
    pub clinic_expense_category_id: Option<i64>,
    pub date: NaiveDate,
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub is_paid: bool,
    pub doctor_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const EXPENSE_COLUMNS: &str =
    "id, name, quantity, clinic_expense_category_id, date, price, is_paid, doctor_id, created_at, updated_at";

impl Resource for Expense {
    const TABLE: &'static str = "clinic_expenses";
    const COLUMNS: &'static str = EXPENSE_COLUMNS;
    const NAME: &'static str = "Expense";
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ExpenseStatistics {
    #[schema(value_type = f64)]
    pub total_expenses: Decimal,
    #[schema(value_type = f64)]
    pub paid_expenses: Decimal,
    #[schema(value_type = f64)]
    pub unpaid_expenses: Decimal,
    pub total_count: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListCategoriesParams {
    pub search: Option<String>,
    #[serde(default, deserialize_with = "optional_bool")]
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListExpensesParams {
    pub search: Option<String>,
    #[serde(default, deserialize_with = "optional_number")]
    pub clinic_expense_category_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub doctor_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_bool")]
    pub is_paid: Option<bool>,
    #[serde(default, deserialize_with = "optional_date")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_date")]
    pub date_to: Option<NaiveDate>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DateRangeParams {
    #[serde(default, deserialize_with = "optional_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExpenseStatisticsParams {
    #[serde(default, deserialize_with = "optional_date")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_date")]
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UnpaidExpensesParams {
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ExpenseCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl RequestValidation for ExpenseCategoryRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            validate_length!(name, 1, 255, "The name may not be greater than 255 characters.");
        }
        if let Some(description) = &self.description {
            validate_field!(
                description,
                description.chars().count() <= 1000,
                "The description may not be greater than 1000 characters."
            );
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ExpenseRequest {
    pub name: Option<String>,
    pub quantity: Option<i64>,
    /// Expense category id
    #[serde(alias = "category")]
    pub clinic_expense_category_id: Option<i64>,
    pub date: Option<NaiveDate>,
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
    pub is_paid: Option<bool>,
    pub doctor_id: Option<i64>,
}

impl RequestValidation for ExpenseRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            validate_length!(name, 1, 255, "The name may not be greater than 255 characters.");
        }
        if let Some(quantity) = self.quantity {
            validate_field!(quantity, quantity >= 1, "The quantity must be at least 1.");
        }
        if let Some(price) = self.price {
            validate_field!(price, price >= Decimal::ZERO, "The price must be at least 0.");
        }
        Ok(())
    }
}

impl ExpenseRequest {
    fn validate_create(&self) -> Result<(), ApiError> {
        self.validate()?;
        if self.name.as_deref().map(str::trim).unwrap_or_default().is_empty() {
            return Err(ApiError::field("name", "The name field is required."));
        }
        if self.date.is_none() {
            return Err(ApiError::field("date", "The date field is required."));
        }
        if self.price.is_none() {
            return Err(ApiError::field("price", "The price field is required."));
        }
        Ok(())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn require_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let start = start.ok_or_else(|| ApiError::field("start_date", "The start date field is required."))?;
    let end = end.ok_or_else(|| ApiError::field("end_date", "The end date field is required."))?;
    if end < start {
        return Err(ApiError::field(
            "end_date",
            "The end date must be a date after or equal to start date.",
        ));
    }
    Ok((start, end))
}

async fn check_references(db: &TenantDb, category_id: Option<i64>, doctor_id: Option<i64>) -> Result<(), ApiError> {
    let pool = db.pool();
    crud::require_optional(
        pool,
        "clinic_expense_categories",
        category_id,
        "clinic_expense_category_id",
        "The selected category is invalid.",
    )
    .await?;
    crud::require_optional(pool, "users", doctor_id, "doctor_id", "The selected doctor id is invalid.").await
}

async fn set_paid(db: &TenantDb, id: i64, is_paid: bool) -> Result<Expense, ApiError> {
    crud::get_live::<Expense>(db.pool(), id).await?;
    let expense = sqlx::query_as::<_, Expense>(&format!(
        "UPDATE clinic_expenses SET is_paid = $2, updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL RETURNING {EXPENSE_COLUMNS}"
    ))
    .bind(id)
    .bind(is_paid)
    .fetch_one(db.pool())
    .await?;
    Ok(expense)
}

// ============================================================================
// EXPENSE CATEGORY HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/clinic-expense-categories",
    params(ListCategoriesParams),
    responses((status = 200, description = "Expense categories retrieved successfully", body = Vec<ExpenseCategory>)),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn list_expense_categories(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ListCategoriesParams>,
) -> Result<Json<ApiResponse<Vec<ExpenseCategory>>>, ApiError> {
    auth.require_permission("view-clinic-expenses")?;

    let mut query = PaginatedQuery::new(CATEGORY_COLUMNS, "FROM clinic_expense_categories WHERE deleted_at IS NULL");
    query
        .filter_eq("is_active", params.is_active)
        .filter_search(&["name", "description"], params.search.as_deref())
        .order_by("name", SortDirection::Asc);

    let (categories, total) = query.fetch_page::<ExpenseCategory>(db.pool(), &params.pagination).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(categories, total)
            .with_message("Expense categories retrieved successfully"),
    ))
}

#[utoipa::path(
    get,
    path = "/api/clinic-expense-categories-active",
    responses((status = 200, description = "Active expense categories retrieved successfully", body = Vec<ExpenseCategory>)),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn active_expense_categories(
    db: TenantDb,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<ExpenseCategory>>>, ApiError> {
    auth.require_permission("view-clinic-expenses")?;

    let categories = sqlx::query_as::<_, ExpenseCategory>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM clinic_expense_categories \
         WHERE deleted_at IS NULL AND is_active ORDER BY name"
    ))
    .fetch_all(db.pool())
    .await?;
    Ok(Json(api_message(categories, "Active expense categories retrieved successfully")))
}

#[utoipa::path(
    post,
    path = "/api/clinic-expense-categories",
    request_body = ExpenseCategoryRequest,
    responses(
        (status = 201, description = "Expense category created successfully", body = ExpenseCategory),
        (status = 422, description = "Validation failed")
    ),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn create_expense_category(
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<ExpenseCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ExpenseCategory>>), ApiError> {
    auth.require_permission("create-expense")?;
    req.validate()?;
    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    validate_field!(name, !name.is_empty(), "The name field is required.");

    let category = sqlx::query_as::<_, ExpenseCategory>(&format!(
        "INSERT INTO clinic_expense_categories (name, description, is_active) VALUES ($1, $2, $3) \
         RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(name)
    .bind(&req.description)
    .bind(req.is_active.unwrap_or(true))
    .fetch_one(db.pool())
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(api_message(category, "Expense category created successfully")),
    ))
}

#[utoipa::path(
    get,
    path = "/api/clinic-expense-categories/{id}",
    params(("id" = i64, Path, description = "Expense category ID")),
    responses(
        (status = 200, description = "Expense category retrieved successfully", body = ExpenseCategory),
        (status = 404, description = "Expense category not found")
    ),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn get_expense_category(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ExpenseCategory>>, ApiError> {
    auth.require_permission("view-clinic-expenses")?;
    let category = crud::get_live::<ExpenseCategory>(db.pool(), id).await?;
    Ok(Json(api_message(category, "Expense category retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/clinic-expense-categories/{id}",
    params(("id" = i64, Path, description = "Expense category ID")),
    request_body = ExpenseCategoryRequest,
    responses(
        (status = 200, description = "Expense category updated successfully", body = ExpenseCategory),
        (status = 404, description = "Expense category not found")
    ),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn update_expense_category(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<ExpenseCategoryRequest>,
) -> Result<Json<ApiResponse<ExpenseCategory>>, ApiError> {
    auth.require_permission("edit-expense")?;
    req.validate()?;
    let current = crud::get_live::<ExpenseCategory>(db.pool(), id).await?;

    let category = sqlx::query_as::<_, ExpenseCategory>(&format!(
        "UPDATE clinic_expense_categories SET name = $2, description = $3, is_active = $4, updated_at = NOW() \
         WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(id)
    .bind(req.name.as_deref().map(str::trim).unwrap_or(current.name.as_str()))
    .bind(req.description.or(current.description))
    .bind(req.is_active.unwrap_or(current.is_active))
    .fetch_one(db.pool())
    .await?;

    Ok(Json(api_message(category, "Expense category updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/clinic-expense-categories/{id}",
    params(("id" = i64, Path, description = "Expense category ID")),
    responses(
        (status = 200, description = "Expense category deleted successfully"),
        (status = 404, description = "Expense category not found")
    ),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn delete_expense_category(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_permission("delete-expense")?;
    crud::soft_delete::<ExpenseCategory>(db.pool(), id).await?;
    Ok(Json(api_message((), "Expense category deleted successfully")))
}

// ============================================================================
// EXPENSE HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/clinic-expenses",
    params(ListExpensesParams),
    responses((status = 200, description = "Expenses retrieved successfully", body = Vec<Expense>)),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn list_expenses(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ListExpensesParams>,
) -> Result<Json<ApiResponse<Vec<Expense>>>, ApiError> {
    auth.require_permission("view-clinic-expenses")?;

    let mut query = PaginatedQuery::new(EXPENSE_COLUMNS, "FROM clinic_expenses WHERE deleted_at IS NULL");
    query
        .filter_eq("clinic_expense_category_id", params.clinic_expense_category_id)
        .filter_eq("doctor_id", params.doctor_id)
        .filter_eq("is_paid", params.is_paid)
        .filter_gte("date", params.date_from)
        .filter_lte("date", params.date_to)
        .filter_search(&["name"], params.search.as_deref())
        .order_by_allowed(
            params.sort_by.as_deref(),
            &["id", "name", "date", "price", "created_at"],
            "date",
            SortDirection::parse_or_desc(params.sort_direction.as_deref()),
        );

    let (expenses, total) = query.fetch_page::<Expense>(db.pool(), &params.pagination).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(expenses, total)
            .with_message("Expenses retrieved successfully"),
    ))
}

#[utoipa::path(
    post,
    path = "/api/clinic-expenses",
    request_body = ExpenseRequest,
    responses(
        (status = 201, description = "Expense created successfully", body = Expense),
        (status = 422, description = "Validation failed")
    ),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn create_expense(
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<ExpenseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Expense>>), ApiError> {
    auth.require_permission("create-expense")?;
    req.validate_create()?;
    check_references(&db, req.clinic_expense_category_id, req.doctor_id).await?;

    let expense = sqlx::query_as::<_, Expense>(&format!(
        r#"
        INSERT INTO clinic_expenses (name, quantity, clinic_expense_category_id, date, price, is_paid, doctor_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {EXPENSE_COLUMNS}
        "#
    ))
    .bind(req.name.as_deref().map(str::trim))
    .bind(req.quantity)
    .bind(req.clinic_expense_category_id)
    .bind(req.date)
    .bind(req.price)
    .bind(req.is_paid.unwrap_or(false))
    .bind(req.doctor_id)
    .fetch_one(db.pool())
    .await?;

    Ok((StatusCode::CREATED, Json(api_message(expense, "Expense created successfully"))))
}

#[utoipa::path(
    get,
    path = "/api/clinic-expenses/{id}",
    params(("id" = i64, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense retrieved successfully", body = Expense),
        (status = 404, description = "Expense not found")
    ),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn get_expense(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Expense>>, ApiError> {
    auth.require_permission("view-clinic-expenses")?;
    let expense = crud::get_live::<Expense>(db.pool(), id).await?;
    Ok(Json(api_message(expense, "Expense retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/clinic-expenses/{id}",
    params(("id" = i64, Path, description = "Expense ID")),
    request_body = ExpenseRequest,
    responses(
        (status = 200, description = "Expense updated successfully", body = Expense),
        (status = 404, description = "Expense not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn update_expense(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<ExpenseRequest>,
) -> Result<Json<ApiResponse<Expense>>, ApiError> {
    auth.require_permission("edit-expense")?;
    req.validate()?;
    let current = crud::get_live::<Expense>(db.pool(), id).await?;
    check_references(&db, req.clinic_expense_category_id, req.doctor_id).await?;

    let expense = sqlx::query_as::<_, Expense>(&format!(
        r#"
        UPDATE clinic_expenses SET
            name = $2, quantity = $3, clinic_expense_category_id = $4, date = $5, price = $6,
            is_paid = $7, doctor_id = $8, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {EXPENSE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(req.name.as_deref().map(str::trim).unwrap_or(current.name.as_str()))
    .bind(req.quantity.or(current.quantity))
    .bind(req.clinic_expense_category_id.or(current.clinic_expense_category_id))
    .bind(req.date.unwrap_or(current.date))
    .bind(req.price.unwrap_or(current.price))
    .bind(req.is_paid.unwrap_or(current.is_paid))
    .bind(req.doctor_id.or(current.doctor_id))
    .fetch_one(db.pool())
    .await?;

    Ok(Json(api_message(expense, "Expense updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/clinic-expenses/{id}",
    params(("id" = i64, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense deleted successfully"),
        (status = 404, description = "Expense not found")
    ),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn delete_expense(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_permission("delete-expense")?;
    crud::soft_delete::<Expense>(db.pool(), id).await?;
    Ok(Json(api_message((), "Expense deleted successfully")))
}

#[utoipa::path(
    patch,
    path = "/api/clinic-expenses/{id}/mark-paid",
    params(("id" = i64, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense marked as paid", body = Expense),
        (status = 404, description = "Expense not found")
    ),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn mark_expense_paid(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Expense>>, ApiError> {
    auth.require_permission("edit-expense")?;
    let expense = set_paid(&db, id, true).await?;
    Ok(Json(api_message(expense, "Expense marked as paid")))
}

#[utoipa::path(
    patch,
    path = "/api/clinic-expenses/{id}/mark-unpaid",
    params(("id" = i64, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense marked as unpaid", body = Expense),
        (status = 404, description = "Expense not found")
    ),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn mark_expense_unpaid(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Expense>>, ApiError> {
    auth.require_permission("edit-expense")?;
    let expense = set_paid(&db, id, false).await?;
    Ok(Json(api_message(expense, "Expense marked as unpaid")))
}

#[utoipa::path(
    get,
    path = "/api/clinic-expenses-statistics",
    params(ExpenseStatisticsParams),
    responses((status = 200, description = "Expense statistics retrieved successfully", body = ExpenseStatistics)),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn expense_statistics(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ExpenseStatisticsParams>,
) -> Result<Json<ApiResponse<ExpenseStatistics>>, ApiError> {
    auth.require_permission("view-clinic-expenses")?;

    let (total, paid, unpaid, count): (Decimal, Decimal, Decimal, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(COALESCE(quantity, 1) * price), 0),
            COALESCE(SUM(COALESCE(quantity, 1) * price) FILTER (WHERE is_paid), 0),
            COALESCE(SUM(COALESCE(quantity, 1) * price) FILTER (WHERE NOT is_paid), 0),
            COUNT(*)
        FROM clinic_expenses
        WHERE deleted_at IS NULL
          AND ($1::DATE IS NULL OR date >= $1)
          AND ($2::DATE IS NULL OR date <= $2)
        "#,
    )
    .bind(params.date_from)
    .bind(params.date_to)
    .fetch_one(db.pool())
    .await?;

    let statistics = ExpenseStatistics {
        total_expenses: total.round_dp(2),
        paid_expenses: paid.round_dp(2),
        unpaid_expenses: unpaid.round_dp(2),
        total_count: count,
    };
    Ok(Json(api_message(statistics, "Expense statistics retrieved successfully")))
}

#[utoipa::path(
    get,
    path = "/api/clinic-expenses-unpaid",
    params(UnpaidExpensesParams),
    responses((status = 200, description = "Unpaid expenses retrieved successfully", body = Vec<Expense>)),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn unpaid_expenses(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<UnpaidExpensesParams>,
) -> Result<Json<ApiResponse<Vec<Expense>>>, ApiError> {
    auth.require_permission("view-clinic-expenses")?;

    let mut query = PaginatedQuery::new(EXPENSE_COLUMNS, "FROM clinic_expenses WHERE deleted_at IS NULL");
    query
        .filter_eq("is_paid", Some(false))
        .order_by("date", SortDirection::Desc);

    let (expenses, total) = query.fetch_page::<Expense>(db.pool(), &params.pagination).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(expenses, total)
            .with_message("Unpaid expenses retrieved successfully"),
    ))
}

#[utoipa::path(
    get,
    path = "/api/clinic-expenses-by-date-range",
    params(DateRangeParams),
    responses(
        (status = 200, description = "Expenses retrieved successfully", body = Vec<Expense>),
        (status = 422, description = "Missing or inverted date range")
    ),
    tag = "expenses",
    security(("bearer_auth" = []))
)]
pub async fn expenses_by_date_range(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<DateRangeParams>,
) -> Result<Json<ApiResponse<Vec<Expense>>>, ApiError> {
    auth.require_permission("view-clinic-expenses")?;
    let (start, end) = require_date_range(params.start_date, params.end_date)?;

    let mut query = PaginatedQuery::new(EXPENSE_COLUMNS, "FROM clinic_expenses WHERE deleted_at IS NULL");
    query
        .filter_gte("date", Some(start))
        .filter_lte("date", Some(end))
        .order_by("date", SortDirection::Desc);

    let (expenses, total) = query.fetch_page::<Expense>(db.pool(), &params.pagination).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(expenses, total)
            .with_message("Expenses retrieved successfully"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_date_range_requires_both_ends_in_order() {
        assert!(require_date_range(None, Some(date("2024-01-01"))).is_err());
        assert!(require_date_range(Some(date("2024-01-01")), None).is_err());

        let err = require_date_range(Some(date("2024-02-01")), Some(date("2024-01-01"))).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let (start, end) = require_date_range(Some(date("2024-01-01")), Some(date("2024-01-01"))).unwrap();
        assert_eq!(start, end);
    }

    #[test]
    fn test_expense_request_rules() {
        let req = ExpenseRequest {
            name: Some("Gloves".to_string()),
            date: Some(date("2024-03-01")),
            price: Some(Decimal::new(1250, 2)),
            quantity: Some(0),
            ..Default::default()
        };
        assert!(req.validate_create().is_err());

        let req = ExpenseRequest {
            quantity: Some(3),
            price: Some(Decimal::new(-1, 0)),
            ..Default::default()
        };
        assert!(req.validate().is_err());

        let req = ExpenseRequest {
            name: Some("Gloves".to_string()),
            date: Some(date("2024-03-01")),
            price: Some(Decimal::new(1250, 2)),
            ..Default::default()
        };
        assert!(req.validate_create().is_ok());
    }

    #[test]
    fn test_category_field_alias() {
        let req: ExpenseRequest = serde_json::from_str(r#"{"name":"Rent","category":4}"#).unwrap();
        assert_eq!(req.clinic_expense_category_id, Some(4));
    }
}
