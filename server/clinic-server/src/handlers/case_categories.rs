use axum::{
    extract::Path,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::error::{api_message, ApiError, ApiResponse};
use crate::handlers::common::crud::{self, Resource};
use crate::middleware::{AuthContext, TenantDb};
use crate::types::{PaginationParams, Query};
use crate::utils::query_builder::{PaginatedQuery, SortDirection};
use crate::validation::RequestValidation;
use crate::{validate_field, validate_length, validate_present};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CaseCategory {
    pub id: i64,
    pub name: String,
    #[sqlx(rename = "sort_order")]
    pub order: i32,
    pub item_cost: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const CATEGORY_COLUMNS: &str = "id, name, sort_order, item_cost, created_at, updated_at";

impl Resource for CaseCategory {
    const TABLE: &'static str = "case_categories";
    const COLUMNS: &'static str = CATEGORY_COLUMNS;
    const NAME: &'static str = "Case category";
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListCategoriesParams {
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CaseCategoryRequest {
    pub name: Option<String>,
    pub order: Option<i32>,
    pub item_cost: Option<i64>,
}

impl RequestValidation for CaseCategoryRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_present!(self.name, "The name field is required.");
        if let Some(name) = &self.name {
            validate_length!(name, 1, 255, "The name may not be greater than 255 characters.");
        }
        if let Some(order) = self.order {
            validate_field!(order, order >= 0, "The order must be at least 0.");
        }
        if let Some(item_cost) = self.item_cost {
            validate_field!(item_cost, item_cost >= 0, "The item cost must be at least 0.");
        }
        Ok(())
    }
}

// ============================================================================
// API HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/case-categories",
    params(ListCategoriesParams),
    responses((status = 200, description = "Case categories retrieved successfully", body = Vec<CaseCategory>)),
    tag = "case-categories",
    security(("bearer_auth" = []))
)]
pub async fn list_case_categories(
    db: TenantDb,
    _auth: AuthContext,
    Query(params): Query<ListCategoriesParams>,
) -> Result<Json<ApiResponse<Vec<CaseCategory>>>, ApiError> {
    let mut query = PaginatedQuery::new(CATEGORY_COLUMNS, "FROM case_categories WHERE deleted_at IS NULL");
    query
        .filter_search(&["name"], params.search.as_deref())
        .order_by("sort_order", SortDirection::Asc);

    let (categories, total) = query.fetch_page::<CaseCategory>(db.pool(), &params.pagination).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(categories, total)
            .with_message("Case categories retrieved successfully"),
    ))
}

#[utoipa::path(
    post,
    path = "/api/case-categories",
    request_body = CaseCategoryRequest,
    responses(
        (status = 201, description = "Case category created successfully", body = CaseCategory),
        (status = 422, description = "Validation failed")
    ),
    tag = "case-categories",
    security(("bearer_auth" = []))
)]
pub async fn create_case_category(
    db: TenantDb,
    _auth: AuthContext,
    Json(req): Json<CaseCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CaseCategory>>), ApiError> {
    req.validate()?;
    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    validate_field!(name, !name.is_empty(), "The name field is required.");

    let category = sqlx::query_as::<_, CaseCategory>(&format!(
        "INSERT INTO case_categories (name, sort_order, item_cost) VALUES ($1, $2, $3) RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(name)
    .bind(req.order.unwrap_or(0))
    .bind(req.item_cost.unwrap_or(0))
    .fetch_one(db.pool())
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(api_message(category, "Case category created successfully")),
    ))
}

#[utoipa::path(
    get,
    path = "/api/case-categories/{id}",
    params(("id" = i64, Path, description = "Case category ID")),
    responses(
        (status = 200, description = "Case category retrieved successfully", body = CaseCategory),
        (status = 404, description = "Case category not found")
    ),
    tag = "case-categories",
    security(("bearer_auth" = []))
)]
pub async fn get_case_category(
    db: TenantDb,
    _auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<CaseCategory>>, ApiError> {
    let category = crud::get_live::<CaseCategory>(db.pool(), id).await?;
    Ok(Json(api_message(category, "Case category retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/case-categories/{id}",
    params(("id" = i64, Path, description = "Case category ID")),
    request_body = CaseCategoryRequest,
    responses(
        (status = 200, description = "Case category updated successfully", body = CaseCategory),
        (status = 404, description = "Case category not found")
    ),
    tag = "case-categories",
    security(("bearer_auth" = []))
)]
pub async fn update_case_category(
    db: TenantDb,
    _auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<CaseCategoryRequest>,
) -> Result<Json<ApiResponse<CaseCategory>>, ApiError> {
    req.validate()?;
    let current = crud::get_live::<CaseCategory>(db.pool(), id).await?;

    let category = sqlx::query_as::<_, CaseCategory>(&format!(
        "UPDATE case_categories SET name = $2, sort_order = $3, item_cost = $4, updated_at = NOW() \
         WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(id)
    .bind(req.name.as_deref().map(str::trim).unwrap_or(current.name.as_str()))
    .bind(req.order.unwrap_or(current.order))
    .bind(req.item_cost.unwrap_or(current.item_cost))
    .fetch_one(db.pool())
    .await?;

    Ok(Json(api_message(category, "Case category updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/case-categories/{id}",
    params(("id" = i64, Path, description = "Case category ID")),
    responses(
        (status = 200, description = "Case category deleted successfully"),
        (status = 404, description = "Case category not found")
    ),
    tag = "case-categories",
    security(("bearer_auth" = []))
)]
pub async fn delete_case_category(
    db: TenantDb,
    _auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    crud::soft_delete::<CaseCategory>(db.pool(), id).await?;
    Ok(Json(api_message((), "Case category deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_values_rejected() {
        let req = CaseCategoryRequest {
            name: Some("Crown".to_string()),
            order: Some(-1),
            item_cost: None,
        };
        assert!(req.validate().is_err());

        let req = CaseCategoryRequest {
            name: Some("Crown".to_string()),
            order: Some(2),
            item_cost: Some(-5),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_order_serializes_under_its_api_name() {
        let category = CaseCategory {
            id: 1,
            name: "Crown".to_string(),
            order: 3,
            item_cost: 25000,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&category).unwrap();
        assert_eq!(json["order"], 3);
    }
}
