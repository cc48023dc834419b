use axum::{
    extract::Path,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};

use crate::error::{api_message, ApiError, ApiResponse};
use crate::handlers::common::crud;
use crate::middleware::{AuthContext, TenantDb};
use crate::types::de::optional_number;
use crate::types::{PaginationParams, Query};
use crate::utils::query_builder::{PaginatedQuery, SortDirection};
use crate::validation::RequestValidation;
use crate::{validate_field, validate_length, validate_required};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, FromRow)]
struct RecipeRow {
    id: i64,
    patient_id: Option<i64>,
    doctors_id: i64,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const RECIPE_COLUMNS: &str = "id, patient_id, doctors_id, notes, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RecipeItem {
    pub id: i64,
    pub recipes_id: Option<i64>,
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

/// A prescription with its items
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Recipe {
    pub id: i64,
    pub patient_id: Option<i64>,
    pub doctors_id: i64,
    pub notes: Option<String>,
    pub items: Vec<RecipeItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListRecipesParams {
    #[serde(default, deserialize_with = "optional_number")]
    pub patient_id: Option<i64>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RecipeItemInput {
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RecipeRequest {
    pub patient_id: Option<i64>,
    pub notes: Option<String>,
    /// Replaces every existing item when present
    pub items: Option<Vec<RecipeItemInput>>,
}

impl RequestValidation for RecipeRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(notes) = &self.notes {
            validate_field!(notes, notes.chars().count() <= 5000, "The notes may not be greater than 5000 characters.");
        }
        for item in self.items.iter().flatten() {
            validate_required!(item.name, "The items.*.name field is required.");
            validate_length!(item.name, 1, 255, "The items.*.name may not be greater than 255 characters.");
        }
        Ok(())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Recipes every caller may see: all for `view-all-recipes`, their own for
/// `view-own-recipes`, none otherwise
fn recipe_owner_filter(auth: &AuthContext) -> Result<Option<i64>, ApiError> {
    if auth.has_permission("view-all-recipes") {
        Ok(None)
    } else if auth.has_permission("view-own-recipes") {
        Ok(Some(auth.user_id))
    } else {
        Err(ApiError::authorization("Unauthorized"))
    }
}

async fn items_of(pool: &PgPool, recipe_ids: &[i64]) -> Result<Vec<RecipeItem>, sqlx::Error> {
    sqlx::query_as::<_, RecipeItem>(
        r#"
        SELECT id, recipes_id, name, dosage, frequency, duration, instructions
        FROM recipe_items
        WHERE recipes_id = ANY($1) AND deleted_at IS NULL
        ORDER BY id
        "#,
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
}

async fn with_items(pool: &PgPool, rows: Vec<RecipeRow>) -> Result<Vec<Recipe>, sqlx::Error> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut by_recipe: HashMap<i64, Vec<RecipeItem>> = HashMap::new();
    for item in items_of(pool, &ids).await? {
        if let Some(recipe_id) = item.recipes_id {
            by_recipe.entry(recipe_id).or_default().push(item);
        }
    }
    Ok(rows
        .into_iter()
        .map(|row| Recipe {
            items: by_recipe.remove(&row.id).unwrap_or_default(),
            id: row.id,
            patient_id: row.patient_id,
            doctors_id: row.doctors_id,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect())
}

/// Live recipe the caller may access: 404 when missing, 403 when it is
/// another doctor's
async fn accessible_recipe(db: &TenantDb, auth: &AuthContext, id: i64) -> Result<RecipeRow, ApiError> {
    let owner = recipe_owner_filter(auth)?;
    let row = sqlx::query_as::<_, RecipeRow>(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(db.pool())
    .await?
    .ok_or_else(|| ApiError::not_found("Recipe"))?;

    match owner {
        Some(user_id) if row.doctors_id != user_id => Err(ApiError::authorization("Unauthorized")),
        _ => Ok(row),
    }
}

async fn replace_items(conn: &mut PgConnection, recipe_id: i64, items: &[RecipeItemInput]) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE recipe_items SET deleted_at = NOW() WHERE recipes_id = $1 AND deleted_at IS NULL")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO recipe_items (recipes_id, name, dosage, frequency, duration, instructions)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(recipe_id)
        .bind(item.name.trim())
        .bind(&item.dosage)
        .bind(&item.frequency)
        .bind(&item.duration)
        .bind(&item.instructions)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn load_recipe(pool: &PgPool, id: i64) -> Result<Recipe, ApiError> {
    let row = sqlx::query_as::<_, RecipeRow>(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Recipe"))?;
    with_items(pool, vec![row])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("Recipe"))
}

// ============================================================================
// API HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/recipes",
    params(ListRecipesParams),
    responses(
        (status = 200, description = "Recipes retrieved successfully", body = Vec<Recipe>),
        (status = 403, description = "Unauthorized")
    ),
    tag = "recipes",
    security(("bearer_auth" = []))
)]
pub async fn list_recipes(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ListRecipesParams>,
) -> Result<Json<ApiResponse<Vec<Recipe>>>, ApiError> {
    let owner = recipe_owner_filter(&auth)?;

    let mut query = PaginatedQuery::new(RECIPE_COLUMNS, "FROM recipes WHERE deleted_at IS NULL");
    query
        .filter_eq("doctors_id", owner)
        .filter_eq("patient_id", params.patient_id)
        .order_by("created_at", SortDirection::Desc);

    let (rows, total) = query.fetch_page::<RecipeRow>(db.pool(), &params.pagination).await?;
    let recipes = with_items(db.pool(), rows).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(recipes, total)
            .with_message("Recipes retrieved successfully"),
    ))
}

#[utoipa::path(
    post,
    path = "/api/recipes",
    request_body = RecipeRequest,
    responses(
        (status = 201, description = "Recipe created successfully", body = Recipe),
        (status = 422, description = "Validation failed")
    ),
    tag = "recipes",
    security(("bearer_auth" = []))
)]
pub async fn create_recipe(
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<RecipeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Recipe>>), ApiError> {
    auth.require_permission("create-recipe")?;
    req.validate()?;
    crud::require_optional(db.pool(), "patients", req.patient_id, "patient_id", "The selected patient id is invalid.")
        .await?;

    let mut tx = db.pool().begin().await?;
    let recipe_id: i64 = sqlx::query_scalar(
        "INSERT INTO recipes (patient_id, doctors_id, notes) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(req.patient_id)
    .bind(auth.user_id)
    .bind(&req.notes)
    .fetch_one(&mut *tx)
    .await?;
    replace_items(&mut *tx, recipe_id, req.items.as_deref().unwrap_or_default()).await?;
    tx.commit().await?;

    let recipe = load_recipe(db.pool(), recipe_id).await?;
    Ok((StatusCode::CREATED, Json(api_message(recipe, "Recipe created successfully"))))
}

#[utoipa::path(
    get,
    path = "/api/recipes/{id}",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 200, description = "Recipe retrieved successfully", body = Recipe),
        (status = 403, description = "Unauthorized"),
        (status = 404, description = "Recipe not found")
    ),
    tag = "recipes",
    security(("bearer_auth" = []))
)]
pub async fn get_recipe(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Recipe>>, ApiError> {
    let row = accessible_recipe(&db, &auth, id).await?;
    let recipe = load_recipe(db.pool(), row.id).await?;
    Ok(Json(api_message(recipe, "Recipe retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/recipes/{id}",
    params(("id" = i64, Path, description = "Recipe ID")),
    request_body = RecipeRequest,
    responses(
        (status = 200, description = "Recipe updated successfully", body = Recipe),
        (status = 403, description = "Unauthorized"),
        (status = 404, description = "Recipe not found")
    ),
    tag = "recipes",
    security(("bearer_auth" = []))
)]
pub async fn update_recipe(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<RecipeRequest>,
) -> Result<Json<ApiResponse<Recipe>>, ApiError> {
    auth.require_permission("edit-recipe")?;
    req.validate()?;
    let row = accessible_recipe(&db, &auth, id).await?;
    crud::require_optional(db.pool(), "patients", req.patient_id, "patient_id", "The selected patient id is invalid.")
        .await?;

    let mut tx = db.pool().begin().await?;
    sqlx::query("UPDATE recipes SET patient_id = $2, notes = $3, updated_at = NOW() WHERE id = $1")
        .bind(row.id)
        .bind(req.patient_id.or(row.patient_id))
        .bind(req.notes.as_ref().or(row.notes.as_ref()))
        .execute(&mut *tx)
        .await?;
    if let Some(items) = &req.items {
        replace_items(&mut *tx, row.id, items).await?;
    }
    tx.commit().await?;

    let recipe = load_recipe(db.pool(), row.id).await?;
    Ok(Json(api_message(recipe, "Recipe updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 200, description = "Recipe deleted successfully"),
        (status = 403, description = "Unauthorized"),
        (status = 404, description = "Recipe not found")
    ),
    tag = "recipes",
    security(("bearer_auth" = []))
)]
pub async fn delete_recipe(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_permission("delete-recipe")?;
    let row = accessible_recipe(&db, &auth, id).await?;

    let mut tx = db.pool().begin().await?;
    sqlx::query("UPDATE recipe_items SET deleted_at = NOW() WHERE recipes_id = $1 AND deleted_at IS NULL")
        .bind(row.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE recipes SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(row.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Json(api_message((), "Recipe deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(roles: &[&str], permissions: &[&str]) -> AuthContext {
        AuthContext::with_permissions(
            42,
            Some("_clinic"),
            roles.iter().map(|r| r.to_string()).collect(),
            permissions.iter().map(|p| p.to_string()).collect(),
        )
    }

    #[test]
    fn test_recipe_visibility() {
        let owner = auth(&["clinic_super_doctor"], &["view-all-recipes"]);
        assert_eq!(recipe_owner_filter(&owner).unwrap(), None);

        let doctor = auth(&["doctor"], &["view-own-recipes"]);
        assert_eq!(recipe_owner_filter(&doctor).unwrap(), Some(42));

        let secretary = auth(&["secretary"], &["view-notes"]);
        let err = recipe_owner_filter(&secretary).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "Unauthorized");
    }

    #[test]
    fn test_item_names_required() {
        let req: RecipeRequest = serde_json::from_str(
            r#"{"notes": "after meals", "items": [{"name": "Amoxicillin"}, {"name": " "}]}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }
}
