//! Secretaries are clinic users whose access comes entirely from
//! permissions the clinic owner grants one by one.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

use crate::auth::roles::{grouped_permissions, is_secretary_assignable, secretary_assignable, PermissionInfo};
use crate::auth::users::{self, NewUser, UserChanges, UserRecord, USER_COLUMNS};
use crate::auth::{hash_password, Role, UserProfile};
use crate::error::{api_message, ApiError, ApiResponse};
use crate::middleware::{AuthContext, TenantDb};
use crate::server::ClinicServer;
use crate::types::de::optional_bool;
use crate::types::{PaginationParams, Query};
use crate::utils::query_builder::{PaginatedQuery, SortDirection};
use crate::validation::RequestValidation;
use crate::{validate_email, validate_field, validate_length};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

const SECRETARIES_FROM: &str = "FROM users WHERE deleted_at IS NULL AND EXISTS (\
     SELECT 1 FROM user_roles r WHERE r.user_id = users.id AND r.role = 'secretary')";

const VIEW_SECRETARIES: [&str; 2] = ["view-clinic-users", "view-all-users"];

const NO_DEFAULTS_NOTE: &str = "Secretaries have no default permissions. All permissions must be assigned \
     individually by clinic_super_doctor from the available list.";

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListSecretariesParams {
    pub search: Option<String>,
    #[serde(default, deserialize_with = "optional_bool")]
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SecretaryRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
    /// Replaces the granted permissions when present
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SecretaryPermissionsRequest {
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailablePermissions {
    pub grouped_permissions: BTreeMap<String, Vec<PermissionInfo>>,
    pub base_role_permissions: Vec<String>,
    pub all_permissions: Vec<String>,
    pub note: String,
}

fn validate_permissions(permissions: &[String]) -> Result<(), ApiError> {
    if let Some(invalid) = permissions.iter().find(|p| !is_secretary_assignable(p)) {
        return Err(ApiError::field(
            "permissions",
            format!("The permission '{}' cannot be assigned to a secretary.", invalid),
        ));
    }
    Ok(())
}

impl RequestValidation for SecretaryRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            validate_length!(name, 1, 255, "The name may not be greater than 255 characters.");
        }
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            validate_email!(email, "The email must be a valid email address.");
        }
        if let Some(phone) = &self.phone {
            validate_length!(phone, 1, 20, "The phone may not be greater than 20 characters.");
        }
        if let Some(password) = &self.password {
            validate_field!(
                password,
                password.chars().count() >= 8,
                "The password must be at least 8 characters."
            );
        }
        if let Some(permissions) = &self.permissions {
            validate_permissions(permissions)?;
        }
        Ok(())
    }
}

impl SecretaryRequest {
    fn validate_create(&self) -> Result<(), ApiError> {
        self.validate()?;
        if self.name.as_deref().map(str::trim).unwrap_or_default().is_empty() {
            return Err(ApiError::field("name", "The name field is required."));
        }
        if self.phone.as_deref().map(str::trim).unwrap_or_default().is_empty() {
            return Err(ApiError::field("phone", "The phone field is required."));
        }
        if self.password.is_none() {
            return Err(ApiError::field("password", "The password field is required."));
        }
        Ok(())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

async fn get_secretary(db: &TenantDb, id: i64) -> Result<UserRecord, ApiError> {
    sqlx::query_as::<_, UserRecord>(&format!("SELECT {USER_COLUMNS} {SECRETARIES_FROM} AND id = $1"))
        .bind(id)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| ApiError::not_found("Secretary"))
}

async fn check_contacts(db: &TenantDb, email: Option<&str>, phone: &str, except: Option<i64>) -> Result<(), ApiError> {
    if let Some(email) = email {
        if users::contact_taken(db.pool(), "email", email, except).await? {
            return Err(ApiError::field("email", "The email has already been taken."));
        }
    }
    if users::contact_taken(db.pool(), "phone", phone, except).await? {
        return Err(ApiError::field("phone", "The phone has already been taken."));
    }
    Ok(())
}

fn available_permissions() -> AvailablePermissions {
    let assignable = secretary_assignable();
    AvailablePermissions {
        grouped_permissions: grouped_permissions(assignable),
        base_role_permissions: Role::Secretary.permissions().iter().map(|p| p.to_string()).collect(),
        all_permissions: assignable.iter().map(|p| p.to_string()).collect(),
        note: NO_DEFAULTS_NOTE.to_string(),
    }
}

// ============================================================================
// API HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/secretaries",
    params(ListSecretariesParams),
    responses((status = 200, description = "Secretaries retrieved successfully", body = Vec<UserProfile>)),
    tag = "secretaries",
    security(("bearer_auth" = []))
)]
pub async fn list_secretaries(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ListSecretariesParams>,
) -> Result<Json<ApiResponse<Vec<UserProfile>>>, ApiError> {
    auth.require_any_permission(&VIEW_SECRETARIES)?;

    let mut query = PaginatedQuery::new(USER_COLUMNS, SECRETARIES_FROM);
    query
        .filter_eq("is_active", params.is_active)
        .filter_search(&["name", "email", "phone"], params.search.as_deref())
        .order_by("created_at", SortDirection::Desc);

    let (records, total) = query.fetch_page::<UserRecord>(db.pool(), &params.pagination).await?;
    let secretaries = users::load_profiles(db.pool(), &records).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(secretaries, total)
            .with_message("Secretaries retrieved successfully"),
    ))
}

#[utoipa::path(
    get,
    path = "/api/secretaries/available-permissions",
    responses((status = 200, description = "Available permissions retrieved successfully", body = AvailablePermissions)),
    tag = "secretaries",
    security(("bearer_auth" = []))
)]
pub async fn list_available_permissions(auth: AuthContext) -> Result<Json<ApiResponse<AvailablePermissions>>, ApiError> {
    auth.require_any_permission(&VIEW_SECRETARIES)?;
    Ok(Json(api_message(
        available_permissions(),
        "Available permissions retrieved successfully",
    )))
}

#[utoipa::path(
    post,
    path = "/api/secretaries",
    request_body = SecretaryRequest,
    responses(
        (status = 201, description = "Secretary created successfully", body = UserProfile),
        (status = 422, description = "Validation failed")
    ),
    tag = "secretaries",
    security(("bearer_auth" = []))
)]
pub async fn create_secretary(
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<SecretaryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserProfile>>), ApiError> {
    auth.require_permission("create-user")?;
    req.validate_create()?;

    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    let phone = req.phone.as_deref().map(str::trim).unwrap_or_default();
    let email = req.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
    check_contacts(&db, email, phone, None).await?;
    let password_hash = hash_password(req.password.as_deref().unwrap_or_default())?;

    let mut tx = db.pool().begin().await?;
    let record = users::insert_user(
        &mut *tx,
        &NewUser {
            name,
            email,
            phone,
            password_hash: &password_hash,
            is_active: req.is_active.unwrap_or(true),
            central_user_id: None,
        },
    )
    .await?;
    users::sync_roles(&mut *tx, record.id, &[Role::Secretary]).await?;
    users::sync_permissions(&mut *tx, record.id, req.permissions.as_deref().unwrap_or_default()).await?;
    tx.commit().await?;

    let secretary = users::load_profile(db.pool(), &record).await?;
    Ok((StatusCode::CREATED, Json(api_message(secretary, "Secretary created successfully"))))
}

#[utoipa::path(
    get,
    path = "/api/secretaries/{id}",
    params(("id" = i64, Path, description = "Secretary ID")),
    responses(
        (status = 200, description = "Secretary details retrieved successfully", body = UserProfile),
        (status = 404, description = "Secretary not found")
    ),
    tag = "secretaries",
    security(("bearer_auth" = []))
)]
pub async fn get_secretary_by_id(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    auth.require_any_permission(&VIEW_SECRETARIES)?;
    let record = get_secretary(&db, id).await?;
    let secretary = users::load_profile(db.pool(), &record).await?;
    Ok(Json(api_message(secretary, "Secretary details retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/secretaries/{id}",
    params(("id" = i64, Path, description = "Secretary ID")),
    request_body = SecretaryRequest,
    responses(
        (status = 200, description = "Secretary updated successfully", body = UserProfile),
        (status = 404, description = "Secretary not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "secretaries",
    security(("bearer_auth" = []))
)]
pub async fn update_secretary(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<SecretaryRequest>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    auth.require_permission("edit-user")?;
    req.validate()?;
    let current = get_secretary(&db, id).await?;

    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty()).unwrap_or(&current.name);
    let phone = req.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()).unwrap_or(&current.phone);
    let email = match req.email.as_deref() {
        Some(email) => Some(email.trim()).filter(|e| !e.is_empty()),
        None => current.email.as_deref(),
    };
    check_contacts(&db, email, phone, Some(id)).await?;
    let password_hash = req.password.as_deref().map(hash_password).transpose()?;
    let is_active = req.is_active.unwrap_or(current.is_active);
    let ends_sessions = users::ends_sessions(&current, is_active, req.permissions.is_some(), password_hash.is_some());

    let mut tx = db.pool().begin().await?;
    let record = users::update_user(
        &mut *tx,
        id,
        &UserChanges {
            name,
            email,
            phone,
            is_active,
        },
    )
    .await?;
    if let Some(permissions) = &req.permissions {
        users::sync_permissions(&mut *tx, id, permissions).await?;
    }
    if let Some(hash) = &password_hash {
        users::update_password(&mut *tx, id, hash).await?;
    }
    tx.commit().await?;

    if ends_sessions {
        server.tokens.revoke_user(Some(db.tenant_id()), id);
    }

    let secretary = users::load_profile(db.pool(), &record).await?;
    Ok(Json(api_message(secretary, "Secretary updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/secretaries/{id}",
    params(("id" = i64, Path, description = "Secretary ID")),
    responses(
        (status = 200, description = "Secretary deleted successfully"),
        (status = 404, description = "Secretary not found")
    ),
    tag = "secretaries",
    security(("bearer_auth" = []))
)]
pub async fn delete_secretary(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_permission("delete-user")?;
    get_secretary(&db, id).await?;
    sqlx::query("UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(db.pool())
        .await?;
    server.tokens.revoke_user(Some(db.tenant_id()), id);
    Ok(Json(api_message((), "Secretary deleted successfully")))
}

#[utoipa::path(
    patch,
    path = "/api/secretaries/{id}/permissions",
    params(("id" = i64, Path, description = "Secretary ID")),
    request_body = SecretaryPermissionsRequest,
    responses(
        (status = 200, description = "Secretary permissions updated successfully", body = UserProfile),
        (status = 404, description = "Secretary not found"),
        (status = 422, description = "A permission is not assignable")
    ),
    tag = "secretaries",
    security(("bearer_auth" = []))
)]
pub async fn update_secretary_permissions(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<SecretaryPermissionsRequest>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    auth.require_permission("edit-user")?;
    validate_permissions(&req.permissions)?;
    let record = get_secretary(&db, id).await?;

    let mut tx = db.pool().begin().await?;
    users::sync_permissions(&mut *tx, id, &req.permissions).await?;
    tx.commit().await?;
    server.tokens.revoke_user(Some(db.tenant_id()), id);

    let secretary = users::load_profile(db.pool(), &record).await?;
    Ok(Json(api_message(secretary, "Secretary permissions updated successfully")))
}

#[utoipa::path(
    patch,
    path = "/api/secretaries/{id}/toggle-status",
    params(("id" = i64, Path, description = "Secretary ID")),
    responses(
        (status = 200, description = "Secretary status updated successfully", body = UserProfile),
        (status = 404, description = "Secretary not found")
    ),
    tag = "secretaries",
    security(("bearer_auth" = []))
)]
pub async fn toggle_secretary_status(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    auth.require_permission("edit-user")?;
    get_secretary(&db, id).await?;

    let record = sqlx::query_as::<_, UserRecord>(&format!(
        "UPDATE users SET is_active = NOT is_active, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .fetch_one(db.pool())
    .await?;
    server.tokens.revoke_user(Some(db.tenant_id()), id);

    let secretary = users::load_profile(db.pool(), &record).await?;
    Ok(Json(api_message(secretary, "Secretary status updated successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_assignable_permissions_accepted() {
        assert!(validate_permissions(&["view-clinic-patients".to_string()]).is_ok());

        let err = validate_permissions(&["manage-setting-definitions".to_string()]).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_available_permissions_payload() {
        let available = available_permissions();
        assert_eq!(available.all_permissions.len(), secretary_assignable().len());
        assert!(available.note.starts_with("Secretaries have no default permissions."));
        let grouped: usize = available.grouped_permissions.values().map(Vec::len).sum();
        assert_eq!(grouped, available.all_permissions.len());
    }

    #[test]
    fn test_create_requires_password() {
        let req = SecretaryRequest {
            name: Some("Lina".to_string()),
            phone: Some("0791112222".to_string()),
            ..Default::default()
        };
        assert!(req.validate_create().is_err());
    }
}
