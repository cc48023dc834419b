use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::users::{self, NewUser, UserChanges, UserRecord, USER_COLUMNS};
use crate::auth::{hash_password, Role, UserProfile};
use crate::error::{api_message, ApiError, ApiResponse};
use crate::middleware::{AuthContext, TenantDb};
use crate::server::ClinicServer;
use crate::types::de::optional_bool;
use crate::types::{PaginationParams, Query};
use crate::utils::query_builder::{PaginatedQuery, SortDirection};
use crate::validation::RequestValidation;
use crate::{validate_email, validate_field, validate_length, validate_one_of};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

const DOCTORS_FROM: &str = "FROM users WHERE deleted_at IS NULL AND EXISTS (\
     SELECT 1 FROM user_roles r WHERE r.user_id = users.id AND r.role IN ('doctor', 'clinic_super_doctor'))";

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListDoctorsParams {
    pub search: Option<String>,
    #[serde(default, deserialize_with = "optional_bool")]
    pub is_active: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DoctorRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    /// `doctor` (default) or `clinic_super_doctor`
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

impl RequestValidation for DoctorRequest {
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
        if let Some(role) = &self.role {
            validate_one_of!(role, ["doctor", "clinic_super_doctor"], "The selected role is invalid.");
        }
        Ok(())
    }
}

impl DoctorRequest {
    fn validate_create(&self) -> Result<(), ApiError> {
        self.validate()?;
        if blank(self.name.as_deref()) {
            return Err(ApiError::field("name", "The name field is required."));
        }
        if blank(self.phone.as_deref()) {
            return Err(ApiError::field("phone", "The phone field is required."));
        }
        if self.password.is_none() {
            return Err(ApiError::field("password", "The password field is required."));
        }
        Ok(())
    }

    fn role(&self) -> Role {
        match self.role.as_deref() {
            Some("clinic_super_doctor") => Role::ClinicSuperDoctor,
            _ => Role::Doctor,
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn blank(value: Option<&str>) -> bool {
    value.map(str::trim).unwrap_or_default().is_empty()
}

fn trimmed_email(email: Option<&str>) -> Option<&str> {
    email.map(str::trim).filter(|e| !e.is_empty())
}

async fn find_doctor(pool: &sqlx::PgPool, column: &str, value: &str) -> Result<Option<UserRecord>, sqlx::Error> {
    let column = match column {
        "email" => "email",
        "phone" => "phone",
        _ => "id::text",
    };
    sqlx::query_as::<_, UserRecord>(&format!("SELECT {USER_COLUMNS} {DOCTORS_FROM} AND {column} = $1"))
        .bind(value)
        .fetch_optional(pool)
        .await
}

async fn get_doctor(db: &TenantDb, id: i64) -> Result<UserRecord, ApiError> {
    find_doctor(db.pool(), "id", &id.to_string())
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor"))
}

async fn check_contacts(db: &TenantDb, email: Option<&str>, phone: Option<&str>, except: Option<i64>) -> Result<(), ApiError> {
    if let Some(email) = email {
        if users::contact_taken(db.pool(), "email", email, except).await? {
            return Err(ApiError::field("email", "The email has already been taken."));
        }
    }
    if let Some(phone) = phone {
        if users::contact_taken(db.pool(), "phone", phone, except).await? {
            return Err(ApiError::field("phone", "The phone has already been taken."));
        }
    }
    Ok(())
}

// ============================================================================
// API HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/doctors",
    params(ListDoctorsParams),
    responses((status = 200, description = "Doctors retrieved successfully", body = Vec<UserProfile>)),
    tag = "doctors",
    security(("bearer_auth" = []))
)]
pub async fn list_doctors(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ListDoctorsParams>,
) -> Result<Json<ApiResponse<Vec<UserProfile>>>, ApiError> {
    auth.require_permission("view-doctors")?;

    let mut query = PaginatedQuery::new(USER_COLUMNS, DOCTORS_FROM);
    query
        .filter_eq("is_active", params.is_active)
        .filter_search(&["name", "email", "phone"], params.search.as_deref())
        .order_by_allowed(
            params.sort_by.as_deref(),
            &["id", "name", "created_at"],
            "created_at",
            SortDirection::parse_or_desc(params.sort_direction.as_deref()),
        );

    let (records, total) = query.fetch_page::<UserRecord>(db.pool(), &params.pagination).await?;
    let doctors = users::load_profiles(db.pool(), &records).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(doctors, total)
            .with_message("Doctors retrieved successfully"),
    ))
}

#[utoipa::path(
    get,
    path = "/api/doctors-active",
    responses((status = 200, description = "Active doctors retrieved successfully", body = Vec<UserProfile>)),
    tag = "doctors",
    security(("bearer_auth" = []))
)]
pub async fn active_doctors(db: TenantDb, auth: AuthContext) -> Result<Json<ApiResponse<Vec<UserProfile>>>, ApiError> {
    auth.require_permission("view-doctors")?;

    let records = sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {USER_COLUMNS} {DOCTORS_FROM} AND is_active ORDER BY name"
    ))
    .fetch_all(db.pool())
    .await?;
    let doctors = users::load_profiles(db.pool(), &records).await?;
    Ok(Json(api_message(doctors, "Active doctors retrieved successfully")))
}

#[utoipa::path(
    post,
    path = "/api/doctors",
    request_body = DoctorRequest,
    responses(
        (status = 201, description = "Doctor created successfully", body = UserProfile),
        (status = 422, description = "Validation failed")
    ),
    tag = "doctors",
    security(("bearer_auth" = []))
)]
pub async fn create_doctor(
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<DoctorRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserProfile>>), ApiError> {
    auth.require_permission("create-doctor")?;
    req.validate_create()?;

    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    let phone = req.phone.as_deref().map(str::trim).unwrap_or_default();
    let email = trimmed_email(req.email.as_deref());
    check_contacts(&db, email, Some(phone), None).await?;
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
    users::sync_roles(&mut *tx, record.id, &[req.role()]).await?;
    tx.commit().await?;

    let doctor = users::load_profile(db.pool(), &record).await?;
    Ok((StatusCode::CREATED, Json(api_message(doctor, "Doctor created successfully"))))
}

#[utoipa::path(
    get,
    path = "/api/doctors/{id}",
    params(("id" = i64, Path, description = "Doctor ID")),
    responses(
        (status = 200, description = "Doctor retrieved successfully", body = UserProfile),
        (status = 404, description = "Doctor not found")
    ),
    tag = "doctors",
    security(("bearer_auth" = []))
)]
pub async fn get_doctor_by_id(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    auth.require_permission("view-doctors")?;
    let record = get_doctor(&db, id).await?;
    let doctor = users::load_profile(db.pool(), &record).await?;
    Ok(Json(api_message(doctor, "Doctor retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/doctors/{id}",
    params(("id" = i64, Path, description = "Doctor ID")),
    request_body = DoctorRequest,
    responses(
        (status = 200, description = "Doctor updated successfully", body = UserProfile),
        (status = 404, description = "Doctor not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "doctors",
    security(("bearer_auth" = []))
)]
pub async fn update_doctor(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<DoctorRequest>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    auth.require_permission("edit-doctor")?;
    req.validate()?;
    let current = get_doctor(&db, id).await?;

    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty()).unwrap_or(&current.name);
    let phone = req.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()).unwrap_or(&current.phone);
    let email = match req.email.as_deref() {
        Some(email) => trimmed_email(Some(email)),
        None => current.email.as_deref(),
    };
    check_contacts(&db, email, Some(phone), Some(id)).await?;
    let password_hash = req.password.as_deref().map(hash_password).transpose()?;
    let is_active = req.is_active.unwrap_or(current.is_active);
    let ends_sessions = users::ends_sessions(&current, is_active, req.role.is_some(), password_hash.is_some());

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
    if req.role.is_some() {
        users::sync_roles(&mut *tx, id, &[req.role()]).await?;
    }
    if let Some(hash) = &password_hash {
        users::update_password(&mut *tx, id, hash).await?;
    }
    tx.commit().await?;

    if ends_sessions {
        server.tokens.revoke_user(Some(db.tenant_id()), id);
    }

    let doctor = users::load_profile(db.pool(), &record).await?;
    Ok(Json(api_message(doctor, "Doctor updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/doctors/{id}",
    params(("id" = i64, Path, description = "Doctor ID")),
    responses(
        (status = 200, description = "Doctor deleted successfully"),
        (status = 404, description = "Doctor not found")
    ),
    tag = "doctors",
    security(("bearer_auth" = []))
)]
pub async fn delete_doctor(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_permission("delete-doctor")?;
    get_doctor(&db, id).await?;
    sqlx::query("UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(db.pool())
        .await?;
    server.tokens.revoke_user(Some(db.tenant_id()), id);
    Ok(Json(api_message((), "Doctor deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/api/doctors/search/email/{email}",
    params(("email" = String, Path, description = "Doctor email")),
    responses(
        (status = 200, description = "Doctor found", body = UserProfile),
        (status = 404, description = "Doctor not found")
    ),
    tag = "doctors",
    security(("bearer_auth" = []))
)]
pub async fn search_doctor_by_email(
    db: TenantDb,
    auth: AuthContext,
    Path(email): Path<String>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    auth.require_permission("view-doctors")?;
    let record = find_doctor(db.pool(), "email", email.trim())
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor"))?;
    let doctor = users::load_profile(db.pool(), &record).await?;
    Ok(Json(api_message(doctor, "Doctor found")))
}

#[utoipa::path(
    get,
    path = "/api/doctors/search/phone/{phone}",
    params(("phone" = String, Path, description = "Doctor phone")),
    responses(
        (status = 200, description = "Doctor found", body = UserProfile),
        (status = 404, description = "Doctor not found")
    ),
    tag = "doctors",
    security(("bearer_auth" = []))
)]
pub async fn search_doctor_by_phone(
    db: TenantDb,
    auth: AuthContext,
    Path(phone): Path<String>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    auth.require_permission("view-doctors")?;
    let record = find_doctor(db.pool(), "phone", phone.trim())
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor"))?;
    let doctor = users::load_profile(db.pool(), &record).await?;
    Ok(Json(api_message(doctor, "Doctor found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> DoctorRequest {
        DoctorRequest {
            name: Some("Dr. Sara".to_string()),
            email: Some("sara@clinic.test".to_string()),
            phone: Some("0790000001".to_string()),
            password: Some("secret123".to_string()),
            role: None,
            is_active: None,
        }
    }

    #[test]
    fn test_create_rules() {
        assert!(valid().validate_create().is_ok());

        let short = DoctorRequest {
            password: Some("short".to_string()),
            ..valid()
        };
        assert!(short.validate_create().is_err());

        let no_phone = DoctorRequest {
            phone: Some("  ".to_string()),
            ..valid()
        };
        assert!(no_phone.validate_create().is_err());

        let secretary = DoctorRequest {
            role: Some("secretary".to_string()),
            ..valid()
        };
        assert!(secretary.validate().is_err());
    }

    #[test]
    fn test_role_defaults_to_doctor() {
        assert_eq!(valid().role(), Role::Doctor);
        let owner = DoctorRequest {
            role: Some("clinic_super_doctor".to_string()),
            ..valid()
        };
        assert_eq!(owner.role(), Role::ClinicSuperDoctor);
    }

    #[test]
    fn test_blank_email_is_dropped() {
        assert_eq!(trimmed_email(Some("  ")), None);
        assert_eq!(trimmed_email(Some(" a@b.co ")), Some("a@b.co"));
    }
}
