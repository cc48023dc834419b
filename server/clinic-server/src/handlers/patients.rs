use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{api_message, ApiError, ApiResponse};
use crate::handlers::common::crud::{self, Resource};
use crate::middleware::{AuthContext, TenantDb};
use crate::server::ClinicServer;
use crate::types::de::{optional_date, optional_number};
use crate::types::{PaginationParams, Query};
use crate::utils::query_builder::{PaginatedQuery, SortDirection};
use crate::validation::RequestValidation;
use crate::{validate_email, validate_field, validate_length, validate_present, validate_range, validate_required};

const VIEW_PATIENTS: &[&str] = &["view-clinic-patients", "view-all-patients"];

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Patient {
    pub id: i64,
    pub public_token: Uuid,
    pub is_public_profile_enabled: bool,
    pub name: String,
    pub age: Option<i32>,
    pub doctor_id: Option<i64>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub systemic_conditions: Option<String>,
    /// 1 = male, 2 = female
    pub sex: Option<i16>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub rx_id: Option<String>,
    pub note: Option<String>,
    pub from_where_come_id: Option<i64>,
    pub identifier: Option<String>,
    pub credit_balance: Option<i64>,
    pub credit_balance_add_at: Option<DateTime<Utc>>,
    pub creator_id: Option<i64>,
    pub updator_id: Option<i64>,
    #[schema(value_type = Option<Object>)]
    pub tooth_details: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const PATIENT_COLUMNS: &str = "id, public_token, is_public_profile_enabled, name, age, doctor_id, phone, email, \
     systemic_conditions, sex, address, notes, birth_date, rx_id, note, from_where_come_id, identifier, \
     credit_balance, credit_balance_add_at, creator_id, updator_id, tooth_details, created_at, updated_at";

impl Resource for Patient {
    const TABLE: &'static str = "patients";
    const COLUMNS: &'static str = PATIENT_COLUMNS;
    const NAME: &'static str = "Patient";
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListPatientsParams {
    /// Matches name, phone or email
    pub search: Option<String>,
    #[serde(default, deserialize_with = "optional_number")]
    pub doctor_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub from_where_come_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub sex: Option<i16>,
    #[serde(default, deserialize_with = "optional_date")]
    pub from_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_date")]
    pub to_date: Option<NaiveDate>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

/// Body shared by create and update; on update absent fields keep their
/// stored value
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PatientRequest {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub doctor_id: Option<i64>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub systemic_conditions: Option<String>,
    pub sex: Option<i16>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub rx_id: Option<String>,
    pub note: Option<String>,
    pub from_where_come_id: Option<i64>,
    pub identifier: Option<String>,
    pub credit_balance: Option<i64>,
    #[schema(value_type = Option<Object>)]
    pub tooth_details: Option<Value>,
}

impl RequestValidation for PatientRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_present!(self.name, "The name field is required.");
        if let Some(name) = &self.name {
            validate_length!(name, 1, 255, "The name may not be greater than 255 characters.");
        }
        if let Some(age) = self.age {
            validate_range!(age, 0, 150, "The age must be between 0 and 150.");
        }
        if let Some(sex) = self.sex {
            validate_range!(sex, 1, 2, "The selected sex is invalid.");
        }
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            validate_email!(email, "The email must be a valid email address.");
        }
        if let Some(phone) = &self.phone {
            validate_field!(phone, phone.chars().count() <= 50, "The phone may not be greater than 50 characters.");
        }
        if let Some(credit_balance) = self.credit_balance {
            validate_field!(credit_balance, credit_balance >= 0, "The credit balance must be at least 0.");
        }
        if let Some(birth_date) = self.birth_date {
            validate_field!(birth_date, birth_date <= Utc::now().date_naive(), "The birth date must be a date before today.");
        }
        Ok(())
    }
}

impl PatientRequest {
    fn validate_create(&self) -> Result<(), ApiError> {
        let name = self.name.as_deref().unwrap_or_default();
        validate_required!(name, "The name field is required.");
        self.validate()
    }

    /// Overlay the request on a stored patient
    fn apply(self, patient: &mut Patient) {
        if let Some(name) = self.name {
            patient.name = name.trim().to_string();
        }
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if self.$field.is_some() { patient.$field = self.$field; })*
            };
        }
        overlay!(age, doctor_id, sex, birth_date, from_where_come_id, credit_balance, tooth_details);
        overlay!(systemic_conditions, address, notes, rx_id, note, identifier);
        if let Some(phone) = self.phone {
            patient.phone = blank_to_none(phone);
        }
        if let Some(email) = self.email {
            patient.email = blank_to_none(email);
        }
    }
}

fn blank_to_none(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ToothDetailsRequest {
    #[schema(value_type = Object)]
    pub tooth_details: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicProfileInfo {
    pub patient_id: i64,
    pub patient_name: String,
    pub public_token: Uuid,
    pub is_public_profile_enabled: bool,
    pub public_profile_url: String,
    pub qr_code_content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QrCodeInfo {
    pub patient_id: i64,
    pub patient_name: String,
    pub qr_code_content: String,
    pub public_token: Uuid,
    pub instructions: String,
}

// ============================================================================
// HELPERS
// ============================================================================

async fn check_references(db: &TenantDb, req: &PatientRequest, except_id: Option<i64>) -> Result<(), ApiError> {
    let pool = db.pool();
    crud::require_optional(pool, "users", req.doctor_id, "doctor_id", "The selected doctor id is invalid.").await?;
    crud::require_optional(
        pool,
        "from_where_comes",
        req.from_where_come_id,
        "from_where_come_id",
        "The selected source is invalid.",
    )
    .await?;
    if let Some(phone) = req.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        crud::require_unique(pool, "patients", "phone", phone, except_id, "Phone number already registered").await?;
    }
    if let Some(email) = req.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        crud::require_unique(pool, "patients", "email", email, except_id, "Email already registered").await?;
    }
    Ok(())
}

async fn save_patient(db: &TenantDb, patient: &Patient, updator_id: i64) -> Result<Patient, ApiError> {
    let saved = sqlx::query_as::<_, Patient>(&format!(
        r#"
        UPDATE patients SET
            name = $2, age = $3, doctor_id = $4, phone = $5, email = $6, systemic_conditions = $7,
            sex = $8, address = $9, notes = $10, birth_date = $11, rx_id = $12, note = $13,
            from_where_come_id = $14, identifier = $15, credit_balance = $16, tooth_details = $17,
            updator_id = $18, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {PATIENT_COLUMNS}
        "#
    ))
    .bind(patient.id)
    .bind(&patient.name)
    .bind(patient.age)
    .bind(patient.doctor_id)
    .bind(&patient.phone)
    .bind(&patient.email)
    .bind(&patient.systemic_conditions)
    .bind(patient.sex)
    .bind(&patient.address)
    .bind(&patient.notes)
    .bind(patient.birth_date)
    .bind(&patient.rx_id)
    .bind(&patient.note)
    .bind(patient.from_where_come_id)
    .bind(&patient.identifier)
    .bind(patient.credit_balance)
    .bind(&patient.tooth_details)
    .bind(updator_id)
    .fetch_optional(db.pool())
    .await?;
    saved.ok_or_else(|| ApiError::not_found("Patient"))
}

fn profile_url(server: &ClinicServer, token: Uuid) -> String {
    format!(
        "{}/{}",
        server.config.server.public_profile_base_url.trim_end_matches('/'),
        token
    )
}

fn profile_info(server: &ClinicServer, patient: &Patient) -> PublicProfileInfo {
    let url = profile_url(server, patient.public_token);
    PublicProfileInfo {
        patient_id: patient.id,
        patient_name: patient.name.clone(),
        public_token: patient.public_token,
        is_public_profile_enabled: patient.is_public_profile_enabled,
        qr_code_content: url.clone(),
        public_profile_url: url,
    }
}

async fn set_profile_enabled(db: &TenantDb, id: i64, enabled: bool) -> Result<Patient, ApiError> {
    sqlx::query_as::<_, Patient>(&format!(
        "UPDATE patients SET is_public_profile_enabled = $2, updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL RETURNING {PATIENT_COLUMNS}"
    ))
    .bind(id)
    .bind(enabled)
    .fetch_optional(db.pool())
    .await?
    .ok_or_else(|| ApiError::not_found("Patient"))
}

// ============================================================================
// API HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/patients",
    params(ListPatientsParams),
    responses(
        (status = 200, description = "Patients retrieved successfully", body = Vec<Patient>),
        (status = 403, description = "Missing view-clinic-patients permission")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn list_patients(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ListPatientsParams>,
) -> Result<Json<ApiResponse<Vec<Patient>>>, ApiError> {
    auth.require_any_permission(VIEW_PATIENTS)?;

    let mut query = PaginatedQuery::new(PATIENT_COLUMNS, "FROM patients WHERE deleted_at IS NULL");
    query
        .filter_search(&["name", "phone", "email"], params.search.as_deref())
        .filter_eq("doctor_id", params.doctor_id)
        .filter_eq("from_where_come_id", params.from_where_come_id)
        .filter_eq("sex", params.sex)
        .filter_gte("created_at::date", params.from_date)
        .filter_lte("created_at::date", params.to_date)
        .order_by_allowed(
            params.sort_by.as_deref(),
            &["id", "name", "age", "created_at", "updated_at"],
            "created_at",
            SortDirection::parse_or_desc(params.sort_direction.as_deref()),
        );

    let (patients, total) = query.fetch_page::<Patient>(db.pool(), &params.pagination).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(patients, total)
            .with_message("Patients retrieved successfully"),
    ))
}

#[utoipa::path(
    post,
    path = "/api/patients",
    request_body = PatientRequest,
    responses(
        (status = 201, description = "Patient created successfully", body = Patient),
        (status = 422, description = "Validation failed or phone already registered")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn create_patient(
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<PatientRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Patient>>), ApiError> {
    auth.require_permission("create-patient")?;
    req.validate_create()?;
    check_references(&db, &req, None).await?;

    let inserted: i64 = sqlx::query_scalar(
        "INSERT INTO patients (public_token, name, creator_id, updator_id) VALUES ($1, $2, $3, $3) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(req.name.as_deref().map(str::trim).unwrap_or_default())
    .bind(auth.user_id)
    .fetch_one(db.pool())
    .await?;

    let mut patient = crud::get_live::<Patient>(db.pool(), inserted).await?;
    let credit_added = req.credit_balance.is_some();
    req.apply(&mut patient);
    let mut patient = save_patient(&db, &patient, auth.user_id).await?;

    if credit_added {
        patient = sqlx::query_as::<_, Patient>(&format!(
            "UPDATE patients SET credit_balance_add_at = NOW() WHERE id = $1 RETURNING {PATIENT_COLUMNS}"
        ))
        .bind(patient.id)
        .fetch_one(db.pool())
        .await?;
    }

    tracing::info!(patient_id = patient.id, tenant_id = %db.tenant_id(), "Patient created");
    Ok((
        StatusCode::CREATED,
        Json(api_message(patient, "Patient created successfully")),
    ))
}

#[utoipa::path(
    get,
    path = "/api/patients/{id}",
    params(("id" = i64, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Patient retrieved successfully", body = Patient),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn get_patient(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Patient>>, ApiError> {
    auth.require_any_permission(VIEW_PATIENTS)?;
    let patient = crud::get_live::<Patient>(db.pool(), id).await?;
    Ok(Json(api_message(patient, "Patient retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/patients/{id}",
    params(("id" = i64, Path, description = "Patient ID")),
    request_body = PatientRequest,
    responses(
        (status = 200, description = "Patient updated successfully", body = Patient),
        (status = 404, description = "Patient not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn update_patient(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<PatientRequest>,
) -> Result<Json<ApiResponse<Patient>>, ApiError> {
    auth.require_permission("edit-patient")?;
    req.validate()?;

    let mut patient = crud::get_live::<Patient>(db.pool(), id).await?;
    check_references(&db, &req, Some(id)).await?;
    let credit_changed = req.credit_balance.is_some() && req.credit_balance != patient.credit_balance;
    req.apply(&mut patient);
    let mut patient = save_patient(&db, &patient, auth.user_id).await?;

    if credit_changed {
        patient = sqlx::query_as::<_, Patient>(&format!(
            "UPDATE patients SET credit_balance_add_at = NOW() WHERE id = $1 RETURNING {PATIENT_COLUMNS}"
        ))
        .bind(patient.id)
        .fetch_one(db.pool())
        .await?;
    }

    Ok(Json(api_message(patient, "Patient updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/patients/{id}",
    params(("id" = i64, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Patient deleted successfully"),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn delete_patient(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_permission("delete-patient")?;
    crud::soft_delete::<Patient>(db.pool(), id).await?;
    Ok(Json(api_message((), "Patient deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/api/patients/search/phone/{phone}",
    params(("phone" = String, Path, description = "Exact phone number")),
    responses(
        (status = 200, description = "Patient found", body = Patient),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn search_by_phone(
    db: TenantDb,
    auth: AuthContext,
    Path(phone): Path<String>,
) -> Result<Json<ApiResponse<Patient>>, ApiError> {
    auth.require_permission("search-patient")?;
    find_by_contact(&db, "phone", phone.trim()).await
}

#[utoipa::path(
    get,
    path = "/api/patients/search/email/{email}",
    params(("email" = String, Path, description = "Exact email address")),
    responses(
        (status = 200, description = "Patient found", body = Patient),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn search_by_email(
    db: TenantDb,
    auth: AuthContext,
    Path(email): Path<String>,
) -> Result<Json<ApiResponse<Patient>>, ApiError> {
    auth.require_permission("search-patient")?;
    find_by_contact(&db, "email", email.trim()).await
}

async fn find_by_contact(db: &TenantDb, column: &str, value: &str) -> Result<Json<ApiResponse<Patient>>, ApiError> {
    let column = if column == "email" { "email" } else { "phone" };
    let patient = sqlx::query_as::<_, Patient>(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE {column} = $1 AND deleted_at IS NULL"
    ))
    .bind(value)
    .fetch_optional(db.pool())
    .await?
    .ok_or_else(|| ApiError::not_found("Patient"))?;
    Ok(Json(api_message(patient, "Patient found")))
}

#[utoipa::path(
    put,
    path = "/api/patients/{id}/tooth-details",
    params(("id" = i64, Path, description = "Patient ID")),
    request_body = ToothDetailsRequest,
    responses(
        (status = 200, description = "Tooth details updated successfully", body = Patient),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn update_tooth_details(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<ToothDetailsRequest>,
) -> Result<Json<ApiResponse<Patient>>, ApiError> {
    auth.require_permission("edit-patient")?;
    let tooth_details = req.tooth_details;
    validate_field!(
        tooth_details,
        tooth_details.is_object() || tooth_details.is_array(),
        "The tooth details must be an object or an array."
    );

    let patient = sqlx::query_as::<_, Patient>(&format!(
        "UPDATE patients SET tooth_details = $2, updator_id = $3, updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL RETURNING {PATIENT_COLUMNS}"
    ))
    .bind(id)
    .bind(&tooth_details)
    .bind(auth.user_id)
    .fetch_optional(db.pool())
    .await?
    .ok_or_else(|| ApiError::not_found("Patient"))?;

    Ok(Json(api_message(patient, "Tooth details updated successfully")))
}

#[utoipa::path(
    get,
    path = "/api/patients/{id}/public-profile",
    params(("id" = i64, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Public profile settings", body = PublicProfileInfo),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn get_public_profile(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PublicProfileInfo>>, ApiError> {
    auth.require_any_permission(VIEW_PATIENTS)?;
    let patient = crud::get_live::<Patient>(db.pool(), id).await?;
    Ok(Json(api_message(
        profile_info(&server, &patient),
        "Public profile settings retrieved successfully",
    )))
}

#[utoipa::path(
    post,
    path = "/api/patients/{id}/public-profile/enable",
    params(("id" = i64, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Public profile enabled successfully.", body = PublicProfileInfo),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn enable_public_profile(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PublicProfileInfo>>, ApiError> {
    auth.require_permission("edit-patient")?;
    let patient = set_profile_enabled(&db, id, true).await?;
    Ok(Json(api_message(
        profile_info(&server, &patient),
        "Public profile enabled successfully.",
    )))
}

#[utoipa::path(
    post,
    path = "/api/patients/{id}/public-profile/disable",
    params(("id" = i64, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Public profile disabled successfully.", body = PublicProfileInfo),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn disable_public_profile(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PublicProfileInfo>>, ApiError> {
    auth.require_permission("edit-patient")?;
    let patient = set_profile_enabled(&db, id, false).await?;
    Ok(Json(api_message(
        profile_info(&server, &patient),
        "Public profile disabled successfully.",
    )))
}

/// Issue a new public token; links and QR codes with the old one stop working
#[utoipa::path(
    post,
    path = "/api/patients/{id}/public-profile/regenerate-token",
    params(("id" = i64, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Public token regenerated successfully.", body = PublicProfileInfo),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn regenerate_public_token(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PublicProfileInfo>>, ApiError> {
    auth.require_permission("edit-patient")?;
    let patient = sqlx::query_as::<_, Patient>(&format!(
        "UPDATE patients SET public_token = $2, updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL RETURNING {PATIENT_COLUMNS}"
    ))
    .bind(id)
    .bind(Uuid::new_v4())
    .fetch_optional(db.pool())
    .await?
    .ok_or_else(|| ApiError::not_found("Patient"))?;

    Ok(Json(api_message(
        profile_info(&server, &patient),
        "Public token regenerated successfully. Old QR codes will no longer work.",
    )))
}

#[utoipa::path(
    get,
    path = "/api/patients/{id}/qr-code",
    params(("id" = i64, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "QR code content", body = QrCodeInfo),
        (status = 400, description = "Public profile is not enabled"),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn get_qr_code(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<QrCodeInfo>>, ApiError> {
    auth.require_any_permission(VIEW_PATIENTS)?;
    let patient = crud::get_live::<Patient>(db.pool(), id).await?;
    if !patient.is_public_profile_enabled {
        return Err(ApiError::bad_request(
            "Public profile is not enabled for this patient. Enable it first to generate QR code.",
        ));
    }

    Ok(Json(api_message(
        QrCodeInfo {
            patient_id: patient.id,
            patient_name: patient.name.clone(),
            qr_code_content: profile_url(&server, patient.public_token),
            public_token: patient.public_token,
            instructions: "Use this URL to generate a QR code. When scanned, it will redirect to the patient's public profile."
                .to_string(),
        },
        "QR code data generated successfully",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_patient() -> Patient {
        Patient {
            id: 1,
            public_token: Uuid::nil(),
            is_public_profile_enabled: false,
            name: "Sara".to_string(),
            age: Some(30),
            doctor_id: None,
            phone: Some("0770".to_string()),
            email: None,
            systemic_conditions: None,
            sex: Some(2),
            address: None,
            notes: None,
            birth_date: None,
            rx_id: None,
            note: None,
            from_where_come_id: None,
            identifier: None,
            credit_balance: None,
            credit_balance_add_at: None,
            creator_id: None,
            updator_id: None,
            tooth_details: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_requires_name() {
        let req = PatientRequest::default();
        assert!(req.validate_create().is_err());

        let req = PatientRequest {
            name: Some("Sara".to_string()),
            sex: Some(3),
            ..PatientRequest::default()
        };
        assert!(req.validate_create().is_err());
    }

    #[test]
    fn test_update_keeps_absent_fields() {
        let mut patient = sample_patient();
        PatientRequest {
            age: Some(31),
            email: Some("  ".to_string()),
            ..PatientRequest::default()
        }
        .apply(&mut patient);

        assert_eq!(patient.name, "Sara");
        assert_eq!(patient.age, Some(31));
        assert_eq!(patient.phone.as_deref(), Some("0770"));
        assert_eq!(patient.email, None);
        assert_eq!(patient.sex, Some(2));
    }

    #[test]
    fn test_future_birth_date_rejected() {
        let req = PatientRequest {
            birth_date: Some(Utc::now().date_naive() + chrono::Duration::days(2)),
            ..PatientRequest::default()
        };
        assert!(req.validate().is_err());
    }
}
