//! Read-only patient profile reachable through the patient's public token.
//!
//! No JWT is involved; the clinic comes from the tenant header and the
//! token must belong to a live patient whose profile is enabled. Any other
//! token gets the same 404 so tokens cannot be guessed one by one.

use axum::{extract::Path, Json};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{api_message, ApiError, ApiResponse};
use crate::handlers::images::image_url;
use crate::middleware::TenantDb;

const NOT_PUBLIC: &str = "Patient profile not found or not publicly accessible.";

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, FromRow)]
struct PublicPatientRow {
    id: i64,
    name: String,
    age: Option<i32>,
    sex: Option<i16>,
    birth_date: Option<NaiveDate>,
    systemic_conditions: Option<String>,
    tooth_details: Option<Value>,
    doctor_name: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusRef {
    pub name_en: String,
    pub name_ar: String,
    pub color: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicCase {
    pub id: i64,
    pub tooth_num: Option<String>,
    pub notes: Option<String>,
    pub category: Option<NamedRef>,
    pub status: Option<StatusRef>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PublicCaseRow {
    id: i64,
    tooth_num: Option<String>,
    notes: Option<String>,
    category_name: Option<String>,
    status_name_en: Option<String>,
    status_name_ar: Option<String>,
    status_color: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PublicCaseRow> for PublicCase {
    fn from(row: PublicCaseRow) -> Self {
        let status = match (row.status_name_en, row.status_name_ar) {
            (Some(name_en), Some(name_ar)) => Some(StatusRef {
                name_en,
                name_ar,
                color: row.status_color.unwrap_or_else(|| "#000000".to_string()),
            }),
            _ => None,
        };
        Self {
            id: row.id,
            tooth_num: row.tooth_num,
            notes: row.notes,
            category: row.category_name.map(|name| NamedRef { name }),
            status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicImage {
    pub id: i64,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub alt_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PublicImageRow {
    id: i64,
    path: String,
    #[sqlx(rename = "type")]
    kind: Option<String>,
    alt_text: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PublicImageRow> for PublicImage {
    fn from(row: PublicImageRow) -> Self {
        Self {
            id: row.id,
            url: image_url(&row.path),
            kind: row.kind,
            alt_text: row.alt_text,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicReservation {
    pub date: NaiveDate,
    pub time: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub doctor: Option<NamedRef>,
}

#[derive(Debug, FromRow)]
struct PublicReservationRow {
    reservation_start_date: NaiveDate,
    reservation_from_time: Option<NaiveTime>,
    status_name: Option<String>,
    notes: Option<String>,
    doctor_name: Option<String>,
}

impl From<PublicReservationRow> for PublicReservation {
    fn from(row: PublicReservationRow) -> Self {
        Self {
            date: row.reservation_start_date,
            time: row.reservation_from_time.map(|t| t.format("%H:%M").to_string()),
            status: row.status_name,
            notes: row.notes,
            doctor: row.doctor_name.map(|name| NamedRef { name }),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicPatientProfile {
    pub name: String,
    pub age: Option<i32>,
    pub sex: Option<i16>,
    pub sex_label: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub systemic_conditions: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub tooth_details: Option<Value>,
    pub doctor: Option<NamedRef>,
    pub cases: Vec<PublicCase>,
    pub images: Vec<PublicImage>,
    pub upcoming_reservations: Vec<PublicReservation>,
    pub cases_count: usize,
    pub images_count: usize,
    pub member_since: DateTime<Utc>,
}

fn sex_label(sex: Option<i16>) -> Option<String> {
    match sex {
        Some(1) => Some("Male".to_string()),
        Some(2) => Some("Female".to_string()),
        _ => None,
    }
}

// ============================================================================
// QUERIES
// ============================================================================

async fn find_public_patient(pool: &PgPool, token: &str) -> Result<PublicPatientRow, ApiError> {
    let token = Uuid::parse_str(token.trim()).map_err(|_| ApiError::not_found_message(NOT_PUBLIC))?;
    sqlx::query_as::<_, PublicPatientRow>(
        r#"
        SELECT p.id, p.name, p.age, p.sex, p.birth_date, p.systemic_conditions, p.tooth_details,
               d.name AS doctor_name, p.created_at
        FROM patients p
        LEFT JOIN users d ON d.id = p.doctor_id
        WHERE p.public_token = $1 AND p.is_public_profile_enabled AND p.deleted_at IS NULL
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found_message(NOT_PUBLIC))
}

async fn patient_cases(pool: &PgPool, patient_id: i64) -> Result<Vec<PublicCase>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PublicCaseRow>(
        r#"
        SELECT c.id, c.tooth_num, c.notes, cc.name AS category_name,
               s.name_en AS status_name_en, s.name_ar AS status_name_ar, s.color AS status_color,
               c.created_at
        FROM cases c
        LEFT JOIN case_categories cc ON cc.id = c.case_categores_id
        LEFT JOIN statuses s ON s.id = c.status_id
        WHERE c.patient_id = $1 AND c.deleted_at IS NULL
        ORDER BY c.created_at DESC
        "#,
    )
    .bind(patient_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(PublicCase::from).collect())
}

async fn patient_images(pool: &PgPool, patient_id: i64) -> Result<Vec<PublicImage>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PublicImageRow>(
        r#"
        SELECT id, path, type, alt_text, created_at
        FROM images
        WHERE imageable_type = 'Patient' AND imageable_id = $1 AND deleted_at IS NULL
        ORDER BY sort_order, id
        "#,
    )
    .bind(patient_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(PublicImage::from).collect())
}

async fn upcoming_reservations(pool: &PgPool, patient_id: i64) -> Result<Vec<PublicReservation>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PublicReservationRow>(
        r#"
        SELECT r.reservation_start_date, r.reservation_from_time, s.name_en AS status_name,
               r.notes, d.name AS doctor_name
        FROM reservations r
        LEFT JOIN statuses s ON s.id = r.status_id
        LEFT JOIN users d ON d.id = r.doctor_id
        WHERE r.patient_id = $1 AND r.deleted_at IS NULL AND r.reservation_start_date >= CURRENT_DATE
        ORDER BY r.reservation_start_date, r.reservation_from_time
        "#,
    )
    .bind(patient_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(PublicReservation::from).collect())
}

// ============================================================================
// API HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/public/patients/{token}",
    params(("token" = String, Path, description = "Patient public token")),
    responses(
        (status = 200, description = "Patient profile retrieved successfully", body = PublicPatientProfile),
        (status = 404, description = "Patient profile not found or not publicly accessible.")
    ),
    tag = "public"
)]
pub async fn show_public_profile(
    db: TenantDb,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<PublicPatientProfile>>, ApiError> {
    let pool = db.pool();
    let patient = find_public_patient(pool, &token).await?;
    let cases = patient_cases(pool, patient.id).await?;
    let images = patient_images(pool, patient.id).await?;
    let upcoming = upcoming_reservations(pool, patient.id).await?;

    let profile = PublicPatientProfile {
        sex_label: sex_label(patient.sex),
        name: patient.name,
        age: patient.age,
        sex: patient.sex,
        birth_date: patient.birth_date,
        systemic_conditions: patient.systemic_conditions,
        tooth_details: patient.tooth_details,
        doctor: patient.doctor_name.map(|name| NamedRef { name }),
        cases_count: cases.len(),
        images_count: images.len(),
        cases,
        images,
        upcoming_reservations: upcoming,
        member_since: patient.created_at,
    };
    Ok(Json(api_message(profile, "Patient profile retrieved successfully")))
}

#[utoipa::path(
    get,
    path = "/api/public/patients/{token}/cases",
    params(("token" = String, Path, description = "Patient public token")),
    responses(
        (status = 200, description = "Patient cases retrieved successfully", body = Vec<PublicCase>),
        (status = 404, description = "Patient profile not found or not publicly accessible.")
    ),
    tag = "public"
)]
pub async fn public_cases(
    db: TenantDb,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<Vec<PublicCase>>>, ApiError> {
    let patient = find_public_patient(db.pool(), &token).await?;
    let cases = patient_cases(db.pool(), patient.id).await?;
    Ok(Json(api_message(cases, "Patient cases retrieved successfully")))
}

#[utoipa::path(
    get,
    path = "/api/public/patients/{token}/images",
    params(("token" = String, Path, description = "Patient public token")),
    responses(
        (status = 200, description = "Patient images retrieved successfully", body = Vec<PublicImage>),
        (status = 404, description = "Patient profile not found or not publicly accessible.")
    ),
    tag = "public"
)]
pub async fn public_images(
    db: TenantDb,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<Vec<PublicImage>>>, ApiError> {
    let patient = find_public_patient(db.pool(), &token).await?;
    let images = patient_images(db.pool(), patient.id).await?;
    Ok(Json(api_message(images, "Patient images retrieved successfully")))
}

#[utoipa::path(
    get,
    path = "/api/public/patients/{token}/reservations",
    params(("token" = String, Path, description = "Patient public token")),
    responses(
        (status = 200, description = "Upcoming reservations retrieved successfully", body = Vec<PublicReservation>),
        (status = 404, description = "Patient profile not found or not publicly accessible.")
    ),
    tag = "public"
)]
pub async fn public_reservations(
    db: TenantDb,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<Vec<PublicReservation>>>, ApiError> {
    let patient = find_public_patient(db.pool(), &token).await?;
    let reservations = upcoming_reservations(db.pool(), patient.id).await?;
    Ok(Json(api_message(reservations, "Upcoming reservations retrieved successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_sex_labels() {
        assert_eq!(sex_label(Some(1)).as_deref(), Some("Male"));
        assert_eq!(sex_label(Some(2)).as_deref(), Some("Female"));
        assert_eq!(sex_label(None), None);
    }

    #[test]
    fn test_case_without_status_color_defaults_black() {
        let case = PublicCase::from(PublicCaseRow {
            id: 3,
            tooth_num: Some("11".to_string()),
            notes: None,
            category_name: Some("Filling".to_string()),
            status_name_en: Some("Done".to_string()),
            status_name_ar: Some("منجز".to_string()),
            status_color: None,
            created_at: Utc::now(),
        });
        assert_eq!(case.status.map(|s| s.color).as_deref(), Some("#000000"));
        assert_eq!(case.category.map(|c| c.name).as_deref(), Some("Filling"));
    }

    #[tokio::test]
    async fn test_malformed_token_is_not_found() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let err = find_public_patient(&pool, "not-a-uuid").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), NOT_PUBLIC);
    }
}
