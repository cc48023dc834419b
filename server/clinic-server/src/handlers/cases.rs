use axum::{
    extract::{Path, State},
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
use crate::server::ClinicServer;
use crate::services::notification_service::spawn_notification;
use crate::services::NotificationService;
use crate::types::de::{optional_bool, optional_number};
use crate::types::{PaginationParams, Query};
use crate::utils::query_builder::{PaginatedQuery, SortDirection};
use crate::validation::RequestValidation;
use crate::validate_field;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Case {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_id: Option<i64>,
    pub case_categores_id: Option<i64>,
    pub status_id: Option<i64>,
    pub notes: Option<String>,
    pub price: i64,
    pub tooth_num: Option<String>,
    pub root_stuffing: Option<String>,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const CASE_COLUMNS: &str = "id, patient_id, doctor_id, case_categores_id, status_id, notes, price, \
     tooth_num, root_stuffing, is_paid, created_at, updated_at";

impl Resource for Case {
    const TABLE: &'static str = "cases";
    const COLUMNS: &'static str = CASE_COLUMNS;
    const NAME: &'static str = "Case";
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListCasesParams {
    #[serde(default, deserialize_with = "optional_number")]
    pub patient_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub doctor_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub status_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub case_categores_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_bool")]
    pub is_paid: Option<bool>,
    /// Matches notes or tooth number
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCaseRequest {
    pub patient_id: i64,
    pub doctor_id: Option<i64>,
    pub case_categores_id: i64,
    pub status_id: i64,
    pub notes: Option<String>,
    pub price: Option<i64>,
    pub tooth_num: Option<String>,
    pub root_stuffing: Option<String>,
    pub is_paid: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateCaseRequest {
    pub patient_id: Option<i64>,
    pub doctor_id: Option<i64>,
    pub case_categores_id: Option<i64>,
    pub status_id: Option<i64>,
    pub notes: Option<String>,
    pub price: Option<i64>,
    pub tooth_num: Option<String>,
    pub root_stuffing: Option<String>,
    pub is_paid: Option<bool>,
}

fn validate_case_text(
    notes: Option<&str>,
    price: Option<i64>,
    tooth_num: Option<&str>,
    root_stuffing: Option<&str>,
) -> Result<(), ApiError> {
    if let Some(notes) = notes {
        validate_field!(notes, notes.chars().count() <= 5000, "The notes may not be greater than 5000 characters.");
    }
    if let Some(price) = price {
        validate_field!(price, price >= 0, "The price must be at least 0.");
    }
    if let Some(tooth_num) = tooth_num {
        validate_field!(
            tooth_num,
            tooth_num.chars().count() <= 500,
            "The tooth num may not be greater than 500 characters."
        );
    }
    if let Some(root_stuffing) = root_stuffing {
        validate_field!(
            root_stuffing,
            root_stuffing.chars().count() <= 500,
            "The root stuffing may not be greater than 500 characters."
        );
    }
    Ok(())
}

impl RequestValidation for CreateCaseRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_case_text(
            self.notes.as_deref(),
            self.price,
            self.tooth_num.as_deref(),
            self.root_stuffing.as_deref(),
        )
    }
}

impl RequestValidation for UpdateCaseRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_case_text(
            self.notes.as_deref(),
            self.price,
            self.tooth_num.as_deref(),
            self.root_stuffing.as_deref(),
        )
    }
}

// ============================================================================
// HELPERS
// ============================================================================

async fn check_references(
    db: &TenantDb,
    patient_id: Option<i64>,
    doctor_id: Option<i64>,
    category_id: Option<i64>,
    status_id: Option<i64>,
) -> Result<(), ApiError> {
    let pool = db.pool();
    crud::require_optional(pool, "patients", patient_id, "patient_id", "The selected patient id is invalid.").await?;
    crud::require_optional(pool, "users", doctor_id, "doctor_id", "The selected doctor id is invalid.").await?;
    crud::require_optional(
        pool,
        "case_categories",
        category_id,
        "case_categores_id",
        "The selected case category is invalid.",
    )
    .await?;
    crud::require_optional(pool, "statuses", status_id, "status_id", "The selected status id is invalid.").await?;
    Ok(())
}

/// Live case visible to the caller; other doctors' cases look missing
async fn visible_case(db: &TenantDb, auth: &AuthContext, id: i64) -> Result<Case, ApiError> {
    let case = crud::get_live::<Case>(db.pool(), id).await?;
    match auth.doctor_scope().doctor_id() {
        Some(doctor_id) if case.doctor_id != Some(doctor_id) => Err(ApiError::not_found("Case")),
        _ => Ok(case),
    }
}

fn require_case_listing(auth: &AuthContext) -> Result<(), ApiError> {
    let allowed = ["view-clinic-cases", "view-all-cases", "view-own-cases", "create-bill"];
    if allowed.iter().any(|p| auth.has_permission(p)) {
        Ok(())
    } else {
        Err(ApiError::authorization(
            "Unauthorized. You need either view-clinic-cases or create-bill permission.",
        ))
    }
}

// ============================================================================
// API HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/cases",
    params(ListCasesParams),
    responses(
        (status = 200, description = "Cases retrieved successfully", body = Vec<Case>),
        (status = 403, description = "Missing view-clinic-cases or create-bill permission")
    ),
    tag = "cases",
    security(("bearer_auth" = []))
)]
pub async fn list_cases(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ListCasesParams>,
) -> Result<Json<ApiResponse<Vec<Case>>>, ApiError> {
    require_case_listing(&auth)?;

    let mut query = PaginatedQuery::new(CASE_COLUMNS, "FROM cases WHERE deleted_at IS NULL");
    query
        .filter_scope("doctor_id", auth.doctor_scope())
        .filter_eq("patient_id", params.patient_id)
        .filter_eq("doctor_id", params.doctor_id)
        .filter_eq("status_id", params.status_id)
        .filter_eq("case_categores_id", params.case_categores_id)
        .filter_eq("is_paid", params.is_paid)
        .filter_search(&["notes", "tooth_num"], params.search.as_deref())
        .order_by_allowed(
            params.sort_by.as_deref(),
            &["id", "price", "created_at", "updated_at"],
            "created_at",
            SortDirection::parse_or_desc(params.sort_direction.as_deref()),
        );

    let (cases, total) = query.fetch_page::<Case>(db.pool(), &params.pagination).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(cases, total)
            .with_message("Cases retrieved successfully"),
    ))
}

#[utoipa::path(
    post,
    path = "/api/cases",
    request_body = CreateCaseRequest,
    responses(
        (status = 201, description = "Case created successfully", body = Case),
        (status = 422, description = "Validation failed")
    ),
    tag = "cases",
    security(("bearer_auth" = []))
)]
pub async fn create_case(
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<CreateCaseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Case>>), ApiError> {
    auth.require_permission("create-case")?;
    req.validate()?;

    // A scoped doctor always records cases under their own name
    let doctor_id = auth.doctor_scope().doctor_id().or(req.doctor_id).or(Some(auth.user_id));
    check_references(
        &db,
        Some(req.patient_id),
        doctor_id,
        Some(req.case_categores_id),
        Some(req.status_id),
    )
    .await?;

    let case = sqlx::query_as::<_, Case>(&format!(
        r#"
        INSERT INTO cases (patient_id, doctor_id, case_categores_id, status_id, notes, price, tooth_num, root_stuffing, is_paid)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {CASE_COLUMNS}
        "#
    ))
    .bind(req.patient_id)
    .bind(doctor_id)
    .bind(req.case_categores_id)
    .bind(req.status_id)
    .bind(&req.notes)
    .bind(req.price.unwrap_or(0))
    .bind(&req.tooth_num)
    .bind(&req.root_stuffing)
    .bind(req.is_paid.unwrap_or(false))
    .fetch_one(db.pool())
    .await?;

    Ok((StatusCode::CREATED, Json(api_message(case, "Case created successfully"))))
}

#[utoipa::path(
    get,
    path = "/api/cases/{id}",
    params(("id" = i64, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Case retrieved successfully", body = Case),
        (status = 404, description = "Case not found")
    ),
    tag = "cases",
    security(("bearer_auth" = []))
)]
pub async fn get_case(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Case>>, ApiError> {
    auth.require_any_permission(&["view-clinic-cases", "view-all-cases", "view-own-cases"])?;
    let case = visible_case(&db, &auth, id).await?;
    Ok(Json(api_message(case, "Case retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/cases/{id}",
    params(("id" = i64, Path, description = "Case ID")),
    request_body = UpdateCaseRequest,
    responses(
        (status = 200, description = "Case updated successfully", body = Case),
        (status = 404, description = "Case not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "cases",
    security(("bearer_auth" = []))
)]
pub async fn update_case(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCaseRequest>,
) -> Result<Json<ApiResponse<Case>>, ApiError> {
    auth.require_permission("edit-case")?;
    req.validate()?;

    let mut case = visible_case(&db, &auth, id).await?;
    let doctor_id = match auth.doctor_scope().doctor_id() {
        Some(own) => Some(own),
        None => req.doctor_id,
    };
    check_references(&db, req.patient_id, doctor_id, req.case_categores_id, req.status_id).await?;

    if let Some(patient_id) = req.patient_id {
        case.patient_id = patient_id;
    }
    if let Some(price) = req.price {
        case.price = price;
    }
    if let Some(is_paid) = req.is_paid {
        case.is_paid = is_paid;
    }
    case.doctor_id = doctor_id.or(case.doctor_id);
    case.case_categores_id = req.case_categores_id.or(case.case_categores_id);
    case.status_id = req.status_id.or(case.status_id);
    case.notes = req.notes.or(case.notes);
    case.tooth_num = req.tooth_num.or(case.tooth_num);
    case.root_stuffing = req.root_stuffing.or(case.root_stuffing);

    let case = sqlx::query_as::<_, Case>(&format!(
        r#"
        UPDATE cases SET
            patient_id = $2, doctor_id = $3, case_categores_id = $4, status_id = $5, notes = $6,
            price = $7, tooth_num = $8, root_stuffing = $9, is_paid = $10, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {CASE_COLUMNS}
        "#
    ))
    .bind(case.id)
    .bind(case.patient_id)
    .bind(case.doctor_id)
    .bind(case.case_categores_id)
    .bind(case.status_id)
    .bind(&case.notes)
    .bind(case.price)
    .bind(&case.tooth_num)
    .bind(&case.root_stuffing)
    .bind(case.is_paid)
    .fetch_one(db.pool())
    .await?;

    if let Some(doctor_id) = case.doctor_id.filter(|d| *d != auth.user_id) {
        let notifications = NotificationService::new(db.pool().clone(), server.push.clone());
        let (case_id, sender) = (case.id, auth.user_id);
        spawn_notification("case_update", async move {
            notifications
                .case_update(doctor_id, case_id, &format!("Case #{}", case_id), Some(sender))
                .await
        });
    }

    Ok(Json(api_message(case, "Case updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/cases/{id}",
    params(("id" = i64, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Case deleted successfully"),
        (status = 404, description = "Case not found")
    ),
    tag = "cases",
    security(("bearer_auth" = []))
)]
pub async fn delete_case(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_permission("delete-case")?;
    visible_case(&db, &auth, id).await?;
    crud::soft_delete::<Case>(db.pool(), id).await?;
    Ok(Json(api_message((), "Case deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(permissions: &[&str]) -> AuthContext {
        AuthContext::with_permissions(
            7,
            Some("_clinic"),
            vec!["secretary".to_string()],
            permissions.iter().map(|p| p.to_string()).collect(),
        )
    }

    #[test]
    fn test_bill_creators_may_list_cases() {
        assert!(require_case_listing(&auth(&["create-bill"])).is_ok());
        assert!(require_case_listing(&auth(&["view-clinic-cases"])).is_ok());

        let err = require_case_listing(&auth(&["view-notes"])).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            err.to_string(),
            "Unauthorized. You need either view-clinic-cases or create-bill permission."
        );
    }

    #[test]
    fn test_case_text_limits() {
        assert!(validate_case_text(Some("ok"), Some(0), Some("11,12"), None).is_ok());
        assert!(validate_case_text(None, Some(-1), None, None).is_err());
        assert!(validate_case_text(None, None, Some("1".repeat(501).as_str()), None).is_err());
    }
}
