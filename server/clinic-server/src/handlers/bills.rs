use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use reporting_engine::{BillStatistics, DoctorScope, ReportFilter, ReportsRepository};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use utoipa::{IntoParams, ToSchema};

use crate::error::{api_message, ApiError, ApiResponse};
use crate::handlers::common::crud::{self, Resource};
use crate::middleware::{AuthContext, TenantDb};
use crate::server::ClinicServer;
use crate::services::notification_service::spawn_notification;
use crate::services::NotificationService;
use crate::types::de::{optional_bool, optional_date, optional_number};
use crate::types::{PaginationParams, Query};
use crate::utils::query_builder::{PaginatedQuery, SortDirection};
use crate::validation::RequestValidation;
use crate::{validate_field, validate_one_of};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Bill {
    pub id: i64,
    pub patient_id: i64,
    pub billable_id: i64,
    /// `case` or `reservation`
    pub billable_type: String,
    pub price: i64,
    pub doctor_id: Option<i64>,
    pub is_paid: bool,
    pub use_credit: bool,
    pub creator_id: Option<i64>,
    pub updator_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const BILL_COLUMNS: &str = "id, patient_id, billable_id, billable_type, price, doctor_id, is_paid, \
     use_credit, creator_id, updator_id, created_at, updated_at";

impl Resource for Bill {
    const TABLE: &'static str = "bills";
    const COLUMNS: &'static str = BILL_COLUMNS;
    const NAME: &'static str = "Bill";
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListBillsParams {
    #[serde(default, deserialize_with = "optional_number")]
    pub patient_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub doctor_id: Option<i64>,
    pub billable_type: Option<String>,
    #[serde(default, deserialize_with = "optional_number")]
    pub billable_id: Option<i64>,
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
pub struct PatientBillsParams {
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BillStatisticsParams {
    #[serde(default, deserialize_with = "optional_date")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_date")]
    pub date_to: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_number")]
    pub doctor_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BillRequest {
    pub patient_id: Option<i64>,
    pub billable_id: Option<i64>,
    pub billable_type: Option<String>,
    pub price: Option<i64>,
    pub doctor_id: Option<i64>,
    pub is_paid: Option<bool>,
    /// Pay from the patient's credit balance
    pub use_credit: Option<bool>,
}

impl RequestValidation for BillRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(billable_type) = &self.billable_type {
            validate_one_of!(billable_type, ["case", "reservation"], "The selected billable type is invalid.");
        }
        if let Some(price) = self.price {
            validate_field!(price, price >= 0, "The price must be at least 0.");
        }
        Ok(())
    }
}

impl BillRequest {
    fn validate_create(&self) -> Result<(), ApiError> {
        self.validate()?;
        if self.patient_id.is_none() {
            return Err(ApiError::field("patient_id", "The patient id field is required."));
        }
        if self.billable_id.is_none() {
            return Err(ApiError::field("billable_id", "The billable id field is required."));
        }
        if self.billable_type.is_none() {
            return Err(ApiError::field("billable_type", "The billable type field is required."));
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

fn billable_table(billable_type: &str) -> Option<&'static str> {
    match billable_type {
        "case" => Some("cases"),
        "reservation" => Some("reservations"),
        _ => None,
    }
}

async fn check_references(db: &TenantDb, bill: &Bill) -> Result<(), ApiError> {
    let pool = db.pool();
    crud::require_exists(pool, "patients", bill.patient_id, "patient_id", "The selected patient id is invalid.").await?;
    crud::require_optional(pool, "users", bill.doctor_id, "doctor_id", "The selected doctor id is invalid.").await?;

    let table = billable_table(&bill.billable_type)
        .ok_or_else(|| ApiError::field("billable_type", "The selected billable type is invalid."))?;
    crud::require_exists(pool, table, bill.billable_id, "billable_id", "The selected billable id is invalid.").await
}

/// Take `amount` from the patient's credit balance inside the caller's transaction
async fn draw_credit(conn: &mut PgConnection, patient_id: i64, amount: i64) -> Result<(), ApiError> {
    let balance: Option<Option<i64>> =
        sqlx::query_scalar("SELECT credit_balance FROM patients WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
            .bind(patient_id)
            .fetch_optional(&mut *conn)
            .await?;

    let available = balance.flatten().unwrap_or(0);
    if available < amount {
        return Err(ApiError::field("use_credit", "The patient credit balance is not sufficient."));
    }

    sqlx::query("UPDATE patients SET credit_balance = $2, updated_at = NOW() WHERE id = $1")
        .bind(patient_id)
        .bind(available - amount)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) fn statistics_scope(auth: &AuthContext, doctor_id: Option<i64>) -> DoctorScope {
    match auth.doctor_scope() {
        DoctorScope::All => doctor_id.map_or(DoctorScope::All, DoctorScope::Doctor),
        scoped => scoped,
    }
}

/// Plain doctors only reach bills booked to them
fn bill_visible_to(bill: &Bill, auth: &AuthContext) -> bool {
    match auth.doctor_scope().doctor_id() {
        Some(doctor_id) => bill.doctor_id == Some(doctor_id),
        None => true,
    }
}

async fn visible_bill(db: &TenantDb, auth: &AuthContext, id: i64) -> Result<Bill, ApiError> {
    let bill = crud::get_live::<Bill>(db.pool(), id).await?;
    if bill_visible_to(&bill, auth) {
        Ok(bill)
    } else {
        Err(ApiError::not_found("Bill"))
    }
}

/// Doctor a bill ends up with after an edit; scoped doctors cannot hand it off
fn assigned_doctor(auth: &AuthContext, requested: Option<i64>, current: Option<i64>) -> Option<i64> {
    auth.doctor_scope().doctor_id().or(requested).or(current)
}

async fn set_paid(db: &TenantDb, auth: &AuthContext, id: i64, is_paid: bool) -> Result<Bill, ApiError> {
    visible_bill(db, auth, id).await?;
    let bill = sqlx::query_as::<_, Bill>(&format!(
        "UPDATE bills SET is_paid = $2, updator_id = $3, updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL RETURNING {BILL_COLUMNS}"
    ))
    .bind(id)
    .bind(is_paid)
    .bind(auth.user_id)
    .fetch_one(db.pool())
    .await?;
    Ok(bill)
}

// ============================================================================
// API HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/bills",
    params(ListBillsParams),
    responses((status = 200, description = "Bills retrieved successfully", body = Vec<Bill>)),
    tag = "bills",
    security(("bearer_auth" = []))
)]
pub async fn list_bills(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ListBillsParams>,
) -> Result<Json<ApiResponse<Vec<Bill>>>, ApiError> {
    let filter = ReportFilter::new(params.date_from, params.date_to)?;

    let mut query = PaginatedQuery::new(BILL_COLUMNS, "FROM bills WHERE deleted_at IS NULL");
    query
        .filter_scope("doctor_id", auth.doctor_scope())
        .filter_eq("patient_id", params.patient_id)
        .filter_eq("doctor_id", params.doctor_id)
        .filter_eq("billable_type", params.billable_type.clone())
        .filter_eq("billable_id", params.billable_id)
        .filter_eq("is_paid", params.is_paid)
        .filter_gte("created_at", filter.start_bound())
        .filter_lte("created_at", filter.end_bound())
        .order_by_allowed(
            params.sort_by.as_deref(),
            &["id", "price", "created_at", "updated_at"],
            "created_at",
            SortDirection::parse_or_desc(params.sort_direction.as_deref()),
        );

    let (bills, total) = query.fetch_page::<Bill>(db.pool(), &params.pagination).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(bills, total)
            .with_message("Bills retrieved successfully"),
    ))
}

#[utoipa::path(
    post,
    path = "/api/bills",
    request_body = BillRequest,
    responses(
        (status = 201, description = "Bill created successfully", body = Bill),
        (status = 422, description = "Validation failed")
    ),
    tag = "bills",
    security(("bearer_auth" = []))
)]
pub async fn create_bill(
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<BillRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Bill>>), ApiError> {
    auth.require_permission("create-bill")?;
    req.validate_create()?;

    let use_credit = req.use_credit.unwrap_or(false);
    let draft = Bill {
        id: 0,
        patient_id: req.patient_id.unwrap_or_default(),
        billable_id: req.billable_id.unwrap_or_default(),
        billable_type: req.billable_type.clone().unwrap_or_default(),
        price: req.price.unwrap_or_default(),
        doctor_id: auth.doctor_scope().doctor_id().or(req.doctor_id),
        is_paid: use_credit || req.is_paid.unwrap_or(false),
        use_credit,
        creator_id: Some(auth.user_id),
        updator_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    check_references(&db, &draft).await?;

    let mut tx = db.pool().begin().await?;
    if use_credit {
        draw_credit(&mut *tx, draft.patient_id, draft.price).await?;
    }
    let bill = sqlx::query_as::<_, Bill>(&format!(
        r#"
        INSERT INTO bills (patient_id, billable_id, billable_type, price, doctor_id, is_paid, use_credit, creator_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {BILL_COLUMNS}
        "#
    ))
    .bind(draft.patient_id)
    .bind(draft.billable_id)
    .bind(&draft.billable_type)
    .bind(draft.price)
    .bind(draft.doctor_id)
    .bind(draft.is_paid)
    .bind(draft.use_credit)
    .bind(draft.creator_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(api_message(bill, "Bill created successfully"))))
}

#[utoipa::path(
    get,
    path = "/api/bills/{id}",
    params(("id" = i64, Path, description = "Bill ID")),
    responses(
        (status = 200, description = "Bill retrieved successfully", body = Bill),
        (status = 404, description = "Bill not found")
    ),
    tag = "bills",
    security(("bearer_auth" = []))
)]
pub async fn get_bill(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Bill>>, ApiError> {
    let bill = visible_bill(&db, &auth, id).await?;
    Ok(Json(api_message(bill, "Bill retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/bills/{id}",
    params(("id" = i64, Path, description = "Bill ID")),
    request_body = BillRequest,
    responses(
        (status = 200, description = "Bill updated successfully", body = Bill),
        (status = 404, description = "Bill not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "bills",
    security(("bearer_auth" = []))
)]
pub async fn update_bill(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<BillRequest>,
) -> Result<Json<ApiResponse<Bill>>, ApiError> {
    auth.require_permission("edit-bill")?;
    req.validate()?;

    let mut bill = visible_bill(&db, &auth, id).await?;
    if let Some(patient_id) = req.patient_id {
        bill.patient_id = patient_id;
    }
    if let Some(billable_id) = req.billable_id {
        bill.billable_id = billable_id;
    }
    if let Some(billable_type) = req.billable_type {
        bill.billable_type = billable_type;
    }
    if let Some(price) = req.price {
        bill.price = price;
    }
    if let Some(is_paid) = req.is_paid {
        bill.is_paid = is_paid;
    }
    bill.doctor_id = assigned_doctor(&auth, req.doctor_id, bill.doctor_id);
    check_references(&db, &bill).await?;

    let bill = sqlx::query_as::<_, Bill>(&format!(
        r#"
        UPDATE bills SET
            patient_id = $2, billable_id = $3, billable_type = $4, price = $5, doctor_id = $6,
            is_paid = $7, updator_id = $8, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {BILL_COLUMNS}
        "#
    ))
    .bind(bill.id)
    .bind(bill.patient_id)
    .bind(bill.billable_id)
    .bind(&bill.billable_type)
    .bind(bill.price)
    .bind(bill.doctor_id)
    .bind(bill.is_paid)
    .bind(auth.user_id)
    .fetch_one(db.pool())
    .await?;

    Ok(Json(api_message(bill, "Bill updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/bills/{id}",
    params(("id" = i64, Path, description = "Bill ID")),
    responses(
        (status = 200, description = "Bill deleted successfully"),
        (status = 404, description = "Bill not found")
    ),
    tag = "bills",
    security(("bearer_auth" = []))
)]
pub async fn delete_bill(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_permission("delete-bill")?;
    visible_bill(&db, &auth, id).await?;
    crud::soft_delete::<Bill>(db.pool(), id).await?;
    Ok(Json(api_message((), "Bill deleted successfully")))
}

#[utoipa::path(
    patch,
    path = "/api/bills/{id}/mark-paid",
    params(("id" = i64, Path, description = "Bill ID")),
    responses(
        (status = 200, description = "Bill marked as paid successfully", body = Bill),
        (status = 404, description = "Bill not found")
    ),
    tag = "bills",
    security(("bearer_auth" = []))
)]
pub async fn mark_bill_paid(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Bill>>, ApiError> {
    auth.require_permission("edit-bill")?;
    let bill = set_paid(&db, &auth, id, true).await?;

    if let Some(doctor_id) = bill.doctor_id {
        let notifications = NotificationService::new(db.pool().clone(), server.push.clone());
        let (bill_id, amount, sender) = (bill.id, bill.price, auth.user_id);
        spawn_notification("payment_notification", async move {
            notifications
                .payment_notification(doctor_id, bill_id, amount, "paid", Some(sender))
                .await
        });
    }

    Ok(Json(api_message(bill, "Bill marked as paid successfully")))
}

#[utoipa::path(
    patch,
    path = "/api/bills/{id}/mark-unpaid",
    params(("id" = i64, Path, description = "Bill ID")),
    responses(
        (status = 200, description = "Bill marked as unpaid successfully", body = Bill),
        (status = 404, description = "Bill not found")
    ),
    tag = "bills",
    security(("bearer_auth" = []))
)]
pub async fn mark_bill_unpaid(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Bill>>, ApiError> {
    auth.require_permission("edit-bill")?;
    let bill = set_paid(&db, &auth, id, false).await?;
    Ok(Json(api_message(bill, "Bill marked as unpaid successfully")))
}

#[utoipa::path(
    get,
    path = "/api/bills/patient/{patient_id}",
    params(("patient_id" = i64, Path, description = "Patient ID"), PatientBillsParams),
    responses((status = 200, description = "Patient bills retrieved successfully", body = Vec<Bill>)),
    tag = "bills",
    security(("bearer_auth" = []))
)]
pub async fn patient_bills(
    db: TenantDb,
    auth: AuthContext,
    Path(patient_id): Path<i64>,
    Query(params): Query<PatientBillsParams>,
) -> Result<Json<ApiResponse<Vec<Bill>>>, ApiError> {
    let mut query = PaginatedQuery::new(BILL_COLUMNS, "FROM bills WHERE deleted_at IS NULL");
    query
        .filter_eq("patient_id", Some(patient_id))
        .filter_scope("doctor_id", auth.doctor_scope())
        .order_by("created_at", SortDirection::Desc);

    let (bills, total) = query.fetch_page::<Bill>(db.pool(), &params.pagination).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(bills, total)
            .with_message("Patient bills retrieved successfully"),
    ))
}

#[utoipa::path(
    get,
    path = "/api/bills/statistics/summary",
    params(BillStatisticsParams),
    responses(
        (status = 200, description = "Bill statistics retrieved successfully", body = BillStatistics),
        (status = 422, description = "date_to precedes date_from")
    ),
    tag = "bills",
    security(("bearer_auth" = []))
)]
pub async fn bill_statistics(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<BillStatisticsParams>,
) -> Result<Json<ApiResponse<BillStatistics>>, ApiError> {
    let filter = ReportFilter::new(params.date_from, params.date_to)?
        .with_scope(statistics_scope(&auth, params.doctor_id));
    let statistics = ReportsRepository::new(db.pool().clone()).bill_statistics(&filter).await?;
    Ok(Json(api_message(statistics, "Bill statistics retrieved successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(roles: &[&str]) -> AuthContext {
        AuthContext::with_permissions(
            9,
            Some("_clinic"),
            roles.iter().map(|r| r.to_string()).collect(),
            vec!["create-bill".to_string()],
        )
    }

    #[test]
    fn test_create_requires_billable_and_price() {
        let req = BillRequest {
            patient_id: Some(1),
            billable_id: Some(4),
            billable_type: Some("case".to_string()),
            ..Default::default()
        };
        let err = req.validate_create().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let req = BillRequest {
            patient_id: Some(1),
            billable_id: Some(4),
            billable_type: Some("invoice".to_string()),
            price: Some(100),
            ..Default::default()
        };
        assert!(req.validate_create().is_err());

        let req = BillRequest {
            patient_id: Some(1),
            billable_id: Some(4),
            billable_type: Some("reservation".to_string()),
            price: Some(100),
            ..Default::default()
        };
        assert!(req.validate_create().is_ok());
    }

    #[test]
    fn test_billable_tables() {
        assert_eq!(billable_table("case"), Some("cases"));
        assert_eq!(billable_table("reservation"), Some("reservations"));
        assert_eq!(billable_table("patient"), None);
    }

    fn bill(doctor_id: Option<i64>) -> Bill {
        Bill {
            id: 1,
            patient_id: 2,
            billable_id: 4,
            billable_type: "case".to_string(),
            price: 100,
            doctor_id,
            is_paid: false,
            use_credit: false,
            creator_id: None,
            updator_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_doctors_reach_only_their_bills() {
        let doctor = auth(&["doctor"]);
        assert!(bill_visible_to(&bill(Some(9)), &doctor));
        assert!(!bill_visible_to(&bill(Some(3)), &doctor));
        assert!(!bill_visible_to(&bill(None), &doctor));

        let owner = auth(&["clinic_super_doctor"]);
        assert!(bill_visible_to(&bill(Some(3)), &owner));
        assert!(bill_visible_to(&bill(None), &owner));
    }

    #[test]
    fn test_scoped_doctor_keeps_the_bill() {
        assert_eq!(assigned_doctor(&auth(&["doctor"]), Some(3), Some(9)), Some(9));
        assert_eq!(assigned_doctor(&auth(&["secretary"]), Some(3), Some(9)), Some(3));
        assert_eq!(assigned_doctor(&auth(&["secretary"]), None, Some(9)), Some(9));
    }

    #[test]
    fn test_doctor_scope_overrides_requested_doctor() {
        assert_eq!(statistics_scope(&auth(&["doctor"]), Some(3)), DoctorScope::Doctor(9));
        assert_eq!(
            statistics_scope(&auth(&["clinic_super_doctor"]), Some(3)),
            DoctorScope::Doctor(3)
        );
        assert_eq!(statistics_scope(&auth(&["secretary"]), None), DoctorScope::All);
    }
}
