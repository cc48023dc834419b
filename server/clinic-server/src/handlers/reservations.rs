use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::error::{api_message, ApiError, ApiResponse};
use crate::handlers::common::crud::{self, Resource};
use crate::middleware::{AuthContext, TenantDb};
use crate::server::ClinicServer;
use crate::services::notification_service::spawn_notification;
use crate::services::NotificationService;
use crate::types::de::{optional_bool, optional_date, optional_number, optional_time};
use crate::types::{PaginationParams, Query};
use crate::utils::query_builder::{PaginatedQuery, SortDirection};
use crate::validate_field;

const VIEW_RESERVATIONS: &[&str] = &["view-clinic-reservations", "view-all-reservations", "view-own-reservations"];

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_id: Option<i64>,
    pub status_id: Option<i64>,
    pub notes: Option<String>,
    pub reservation_start_date: NaiveDate,
    pub reservation_end_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, example = "09:30:00")]
    pub reservation_from_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "10:00:00")]
    pub reservation_to_time: Option<NaiveTime>,
    pub is_waiting: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const RESERVATION_COLUMNS: &str = "id, patient_id, doctor_id, status_id, notes, reservation_start_date, \
     reservation_end_date, reservation_from_time, reservation_to_time, is_waiting, created_at, updated_at";

impl Resource for Reservation {
    const TABLE: &'static str = "reservations";
    const COLUMNS: &'static str = RESERVATION_COLUMNS;
    const NAME: &'static str = "Reservation";
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListReservationsParams {
    #[serde(default, deserialize_with = "optional_number")]
    pub patient_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub doctor_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub status_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_bool")]
    pub is_waiting: Option<bool>,
    /// Reservations starting on this day
    #[serde(default, deserialize_with = "optional_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_date")]
    pub from_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_date")]
    pub to_date: Option<NaiveDate>,
    pub sort_direction: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

/// Create and update body; on update absent fields keep their value
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReservationRequest {
    pub patient_id: Option<i64>,
    pub doctor_id: Option<i64>,
    pub status_id: Option<i64>,
    pub notes: Option<String>,
    pub reservation_start_date: Option<NaiveDate>,
    pub reservation_end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_time")]
    #[schema(value_type = Option<String>, example = "09:30")]
    pub reservation_from_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "optional_time")]
    #[schema(value_type = Option<String>, example = "10:00")]
    pub reservation_to_time: Option<NaiveTime>,
    pub is_waiting: Option<bool>,
}

impl ReservationRequest {
    fn require_create_fields(&self) -> Result<(), ApiError> {
        let patient_id = self.patient_id;
        validate_field!(patient_id, patient_id.is_some(), "The patient id field is required.");
        let doctor_id = self.doctor_id;
        validate_field!(doctor_id, doctor_id.is_some(), "The doctor id field is required.");
        let reservation_start_date = self.reservation_start_date;
        validate_field!(
            reservation_start_date,
            reservation_start_date.is_some(),
            "The reservation start date field is required."
        );
        let reservation_from_time = self.reservation_from_time;
        validate_field!(
            reservation_from_time,
            reservation_from_time.is_some(),
            "The reservation from time field is required."
        );
        Ok(())
    }

    /// Overlay on a stored reservation
    fn apply(self, reservation: &mut Reservation) {
        if let Some(patient_id) = self.patient_id {
            reservation.patient_id = patient_id;
        }
        if let Some(start) = self.reservation_start_date {
            reservation.reservation_start_date = start;
        }
        if let Some(is_waiting) = self.is_waiting {
            reservation.is_waiting = is_waiting;
        }
        reservation.doctor_id = self.doctor_id.or(reservation.doctor_id);
        reservation.status_id = self.status_id.or(reservation.status_id);
        reservation.notes = self.notes.or(reservation.notes.take());
        reservation.reservation_end_date = self.reservation_end_date.or(reservation.reservation_end_date);
        reservation.reservation_from_time = self.reservation_from_time.or(reservation.reservation_from_time);
        reservation.reservation_to_time = self.reservation_to_time.or(reservation.reservation_to_time);
    }
}

/// Date and time ordering rules of a complete reservation
fn validate_schedule(reservation: &Reservation) -> Result<(), ApiError> {
    if let Some(reservation_end_date) = reservation.reservation_end_date {
        validate_field!(
            reservation_end_date,
            reservation_end_date >= reservation.reservation_start_date,
            "The reservation end date must be a date after or equal to reservation start date."
        );
    }
    if let (Some(from), Some(reservation_to_time)) = (reservation.reservation_from_time, reservation.reservation_to_time) {
        validate_field!(
            reservation_to_time,
            reservation_to_time > from,
            "The reservation to time must be a time after reservation from time."
        );
    }
    if let Some(notes) = &reservation.notes {
        validate_field!(notes, notes.chars().count() <= 5000, "The notes may not be greater than 5000 characters.");
    }
    Ok(())
}

// ============================================================================
// HELPERS
// ============================================================================

async fn check_references(db: &TenantDb, reservation: &Reservation) -> Result<(), ApiError> {
    let pool = db.pool();
    crud::require_exists(pool, "patients", reservation.patient_id, "patient_id", "The selected patient id is invalid.")
        .await?;
    crud::require_optional(pool, "users", reservation.doctor_id, "doctor_id", "The selected doctor id is invalid.")
        .await?;
    crud::require_optional(pool, "statuses", reservation.status_id, "status_id", "The selected status id is invalid.")
        .await?;
    Ok(())
}

async fn visible_reservation(db: &TenantDb, auth: &AuthContext, id: i64) -> Result<Reservation, ApiError> {
    let reservation = crud::get_live::<Reservation>(db.pool(), id).await?;
    match auth.doctor_scope().doctor_id() {
        Some(doctor_id) if reservation.doctor_id != Some(doctor_id) => Err(ApiError::not_found("Reservation")),
        _ => Ok(reservation),
    }
}

fn blank_reservation() -> Reservation {
    let now = Utc::now();
    Reservation {
        id: 0,
        patient_id: 0,
        doctor_id: None,
        status_id: None,
        notes: None,
        reservation_start_date: now.date_naive(),
        reservation_end_date: None,
        reservation_from_time: None,
        reservation_to_time: None,
        is_waiting: false,
        created_at: now,
        updated_at: now,
    }
}

// ============================================================================
// API HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/reservations",
    params(ListReservationsParams),
    responses(
        (status = 200, description = "Reservations retrieved successfully", body = Vec<Reservation>),
        (status = 403, description = "Missing reservation view permission")
    ),
    tag = "reservations",
    security(("bearer_auth" = []))
)]
pub async fn list_reservations(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ListReservationsParams>,
) -> Result<Json<ApiResponse<Vec<Reservation>>>, ApiError> {
    auth.require_any_permission(VIEW_RESERVATIONS)?;

    let mut query = PaginatedQuery::new(RESERVATION_COLUMNS, "FROM reservations WHERE deleted_at IS NULL");
    query
        .filter_scope("doctor_id", auth.doctor_scope())
        .filter_eq("patient_id", params.patient_id)
        .filter_eq("doctor_id", params.doctor_id)
        .filter_eq("status_id", params.status_id)
        .filter_eq("is_waiting", params.is_waiting)
        .filter_eq("reservation_start_date", params.date)
        .filter_gte("reservation_start_date", params.from_date)
        .filter_lte("reservation_start_date", params.to_date)
        .order_by(
            "reservation_start_date",
            SortDirection::parse_or_desc(params.sort_direction.as_deref()),
        );

    let (reservations, total) = query.fetch_page::<Reservation>(db.pool(), &params.pagination).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(reservations, total)
            .with_message("Reservations retrieved successfully"),
    ))
}

#[utoipa::path(
    post,
    path = "/api/reservations",
    request_body = ReservationRequest,
    responses(
        (status = 201, description = "Reservation created successfully", body = Reservation),
        (status = 422, description = "Validation failed")
    ),
    tag = "reservations",
    security(("bearer_auth" = []))
)]
pub async fn create_reservation(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Json(mut req): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Reservation>>), ApiError> {
    auth.require_permission("create-reservation")?;
    if let Some(own) = auth.doctor_scope().doctor_id() {
        req.doctor_id = Some(own);
    }
    req.require_create_fields()?;

    let mut draft = blank_reservation();
    req.apply(&mut draft);
    validate_schedule(&draft)?;
    check_references(&db, &draft).await?;

    let reservation = sqlx::query_as::<_, Reservation>(&format!(
        r#"
        INSERT INTO reservations
            (patient_id, doctor_id, status_id, notes, reservation_start_date, reservation_end_date,
             reservation_from_time, reservation_to_time, is_waiting)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {RESERVATION_COLUMNS}
        "#
    ))
    .bind(draft.patient_id)
    .bind(draft.doctor_id)
    .bind(draft.status_id)
    .bind(&draft.notes)
    .bind(draft.reservation_start_date)
    .bind(draft.reservation_end_date)
    .bind(draft.reservation_from_time)
    .bind(draft.reservation_to_time)
    .bind(draft.is_waiting)
    .fetch_one(db.pool())
    .await?;

    if let Some(doctor_id) = reservation.doctor_id {
        let notifications = NotificationService::new(db.pool().clone(), server.push.clone());
        let (reservation_id, date, time, sender) = (
            reservation.id,
            reservation.reservation_start_date,
            reservation.reservation_from_time,
            auth.user_id,
        );
        spawn_notification("appointment_reminder", async move {
            notifications
                .appointment_reminder(doctor_id, reservation_id, date, time, Some(sender))
                .await
        });
    }

    Ok((
        StatusCode::CREATED,
        Json(api_message(reservation, "Reservation created successfully")),
    ))
}

#[utoipa::path(
    get,
    path = "/api/reservations/{id}",
    params(("id" = i64, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation retrieved successfully", body = Reservation),
        (status = 404, description = "Reservation not found")
    ),
    tag = "reservations",
    security(("bearer_auth" = []))
)]
pub async fn get_reservation(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Reservation>>, ApiError> {
    auth.require_any_permission(VIEW_RESERVATIONS)?;
    let reservation = visible_reservation(&db, &auth, id).await?;
    Ok(Json(api_message(reservation, "Reservation retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/reservations/{id}",
    params(("id" = i64, Path, description = "Reservation ID")),
    request_body = ReservationRequest,
    responses(
        (status = 200, description = "Reservation updated successfully", body = Reservation),
        (status = 404, description = "Reservation not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "reservations",
    security(("bearer_auth" = []))
)]
pub async fn update_reservation(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(mut req): Json<ReservationRequest>,
) -> Result<Json<ApiResponse<Reservation>>, ApiError> {
    auth.require_permission("edit-reservation")?;
    let mut reservation = visible_reservation(&db, &auth, id).await?;
    if let Some(own) = auth.doctor_scope().doctor_id() {
        req.doctor_id = Some(own);
    }
    req.apply(&mut reservation);
    validate_schedule(&reservation)?;
    check_references(&db, &reservation).await?;

    let reservation = sqlx::query_as::<_, Reservation>(&format!(
        r#"
        UPDATE reservations SET
            patient_id = $2, doctor_id = $3, status_id = $4, notes = $5, reservation_start_date = $6,
            reservation_end_date = $7, reservation_from_time = $8, reservation_to_time = $9,
            is_waiting = $10, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {RESERVATION_COLUMNS}
        "#
    ))
    .bind(reservation.id)
    .bind(reservation.patient_id)
    .bind(reservation.doctor_id)
    .bind(reservation.status_id)
    .bind(&reservation.notes)
    .bind(reservation.reservation_start_date)
    .bind(reservation.reservation_end_date)
    .bind(reservation.reservation_from_time)
    .bind(reservation.reservation_to_time)
    .bind(reservation.is_waiting)
    .fetch_one(db.pool())
    .await?;

    Ok(Json(api_message(reservation, "Reservation updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/reservations/{id}",
    params(("id" = i64, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation deleted successfully"),
        (status = 404, description = "Reservation not found")
    ),
    tag = "reservations",
    security(("bearer_auth" = []))
)]
pub async fn delete_reservation(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_permission("delete-reservation")?;
    visible_reservation(&db, &auth, id).await?;
    crud::soft_delete::<Reservation>(db.pool(), id).await?;
    Ok(Json(api_message((), "Reservation deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut reservation = blank_reservation();
        ReservationRequest {
            patient_id: Some(1),
            reservation_start_date: Some(day(10)),
            reservation_end_date: Some(day(9)),
            ..ReservationRequest::default()
        }
        .apply(&mut reservation);
        assert!(validate_schedule(&reservation).is_err());

        reservation.reservation_end_date = Some(day(10));
        assert!(validate_schedule(&reservation).is_ok());
    }

    #[test]
    fn test_to_time_must_follow_from_time() {
        let mut reservation = blank_reservation();
        reservation.reservation_from_time = Some(at(10, 0));
        reservation.reservation_to_time = Some(at(10, 0));
        assert!(validate_schedule(&reservation).is_err());

        reservation.reservation_to_time = Some(at(10, 30));
        assert!(validate_schedule(&reservation).is_ok());
    }

    #[test]
    fn test_create_requires_doctor_and_time() {
        let req: ReservationRequest = serde_json::from_str(
            r#"{"patient_id": 1, "reservation_start_date": "2024-05-10", "reservation_from_time": "09:30"}"#,
        )
        .unwrap();
        assert_eq!(req.reservation_from_time, Some(at(9, 30)));
        assert!(req.require_create_fields().is_err());
    }
}
