use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use push_service::Priority;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::auth::Role;
use crate::error::{api_message, api_success, ApiError, ApiResponse};
use crate::middleware::{AuthContext, TenantDb};
use crate::server::ClinicServer;
use crate::services::notification_service::NOTIFICATION_COLUMNS;
use crate::services::{Notification, NotificationKind, NotificationOptions, NotificationService};
use crate::types::de::{optional_bool, optional_number};
use crate::types::Query;
use crate::validation::RequestValidation;
use crate::{validate_field, validate_length, validate_one_of, validate_required};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

const DEFAULT_LIMIT: i64 = 50;

/// Recipient condition shared by every query on the caller's own inbox
const OWN_INBOX: &str = "notifiable_type = 'user' AND notifiable_id = $1 AND deleted_at IS NULL";

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListNotificationsParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "optional_bool")]
    pub is_read: Option<bool>,
    pub priority: Option<String>,
    /// At most 50
    #[serde(default, deserialize_with = "optional_number")]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCount {
    pub unread_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdatedCount {
    pub count: u64,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct NotificationStatistics {
    pub total: i64,
    pub unread: i64,
    pub read: i64,
    pub by_type: BTreeMap<String, i64>,
    pub by_priority: BTreeMap<String, i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NotificationRequest {
    /// Only `user` recipients are supported
    pub notifiable_type: Option<String>,
    pub notifiable_id: Option<i64>,
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub priority: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
    pub action_url: Option<String>,
}

impl RequestValidation for NotificationRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let Some(notifiable_type) = &self.notifiable_type else {
            return Err(ApiError::field("notifiable_type", "The notifiable type field is required."));
        };
        validate_one_of!(notifiable_type, ["user"], "The selected notifiable type is invalid.");
        if self.notifiable_id.is_none() {
            return Err(ApiError::field("notifiable_id", "The notifiable id field is required."));
        }
        let Some(title) = &self.title else {
            return Err(ApiError::field("title", "The title field is required."));
        };
        validate_required!(title, "The title field is required.");
        validate_length!(title, 1, 255, "The title may not be greater than 255 characters.");
        let Some(body) = &self.body else {
            return Err(ApiError::field("body", "The body field is required."));
        };
        validate_required!(body, "The body field is required.");
        if let Some(kind) = &self.kind {
            validate_field!(kind, kind.parse::<NotificationKind>().is_ok(), "The selected type is invalid.");
        }
        if let Some(priority) = &self.priority {
            validate_field!(priority, Priority::from_str(priority).is_ok(), "The selected priority is invalid.");
        }
        if let Some(data) = &self.data {
            validate_field!(data, data.is_object() || data.is_array(), "The data must be an array.");
        }
        if let Some(action_url) = &self.action_url {
            validate_field!(action_url, is_url(action_url), "The action url format is invalid.");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BroadcastRequest {
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub priority: Option<String>,
    /// Restrict to holders of this role
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkMultipleRequest {
    pub notification_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlayerIdRequest {
    pub player_id: String,
}

// ============================================================================
// HELPERS
// ============================================================================

fn is_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    rest.is_some_and(|r| !r.is_empty() && !r.contains(char::is_whitespace))
}

fn parse_kind(kind: Option<&str>) -> Result<NotificationKind, ApiError> {
    kind.map(|k| k.parse::<NotificationKind>().map_err(|_| ApiError::field("type", "The selected type is invalid.")))
        .transpose()
        .map(Option::unwrap_or_default)
}

fn parse_priority(priority: Option<&str>) -> Result<Priority, ApiError> {
    priority
        .map(|p| Priority::from_str(p).map_err(|_| ApiError::field("priority", "The selected priority is invalid.")))
        .transpose()
        .map(Option::unwrap_or_default)
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.filter(|l| *l > 0).map_or(DEFAULT_LIMIT, |l| l.min(DEFAULT_LIMIT))
}

/// Load a notification the caller is allowed to touch
async fn owned_notification(pool: &PgPool, auth: &AuthContext, id: i64) -> Result<Notification, ApiError> {
    let notification = sqlx::query_as::<_, Notification>(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Notification"))?;

    if notification.notifiable_type != "user" || notification.notifiable_id != auth.user_id {
        return Err(ApiError::authorization("Unauthorized"));
    }
    Ok(notification)
}

async fn unread_count(pool: &PgPool, user_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM notifications WHERE {OWN_INBOX} AND NOT is_read"))
        .bind(user_id)
        .fetch_one(pool)
        .await
}

async fn count_by(pool: &PgPool, user_id: i64, column: &str) -> Result<BTreeMap<String, i64>, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(&format!(
        "SELECT {column}, COUNT(*) FROM notifications WHERE {OWN_INBOX} GROUP BY {column}"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

// ============================================================================
// API HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/notifications",
    params(ListNotificationsParams),
    responses((status = 200, description = "The caller's notifications, newest first", body = NotificationList)),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn list_notifications(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ListNotificationsParams>,
) -> Result<Json<ApiResponse<NotificationList>>, ApiError> {
    let notifications = sqlx::query_as::<_, Notification>(&format!(
        r#"
        SELECT {NOTIFICATION_COLUMNS} FROM notifications
        WHERE {OWN_INBOX}
          AND ($2::TEXT IS NULL OR type = $2)
          AND ($3::BOOLEAN IS NULL OR is_read = $3)
          AND ($4::TEXT IS NULL OR priority = $4)
        ORDER BY created_at DESC, id DESC
        LIMIT $5
        "#
    ))
    .bind(auth.user_id)
    .bind(&params.kind)
    .bind(params.is_read)
    .bind(&params.priority)
    .bind(clamp_limit(params.limit))
    .fetch_all(db.pool())
    .await?;

    let unread_count = unread_count(db.pool(), auth.user_id).await?;
    Ok(Json(api_success(NotificationList {
        notifications,
        unread_count,
    })))
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    responses((status = 200, description = "Unread notification count", body = UnreadCount)),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn notification_unread_count(
    db: TenantDb,
    auth: AuthContext,
) -> Result<Json<ApiResponse<UnreadCount>>, ApiError> {
    let unread_count = unread_count(db.pool(), auth.user_id).await?;
    Ok(Json(api_success(UnreadCount { unread_count })))
}

#[utoipa::path(
    get,
    path = "/api/notifications/statistics",
    responses((status = 200, description = "Counts by read state, type and priority", body = NotificationStatistics)),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn notification_statistics(
    db: TenantDb,
    auth: AuthContext,
) -> Result<Json<ApiResponse<NotificationStatistics>>, ApiError> {
    let (total, unread): (i64, i64) = sqlx::query_as(&format!(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE NOT is_read) FROM notifications WHERE {OWN_INBOX}"
    ))
    .bind(auth.user_id)
    .fetch_one(db.pool())
    .await?;

    // Every known type and priority is reported, zero when absent
    let mut by_type: BTreeMap<String, i64> =
        NotificationKind::ALL.iter().map(|k| (k.as_str().to_string(), 0)).collect();
    by_type.extend(count_by(db.pool(), auth.user_id, "type").await?);
    let mut by_priority: BTreeMap<String, i64> =
        Priority::ALL.iter().map(|p| (p.as_str().to_string(), 0)).collect();
    by_priority.extend(count_by(db.pool(), auth.user_id, "priority").await?);

    Ok(Json(api_success(NotificationStatistics {
        total,
        unread,
        read: total - unread,
        by_type,
        by_priority,
    })))
}

#[utoipa::path(
    get,
    path = "/api/notifications/{id}",
    params(("id" = i64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification details", body = Notification),
        (status = 403, description = "Notification belongs to another user"),
        (status = 404, description = "Notification not found")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn get_notification(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Notification>>, ApiError> {
    let notification = owned_notification(db.pool(), &auth, id).await?;
    Ok(Json(api_success(notification)))
}

#[utoipa::path(
    post,
    path = "/api/notifications",
    request_body = NotificationRequest,
    responses(
        (status = 201, description = "Notification sent successfully", body = Notification),
        (status = 404, description = "Notifiable entity not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn create_notification(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<NotificationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Notification>>), ApiError> {
    req.validate()?;
    let recipient = req.notifiable_id.unwrap_or_default();
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND deleted_at IS NULL)")
        .bind(recipient)
        .fetch_one(db.pool())
        .await?;
    if !exists {
        return Err(ApiError::not_found_message("Notifiable entity not found"));
    }

    let options = NotificationOptions {
        kind: parse_kind(req.kind.as_deref())?,
        priority: parse_priority(req.priority.as_deref())?,
        data: req.data,
        action_url: req.action_url,
        sender_id: Some(auth.user_id),
    };
    let service = NotificationService::new(db.pool().clone(), server.push.clone());
    let notification = service
        .send(
            recipient,
            req.title.as_deref().unwrap_or_default(),
            req.body.as_deref().unwrap_or_default(),
            options,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(api_message(notification, "Notification sent successfully")),
    ))
}

#[utoipa::path(
    post,
    path = "/api/notifications/broadcast",
    request_body = BroadcastRequest,
    responses(
        (status = 201, description = "Notification sent to every matching user", body = UpdatedCount),
        (status = 403, description = "Only clinic owners may broadcast")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn broadcast_notification(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<BroadcastRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UpdatedCount>>), ApiError> {
    if !auth.has_role(Role::ClinicSuperDoctor) && !auth.is_super_admin() {
        return Err(ApiError::authorization("Only clinic owners can broadcast notifications"));
    }
    if req.title.trim().is_empty() {
        return Err(ApiError::field("title", "The title field is required."));
    }
    if req.body.trim().is_empty() {
        return Err(ApiError::field("body", "The body field is required."));
    }
    let role = req
        .role
        .as_deref()
        .map(|r| {
            Role::ALL
                .into_iter()
                .find(|role| role.as_str() == r)
                .ok_or_else(|| ApiError::field("role", "The selected role is invalid."))
        })
        .transpose()?;

    let options = NotificationOptions {
        kind: parse_kind(req.kind.as_deref())?,
        priority: parse_priority(req.priority.as_deref())?,
        data: None,
        action_url: None,
        sender_id: Some(auth.user_id),
    };
    let service = NotificationService::new(db.pool().clone(), server.push.clone());
    let sent = match role {
        Some(role) => service.send_to_role(role, &req.title, &req.body, options).await?,
        None => service.send_to_all_users(&req.title, &req.body, options).await?,
    };
    let count = u64::try_from(sent.len()).unwrap_or_default();
    info!(tenant_id = %db.tenant_id(), sender_id = auth.user_id, count, "Notification broadcast");

    Ok((
        StatusCode::CREATED,
        Json(api_message(UpdatedCount { count }, format!("Notification sent to {} users", count))),
    ))
}

#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    params(("id" = i64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked as read", body = Notification),
        (status = 403, description = "Notification belongs to another user"),
        (status = 404, description = "Notification not found")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_notification_read(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Notification>>, ApiError> {
    owned_notification(db.pool(), &auth, id).await?;
    let notification = sqlx::query_as::<_, Notification>(&format!(
        r#"
        UPDATE notifications
        SET is_read = TRUE, read_at = COALESCE(read_at, NOW()), updated_at = NOW()
        WHERE id = $1
        RETURNING {NOTIFICATION_COLUMNS}
        "#
    ))
    .bind(id)
    .fetch_one(db.pool())
    .await?;
    Ok(Json(api_message(notification, "Notification marked as read")))
}

#[utoipa::path(
    post,
    path = "/api/notifications/mark-multiple-read",
    request_body = MarkMultipleRequest,
    responses((status = 200, description = "Notifications marked as read", body = UpdatedCount)),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_multiple_read(
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<MarkMultipleRequest>,
) -> Result<Json<ApiResponse<UpdatedCount>>, ApiError> {
    if req.notification_ids.is_empty() {
        return Err(ApiError::field("notification_ids", "The notification ids field is required."));
    }
    // Ids belonging to someone else are silently left alone
    let count = sqlx::query(&format!(
        "UPDATE notifications SET is_read = TRUE, read_at = NOW(), updated_at = NOW() \
         WHERE {OWN_INBOX} AND NOT is_read AND id = ANY($2)"
    ))
    .bind(auth.user_id)
    .bind(&req.notification_ids)
    .execute(db.pool())
    .await?
    .rows_affected();

    Ok(Json(api_message(
        UpdatedCount { count },
        format!("{} notifications marked as read", count),
    )))
}

#[utoipa::path(
    post,
    path = "/api/notifications/mark-all-read",
    responses((status = 200, description = "All notifications marked as read", body = UpdatedCount)),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_all_read(
    db: TenantDb,
    auth: AuthContext,
) -> Result<Json<ApiResponse<UpdatedCount>>, ApiError> {
    let count = sqlx::query(&format!(
        "UPDATE notifications SET is_read = TRUE, read_at = NOW(), updated_at = NOW() WHERE {OWN_INBOX} AND NOT is_read"
    ))
    .bind(auth.user_id)
    .execute(db.pool())
    .await?
    .rows_affected();
    Ok(Json(api_message(UpdatedCount { count }, "All notifications marked as read")))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    params(("id" = i64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification deleted successfully"),
        (status = 403, description = "Notification belongs to another user"),
        (status = 404, description = "Notification not found")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn delete_notification(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    owned_notification(db.pool(), &auth, id).await?;
    sqlx::query("UPDATE notifications SET deleted_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(db.pool())
        .await?;
    Ok(Json(api_message((), "Notification deleted successfully")))
}

#[utoipa::path(
    post,
    path = "/api/notifications/player-id",
    request_body = PlayerIdRequest,
    responses(
        (status = 200, description = "Player ID updated successfully"),
        (status = 422, description = "Validation failed")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn update_player_id(
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<PlayerIdRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let player_id = req.player_id.trim();
    if player_id.is_empty() {
        return Err(ApiError::field("player_id", "The player id field is required."));
    }
    sqlx::query("UPDATE users SET onesignal_player_id = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
        .bind(auth.user_id)
        .bind(player_id)
        .execute(db.pool())
        .await?;
    Ok(Json(api_message((), "Player ID updated successfully")))
}

#[utoipa::path(
    post,
    path = "/api/notifications/test",
    responses((status = 200, description = "Test notification sent", body = Notification)),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn send_test_notification(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Notification>>, ApiError> {
    let service = NotificationService::new(db.pool().clone(), server.push.clone());
    let notification = service
        .send(
            auth.user_id,
            "Test Notification",
            "This is a test notification from the clinic system",
            NotificationOptions {
                kind: NotificationKind::General,
                priority: Priority::Low,
                data: Some(json!({ "test": true })),
                action_url: None,
                sender_id: Some(auth.user_id),
            },
        )
        .await?;
    Ok(Json(api_message(notification, "Test notification sent")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> NotificationRequest {
        NotificationRequest {
            notifiable_type: Some("user".to_string()),
            notifiable_id: Some(4),
            title: Some("Lab results".to_string()),
            body: Some("Your x-ray is ready".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_limit_is_capped() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some(10)), 10);
        assert_eq!(clamp_limit(Some(500)), 50);
        assert_eq!(clamp_limit(Some(0)), 50);
    }

    #[test]
    fn test_request_validation() {
        assert!(request().validate().is_ok());

        let mut req = request();
        req.kind = Some("promo".to_string());
        assert!(req.validate().is_err());

        let mut req = request();
        req.priority = Some("urgent".to_string());
        req.action_url = Some("https://clinic.example/cases/3".to_string());
        assert!(req.validate().is_ok());

        let mut req = request();
        req.action_url = Some("cases/3".to_string());
        assert!(req.validate().is_err());

        let mut req = request();
        req.notifiable_type = Some("patient".to_string());
        assert!(req.validate().is_err());

        let mut req = request();
        req.data = Some(json!("text"));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_defaults_for_kind_and_priority() {
        assert_eq!(parse_kind(None).unwrap(), NotificationKind::General);
        assert_eq!(parse_priority(None).unwrap(), Priority::Medium);
        assert_eq!(parse_priority(Some("high")).unwrap(), Priority::High);
        assert!(parse_kind(Some("spam")).is_err());
    }
}
