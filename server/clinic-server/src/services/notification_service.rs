//! In-app notifications with OneSignal push delivery.
//!
//! A notification is stored first (status `pending`) and then pushed when
//! the recipient has registered a device. The outcome is written back as
//! `sent` with OneSignal's id or `failed` with the error. Delivery problems
//! are logged and never surface as request errors.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use push_service::{Priority, PushMessage, PushProvider};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::auth::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    General,
    Appointment,
    Payment,
    Case,
    Reminder,
    Alert,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 6] = [
        NotificationKind::General,
        NotificationKind::Appointment,
        NotificationKind::Payment,
        NotificationKind::Case,
        NotificationKind::Reminder,
        NotificationKind::Alert,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::General => "general",
            NotificationKind::Appointment => "appointment",
            NotificationKind::Payment => "payment",
            NotificationKind::Case => "case",
            NotificationKind::Reminder => "reminder",
            NotificationKind::Alert => "alert",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown notification type '{s}'"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: i64,
    pub notifiable_type: String,
    pub notifiable_id: i64,
    pub title: String,
    pub body: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Option<Value>,
    pub onesignal_notification_id: Option<String>,
    pub onesignal_status: String,
    pub onesignal_error: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub sender_id: Option<i64>,
    pub priority: String,
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationOptions {
    pub kind: NotificationKind,
    pub priority: Priority,
    pub data: Option<Value>,
    pub action_url: Option<String>,
    pub sender_id: Option<i64>,
}

pub const NOTIFICATION_COLUMNS: &str = "id, notifiable_type, notifiable_id, title, body, type, data, \
     onesignal_notification_id, onesignal_status, onesignal_error, is_read, read_at, sender_id, \
     priority, action_url, created_at, updated_at";

#[derive(Clone)]
pub struct NotificationService {
    pool: PgPool,
    push: Arc<dyn PushProvider>,
}

impl NotificationService {
    pub fn new(pool: PgPool, push: Arc<dyn PushProvider>) -> Self {
        Self { pool, push }
    }

    /// Store a notification for `user_id` and push it to their device
    pub async fn send(
        &self,
        user_id: i64,
        title: &str,
        body: &str,
        options: NotificationOptions,
    ) -> Result<Notification, sqlx::Error> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications
                (notifiable_type, notifiable_id, title, body, type, data, sender_id, priority, action_url, onesignal_status)
            VALUES ('user', $1, $2, $3, $4, $5, $6, $7, $8, 'pending')
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(title)
        .bind(body)
        .bind(options.kind.as_str())
        .bind(&options.data)
        .bind(options.sender_id)
        .bind(options.priority.as_str())
        .bind(&options.action_url)
        .fetch_one(&self.pool)
        .await?;

        let player_id: Option<String> = sqlx::query_scalar(
            "SELECT onesignal_player_id FROM users WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .flatten();

        match player_id.filter(|p| !p.is_empty()) {
            Some(player_id) => self.deliver(notification, player_id).await,
            None => {
                debug!(notification_id = notification.id, user_id, "Recipient has no push device");
                Ok(notification)
            }
        }
    }

    async fn deliver(&self, notification: Notification, player_id: String) -> Result<Notification, sqlx::Error> {
        let priority = Priority::from_str(&notification.priority).unwrap_or_default();
        let message = PushMessage::new(player_id, &notification.title, &notification.body)
            .with_priority(priority)
            .with_action_url(notification.action_url.clone())
            .with_data(notification.data.clone().unwrap_or(Value::Null))
            .with_data_entry("notification_id", json!(notification.id))
            .with_data_entry("type", json!(notification.kind))
            .with_data_entry("action_url", json!(notification.action_url));

        let (status, external_id, error) = match self.push.send(&message).await {
            Ok(result) if result.success => ("sent", result.external_id, None),
            Ok(result) => ("failed", None, result.error),
            Err(e) => ("failed", None, Some(e.to_string())),
        };

        if let Some(error) = &error {
            warn!(
                notification_id = notification.id,
                provider = self.push.name(),
                error = %logger_redacted::redact(error),
                "Push delivery failed"
            );
        } else {
            info!(notification_id = notification.id, provider = self.push.name(), "Push delivered");
        }

        sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET onesignal_status = $2, onesignal_notification_id = $3, onesignal_error = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(notification.id)
        .bind(status)
        .bind(external_id)
        .bind(error)
        .fetch_one(&self.pool)
        .await
    }

    /// Send to each user; failures for one recipient do not stop the rest
    pub async fn send_to_many(
        &self,
        user_ids: &[i64],
        title: &str,
        body: &str,
        options: NotificationOptions,
    ) -> Vec<Notification> {
        let mut sent = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            match self.send(*user_id, title, body, options.clone()).await {
                Ok(notification) => sent.push(notification),
                Err(e) => warn!(user_id, error = %e, "Failed to store notification"),
            }
        }
        sent
    }

    /// Send to every active user holding `role`
    pub async fn send_to_role(
        &self,
        role: Role,
        title: &str,
        body: &str,
        options: NotificationOptions,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let user_ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT u.id FROM users u
            JOIN user_roles r ON r.user_id = u.id
            WHERE r.role = $1 AND u.is_active AND u.deleted_at IS NULL
            ORDER BY u.id
            "#,
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(self.send_to_many(&user_ids, title, body, options).await)
    }

    /// Send to every active user of the clinic
    pub async fn send_to_all_users(
        &self,
        title: &str,
        body: &str,
        options: NotificationOptions,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let user_ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE is_active AND deleted_at IS NULL ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(self.send_to_many(&user_ids, title, body, options).await)
    }

    pub async fn appointment_reminder(
        &self,
        user_id: i64,
        reservation_id: i64,
        date: NaiveDate,
        time: Option<NaiveTime>,
        sender_id: Option<i64>,
    ) -> Result<Notification, sqlx::Error> {
        let time_label = time.map(|t| t.format("%H:%M").to_string()).unwrap_or_else(|| "-".to_string());
        self.send(
            user_id,
            "Appointment Reminder",
            &format!("You have an appointment on {} at {}", date, time_label),
            NotificationOptions {
                kind: NotificationKind::Reminder,
                priority: Priority::High,
                data: Some(json!({ "id": reservation_id, "date": date, "time": time_label })),
                action_url: Some(format!("/appointments/{}", reservation_id)),
                sender_id,
            },
        )
        .await
    }

    pub async fn payment_notification(
        &self,
        user_id: i64,
        bill_id: i64,
        amount: i64,
        status: &str,
        sender_id: Option<i64>,
    ) -> Result<Notification, sqlx::Error> {
        self.send(
            user_id,
            "Payment Notification",
            &format!("Payment of {} has been {}", amount, status),
            NotificationOptions {
                kind: NotificationKind::Payment,
                priority: Priority::Medium,
                data: Some(json!({ "id": bill_id, "amount": amount, "status": status })),
                action_url: None,
                sender_id,
            },
        )
        .await
    }

    pub async fn case_update(
        &self,
        user_id: i64,
        case_id: i64,
        title: &str,
        sender_id: Option<i64>,
    ) -> Result<Notification, sqlx::Error> {
        self.send(
            user_id,
            "Case Updated",
            &format!("Your case '{}' has been updated", title),
            NotificationOptions {
                kind: NotificationKind::Case,
                priority: Priority::Medium,
                data: Some(json!({ "id": case_id, "title": title })),
                action_url: Some(format!("/cases/{}", case_id)),
                sender_id,
            },
        )
        .await
    }
}

/// Run a notification in the background; the request does not wait for
/// OneSignal and never fails because of it
pub fn spawn_notification<F>(context: &'static str, task: F)
where
    F: std::future::Future<Output = Result<Notification, sqlx::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = task.await {
            warn!(context, error = %e, "Notification could not be stored");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        for kind in NotificationKind::ALL {
            assert_eq!(kind.as_str().parse::<NotificationKind>(), Ok(kind));
        }
        assert!("promo".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_value(NotificationKind::Reminder).unwrap(), json!("reminder"));
    }
}
