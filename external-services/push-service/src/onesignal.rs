//! OneSignal REST client

use crate::error::{PushError, PushResult};
use crate::message::PushMessage;
use crate::provider::{PushProvider, SendResult};
use async_trait::async_trait;
use config_engine::OneSignalSettings;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub struct OneSignalClient {
    http_client: Client,
    base_url: String,
    app_id: String,
    api_key: SecretString,
}

impl OneSignalClient {
    pub fn new(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> PushResult<Self> {
        let app_id = app_id.into();
        if app_id.is_empty() || api_key.expose_secret().is_empty() {
            return Err(PushError::NotConfigured(
                "OneSignal app id and REST API key are required".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PushError::NotConfigured(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_id,
            api_key,
        })
    }

    pub fn from_settings(settings: &OneSignalSettings) -> PushResult<Self> {
        Self::new(
            settings.base_url.clone(),
            settings.app_id.clone(),
            settings.api_key.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Interpret a `/notifications` response body.
    ///
    /// OneSignal returns an `id` for accepted notifications, even when some
    /// player ids were invalid; anything else is a rejection and the body is
    /// kept as the error text.
    fn interpret(body: &Value) -> SendResult {
        match body.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => SendResult::sent(id),
            _ => SendResult::failed(body.to_string()),
        }
    }
}

#[async_trait]
impl PushProvider for OneSignalClient {
    async fn send(&self, message: &PushMessage) -> PushResult<SendResult> {
        if message.player_ids.is_empty() {
            return Err(PushError::InvalidMessage("no recipients".to_string()));
        }

        let url = format!("{}/notifications", self.base_url);
        let payload = message.to_onesignal_payload(&self.app_id);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Basic {}", self.api_key.expose_secret()))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PushError::SendFailed(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PushError::InvalidResponse(e.to_string()))?;

        let result = Self::interpret(&body);
        if result.success {
            debug!(
                recipients = message.player_ids.len(),
                external_id = ?result.external_id,
                "Push notification accepted"
            );
        } else {
            warn!(status = %status, body = %body, "Push notification rejected");
        }
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "onesignal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Priority;
    use mockito::Matcher;
    use serde_json::json;

    fn client(base_url: &str) -> OneSignalClient {
        OneSignalClient::new(
            base_url,
            "app-123",
            SecretString::new("rest-key".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_requires_credentials() {
        let result = OneSignalClient::new(
            "https://onesignal.com/api/v1",
            "",
            SecretString::new("key".to_string()),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(PushError::NotConfigured(_))));
    }

    #[test]
    fn test_interpret_response() {
        assert_eq!(
            OneSignalClient::interpret(&json!({ "id": "abc", "recipients": 1 })),
            SendResult::sent("abc")
        );
        let failed = OneSignalClient::interpret(&json!({ "errors": ["All included players are not subscribed"] }));
        assert!(!failed.success);
        assert!(failed.error.unwrap().contains("not subscribed"));
    }

    #[tokio::test]
    async fn test_send_accepted() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/notifications")
            .match_header("authorization", "Basic rest-key")
            .match_body(Matcher::PartialJson(json!({
                "app_id": "app-123",
                "include_player_ids": ["player-1"],
                "priority": 10,
                "android_channel_id": "urgent-notifications"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"os-1","recipients":1}"#)
            .create_async()
            .await;

        let message = PushMessage::new("player-1", "Alert", "Body").with_priority(Priority::Urgent);
        let result = client(&server.url()).send(&message).await.unwrap();

        mock.assert_async().await;
        assert!(result.success);
        assert_eq!(result.external_id.as_deref(), Some("os-1"));
    }

    #[tokio::test]
    async fn test_send_rejected_keeps_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/notifications")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"errors":["Invalid player ids"]}"#)
            .create_async()
            .await;

        let message = PushMessage::new("bad", "t", "b");
        let result = client(&server.url()).send(&message).await.unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("Invalid player ids"));
    }

    #[tokio::test]
    async fn test_send_without_recipients() {
        let mut message = PushMessage::new("p", "t", "b");
        message.player_ids.clear();
        let result = client("http://127.0.0.1:1").send(&message).await;
        assert!(matches!(result, Err(PushError::InvalidMessage(_))));
    }
}
