//! Provider-neutral push message and its OneSignal payload

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Delivery urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent];

    /// OneSignal's 0-10 delivery priority
    pub fn onesignal_priority(self) -> u8 {
        match self {
            Priority::Urgent => 10,
            Priority::High => 9,
            Priority::Medium => 5,
            Priority::Low => 3,
        }
    }

    /// Android notification channel for the two loud levels
    pub fn android_channel(self) -> Option<&'static str> {
        match self {
            Priority::Urgent => Some("urgent-notifications"),
            Priority::High => Some("high-priority-notifications"),
            Priority::Medium | Priority::Low => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// A notification addressed to one or more OneSignal players
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub player_ids: Vec<String>,
    pub title: String,
    pub body: String,
    /// Extra key/values delivered to the app with the notification
    pub data: Map<String, Value>,
    pub priority: Priority,
    pub action_url: Option<String>,
}

impl PushMessage {
    pub fn new(player_id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            player_ids: vec![player_id.into()],
            title: title.into(),
            body: body.into(),
            data: Map::new(),
            priority: Priority::default(),
            action_url: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_action_url(mut self, url: Option<String>) -> Self {
        self.action_url = url;
        self
    }

    /// Merge an object into `data`; non-object values are stored under `value`
    pub fn with_data(mut self, data: Value) -> Self {
        match data {
            Value::Object(map) => self.data.extend(map),
            Value::Null => {}
            other => {
                self.data.insert("value".to_string(), other);
            }
        }
        self
    }

    pub fn with_data_entry(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    /// Body of `POST /notifications`
    pub fn to_onesignal_payload(&self, app_id: &str) -> Value {
        let mut payload = json!({
            "app_id": app_id,
            "include_player_ids": self.player_ids,
            "headings": { "en": self.title },
            "contents": { "en": self.body },
            "data": self.data,
            "priority": self.priority.onesignal_priority(),
        });

        if let Some(fields) = payload.as_object_mut() {
            if let Some(channel) = self.priority.android_channel() {
                fields.insert("android_channel_id".to_string(), json!(channel));
            }
            if let Some(url) = &self.action_url {
                fields.insert("url".to_string(), json!(url));
            }
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_mapping() {
        assert_eq!(Priority::Urgent.onesignal_priority(), 10);
        assert_eq!(Priority::High.onesignal_priority(), 9);
        assert_eq!(Priority::Medium.onesignal_priority(), 5);
        assert_eq!(Priority::Low.onesignal_priority(), 3);
        assert_eq!(Priority::Urgent.android_channel(), Some("urgent-notifications"));
        assert_eq!(Priority::High.android_channel(), Some("high-priority-notifications"));
        assert_eq!(Priority::Low.android_channel(), None);
    }

    #[test]
    fn test_payload_shape() {
        let message = PushMessage::new("player-1", "Appointment Reminder", "Tomorrow at 10:00")
            .with_priority(Priority::High)
            .with_action_url(Some("/appointments/5".to_string()))
            .with_data(json!({ "appointment_id": 5 }))
            .with_data_entry("notification_id", json!(42));

        let payload = message.to_onesignal_payload("app-123");
        assert_eq!(payload["app_id"], "app-123");
        assert_eq!(payload["include_player_ids"], json!(["player-1"]));
        assert_eq!(payload["headings"]["en"], "Appointment Reminder");
        assert_eq!(payload["contents"]["en"], "Tomorrow at 10:00");
        assert_eq!(payload["priority"], 9);
        assert_eq!(payload["android_channel_id"], "high-priority-notifications");
        assert_eq!(payload["url"], "/appointments/5");
        assert_eq!(payload["data"]["appointment_id"], 5);
        assert_eq!(payload["data"]["notification_id"], 42);
    }

    #[test]
    fn test_medium_payload_has_no_channel_or_url() {
        let payload = PushMessage::new("p", "t", "b").to_onesignal_payload("app");
        assert!(payload.get("android_channel_id").is_none());
        assert!(payload.get("url").is_none());
        assert_eq!(payload["priority"], 5);
    }

    #[test]
    fn test_scalar_data_is_wrapped() {
        let message = PushMessage::new("p", "t", "b").with_data(json!("plain"));
        assert_eq!(message.data["value"], "plain");
    }
}
