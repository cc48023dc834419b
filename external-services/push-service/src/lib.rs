//! Push notification delivery.
//!
//! [`PushProvider`] is the seam the server depends on; [`OneSignalClient`]
//! talks to the OneSignal REST API and [`DisabledPushProvider`] stands in
//! when push is switched off.

pub mod error;
pub mod message;
pub mod onesignal;
pub mod provider;

pub use error::{PushError, PushResult};
pub use message::{Priority, PushMessage};
pub use onesignal::OneSignalClient;
pub use provider::{DisabledPushProvider, PushProvider, SendResult};

#[cfg(any(test, feature = "mock"))]
pub use provider::MockPushProvider;

use config_engine::OneSignalSettings;
use std::sync::Arc;

/// Provider selected by configuration
pub fn provider_from_settings(settings: &OneSignalSettings) -> PushResult<Arc<dyn PushProvider>> {
    if settings.enabled {
        Ok(Arc::new(OneSignalClient::from_settings(settings)?))
    } else {
        Ok(Arc::new(DisabledPushProvider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_provider_reports_failure() {
        let provider = provider_from_settings(&OneSignalSettings::default()).unwrap();
        assert_eq!(provider.name(), "disabled");
        let result = provider.send(&PushMessage::new("p", "t", "b")).await.unwrap();
        assert!(!result.success);
    }

    #[test]
    fn test_enabled_without_keys_fails() {
        let settings = OneSignalSettings {
            enabled: true,
            ..OneSignalSettings::default()
        };
        assert!(provider_from_settings(&settings).is_err());
    }
}
