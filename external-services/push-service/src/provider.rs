use crate::error::PushResult;
use crate::message::PushMessage;
use async_trait::async_trait;

/// Outcome of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub success: bool,
    /// Provider-side id of the notification when accepted
    pub external_id: Option<String>,
    pub error: Option<String>,
}

impl SendResult {
    pub fn sent(external_id: impl Into<String>) -> Self {
        Self {
            success: true,
            external_id: Some(external_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            external_id: None,
            error: Some(error.into()),
        }
    }
}

/// Something that can deliver push messages
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// `Err` means the request could not be made; a rejection by the
    /// provider is an `Ok` result with `success == false`
    async fn send(&self, message: &PushMessage) -> PushResult<SendResult>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}

/// Provider used when push delivery is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledPushProvider;

#[async_trait]
impl PushProvider for DisabledPushProvider {
    async fn send(&self, _message: &PushMessage) -> PushResult<SendResult> {
        Ok(SendResult::failed("push delivery is disabled"))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}
