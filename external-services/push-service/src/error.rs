use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("Push provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid push message: {0}")]
    InvalidMessage(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

pub type PushResult<T> = Result<T, PushError>;
