//! Request ID extraction and request metadata

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request context containing tracing information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Unique request ID for tracing
    pub request_id: String,
    /// User-Agent header value
    pub user_agent: Option<String>,
    /// Request timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Create a new request context with generated request ID
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            user_agent: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Build from headers, keeping a client supplied request ID
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        Self {
            request_id: request_id_from(headers).unwrap_or_else(|| Uuid::new_v4().to_string()),
            user_agent,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Client supplied request ID, if it is a sane token
pub fn request_id_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= 128)
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_id_kept_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("abc-123"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("clinic-app/2.1"));
        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.request_id, "abc-123");
        assert_eq!(ctx.user_agent.as_deref(), Some("clinic-app/2.1"));
    }

    #[test]
    fn test_request_id_generated_when_missing() {
        let ctx = RequestContext::from_headers(&HeaderMap::new());
        assert!(Uuid::parse_str(&ctx.request_id).is_ok());
    }
}
