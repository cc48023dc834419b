use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use database_layer::DatabaseError;
use reporting_engine::ReportError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Standard API error response structure
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiErrorResponse {
    /// Always false
    pub success: bool,
    /// Unique error ID for tracking
    pub error_id: String,
    /// Error type/code
    pub error_type: String,
    /// Human-readable error message
    pub message: String,
    /// Arabic message, for the errors clinics show to end users
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_ar: Option<String>,
    /// Field-specific validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<HashMap<String, Vec<String>>>,
    /// Timestamp when error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Suggested actions for resolving the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

/// Standard API success response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_ar: Option<String>,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

impl<T> ApiResponse<T> {
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_message_ar(mut self, message_ar: impl Into<String>) -> Self {
        self.message_ar = Some(message_ar.into());
        self
    }
}

/// Response metadata for pagination, etc.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Main API error enum
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        message_ar: Option<String>,
        field_errors: Option<HashMap<String, Vec<String>>>,
    },

    #[error("{message}")]
    Authentication {
        message: String,
        message_ar: Option<String>,
    },

    #[error("{message}")]
    Authorization { message: String },

    #[error("{resource_type} not found")]
    NotFound { resource_type: String },

    /// 404 whose whole message is given by the caller
    #[error("{message}")]
    Missing { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("{message}")]
    BadRequest { message: String },

    #[error("Tenant ID is required. Please provide X-Tenant-ID or X-Clinic-ID header.")]
    TenantRequired,

    #[error("Tenant not found.")]
    TenantNotFound { tenant_id: String },
}

impl ApiError {
    /// Create a validation error with field-specific errors
    pub fn validation_with_fields(
        message: impl Into<String>,
        field_errors: HashMap<String, Vec<String>>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            message_ar: None,
            field_errors: Some(field_errors),
        }
    }

    /// Create a validation error for a single field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), vec![message.clone()]);
        Self::validation_with_fields(message, field_errors)
    }

    /// Create a simple validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            message_ar: None,
            field_errors: None,
        }
    }

    /// Attach an Arabic message to a validation or authentication error
    pub fn with_message_ar(mut self, ar: impl Into<String>) -> Self {
        match &mut self {
            ApiError::Validation { message_ar, .. } | ApiError::Authentication { message_ar, .. } => {
                *message_ar = Some(ar.into());
            }
            _ => {}
        }
        self
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            message_ar: None,
        }
    }

    /// Authentication error carrying an Arabic message as well
    pub fn authentication_ar(message: impl Into<String>, message_ar: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            message_ar: Some(message_ar.into()),
        }
    }

    /// Create an authorization error
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(resource_type: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
        }
    }

    /// Not found error with a full sentence instead of a resource name
    pub fn not_found_message(message: impl Into<String>) -> Self {
        Self::Missing {
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Authorization { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } | ApiError::Missing { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Database(db_err) => match db_err {
                DatabaseError::TenantNotFound(_) => StatusCode::NOT_FOUND,
                DatabaseError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
                DatabaseError::ConnectionFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ if db_err.is_unique_violation() => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::TenantRequired => StatusCode::BAD_REQUEST,
            ApiError::TenantNotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "validation_error",
            ApiError::Authentication { .. } => "authentication_error",
            ApiError::Authorization { .. } => "authorization_error",
            ApiError::NotFound { .. } | ApiError::Missing { .. } => "not_found",
            ApiError::Conflict { .. } => "conflict",
            ApiError::Database(_) => "database_error",
            ApiError::Internal { .. } => "internal_error",
            ApiError::BadRequest { .. } => "bad_request",
            ApiError::TenantRequired => "tenant_required",
            ApiError::TenantNotFound { .. } => "tenant_not_found",
        }
    }

    /// Arabic rendering of the message, when one exists
    pub fn message_ar(&self) -> Option<String> {
        match self {
            ApiError::Validation { message_ar, .. } | ApiError::Authentication { message_ar, .. } => {
                message_ar.clone()
            }
            ApiError::TenantRequired => Some(
                "معرف العيادة مطلوب. يرجى إرسال X-Tenant-ID أو X-Clinic-ID.".to_string(),
            ),
            ApiError::TenantNotFound { .. } => Some("العيادة غير موجودة.".to_string()),
            _ => None,
        }
    }

    /// Get suggested actions for resolving the error
    pub fn suggestions(&self) -> Option<Vec<String>> {
        match self {
            ApiError::Validation { .. } => Some(vec![
                "Check the request payload for invalid fields".to_string(),
                "Ensure all required fields are provided".to_string(),
            ]),
            ApiError::Authentication { .. } => Some(vec![
                "Verify your authentication credentials".to_string(),
                "Check if your token has expired".to_string(),
            ]),
            ApiError::Authorization { .. } => Some(vec![
                "Verify you have the required permissions".to_string(),
                "Ask the clinic owner to grant access".to_string(),
            ]),
            ApiError::TenantRequired => Some(vec![
                "Send the clinic id in the X-Tenant-ID header".to_string(),
            ]),
            ApiError::Database(DatabaseError::ConnectionFailed(_)) => Some(vec![
                "Try again in a few moments".to_string(),
                "Contact support if the issue persists".to_string(),
            ]),
            _ => None,
        }
    }

    /// Pretty format database errors for better user experience
    pub fn format_database_error(db_error: &DatabaseError) -> String {
        match db_error {
            DatabaseError::ConnectionFailed(_) => {
                "Unable to connect to the clinic database.".to_string()
            }
            DatabaseError::TenantNotFound(id) => format!("Tenant '{}' not found.", id),
            DatabaseError::InvalidIdentifier(name) => {
                format!("'{}' is not a valid database name.", name)
            }
            DatabaseError::SqlxError(sqlx_err) => match sqlx_err {
                sqlx::Error::RowNotFound => "Requested record not found.".to_string(),
                sqlx::Error::Database(db) => match db.code().as_deref() {
                    Some("23505") => "A record with these details already exists.".to_string(),
                    Some("23503") => {
                        "Referenced record does not exist or has been deleted.".to_string()
                    }
                    Some("23514") => {
                        "The provided data does not meet validation requirements.".to_string()
                    }
                    Some("23502") => "Required field is missing or empty.".to_string(),
                    _ => "Database operation failed. Please try again.".to_string(),
                },
                _ => "Database operation failed. Please try again.".to_string(),
            },
            _ => "An unexpected database error occurred.".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();

        // Log the error with correlation ID
        error!(
            error_id = %error_id,
            error_type = %self.error_type(),
            status_code = %status_code.as_u16(),
            error = %self,
            "API error occurred"
        );

        let field_errors = match &self {
            ApiError::Validation { field_errors, .. } => field_errors.clone(),
            _ => None,
        };

        let message = match &self {
            ApiError::Database(db_err) => ApiError::format_database_error(db_err),
            ApiError::Internal { .. } => "An unexpected error occurred.".to_string(),
            _ => self.to_string(),
        };

        let error_response = ApiErrorResponse {
            success: false,
            error_id,
            error_type: self.error_type().to_string(),
            message,
            message_ar: self.message_ar(),
            field_errors,
            timestamp: chrono::Utc::now(),
            suggestions: self.suggestions(),
        };

        (status_code, Json(error_response)).into_response()
    }
}

/// Helper function to create successful API responses
pub fn api_success<T>(data: T) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        message: None,
        message_ar: None,
        data,
        metadata: None,
    }
}

/// Successful response carrying a human readable message
pub fn api_message<T>(data: T, message: impl Into<String>) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        message: Some(message.into()),
        message_ar: None,
        data,
        metadata: None,
    }
}

/// Helper function to create successful API responses with metadata
pub fn api_success_with_meta<T>(data: T, metadata: ResponseMetadata) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        message: None,
        message_ar: None,
        data,
        metadata: Some(metadata),
    }
}

/// Convert SQLx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(sqlx_error: sqlx::Error) -> Self {
        ApiError::Database(DatabaseError::SqlxError(sqlx_error))
    }
}

impl From<ReportError> for ApiError {
    fn from(error: ReportError) -> Self {
        match error {
            ReportError::InvalidDateRange { .. } => ApiError::field("date_to", error.to_string()),
            ReportError::Database(db_err) => ApiError::Database(db_err),
        }
    }
}

impl From<push_service::PushError> for ApiError {
    fn from(error: push_service::PushError) -> Self {
        ApiError::Internal {
            message: error.to_string(),
        }
    }
}

/// Convert serde JSON errors to API errors
impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::BadRequest {
            message: format!("Invalid JSON: {}", error),
        }
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::validation("x").status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::TenantRequired.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::TenantNotFound { tenant_id: "x".into() }.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::authorization("no").status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(ApiError::not_found("Patient").to_string(), "Patient not found");
    }

    #[test]
    fn test_invalid_date_range_becomes_field_error() {
        let from = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let err: ApiError = ReportError::InvalidDateRange { from, to }.into();
        match err {
            ApiError::Validation { field_errors: Some(fields), .. } => {
                assert!(fields.contains_key("date_to"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_tenant_errors_carry_arabic() {
        assert!(ApiError::TenantRequired.message_ar().is_some());
        assert!(ApiError::authentication("x").message_ar().is_none());
    }
}
