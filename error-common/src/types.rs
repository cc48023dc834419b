use thiserror::Error;

/// Error enum for process-level failures
#[derive(Error, Debug)]
pub enum ClinicError {
    /// Network communication errors (binding, upstream services)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    ServerError(String),

    /// Database bootstrap errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal system errors
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Wrapped external errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClinicError {
    /// Short machine-readable category, used as a log field
    pub fn category(&self) -> &'static str {
        match self {
            ClinicError::NetworkError(_) => "network",
            ClinicError::ServerError(_) => "server",
            ClinicError::DatabaseError(_) => "database",
            ClinicError::ConfigError(_) => "config",
            ClinicError::InternalError(_) => "internal",
            ClinicError::Other(_) => "other",
        }
    }
}

/// Result type alias for clinic engine operations
pub type Result<T> = std::result::Result<T, ClinicError>;

/// Log an error with its category and the context it surfaced in
pub fn log_error(context: &str, error: &ClinicError) {
    tracing::error!(
        context = context,
        category = error.category(),
        error = %error,
        "Clinic engine error occurred"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names() {
        assert_eq!(ClinicError::ConfigError("x".into()).category(), "config");
        assert_eq!(ClinicError::NetworkError("x".into()).category(), "network");
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: ClinicError = anyhow::anyhow!("boom").into();
        assert_eq!(err.category(), "other");
        assert_eq!(err.to_string(), "boom");
    }
}
