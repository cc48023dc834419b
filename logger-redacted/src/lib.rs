//! Logging for the clinic engine with automatic PII redaction.
//!
//! Clinic logs routinely mention phone numbers (login is by phone), patient
//! emails and bearer tokens. This crate installs the process-wide `tracing`
//! subscriber and provides a [`PiiRedactor`] plus `redacted_*!` macros so
//! those values never reach log sinks in clear text.
//!
//! # Example
//!
//! ```rust
//! use logger_redacted::{redact, redacted_warn};
//!
//! let line = redact("login failed for 07701234567");
//! assert!(!line.contains("07701234567"));
//!
//! redacted_warn!("smart-login rejected for {}", "07701234567");
//! ```

pub mod config;
pub mod macros;
pub mod redactor;

pub use config::*;
pub use redactor::*;

use error_common::{ClinicError, Result};
use lazy_static::lazy_static;
use tracing_subscriber::{fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

lazy_static! {
    static ref GLOBAL_REDACTOR: PiiRedactor = PiiRedactor::default();
}

/// Redact a message with the default configuration
pub fn redact(text: &str) -> String {
    GLOBAL_REDACTOR.redact(text)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when it is set.
pub fn init_tracing(config: &LoggerConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let result = match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(true),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .try_init(),
    };

    result.map_err(|e| ClinicError::InternalError(format!("Failed to initialize tracing: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_redact() {
        let line = redact("contact admin@clinic.iq");
        assert!(!line.contains("admin@clinic.iq"));
    }

    #[test]
    fn test_default_directive_includes_target() {
        let config = LoggerConfig {
            log_level: "debug".to_string(),
            ..Default::default()
        };
        assert!(config.default_directive().starts_with("clinic_server=debug"));
    }
}
