// Logger configuration
use serde::{Deserialize, Serialize};

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable output for local development
    #[default]
    Pretty,
    /// One JSON object per event for log shippers
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub redaction_enabled: bool,
    pub log_level: String,
    pub format: LogFormat,
    /// Crate target that receives `log_level`; everything else uses library defaults
    pub target: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            redaction_enabled: true,
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
            target: "clinic_server".to_string(),
        }
    }
}

impl LoggerConfig {
    /// Default `EnvFilter` directive used when `RUST_LOG` is not set
    pub fn default_directive(&self) -> String {
        format!(
            "{}={},database_layer={},reporting_engine={},push_service={},tower_http=info,sqlx=warn,hyper=info,reqwest=info",
            self.target, self.log_level, self.log_level, self.log_level, self.log_level
        )
    }
}
