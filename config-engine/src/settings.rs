//! Configuration sections

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Deployment environment.
///
/// Decides which credentials tenant connections use and whether the server
/// may create or drop tenant databases itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    #[serde(alias = "dev")]
    Development,
    Testing,
    Staging,
    #[serde(alias = "prod")]
    Production,
}

impl Environment {
    /// Tenant connections reuse the central username/password
    pub fn uses_central_credentials(self) -> bool {
        matches!(self, Environment::Local | Environment::Development | Environment::Testing)
    }

    /// The server is allowed to issue CREATE/DROP DATABASE
    pub fn manages_databases(self) -> bool {
        self.uses_central_credentials()
    }

    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production | Environment::Staging)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub tenancy: TenancySettings,
    pub jwt: JwtSettings,
    pub onesignal: OneSignalSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    /// Base URL the QR code of a public patient profile points at
    pub public_profile_base_url: String,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: Environment::Local,
            public_profile_base_url: "http://localhost:3000/public/patients".to_string(),
            allowed_origins: vec!["http://localhost:3000".to_string()],
            request_timeout_secs: 30,
        }
    }
}

/// Central (landlord) database connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(default = "empty_secret")]
    pub password: SecretString,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            database: "clinic_central".to_string(),
            username: "postgres".to_string(),
            password: empty_secret(),
            max_connections: 20,
            min_connections: 2,
            acquire_timeout_secs: 30,
        }
    }
}

impl DatabaseSettings {
    /// Connection URL, for logging only when the password is masked
    pub fn masked_url(&self) -> String {
        format!(
            "postgres://{}:****@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

/// Per-tenant database naming and credentials
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TenancySettings {
    pub database_prefix: String,
    pub database_suffix: String,
    /// Shared password of tenant database users in production
    pub tenant_db_password: Option<SecretString>,
    /// Run tenant migrations when a tenant pool is first opened
    pub auto_migrate: bool,
    pub pool_max_connections: u32,
    pub pool_idle_timeout_secs: u64,
}

impl Default for TenancySettings {
    fn default() -> Self {
        Self {
            database_prefix: "tenant".to_string(),
            database_suffix: String::new(),
            tenant_db_password: None,
            auto_migrate: false,
            pool_max_connections: 10,
            pool_idle_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    #[serde(default = "empty_secret")]
    pub secret: SecretString,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: empty_secret(),
            ttl_minutes: 60,
            refresh_ttl_minutes: 20_160,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OneSignalSettings {
    pub enabled: bool,
    pub app_id: String,
    #[serde(default = "empty_secret")]
    pub api_key: SecretString,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for OneSignalSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            app_id: String::new(),
            api_key: empty_secret(),
            base_url: "https://onesignal.com/api/v1".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
