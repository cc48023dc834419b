// Startup checks on a loaded configuration
use crate::error::{ConfigError, Result};
use crate::settings::AppConfig;
use secrecy::ExposeSecret;

/// Minimum HS256 secret length accepted outside local-like environments
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Reject configurations the server cannot run safely with
pub fn validate(config: &AppConfig) -> Result<()> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError("server.port must be non-zero".to_string()));
    }

    if config.database.host.trim().is_empty() || config.database.database.trim().is_empty() {
        return Err(ConfigError::Missing("database.host / database.database".to_string()));
    }

    let secret = config.jwt.secret.expose_secret();
    if secret.is_empty() {
        return Err(ConfigError::Missing("jwt.secret".to_string()));
    }
    if config.server.environment.is_production() && secret.len() < MIN_JWT_SECRET_LEN {
        return Err(ConfigError::ValidationError(format!(
            "jwt.secret must be at least {MIN_JWT_SECRET_LEN} characters in {}",
            config.server.environment.as_str()
        )));
    }

    if config.jwt.ttl_minutes <= 0 || config.jwt.refresh_ttl_minutes < config.jwt.ttl_minutes {
        return Err(ConfigError::ValidationError(
            "jwt.refresh_ttl_minutes must be >= jwt.ttl_minutes > 0".to_string(),
        ));
    }

    if config.tenancy.database_prefix.is_empty() && config.tenancy.database_suffix.is_empty() {
        return Err(ConfigError::ValidationError(
            "tenancy needs a database_prefix or database_suffix".to_string(),
        ));
    }

    if config.onesignal.enabled
        && (config.onesignal.app_id.is_empty() || config.onesignal.api_key.expose_secret().is_empty())
    {
        return Err(ConfigError::Missing("onesignal.app_id / onesignal.api_key".to_string()));
    }

    Ok(())
}
