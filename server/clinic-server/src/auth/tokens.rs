//! JWT issuing, verification, refresh and revocation
//!
//! Tokens are HS256 and carry the user's tenant, roles and effective
//! permissions so that per-request authorization never touches the
//! database. Logout and refresh revoke a token's `jti`. When a user's
//! status or permissions change, every token issued to them up to that
//! moment is cut off, and so is every token of a deleted tenant. Refresh
//! is where the user is read back from the database. Both denylists live in
//! memory until the tokens they cover could no longer be used anyway.

use chrono::Utc;
use config_engine::JwtSettings;
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;

// =============================================================================
// JWT TOKEN CLAIMS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID within the tenant, or central user ID)
    pub sub: i64,
    /// Tenant the token was issued for; `None` for central tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiration (seconds since epoch)
    pub exp: i64,
    /// JWT ID (unique token identifier)
    pub jti: String,
}

/// Who a token is issued to
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: i64,
    pub tenant_id: Option<String>,
    pub name: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until the token expires
    pub expires_in: i64,
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Token can no longer be refreshed")]
    RefreshWindowElapsed,

    #[error("Token is no longer valid for this account")]
    Superseded,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => ApiError::internal(msg),
            other => ApiError::authentication(other.to_string()),
        }
    }
}

// =============================================================================
// JWT SERVICE
// =============================================================================

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
    refresh_ttl_secs: i64,
    /// jti -> unix time after which the entry can be dropped
    revoked: DashMap<String, i64>,
    /// subject key -> tokens issued at or before this unix time are void
    cutoffs: DashMap<String, i64>,
}

fn user_key(tenant_id: Option<&str>, user_id: i64) -> String {
    format!("{}/{}", tenant_id.unwrap_or_default(), user_id)
}

fn tenant_key(tenant_id: &str) -> String {
    format!("{}/*", tenant_id)
}

impl TokenService {
    pub fn new(settings: &JwtSettings) -> Self {
        let secret = settings.secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs: settings.ttl_minutes * 60,
            refresh_ttl_secs: settings.refresh_ttl_minutes * 60,
            revoked: DashMap::new(),
            cutoffs: DashMap::new(),
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Sign a fresh access token for `subject`
    pub fn issue(&self, subject: &TokenSubject) -> Result<IssuedToken, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.user_id,
            tenant_id: subject.tenant_id.clone(),
            name: subject.name.clone(),
            roles: subject.roles.clone(),
            permissions: subject.permissions.clone(),
            iat: now,
            exp: now + self.ttl_secs,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            access_token: token,
            token_type: "Bearer",
            expires_in: self.ttl_secs,
        })
    }

    fn decode(&self, token: &str, check_exp: bool) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = check_exp;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        if self.is_revoked(&data.claims.jti) {
            return Err(TokenError::Revoked);
        }
        Ok(data.claims)
    }

    /// Check signature, expiry and revocation
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode(token, true)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        if self.is_cut_off(&claims) || self.tenant_cut_off(&claims) {
            return Err(TokenError::Superseded);
        }
        Ok(claims)
    }

    /// Claims of a token that may still be exchanged. Expired tokens are
    /// accepted while `now <= iat + refresh_ttl`. A user cut-off does not
    /// block refresh: the caller reloads the account and decides.
    pub fn refreshable(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode(token, false)?;
        if Utc::now().timestamp() > claims.iat + self.refresh_ttl_secs {
            return Err(TokenError::RefreshWindowElapsed);
        }
        if self.tenant_cut_off(&claims) {
            return Err(TokenError::Superseded);
        }
        Ok(claims)
    }

    /// Issue a token for the reloaded `subject` in place of `old`, which is
    /// revoked
    pub fn reissue(&self, old: &Claims, subject: &TokenSubject) -> Result<IssuedToken, TokenError> {
        if subject.user_id != old.sub || subject.tenant_id != old.tenant_id {
            return Err(TokenError::Invalid("subject does not match the token".to_string()));
        }
        let issued = self.issue(subject)?;
        self.revoke(&old.jti, (old.iat + self.refresh_ttl_secs).max(old.exp));
        Ok(issued)
    }

    /// Deny `jti` until `until` (unix seconds)
    pub fn revoke(&self, jti: &str, until: i64) {
        self.purge_expired();
        self.revoked.insert(jti.to_string(), until);
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.revoked.contains_key(jti)
    }

    /// Void every token issued so far to one user
    pub fn revoke_user(&self, tenant_id: Option<&str>, user_id: i64) {
        self.purge_expired();
        self.cutoffs.insert(user_key(tenant_id, user_id), Utc::now().timestamp());
    }

    /// Void every token issued so far for a tenant
    pub fn revoke_tenant(&self, tenant_id: &str) {
        self.purge_expired();
        self.cutoffs.insert(tenant_key(tenant_id), Utc::now().timestamp());
    }

    fn is_cut_off(&self, claims: &Claims) -> bool {
        self.cutoffs
            .get(&user_key(claims.tenant_id.as_deref(), claims.sub))
            .is_some_and(|cutoff| claims.iat <= *cutoff)
    }

    fn tenant_cut_off(&self, claims: &Claims) -> bool {
        claims.tenant_id.as_deref().is_some_and(|tenant_id| {
            self.cutoffs
                .get(&tenant_key(tenant_id))
                .is_some_and(|cutoff| claims.iat <= *cutoff)
        })
    }

    fn purge_expired(&self) {
        let now = Utc::now().timestamp();
        self.revoked.retain(|_, until| *until >= now);
        // A token issued before the cut-off can be neither used nor refreshed
        // once the refresh window has passed
        let horizon = self.refresh_ttl_secs.max(self.ttl_secs);
        self.cutoffs.retain(|_, cutoff| *cutoff + horizon >= now);
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn service(ttl_minutes: i64, refresh_ttl_minutes: i64) -> TokenService {
        TokenService::new(&JwtSettings {
            secret: SecretString::new("0123456789abcdef0123456789abcdef".to_string()),
            ttl_minutes,
            refresh_ttl_minutes,
        })
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: 7,
            tenant_id: Some("_alshifa".to_string()),
            name: "Dr. Sara".to_string(),
            roles: vec!["doctor".to_string()],
            permissions: vec!["view-clinic-patients".to_string()],
        }
    }

    fn sign(service: &TokenService, iat: i64, exp: i64) -> String {
        let claims = Claims {
            sub: 7,
            tenant_id: Some("_alshifa".to_string()),
            name: "Dr. Sara".to_string(),
            roles: vec![],
            permissions: vec![],
            iat,
            exp,
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &service.encoding_key).unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = service(60, 120);
        let issued = tokens.issue(&subject()).unwrap();
        let claims = tokens.verify(&issued.access_token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.tenant_id.as_deref(), Some("_alshifa"));
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(issued.expires_in, 3600);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let tokens = service(60, 120);
        let issued = tokens.issue(&subject()).unwrap();
        let other = TokenService::new(&JwtSettings {
            secret: SecretString::new("ffffffffffffffffffffffffffffffff".to_string()),
            ttl_minutes: 60,
            refresh_ttl_minutes: 120,
        });
        assert!(matches!(other.verify(&issued.access_token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_expired_token_rejected_but_refreshable() {
        let tokens = service(60, 120);
        let now = Utc::now().timestamp();
        let token = sign(&tokens, now - 3700, now - 100);
        assert!(matches!(tokens.verify(&token), Err(TokenError::Expired)));

        let old = tokens.refreshable(&token).unwrap();
        let reloaded = TokenSubject {
            permissions: vec!["view-reports".to_string()],
            ..subject()
        };
        let issued = tokens.reissue(&old, &reloaded).unwrap();
        assert!(tokens.is_revoked(&old.jti));
        let fresh = tokens.verify(&issued.access_token).unwrap();
        assert_eq!(fresh.permissions, vec!["view-reports".to_string()]);
        assert!(matches!(tokens.refreshable(&token), Err(TokenError::Revoked)));
    }

    #[test]
    fn test_refresh_window_elapsed() {
        let tokens = service(60, 120);
        let now = Utc::now().timestamp();
        let token = sign(&tokens, now - 7300, now - 3700);
        assert!(matches!(tokens.refreshable(&token), Err(TokenError::RefreshWindowElapsed)));
    }

    #[test]
    fn test_reissue_requires_same_subject() {
        let tokens = service(60, 120);
        let issued = tokens.issue(&subject()).unwrap();
        let claims = tokens.refreshable(&issued.access_token).unwrap();
        let other = TokenSubject {
            user_id: 8,
            ..subject()
        };
        assert!(matches!(tokens.reissue(&claims, &other), Err(TokenError::Invalid(_))));
        assert!(!tokens.is_revoked(&claims.jti));
    }

    #[test]
    fn test_user_cut_off_voids_existing_tokens() {
        let tokens = service(60, 120);
        let now = Utc::now().timestamp();
        let before = sign(&tokens, now - 5, now + 3600);
        assert!(tokens.verify(&before).is_ok());

        tokens.revoke_user(Some("_alshifa"), 7);
        assert!(matches!(tokens.verify(&before), Err(TokenError::Superseded)));
        // Refresh stays open so the account can be reloaded
        assert!(tokens.refreshable(&before).is_ok());

        // Same user id in another clinic is untouched
        tokens.revoke_user(Some("_other"), 9);
        let later = sign(&tokens, now + 5, now + 3600);
        assert!(tokens.verify(&later).is_ok());
    }

    #[test]
    fn test_tenant_cut_off_blocks_refresh() {
        let tokens = service(60, 120);
        let now = Utc::now().timestamp();
        let token = sign(&tokens, now - 5, now + 3600);
        tokens.revoke_tenant("_alshifa");
        assert!(matches!(tokens.verify(&token), Err(TokenError::Superseded)));
        assert!(matches!(tokens.refreshable(&token), Err(TokenError::Superseded)));
    }

    #[test]
    fn test_revoked_token_rejected() {
        let tokens = service(60, 120);
        let issued = tokens.issue(&subject()).unwrap();
        let claims = tokens.verify(&issued.access_token).unwrap();
        tokens.revoke(&claims.jti, claims.exp);
        assert!(matches!(tokens.verify(&issued.access_token), Err(TokenError::Revoked)));
    }

    #[test]
    fn test_stale_revocations_are_purged() {
        let tokens = service(60, 120);
        let now = Utc::now().timestamp();
        tokens.revoke("old", now - 10);
        tokens.revoke("fresh", now + 10);
        assert_eq!(tokens.revoked_count(), 2);
        tokens.revoke("another", now + 10);
        assert!(!tokens.is_revoked("old"));
        assert_eq!(tokens.revoked_count(), 2);
    }
}
