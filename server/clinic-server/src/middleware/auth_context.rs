//! Authentication context extraction
//!
//! Verifies the bearer token and exposes the caller's roles, permissions
//! and doctor scope to handlers. A token issued for one clinic is rejected
//! on requests addressed to another.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};
use reporting_engine::DoctorScope;

use crate::auth::roles::{self, Role};
use crate::auth::Claims;
use crate::error::ApiError;
use crate::middleware::request_context::RequestContext;
use crate::middleware::tenancy::resolve_tenant_id;
use crate::server::ClinicServer;

/// Authentication context extracted from JWT token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub tenant_id: Option<String>,
    pub name: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub jti: String,
    pub exp: i64,
    /// Raw bearer token, needed for refresh
    pub token: String,
    /// Request context (automatically extracted)
    pub request: RequestContext,
}

impl AuthContext {
    /// Create with roles and permissions (for testing)
    pub fn with_permissions(user_id: i64, tenant_id: Option<&str>, roles: Vec<String>, permissions: Vec<String>) -> Self {
        Self {
            user_id,
            tenant_id: tenant_id.map(str::to_string),
            name: String::new(),
            roles,
            permissions,
            jti: String::new(),
            exp: 0,
            token: String::new(),
            request: RequestContext::new(),
        }
    }

    fn from_claims(claims: Claims, token: String, request: RequestContext) -> Self {
        Self {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            name: claims.name,
            roles: claims.roles,
            permissions: claims.permissions,
            jti: claims.jti,
            exp: claims.exp,
            token,
            request,
        }
    }

    /// Get request ID (convenience method)
    pub fn request_id(&self) -> &str {
        &self.request.request_id
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r == role.as_str())
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(Role::SuperAdmin)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Require permission - returns error if permission is not granted
    pub fn require_permission(&self, permission: &str) -> Result<(), ApiError> {
        if !self.has_permission(permission) {
            return Err(ApiError::authorization(format!("Permission denied: {}", permission)));
        }
        Ok(())
    }

    /// Require at least one of `permissions`
    pub fn require_any_permission(&self, permissions: &[&str]) -> Result<(), ApiError> {
        if permissions.iter().any(|p| self.has_permission(p)) {
            return Ok(());
        }
        Err(ApiError::authorization(format!(
            "Unauthorized. You need either {} permission.",
            permissions.join(" or ")
        )))
    }

    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        if !self.has_role(role) {
            return Err(ApiError::authorization(format!("This action requires the {} role", role)));
        }
        Ok(())
    }

    /// Rows this caller may see when they are doctor-owned
    pub fn doctor_scope(&self) -> DoctorScope {
        roles::doctor_scope(self.user_id, &self.roles)
    }
}

/// Extract the bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::authentication("Missing Authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::authentication("Invalid Authorization header format. Expected: Bearer <token>"))
        .map(|s| s.to_string())
}

#[async_trait]
impl FromRequestParts<ClinicServer> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ClinicServer) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<AuthContext>() {
            return Ok(ctx.clone());
        }

        let token = bearer_token(&parts.headers)?;
        let claims = state.tokens.verify(&token)?;

        if let Some(request_tenant) = resolve_tenant_id(&parts.headers, &parts.uri) {
            if claims.tenant_id.as_deref() != Some(request_tenant.as_str()) {
                tracing::warn!(
                    user_id = claims.sub,
                    token_tenant = ?claims.tenant_id,
                    request_tenant = %request_tenant,
                    "Token used against another tenant"
                );
                return Err(ApiError::authentication("Token does not belong to this clinic"));
            }
        }

        let ctx = AuthContext::from_claims(claims, token, RequestContext::from_headers(&parts.headers));
        parts.extensions.insert(ctx.clone());
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(roles: &[Role]) -> AuthContext {
        let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        let permissions = roles::effective_permissions(&roles, &[]);
        AuthContext::with_permissions(3, Some("_alshifa"), roles, permissions)
    }

    #[test]
    fn test_require_permission() {
        let secretary = ctx(&[Role::Secretary]);
        assert!(secretary.require_permission("create-patient").is_ok());
        let err = secretary.require_permission("delete-patient").unwrap_err();
        assert_eq!(err.to_string(), "Permission denied: delete-patient");
    }

    #[test]
    fn test_require_any_permission_message() {
        let doctor = ctx(&[Role::Doctor]);
        assert!(doctor.require_any_permission(&["view-clinic-cases", "create-bill"]).is_ok());

        let nobody = AuthContext::with_permissions(1, None, vec![], vec![]);
        let err = nobody.require_any_permission(&["view-clinic-cases", "create-bill"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unauthorized. You need either view-clinic-cases or create-bill permission."
        );
    }

    #[test]
    fn test_doctor_scope() {
        assert_eq!(ctx(&[Role::Doctor]).doctor_scope(), DoctorScope::Doctor(3));
        assert_eq!(ctx(&[Role::ClinicSuperDoctor]).doctor_scope(), DoctorScope::All);
    }

    #[test]
    fn test_role_checks() {
        assert!(ctx(&[Role::SuperAdmin]).is_super_admin());
        assert!(ctx(&[Role::Doctor]).require_role(Role::SuperAdmin).is_err());
    }
}
