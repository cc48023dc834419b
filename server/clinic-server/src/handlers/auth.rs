use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use database_layer::NewTenant;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::users::{self, CentralClinic, CentralUser, UserRecord};
use crate::auth::{hash_password, verify_password, IssuedToken, Role, TokenSubject, UserProfile};
use crate::error::{api_message, ApiError, ApiResponse, ApiResult};
use crate::middleware::{bearer_token, connect_tenant, AuthContext, TenantDb};
use crate::server::ClinicServer;
use crate::services::onboarding::{self, ClinicRegistration, OwnerAccount};
use crate::validation::RequestValidation;
use crate::{validate_email, validate_field, validate_length, validate_required};

const INVALID_CREDENTIALS: &str = "Invalid phone number or password";
const INVALID_CREDENTIALS_AR: &str = "بيانات الدخول غير صحيحة";
const ACCOUNT_UNAVAILABLE: &str = "Account is no longer available";
const SMART_LOGIN_FAILED_AR: &str = "فشل تسجيل الدخول: بيانات الدخول غير صحيحة";

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Phone and password login
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"phone": "07701234567", "password": "secret123"}))]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

impl RequestValidation for LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.phone, "The phone field is required.");
        validate_field!(
            self.password,
            self.password.chars().count() >= 6,
            "The password must be at least 6 characters."
        );
        Ok(())
    }
}

/// Self-service clinic registration
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub password: String,
    pub password_confirmation: String,
    pub clinic_name: String,
    pub clinic_address: String,
    pub clinic_phone: Option<String>,
}

impl RequestValidation for RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.name, "The name field is required.");
        validate_length!(self.name, 1, 255, "The name may not be greater than 255 characters.");
        validate_required!(self.phone, "The phone field is required.");
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            validate_email!(email, "The email must be a valid email address.");
        }
        validate_field!(
            self.password,
            self.password.chars().count() >= 8,
            "The password must be at least 8 characters."
        );
        validate_field!(
            self.password,
            self.password == self.password_confirmation,
            "The password confirmation does not match."
        );
        validate_required!(self.clinic_name, "The clinic name field is required.");
        validate_length!(self.clinic_name, 1, 255, "The clinic name may not be greater than 255 characters.");
        validate_required!(self.clinic_address, "The clinic address field is required.");
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub new_password_confirmation: String,
}

impl RequestValidation for ChangePasswordRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.current_password, "The current password field is required.");
        validate_field!(
            self.new_password,
            self.new_password.chars().count() >= 8,
            "The new password must be at least 8 characters."
        );
        validate_field!(
            self.new_password,
            self.new_password == self.new_password_confirmation,
            "The new password confirmation does not match."
        );
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user: UserProfile,
    pub clinic: CentralClinic,
    pub token: IssuedToken,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CredentialsCheckResponse {
    pub tenant_id: String,
    pub clinic_name: String,
    pub user_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub token: IssuedToken,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SmartLoginResponse {
    pub user: UserProfile,
    pub token: IssuedToken,
    pub tenant_id: String,
    pub clinic_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub token: IssuedToken,
}

// ============================================================================
// HELPERS
// ============================================================================

fn subject_for(user: &UserProfile, tenant_id: &str) -> TokenSubject {
    TokenSubject {
        user_id: user.id,
        tenant_id: Some(tenant_id.to_string()),
        name: user.name.clone(),
        roles: user.roles.clone(),
        permissions: user.permissions.clone(),
    }
}

fn issue_for(server: &ClinicServer, user: &UserProfile, tenant_id: &str) -> ApiResult<IssuedToken> {
    Ok(server.tokens.issue(&subject_for(user, tenant_id))?)
}

/// A tenant user that still exists and is active
fn active_account(record: Option<UserRecord>) -> ApiResult<UserRecord> {
    match record {
        Some(record) if record.is_active => Ok(record),
        Some(record) => {
            warn!(user_id = record.id, "Refresh refused for inactive user");
            Err(ApiError::authentication("User account is inactive"))
        }
        None => Err(ApiError::authentication(ACCOUNT_UNAVAILABLE)),
    }
}

/// Central user whose password matches, active and attached to a clinic
async fn verify_central(
    server: &ClinicServer,
    request: &LoginRequest,
    failure_ar: &str,
) -> ApiResult<(CentralUser, String)> {
    let user = users::central_find_by_phone(server.central.pool(), request.phone.trim())
        .await?
        .filter(|u| verify_password(&request.password, &u.password));

    let user = match user {
        Some(user) => user,
        None => {
            warn!(phone = %logger_redacted::redact(&request.phone), "Central credential check failed");
            return Err(ApiError::authentication_ar(INVALID_CREDENTIALS, failure_ar));
        }
    };

    if !user.is_active {
        return Err(ApiError::authentication_ar("User account is inactive", failure_ar));
    }

    match user.clinic_id.clone().filter(|c| !c.is_empty()) {
        Some(clinic_id) => Ok((user, clinic_id)),
        None => Err(ApiError::authentication_ar(
            "User is not associated with any clinic",
            failure_ar,
        )),
    }
}

// ============================================================================
// API HANDLERS
// ============================================================================

/// Register a new clinic together with its owner
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User and clinic registered successfully", body = RegisterResponse),
        (status = 422, description = "Validation failed or phone/email already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    State(server): State<ClinicServer>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RegisterResponse>>), ApiError> {
    req.validate()?;

    let password_hash = hash_password(&req.password)?;
    let email = req.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
    let onboarded = onboarding::onboard_clinic(
        &server,
        &ClinicRegistration {
            clinic_name: req.clinic_name.trim(),
            clinic_address: Some(req.clinic_address.trim()),
            clinic_phone: req.clinic_phone.as_deref(),
            name: req.name.trim(),
            email,
            phone: req.phone.trim(),
            password_hash: &password_hash,
        },
    )
    .await?;

    let pool = onboarded.connection.pool();
    let user = users::load_profile(pool, &onboarded.owner).await?;
    let token = issue_for(&server, &user, &onboarded.clinic.id)?;

    Ok((
        StatusCode::CREATED,
        Json(api_message(
            RegisterResponse {
                user,
                clinic: onboarded.clinic,
                token,
            },
            "User and clinic registered successfully",
        )),
    ))
}

/// Verify central credentials and tell the client which clinic to log into
#[utoipa::path(
    post,
    path = "/api/auth/check-credentials",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials verified", body = CredentialsCheckResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn check_credentials(
    State(server): State<ClinicServer>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<CredentialsCheckResponse>>, ApiError> {
    req.validate()?;
    let (user, clinic_id) = verify_central(&server, &req, INVALID_CREDENTIALS_AR).await?;

    Ok(Json(
        api_message(
            CredentialsCheckResponse {
                clinic_name: user.clinic_name.clone().unwrap_or_default(),
                tenant_id: clinic_id,
                user_name: user.name,
            },
            "Credentials verified. Please proceed with tenant login.",
        )
        .with_message_ar("تم التحقق من بيانات الدخول. يرجى المتابعة."),
    ))
}

/// Log into the request's clinic with phone and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Tenant header missing"),
        (status = 401, description = "Invalid credentials")
    ),
    params(("X-Tenant-ID" = String, Header, description = "Clinic id")),
    tag = "auth"
)]
pub async fn login(
    State(server): State<ClinicServer>,
    db: TenantDb,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    req.validate()?;

    let record = users::find_by_phone(db.pool(), req.phone.trim())
        .await?
        .filter(|u| verify_password(&req.password, &u.password));
    let Some(record) = record else {
        logger_redacted::redacted_warn!("Login rejected for {} on tenant {}", req.phone.trim(), db.tenant_id());
        return Err(ApiError::authentication(INVALID_CREDENTIALS));
    };

    if !record.is_active {
        return Err(ApiError::authentication("User account is inactive"));
    }

    let user = users::load_profile(db.pool(), &record).await?;
    let token = issue_for(&server, &user, db.tenant_id())?;
    info!(user_id = user.id, tenant_id = %db.tenant_id(), "User logged in");

    Ok(Json(api_message(LoginResponse { user, token }, "Login successful")))
}

/// Central login that provisions the clinic on first use
#[utoipa::path(
    post,
    path = "/api/auth/smart-login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = SmartLoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn smart_login(
    State(server): State<ClinicServer>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<SmartLoginResponse>>, ApiError> {
    req.validate()?;
    let (central_user, clinic_id) = verify_central(&server, &req, SMART_LOGIN_FAILED_AR).await?;
    let clinic_name = central_user.clinic_name.clone().unwrap_or_else(|| clinic_id.clone());

    let tenant = match server.tenants.find(&clinic_id).await? {
        Some(tenant) => tenant,
        None => {
            info!(tenant_id = %clinic_id, "Creating missing tenant record on smart login");
            server.tenants.create(&NewTenant::new(clinic_id.as_str(), clinic_name.as_str())).await?
        }
    };
    let connection = onboarding::provision_tenant(&server, tenant).await?;
    let pool = connection.pool();

    let record = match users::find_by_phone(pool, &central_user.phone).await? {
        Some(record) => record,
        None if central_user.role == Role::ClinicSuperDoctor.as_str() => {
            onboarding::ensure_owner(
                pool,
                &OwnerAccount {
                    name: &central_user.name,
                    email: central_user.email.as_deref(),
                    phone: &central_user.phone,
                    password_hash: &central_user.password,
                    central_user_id: Some(central_user.id),
                },
            )
            .await?
        }
        None => {
            return Err(ApiError::authentication_ar(
                "User not found in tenant database",
                SMART_LOGIN_FAILED_AR,
            ))
        }
    };

    if !record.is_active {
        return Err(ApiError::authentication_ar(
            "User account is inactive in tenant database",
            SMART_LOGIN_FAILED_AR,
        ));
    }

    if users::roles_of(pool, record.id).await?.is_empty() {
        let mut conn = pool.acquire().await?;
        users::sync_roles(&mut *conn, record.id, &[Role::ClinicSuperDoctor]).await?;
        info!(user_id = record.id, tenant_id = %clinic_id, "Assigned default clinic_super_doctor role");
    }

    let user = users::load_profile(pool, &record).await?;
    let token = issue_for(&server, &user, &clinic_id)?;
    info!(user_id = user.id, tenant_id = %clinic_id, "Smart login succeeded");

    Ok(Json(
        api_message(
            SmartLoginResponse {
                user,
                token,
                tenant_id: clinic_id,
                clinic_name,
            },
            "Login successful",
        )
        .with_message_ar("تم تسجيل الدخول بنجاح"),
    ))
}

/// Current user with roles and permissions
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "User retrieved successfully", body = UserProfile),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    tag = "auth",
    security(("bearer_auth" = []))
)]
pub async fn me(db: TenantDb, auth: AuthContext) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let record = users::find_by_id(db.pool(), auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    let user = users::load_profile(db.pool(), &record).await?;
    Ok(Json(api_message(user, "User retrieved successfully")))
}

/// Revoke the presented token
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth",
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(server): State<ClinicServer>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    server.tokens.revoke(&auth.jti, auth.exp);
    info!(user_id = auth.user_id, "User logged out");
    Ok(Json(api_message((), "Logout successful")))
}

/// Exchange a token, expired or not, for a fresh one within the refresh window.
/// The account is read back from the clinic database so the new token carries
/// current roles and permissions; deleted or inactive accounts are refused.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "Token refreshed successfully", body = RefreshResponse),
        (status = 401, description = "Token invalid, revoked, past the refresh window or account unavailable")
    ),
    tag = "auth",
    security(("bearer_auth" = []))
)]
pub async fn refresh(
    State(server): State<ClinicServer>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<RefreshResponse>>, ApiError> {
    let token = bearer_token(&headers)?;
    let claims = server.tokens.refreshable(&token)?;
    let tenant_id = claims
        .tenant_id
        .clone()
        .ok_or_else(|| ApiError::authentication(ACCOUNT_UNAVAILABLE))?;

    let connection = match connect_tenant(&server, &tenant_id).await {
        Ok(connection) => connection,
        Err(e) => {
            warn!(user_id = claims.sub, tenant_id = %tenant_id, error = %e, "Refresh for unavailable clinic");
            return Err(ApiError::authentication(ACCOUNT_UNAVAILABLE));
        }
    };
    let record = active_account(users::find_by_id(connection.pool(), claims.sub).await?)?;
    let user = users::load_profile(connection.pool(), &record).await?;

    let issued = server.tokens.reissue(&claims, &subject_for(&user, &tenant_id))?;
    info!(user_id = claims.sub, tenant_id = %tenant_id, "Token refreshed");
    Ok(Json(api_message(RefreshResponse { token: issued }, "Token refreshed successfully")))
}

/// Change the current user's password
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed successfully"),
        (status = 422, description = "Current password is incorrect")
    ),
    tag = "auth",
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    req.validate()?;

    let record = users::find_by_id(db.pool(), auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    if !verify_password(&req.current_password, &record.password) {
        return Err(ApiError::field("current_password", "Current password is incorrect"));
    }

    let password_hash = hash_password(&req.new_password)?;
    users::update_password(db.pool(), record.id, &password_hash).await?;

    // The central directory is used by smart login, keep it in step
    if let Some(central_id) = record.central_user_id {
        sqlx::query("UPDATE users SET password = $2, updated_at = NOW() WHERE id = $1")
            .bind(central_id)
            .bind(&password_hash)
            .execute(server.central.pool())
            .await?;
    }

    info!(user_id = record.id, "Password changed");
    Ok(Json(api_message((), "Password changed successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(phone: &str, password: &str) -> LoginRequest {
        LoginRequest {
            phone: phone.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_login_validation() {
        assert!(login("07701234567", "secret1").validate().is_ok());
        assert!(login("", "secret1").validate().is_err());
        assert!(login("07701234567", "short").validate().is_err());
    }

    #[test]
    fn test_register_requires_matching_confirmation() {
        let mut req = RegisterRequest {
            name: "Dr. Sara".to_string(),
            phone: "07701234567".to_string(),
            email: None,
            password: "password1".to_string(),
            password_confirmation: "password1".to_string(),
            clinic_name: "Al Noor".to_string(),
            clinic_address: "Baghdad".to_string(),
            clinic_phone: None,
        };
        assert!(req.validate().is_ok());

        req.password_confirmation = "password2".to_string();
        assert!(req.validate().is_err());

        req.password_confirmation = "password1".to_string();
        req.email = Some("not-an-email".to_string());
        assert!(req.validate().is_err());
    }

    fn user(is_active: bool) -> UserRecord {
        UserRecord {
            id: 12,
            name: "Noor".to_string(),
            email: None,
            phone: "07709876543".to_string(),
            password: String::new(),
            is_active,
            onesignal_player_id: None,
            central_user_id: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_refresh_needs_an_active_account() {
        assert_eq!(active_account(Some(user(true))).unwrap().id, 12);

        let inactive = active_account(Some(user(false))).unwrap_err();
        assert_eq!(inactive.status_code(), StatusCode::UNAUTHORIZED);

        let missing = active_account(None).unwrap_err();
        assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(missing.to_string(), ACCOUNT_UNAVAILABLE);
    }
}
