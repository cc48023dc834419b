use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use database_layer::{migrate, seed, seed::SeedSummary, Domain, Tenant, TenantChanges};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::auth::users::{self, CentralClinic};
use crate::auth::{hash_password, Role, UserProfile};
use crate::error::{api_message, ApiError, ApiResponse, ApiResult};
use crate::middleware::AuthContext;
use crate::server::ClinicServer;
use crate::services::onboarding::{self, ClinicRegistration};
use crate::types::{PaginationParams, Query};
use crate::validation::RequestValidation;
use crate::{validate_email, validate_field, validate_length, validate_required};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListTenantsParams {
    /// Matches id or name
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PreviewParams {
    pub name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreviewChecks {
    pub tenant_exists: bool,
    pub clinic_exists: bool,
    pub database_exists: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TenantIdPreview {
    pub name: String,
    pub generated_id: String,
    pub database_name: String,
    pub is_available: bool,
    pub checks: PreviewChecks,
}

/// Clinic plus owner account, created by a super admin
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTenantRequest {
    pub name: String,
    pub address: Option<String>,
    pub whatsapp_phone: Option<String>,
    pub logo: Option<String>,
    pub user_name: String,
    pub user_phone: String,
    pub user_email: Option<String>,
    pub user_password: String,
}

impl RequestValidation for CreateTenantRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.name, "The name field is required.");
        validate_length!(self.name, 1, 255, "The name may not be greater than 255 characters.");
        validate_required!(self.user_name, "The user name field is required.");
        validate_required!(self.user_phone, "The user phone field is required.");
        if let Some(user_email) = self.user_email.as_deref().filter(|e| !e.trim().is_empty()) {
            validate_email!(user_email, "The user email must be a valid email address.");
        }
        validate_field!(
            self.user_password,
            self.user_password.chars().count() >= 6,
            "The user password must be at least 6 characters."
        );
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedTenant {
    pub tenant: Tenant,
    pub clinic: CentralClinic,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddDomainRequest {
    pub domain: String,
}

impl RequestValidation for AddDomainRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.domain, "The domain field is required.");
        validate_length!(self.domain, 1, 255, "The domain may not be greater than 255 characters.");
        Ok(())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

async fn require_tenant(server: &ClinicServer, id: &str) -> ApiResult<Tenant> {
    server
        .tenants
        .find(id)
        .await?
        .ok_or_else(|| ApiError::TenantNotFound { tenant_id: id.to_string() })
}

// ============================================================================
// API HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/tenants",
    params(ListTenantsParams),
    responses(
        (status = 200, description = "Tenants retrieved successfully", body = Vec<Tenant>),
        (status = 403, description = "Super admin only")
    ),
    tag = "tenants",
    security(("bearer_auth" = []))
)]
pub async fn list_tenants(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Query(params): Query<ListTenantsParams>,
) -> Result<Json<ApiResponse<Vec<Tenant>>>, ApiError> {
    auth.require_role(Role::SuperAdmin)?;

    let search = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let (tenants, total) = server
        .tenants
        .list(search, params.pagination.limit(), params.pagination.offset())
        .await?;

    Ok(Json(
        params
            .pagination
            .wrap_response(tenants, total)
            .with_message("Tenants retrieved successfully")
            .with_message_ar("تم جلب العيادات بنجاح"),
    ))
}

/// Show the id a clinic name would receive, without creating anything
#[utoipa::path(
    get,
    path = "/api/tenants/preview",
    params(PreviewParams),
    responses(
        (status = 200, description = "Tenant ID preview generated", body = TenantIdPreview),
        (status = 422, description = "Name is required")
    ),
    tag = "tenants",
    security(("bearer_auth" = []))
)]
pub async fn preview_tenant_id(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Query(params): Query<PreviewParams>,
) -> Result<Json<ApiResponse<TenantIdPreview>>, ApiError> {
    auth.require_role(Role::SuperAdmin)?;

    let name = params.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::field("name", "Name is required").with_message_ar("الاسم مطلوب"));
    }

    let generated_id = onboarding::generate_tenant_id(&server, name).await?;
    let candidate = Tenant::new(generated_id.as_str(), name);
    let database_name = server.pools.resolver().database_name(&candidate);

    let tenant_exists = server.tenants.find(&generated_id).await?.is_some();
    let clinic_exists = users::central_find_clinic(server.central.pool(), &generated_id)
        .await?
        .is_some();
    let database_exists = if server.config.server.environment.manages_databases() {
        server.databases.exists(&candidate).await?
    } else {
        false
    };

    Ok(Json(
        api_message(
            TenantIdPreview {
                name: name.to_string(),
                is_available: !tenant_exists && !clinic_exists && !database_exists,
                generated_id,
                database_name,
                checks: PreviewChecks {
                    tenant_exists,
                    clinic_exists,
                    database_exists,
                },
            },
            "Tenant ID preview generated",
        )
        .with_message_ar("تم إنشاء معاينة معرف العيادة"),
    ))
}

#[utoipa::path(
    post,
    path = "/api/tenants",
    request_body = CreateTenantRequest,
    responses(
        (status = 201, description = "Tenant created successfully", body = CreatedTenant),
        (status = 422, description = "Validation failed or phone/email already registered")
    ),
    tag = "tenants",
    security(("bearer_auth" = []))
)]
pub async fn create_tenant(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Json(req): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedTenant>>), ApiError> {
    auth.require_role(Role::SuperAdmin)?;
    req.validate()?;

    let central = server.central.pool();
    let phone = req.user_phone.trim();
    let email = req.user_email.as_deref().map(str::trim).filter(|e| !e.is_empty());
    if users::central_contact_taken(central, "phone", phone).await? {
        return Err(ApiError::field("user_phone", "Phone number already registered")
            .with_message_ar("رقم الهاتف مسجل مسبقاً"));
    }
    if let Some(email) = email {
        if users::central_contact_taken(central, "email", email).await? {
            return Err(ApiError::field("user_email", "Email already registered")
                .with_message_ar("البريد الإلكتروني مسجل مسبقاً"));
        }
    }

    let password_hash = hash_password(&req.user_password)?;
    let onboarded = onboarding::onboard_clinic(
        &server,
        &ClinicRegistration {
            clinic_name: req.name.trim(),
            clinic_address: req.address.as_deref(),
            clinic_phone: req.whatsapp_phone.as_deref(),
            name: req.user_name.trim(),
            email,
            phone,
            password_hash: &password_hash,
        },
    )
    .await?;

    let mut tenant = onboarded.connection.tenant().clone();
    if let Some(logo) = req.logo.clone() {
        let changes = TenantChanges {
            logo: Some(logo.clone()),
            ..TenantChanges::default()
        };
        if let Some(updated) = server.tenants.update(&tenant.id, &changes).await? {
            tenant = updated;
        }
        sqlx::query("UPDATE clinics SET logo = $2, updated_at = NOW() WHERE id = $1")
            .bind(&tenant.id)
            .bind(&logo)
            .execute(central)
            .await?;
    }

    let user = users::load_profile(onboarded.connection.pool(), &onboarded.owner).await?;
    info!(tenant_id = %tenant.id, created_by = auth.user_id, "Tenant created by super admin");

    Ok((
        StatusCode::CREATED,
        Json(
            api_message(
                CreatedTenant {
                    tenant,
                    clinic: onboarded.clinic,
                    user,
                },
                "Tenant created successfully. You can now login.",
            )
            .with_message_ar("تم إنشاء العيادة بنجاح. يمكنك الآن تسجيل الدخول."),
        ),
    ))
}

#[utoipa::path(
    get,
    path = "/api/tenants/{id}",
    params(("id" = String, Path, description = "Tenant ID")),
    responses(
        (status = 200, description = "Tenant retrieved successfully", body = Tenant),
        (status = 404, description = "Tenant not found")
    ),
    tag = "tenants",
    security(("bearer_auth" = []))
)]
pub async fn get_tenant(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Tenant>>, ApiError> {
    auth.require_role(Role::SuperAdmin)?;
    let tenant = require_tenant(&server, &id).await?;
    Ok(Json(
        api_message(tenant, "Tenant retrieved successfully").with_message_ar("تم جلب العيادة بنجاح"),
    ))
}

#[utoipa::path(
    put,
    path = "/api/tenants/{id}",
    params(("id" = String, Path, description = "Tenant ID")),
    request_body = TenantChanges,
    responses(
        (status = 200, description = "Tenant updated successfully", body = Tenant),
        (status = 404, description = "Tenant not found")
    ),
    tag = "tenants",
    security(("bearer_auth" = []))
)]
pub async fn update_tenant(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(changes): Json<TenantChanges>,
) -> Result<Json<ApiResponse<Tenant>>, ApiError> {
    auth.require_role(Role::SuperAdmin)?;
    if let Some(name) = changes.name.as_deref() {
        validate_field!(name, !name.trim().is_empty(), "The name field is required.");
    }

    let tenant = server
        .tenants
        .update(&id, &changes)
        .await?
        .ok_or_else(|| ApiError::TenantNotFound { tenant_id: id.clone() })?;

    // Cached pools carry the old tenant snapshot and possibly old credentials
    server.pools.purge(&tenant.id).await;
    info!(tenant_id = %tenant.id, credentials_changed = changes.touches_credentials(), "Tenant updated");

    Ok(Json(
        api_message(tenant, "Tenant updated successfully").with_message_ar("تم تحديث العيادة بنجاح"),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/tenants/{id}",
    params(("id" = String, Path, description = "Tenant ID")),
    responses(
        (status = 200, description = "Tenant deleted successfully"),
        (status = 404, description = "Tenant not found")
    ),
    tag = "tenants",
    security(("bearer_auth" = []))
)]
pub async fn delete_tenant(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_role(Role::SuperAdmin)?;
    let tenant = require_tenant(&server, &id).await?;

    server.pools.purge(&tenant.id).await;
    server.databases.delete_database(&tenant).await?;

    if !server.tenants.delete(&tenant.id).await? {
        warn!(tenant_id = %tenant.id, "Tenant row vanished during delete");
    }
    server.tokens.revoke_tenant(&tenant.id);
    info!(tenant_id = %tenant.id, deleted_by = auth.user_id, "Tenant deleted");

    Ok(Json(
        api_message((), "Tenant deleted successfully. Database has been removed.")
            .with_message_ar("تم حذف العيادة بنجاح. تم إزالة قاعدة البيانات."),
    ))
}

#[utoipa::path(
    get,
    path = "/api/tenants/{id}/domains",
    params(("id" = String, Path, description = "Tenant ID")),
    responses(
        (status = 200, description = "Domains retrieved successfully", body = Vec<Domain>),
        (status = 404, description = "Tenant not found")
    ),
    tag = "tenants",
    security(("bearer_auth" = []))
)]
pub async fn list_domains(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Domain>>>, ApiError> {
    auth.require_role(Role::SuperAdmin)?;
    let tenant = require_tenant(&server, &id).await?;
    let domains = server.tenants.domains(&tenant.id).await?;
    Ok(Json(
        api_message(domains, "Domains retrieved successfully").with_message_ar("تم جلب النطاقات بنجاح"),
    ))
}

#[utoipa::path(
    post,
    path = "/api/tenants/{id}/domains",
    params(("id" = String, Path, description = "Tenant ID")),
    request_body = AddDomainRequest,
    responses(
        (status = 201, description = "Domain added successfully", body = Domain),
        (status = 404, description = "Tenant not found"),
        (status = 409, description = "Domain already in use")
    ),
    tag = "tenants",
    security(("bearer_auth" = []))
)]
pub async fn add_domain(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<AddDomainRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Domain>>), ApiError> {
    auth.require_role(Role::SuperAdmin)?;
    req.validate()?;
    let tenant = require_tenant(&server, &id).await?;
    let domain = server
        .tenants
        .add_domain(&tenant.id, req.domain.trim().to_ascii_lowercase().as_str())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(api_message(domain, "Domain added successfully").with_message_ar("تم إضافة النطاق بنجاح")),
    ))
}

#[utoipa::path(
    post,
    path = "/api/tenants/{id}/migrate",
    params(("id" = String, Path, description = "Tenant ID")),
    responses(
        (status = 200, description = "Migrations run successfully for tenant"),
        (status = 404, description = "Tenant not found")
    ),
    tag = "tenants",
    security(("bearer_auth" = []))
)]
pub async fn migrate_tenant(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_role(Role::SuperAdmin)?;
    let tenant = require_tenant(&server, &id).await?;
    let connection = server.pools.bootstrap(tenant).await?;
    migrate::run_tenant_migrations(connection.pool()).await?;
    info!(tenant_id = %connection.tenant_id(), "Tenant migrations run on request");
    Ok(Json(
        api_message((), "Migrations run successfully for tenant")
            .with_message_ar("تم تشغيل الترحيلات بنجاح للعيادة"),
    ))
}

#[utoipa::path(
    post,
    path = "/api/tenants/{id}/seed",
    params(("id" = String, Path, description = "Tenant ID")),
    responses(
        (status = 200, description = "Seeder run successfully for tenant", body = SeedSummary),
        (status = 404, description = "Tenant not found")
    ),
    tag = "tenants",
    security(("bearer_auth" = []))
)]
pub async fn seed_tenant(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SeedSummary>>, ApiError> {
    auth.require_role(Role::SuperAdmin)?;
    let tenant = require_tenant(&server, &id).await?;
    let connection = server.pools.bootstrap(tenant).await?;
    let summary = seed::seed_tenant(connection.pool()).await?;
    Ok(Json(
        api_message(summary, "Seeder run successfully for tenant")
            .with_message_ar("تم تشغيل البذور بنجاح للعيادة"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateTenantRequest {
        CreateTenantRequest {
            name: "Al Noor Dental".to_string(),
            address: None,
            whatsapp_phone: None,
            logo: None,
            user_name: "Dr. Ali".to_string(),
            user_phone: "07701234567".to_string(),
            user_email: Some(String::new()),
            user_password: "secret".to_string(),
        }
    }

    #[test]
    fn test_create_request_validation() {
        assert!(request().validate().is_ok());

        let mut req = request();
        req.user_password = "12345".to_string();
        assert!(req.validate().is_err());

        let mut req = request();
        req.user_email = Some("nope".to_string());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validation_error_carries_arabic() {
        let err = ApiError::field("name", "Name is required").with_message_ar("الاسم مطلوب");
        assert_eq!(err.message_ar().as_deref(), Some("الاسم مطلوب"));
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
