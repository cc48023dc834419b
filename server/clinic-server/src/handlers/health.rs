use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::error::{api_success, ApiError, ApiResponse};
use crate::server::ClinicServer;

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall system health status
    #[schema(example = "healthy")]
    pub status: String,
    /// Current timestamp in RFC3339 format
    #[schema(example = "2024-01-15T10:30:00Z")]
    pub timestamp: String,
    /// API version
    #[schema(example = "1.0.0")]
    pub version: String,
    /// System uptime in seconds
    #[schema(example = 3600)]
    pub uptime: u64,
    /// Tenant pools currently open
    pub active_tenants: usize,
    /// Individual service health checks
    pub checks: HashMap<String, String>,
}

/// Version information response
#[derive(Debug, Serialize, ToSchema)]
pub struct VersionResponse {
    /// Application name
    #[schema(example = "Clinic Engine")]
    pub name: String,
    /// Application version
    #[schema(example = "1.0.0")]
    pub version: String,
    /// Deployment environment
    #[schema(example = "production")]
    pub environment: String,
    /// Enabled features
    pub features: Vec<String>,
}

/// Health check handler
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "System is healthy", body = HealthResponse),
        (status = 503, description = "Central database unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(
    State(server): State<ClinicServer>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let database_ok = server.central.is_healthy().await;

    let mut checks = HashMap::new();
    checks.insert(
        "central_database".to_string(),
        if database_ok { "healthy" } else { "unreachable" }.to_string(),
    );
    checks.insert("push_provider".to_string(), server.push.name().to_string());

    let response = HealthResponse {
        status: if database_ok { "healthy" } else { "unhealthy" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: server.started_at.elapsed().as_secs(),
        active_tenants: server.pools.active_tenants().len(),
        checks,
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(api_success(response)))
}

/// Version information handler
#[utoipa::path(
    get,
    path = "/version",
    tag = "health",
    responses(
        (status = 200, description = "Version information retrieved successfully", body = VersionResponse)
    )
)]
pub async fn version_info(
    State(server): State<ClinicServer>,
) -> Result<Json<ApiResponse<VersionResponse>>, ApiError> {
    let features = vec![
        "multi-tenancy".to_string(),
        "role-based-access".to_string(),
        "reporting".to_string(),
        "push-notifications".to_string(),
        "public-patient-profiles".to_string(),
    ];

    let response = VersionResponse {
        name: "Clinic Engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: server.config.server.environment.as_str().to_string(),
        features,
    };

    Ok(Json(api_success(response)))
}
