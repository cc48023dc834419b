//! Router level tests. The central pool connects lazily and tenants come
//! from an in-memory directory, so every request here is answered before
//! a database would be touched.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use clinic_server::auth::{TokenService, TokenSubject};
use clinic_server::{create_app, ClinicServer};
use config_engine::AppConfig;
use database_layer::{DatabasePool, StaticTenantDirectory, Tenant};
use push_service::MockPushProvider;
use secrecy::SecretString;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const TENANT: &str = "_smile_dental";
const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt.secret = SecretString::new(JWT_SECRET.to_string());
    config.database.acquire_timeout_secs = 1;
    config.database.min_connections = 0;
    config.tenancy.auto_migrate = false;
    config
}

fn test_server() -> ClinicServer {
    let config = test_config();
    let central = DatabasePool::connect_lazy(&config.database);
    let tenants = StaticTenantDirectory::new().with_tenant(Tenant::new(TENANT, "Smile Dental"));
    let mut push = MockPushProvider::new();
    push.expect_name().return_const("mock");
    ClinicServer::from_parts(config, central, Arc::new(tenants), Arc::new(push))
}

fn app() -> Router {
    create_app(test_server())
}

fn token(tenant_id: Option<&str>, roles: &[&str], permissions: &[&str]) -> String {
    let tokens = TokenService::new(&test_config().jwt);
    let issued = tokens
        .issue(&TokenSubject {
            user_id: 7,
            tenant_id: tenant_id.map(str::to_string),
            name: "Dr. Test".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        })
        .unwrap();
    issued.access_token
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

#[tokio::test]
async fn version_reports_package_version() {
    let (status, body) = send(get("/version").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn tenant_endpoints_require_a_tenant() {
    let bearer = format!("Bearer {}", token(Some(TENANT), &["clinic_super_doctor"], &["view-patients"]));
    let (status, body) = send(
        get("/api/patients")
            .header(header::AUTHORIZATION, bearer)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["message"],
        "Tenant ID is required. Please provide X-Tenant-ID or X-Clinic-ID header."
    );
}

#[tokio::test]
async fn unknown_tenant_is_not_found() {
    let (status, body) = send(
        get("/api/patients")
            .header("X-Tenant-ID", "_nobody")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Tenant not found.");
}

#[tokio::test]
async fn tenant_can_come_from_clinic_header_or_query() {
    let (status, _) = send(
        get("/api/patients")
            .header("X-Clinic-ID", TENANT)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    // Tenant resolved, then rejected for the missing token
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(get(&format!("/api/patients?tenant_id={TENANT}")).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_permission_is_forbidden() {
    let bearer = format!("Bearer {}", token(Some(TENANT), &["secretary"], &[]));
    let (status, body) = send(
        get("/api/patients")
            .header("X-Tenant-ID", TENANT)
            .header(header::AUTHORIZATION, bearer)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn token_for_another_clinic_is_rejected() {
    let bearer = format!("Bearer {}", token(Some("_other_clinic"), &["clinic_super_doctor"], &["view-patients"]));
    let (status, _) = send(
        get("/api/patients")
            .header("X-Tenant-ID", TENANT)
            .header(header::AUTHORIZATION, bearer)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reversed_report_range_is_unprocessable() {
    let bearer = format!("Bearer {}", token(Some(TENANT), &["clinic_super_doctor"], &["view-reports"]));
    let (status, body) = send(
        get("/api/reports/patients/summary?date_from=2024-03-10&date_to=2024-03-01")
            .header("X-Tenant-ID", TENANT)
            .header(header::AUTHORIZATION, bearer)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["field_errors"]["date_to"].is_array());
}

#[tokio::test]
async fn malformed_report_date_is_unprocessable() {
    let bearer = format!("Bearer {}", token(Some(TENANT), &["clinic_super_doctor"], &["view-reports"]));
    let (status, body) = send(
        get("/api/reports/patients/summary?date_from=2024-02-30")
            .header("X-Tenant-ID", TENANT)
            .header(header::AUTHORIZATION, bearer)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("invalid date: 2024-02-30"));
}

#[tokio::test]
async fn tenant_registry_is_for_super_admins() {
    let bearer = format!("Bearer {}", token(Some(TENANT), &["clinic_super_doctor"], &[]));
    let (status, _) = send(
        get("/api/tenants")
            .header(header::AUTHORIZATION, bearer)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn setting_types_are_listed_for_super_admins() {
    let bearer = format!("Bearer {}", token(None, &["super_admin"], &["manage-setting-definitions"]));
    let (status, body) = send(
        get("/api/setting-definitions/types")
            .header(header::AUTHORIZATION, bearer)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Setting types retrieved successfully");
    assert_eq!(body["data"], serde_json::json!(["string", "boolean", "integer", "json"]));
}

#[tokio::test]
async fn only_clinic_owners_may_broadcast() {
    let bearer = format!("Bearer {}", token(Some(TENANT), &["doctor"], &["view-patients"]));
    let (status, _) = send(
        Request::builder()
            .method("POST")
            .uri("/api/notifications/broadcast")
            .header("X-Tenant-ID", TENANT)
            .header(header::AUTHORIZATION, bearer)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"title":"Closed","body":"The clinic is closed on Friday"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let response = app()
        .oneshot(
            get("/version")
                .header("X-Request-ID", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (status, body) = send(get("/api-docs/openapi.json").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/bills/{id}/mark-paid"].is_object());
}

fn subject(tenant_id: &str) -> TokenSubject {
    TokenSubject {
        user_id: 7,
        tenant_id: Some(tenant_id.to_string()),
        name: "Dr. Test".to_string(),
        roles: vec!["doctor".to_string()],
        permissions: vec!["view-patients".to_string()],
    }
}

#[tokio::test]
async fn refresh_for_a_removed_clinic_is_unauthorized() {
    let bearer = format!("Bearer {}", token(Some("_removed_clinic"), &["doctor"], &["view-patients"]));
    let (status, body) = send(
        Request::builder()
            .method("POST")
            .uri("/api/auth/refresh")
            .header(header::AUTHORIZATION, bearer)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Account is no longer available");
}

#[tokio::test]
async fn deactivated_user_loses_access_immediately() {
    let server = test_server();
    let issued = server.tokens.issue(&subject(TENANT)).unwrap();
    let app = create_app(server.clone());
    let request = || {
        get("/api/patients")
            .header("X-Tenant-ID", TENANT)
            .header(header::AUTHORIZATION, format!("Bearer {}", issued.access_token))
            .body(Body::empty())
            .unwrap()
    };

    server.tokens.revoke_user(Some(TENANT), 7);
    let response = app.oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deleted_clinic_tokens_stop_working() {
    let server = test_server();
    let issued = server.tokens.issue(&subject(TENANT)).unwrap();
    server.tokens.revoke_tenant(TENANT);

    let refresh = Request::builder()
        .method("POST")
        .uri("/api/auth/refresh")
        .header(header::AUTHORIZATION, format!("Bearer {}", issued.access_token))
        .body(Body::empty())
        .unwrap();
    let response = create_app(server).oneshot(refresh).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
