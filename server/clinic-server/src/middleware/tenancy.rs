//! Tenant resolution for clinic-scoped routes.
//!
//! The tenant comes from `X-Tenant-ID`, then `X-Clinic-ID`, then the
//! `tenant_id` query parameter. Extracting [`TenantDb`] looks the tenant up
//! in the central registry and binds the request to that tenant's pool.
//! The binding lives in the request extensions, so it is released with the
//! request.

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::{request::Parts, HeaderMap, Uri};
use database_layer::TenantConnection;
use serde::Deserialize;
use std::ops::Deref;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::server::ClinicServer;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const CLINIC_HEADER: &str = "x-clinic-id";

#[derive(Debug, Deserialize)]
struct TenantQuery {
    tenant_id: Option<String>,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// Tenant id of a request, if it names one
pub fn resolve_tenant_id(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    header_value(headers, TENANT_HEADER)
        .or_else(|| header_value(headers, CLINIC_HEADER))
        .or_else(|| {
            Query::<TenantQuery>::try_from_uri(uri)
                .ok()
                .and_then(|q| q.0.tenant_id)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        })
}

/// Look the tenant up and bind a connection to its database
pub async fn connect_tenant(server: &ClinicServer, tenant_id: &str) -> Result<TenantConnection, ApiError> {
    let tenant = match server.tenants.find(tenant_id).await? {
        Some(tenant) => tenant,
        None => {
            warn!(tenant_id = %tenant_id, "Request for unknown tenant");
            return Err(ApiError::TenantNotFound {
                tenant_id: tenant_id.to_string(),
            });
        }
    };

    let connection = server.pools.bootstrap(tenant).await?;
    debug!(
        tenant_id = %connection.tenant_id(),
        database = %connection.database(),
        "Tenant connection bound to request"
    );
    Ok(connection)
}

/// The request's tenant database
#[derive(Debug, Clone)]
pub struct TenantDb(pub TenantConnection);

impl Deref for TenantDb {
    type Target = TenantConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl FromRequestParts<ClinicServer> for TenantDb {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ClinicServer) -> Result<Self, Self::Rejection> {
        if let Some(connection) = parts.extensions.get::<TenantConnection>() {
            return Ok(TenantDb(connection.clone()));
        }

        let tenant_id = resolve_tenant_id(&parts.headers, &parts.uri).ok_or(ApiError::TenantRequired)?;
        let connection = connect_tenant(state, &tenant_id).await?;
        parts.extensions.insert(connection.clone());
        Ok(TenantDb(connection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_tenant_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_static("_alshifa"));
        headers.insert(CLINIC_HEADER, HeaderValue::from_static("_other"));
        assert_eq!(
            resolve_tenant_id(&headers, &uri("/api/patients?tenant_id=_query")).as_deref(),
            Some("_alshifa")
        );
    }

    #[test]
    fn test_clinic_header_then_query() {
        let mut headers = HeaderMap::new();
        headers.insert(CLINIC_HEADER, HeaderValue::from_static("_clinic"));
        assert_eq!(resolve_tenant_id(&headers, &uri("/api/patients")).as_deref(), Some("_clinic"));

        assert_eq!(
            resolve_tenant_id(&HeaderMap::new(), &uri("/api/patients?page=2&tenant_id=_query")).as_deref(),
            Some("_query")
        );
    }

    #[test]
    fn test_blank_values_are_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_static("  "));
        assert_eq!(resolve_tenant_id(&headers, &uri("/api/patients?tenant_id=")), None);
    }
}
