//! Request processing: tenancy, authentication and request bookkeeping

pub mod auth_context;
pub mod request_context;
pub mod tenancy;
pub mod timing;

pub use auth_context::{bearer_token, AuthContext};
pub use request_context::RequestContext;
pub use tenancy::{connect_tenant, resolve_tenant_id, TenantDb};
pub use timing::{create_cors_layer, request_id_middleware, request_timing_middleware};
