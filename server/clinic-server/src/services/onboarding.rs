//! Clinic onboarding: registering a clinic in the central directory and
//! provisioning its tenant database.
//!
//! Provisioning is idempotent. Registration and smart-login both end with
//! [`provision_tenant`], so a tenant whose database was lost or never
//! migrated is repaired on its owner's next login.

use database_layer::{migrate, seed, NewTenant, Tenant, TenantConnection};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::auth::users::{self, CentralClinic, NewUser, UserRecord};
use crate::auth::Role;
use crate::error::{ApiError, ApiResult};
use crate::server::ClinicServer;

/// `Al-Noor Dental` -> `_al_noor_dental`
pub fn tenant_slug(name: &str) -> Option<String> {
    let mut slug = String::with_capacity(name.len() + 1);
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if slug.is_empty() {
        None
    } else {
        Some(format!("_{}", slug))
    }
}

fn random_tenant_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("clinic_{}", suffix)
}

/// First free tenant id for a clinic name
pub async fn generate_tenant_id(server: &ClinicServer, name: &str) -> ApiResult<String> {
    let base = match tenant_slug(name) {
        Some(slug) => slug,
        None => loop {
            let candidate = random_tenant_id();
            if server.tenants.find(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        },
    };

    let mut candidate = base.clone();
    let mut counter = 2;
    while server.tenants.find(&candidate).await?.is_some() {
        candidate = format!("{}_{}", base, counter);
        counter += 1;
    }
    Ok(candidate)
}

/// Owner account copied from the central directory into a tenant
pub struct OwnerAccount<'a> {
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub phone: &'a str,
    pub password_hash: &'a str,
    pub central_user_id: Option<i64>,
}

/// Make sure the tenant database exists, is migrated and holds the
/// default lookup rows, then return a connection to it
pub async fn provision_tenant(server: &ClinicServer, tenant: Tenant) -> ApiResult<TenantConnection> {
    server.databases.create_database(&tenant).await?;
    let connection = server.pools.bootstrap(tenant).await?;
    migrate::run_tenant_migrations(connection.pool()).await?;

    if users::count_users(connection.pool()).await? == 0 {
        let summary = seed::seed_tenant(connection.pool()).await?;
        info!(tenant_id = %connection.tenant_id(), ?summary, "Seeded new tenant database");
    }
    Ok(connection)
}

/// Find the owner in the tenant by phone, creating them as
/// clinic_super_doctor when missing
pub async fn ensure_owner(pool: &PgPool, owner: &OwnerAccount<'_>) -> ApiResult<UserRecord> {
    if let Some(existing) = users::find_by_phone(pool, owner.phone).await? {
        return Ok(existing);
    }

    let mut tx = pool.begin().await?;
    let user = users::insert_user(
        &mut *tx,
        &NewUser {
            name: owner.name,
            email: owner.email,
            phone: owner.phone,
            password_hash: owner.password_hash,
            is_active: true,
            central_user_id: owner.central_user_id,
        },
    )
    .await?;
    users::sync_roles(&mut *tx, user.id, &[Role::ClinicSuperDoctor]).await?;
    tx.commit().await?;

    info!(user_id = user.id, "Clinic owner created in tenant database");
    Ok(user)
}

pub struct ClinicRegistration<'a> {
    pub clinic_name: &'a str,
    pub clinic_address: Option<&'a str>,
    pub clinic_phone: Option<&'a str>,
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub phone: &'a str,
    pub password_hash: &'a str,
}

pub struct OnboardedClinic {
    pub clinic: CentralClinic,
    pub connection: TenantConnection,
    pub owner: UserRecord,
}

/// Register a clinic: tenant record, central clinic and owner, then the
/// provisioned tenant database with the owner copied into it
pub async fn onboard_clinic(server: &ClinicServer, registration: &ClinicRegistration<'_>) -> ApiResult<OnboardedClinic> {
    let central = server.central.pool();
    if let Some(email) = registration.email {
        if users::central_contact_taken(central, "email", email).await? {
            return Err(ApiError::field("email", "Email already registered"));
        }
    }
    if users::central_contact_taken(central, "phone", registration.phone).await? {
        return Err(ApiError::field("phone", "Phone already registered"));
    }

    let tenant_id = generate_tenant_id(server, registration.clinic_name).await?;
    let mut new_tenant = NewTenant::new(tenant_id.as_str(), registration.clinic_name);
    new_tenant.address = registration.clinic_address.map(str::to_string);
    new_tenant.whatsapp_phone = registration.clinic_phone.map(str::to_string);
    let tenant = server.tenants.create(&new_tenant).await?;

    let registered = register_central(central, &tenant, registration).await;
    let (clinic, central_user_id) = match registered {
        Ok(rows) => rows,
        Err(e) => {
            error!(tenant_id = %tenant_id, error = %e, "Central registration failed, removing tenant");
            if let Err(cleanup) = server.tenants.delete(&tenant_id).await {
                warn!(tenant_id = %tenant_id, error = %cleanup, "Tenant cleanup failed");
            }
            return Err(e.into());
        }
    };

    let connection = provision_tenant(server, tenant).await?;
    let owner = ensure_owner(
        connection.pool(),
        &OwnerAccount {
            name: registration.name,
            email: registration.email,
            phone: registration.phone,
            password_hash: registration.password_hash,
            central_user_id: Some(central_user_id),
        },
    )
    .await?;

    info!(tenant_id = %tenant_id, "Clinic registered");
    Ok(OnboardedClinic {
        clinic,
        connection,
        owner,
    })
}

async fn register_central(
    central: &PgPool,
    tenant: &Tenant,
    registration: &ClinicRegistration<'_>,
) -> Result<(CentralClinic, i64), sqlx::Error> {
    let mut tx = central.begin().await?;

    let clinic = sqlx::query_as::<_, CentralClinic>(
        r#"
        INSERT INTO clinics (id, name, address, whatsapp_phone)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, address, whatsapp_phone, logo, created_at
        "#,
    )
    .bind(&tenant.id)
    .bind(&tenant.name)
    .bind(registration.clinic_address)
    .bind(registration.clinic_phone)
    .fetch_one(&mut *tx)
    .await?;

    let user_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO users (name, email, phone, password, clinic_id, role, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE)
        RETURNING id
        "#,
    )
    .bind(registration.name)
    .bind(registration.email)
    .bind(registration.phone)
    .bind(registration.password_hash)
    .bind(&tenant.id)
    .bind(Role::ClinicSuperDoctor.as_str())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((clinic, user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_engine::AppConfig;
    use database_layer::{DatabasePool, StaticTenantDirectory};
    use push_service::MockPushProvider;
    use std::sync::Arc;

    fn server_with(directory: StaticTenantDirectory) -> ClinicServer {
        let mut config = AppConfig::default();
        config.database.min_connections = 0;
        let central = DatabasePool::connect_lazy(&config.database);
        ClinicServer::from_parts(config, central, Arc::new(directory), Arc::new(MockPushProvider::new()))
    }

    #[tokio::test]
    async fn test_taken_slug_gets_a_counter() {
        let server = server_with(StaticTenantDirectory::new().with_tenant(Tenant::new("_smile", "Smile")));
        assert_eq!(generate_tenant_id(&server, "Smile").await.unwrap(), "_smile_2");
    }

    #[tokio::test]
    async fn test_deleted_tenant_id_is_reused() {
        let server = server_with(StaticTenantDirectory::new().with_tenant(Tenant::new("_smile", "Smile")));
        assert!(server.tenants.delete("_smile").await.unwrap());

        let id = generate_tenant_id(&server, "Smile").await.unwrap();
        assert_eq!(id, "_smile");
        let created = server.tenants.create(&NewTenant::new(id.as_str(), "Smile")).await.unwrap();
        assert_eq!(created.id, "_smile");
    }

    #[test]
    fn test_slug_collapses_separators() {
        assert_eq!(tenant_slug("Al-Noor  Dental").as_deref(), Some("_al_noor_dental"));
        assert_eq!(tenant_slug("  Smile 2 Clinic! ").as_deref(), Some("_smile_2_clinic"));
    }

    #[test]
    fn test_slug_without_ascii_is_none() {
        assert_eq!(tenant_slug("عيادة النور"), None);
        assert_eq!(tenant_slug("---"), None);
    }

    #[test]
    fn test_random_id_shape() {
        let id = random_tenant_id();
        let suffix = id.strip_prefix("clinic_").unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
