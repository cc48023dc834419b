//! Tenant registry stored in the central database.
//!
//! A tenant is one clinic's isolated database. The central `tenants` table
//! keeps its display settings and, optionally, explicit connection
//! overrides (`db_name`, `db_username`, `db_password`).

use crate::error::DatabaseResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub rx_img: Option<String>,
    pub whatsapp_template_sid: Option<String>,
    pub whatsapp_message_count: i32,
    pub whatsapp_phone: Option<String>,
    pub show_image_case: bool,
    pub doctor_mony: i32,
    pub teeth_v2: bool,
    pub send_msg: bool,
    pub show_rx_id: bool,
    pub logo: Option<String>,
    pub api_whatsapp: bool,
    pub db_name: Option<String>,
    pub db_username: Option<String>,
    #[serde(skip_serializing, default)]
    pub db_password: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Tenant {
    /// A tenant with default settings, as inserted by [`NewTenant::new`]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            address: None,
            rx_img: None,
            whatsapp_template_sid: None,
            whatsapp_message_count: 0,
            whatsapp_phone: None,
            show_image_case: false,
            doctor_mony: 0,
            teeth_v2: false,
            send_msg: false,
            show_rx_id: false,
            logo: None,
            api_whatsapp: false,
            db_name: None,
            db_username: None,
            db_password: None,
            data: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Domain {
    pub id: i64,
    pub domain: String,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when registering a tenant
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewTenant {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub whatsapp_phone: Option<String>,
    pub logo: Option<String>,
    pub rx_img: Option<String>,
    pub db_name: Option<String>,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
}

impl NewTenant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial update of a tenant; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TenantChanges {
    pub name: Option<String>,
    pub address: Option<String>,
    pub rx_img: Option<String>,
    pub whatsapp_template_sid: Option<String>,
    pub whatsapp_phone: Option<String>,
    pub show_image_case: Option<bool>,
    pub doctor_mony: Option<i32>,
    pub teeth_v2: Option<bool>,
    pub send_msg: Option<bool>,
    pub show_rx_id: Option<bool>,
    pub logo: Option<String>,
    pub api_whatsapp: Option<bool>,
    pub db_name: Option<String>,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
}

impl TenantChanges {
    /// True when the change affects how the tenant database is reached
    pub fn touches_credentials(&self) -> bool {
        self.db_name.is_some() || self.db_username.is_some() || self.db_password.is_some()
    }

    fn apply(&self, tenant: &mut Tenant) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(value) = &self.$field { tenant.$field = value.clone().into(); })*
            };
        }
        set!(name, show_image_case, doctor_mony, teeth_v2, send_msg, show_rx_id, api_whatsapp);
        set!(address, rx_img, whatsapp_template_sid, whatsapp_phone, logo, db_name, db_username, db_password);
        tenant.updated_at = Utc::now();
    }
}

/// Lookup and maintenance of tenants in the central registry
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Active (not soft-deleted) tenant by id
    async fn find(&self, id: &str) -> DatabaseResult<Option<Tenant>>;

    /// Page of tenants, optionally filtered by id or name, with the total count
    async fn list(&self, search: Option<&str>, limit: i64, offset: i64) -> DatabaseResult<(Vec<Tenant>, i64)>;

    async fn create(&self, tenant: &NewTenant) -> DatabaseResult<Tenant>;

    /// Applies the changes to the tenant and its central clinic row together
    async fn update(&self, id: &str, changes: &TenantChanges) -> DatabaseResult<Option<Tenant>>;

    /// Removes the tenant with its domains and central clinic row, and
    /// deactivates the clinic's central users. The id becomes free for a
    /// new registration. Returns false when the tenant did not exist
    async fn delete(&self, id: &str) -> DatabaseResult<bool>;

    async fn domains(&self, tenant_id: &str) -> DatabaseResult<Vec<Domain>>;

    async fn add_domain(&self, tenant_id: &str, domain: &str) -> DatabaseResult<Domain>;
}

/// Tenant directory backed by the central `tenants` and `domains` tables
#[derive(Clone)]
pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn find(&self, id: &str) -> DatabaseResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn list(&self, search: Option<&str>, limit: i64, offset: i64) -> DatabaseResult<(Vec<Tenant>, i64)> {
        let pattern = search.map(|s| format!("%{}%", s.trim()));

        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM tenants WHERE deleted_at IS NULL");
        let mut rows: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM tenants WHERE deleted_at IS NULL");
        if let Some(pattern) = &pattern {
            for qb in [&mut count, &mut rows] {
                qb.push(" AND (id ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR name ILIKE ")
                    .push_bind(pattern.clone())
                    .push(")");
            }
        }
        rows.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;
        let tenants = rows.build_query_as::<Tenant>().fetch_all(&self.pool).await?;
        Ok((tenants, total))
    }

    async fn create(&self, tenant: &NewTenant) -> DatabaseResult<Tenant> {
        let created = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (id, name, address, whatsapp_phone, logo, rx_img, db_name, db_username, db_password)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.address)
        .bind(&tenant.whatsapp_phone)
        .bind(&tenant.logo)
        .bind(&tenant.rx_img)
        .bind(&tenant.db_name)
        .bind(&tenant.db_username)
        .bind(&tenant.db_password)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update(&self, id: &str, changes: &TenantChanges) -> DatabaseResult<Option<Tenant>> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query_as::<_, Tenant>(
            r#"
            UPDATE tenants SET
                name = COALESCE($2, name),
                address = COALESCE($3, address),
                rx_img = COALESCE($4, rx_img),
                whatsapp_template_sid = COALESCE($5, whatsapp_template_sid),
                whatsapp_phone = COALESCE($6, whatsapp_phone),
                show_image_case = COALESCE($7, show_image_case),
                doctor_mony = COALESCE($8, doctor_mony),
                teeth_v2 = COALESCE($9, teeth_v2),
                send_msg = COALESCE($10, send_msg),
                show_rx_id = COALESCE($11, show_rx_id),
                logo = COALESCE($12, logo),
                api_whatsapp = COALESCE($13, api_whatsapp),
                db_name = COALESCE($14, db_name),
                db_username = COALESCE($15, db_username),
                db_password = COALESCE($16, db_password),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.address)
        .bind(&changes.rx_img)
        .bind(&changes.whatsapp_template_sid)
        .bind(&changes.whatsapp_phone)
        .bind(changes.show_image_case)
        .bind(changes.doctor_mony)
        .bind(changes.teeth_v2)
        .bind(changes.send_msg)
        .bind(changes.show_rx_id)
        .bind(&changes.logo)
        .bind(changes.api_whatsapp)
        .bind(&changes.db_name)
        .bind(&changes.db_username)
        .bind(&changes.db_password)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(tenant) = updated else {
            return Ok(None);
        };

        // The central clinic row mirrors the tenant settings shown to users
        sqlx::query(
            r#"
            UPDATE clinics SET
                name = $2, address = $3, rx_img = $4, whatsapp_template_sid = $5, whatsapp_phone = $6,
                show_image_case = $7, doctor_mony = $8, teeth_v2 = $9, send_msg = $10, show_rx_id = $11,
                logo = $12, api_whatsapp = $13, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(&tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.address)
        .bind(&tenant.rx_img)
        .bind(&tenant.whatsapp_template_sid)
        .bind(&tenant.whatsapp_phone)
        .bind(tenant.show_image_case)
        .bind(tenant.doctor_mony)
        .bind(tenant.teeth_v2)
        .bind(tenant.send_msg)
        .bind(tenant.show_rx_id)
        .bind(&tenant.logo)
        .bind(tenant.api_whatsapp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(tenant))
    }

    async fn delete(&self, id: &str) -> DatabaseResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE clinic_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        // users.clinic_id is cleared by ON DELETE SET NULL, domains cascade
        sqlx::query("DELETE FROM clinics WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn domains(&self, tenant_id: &str) -> DatabaseResult<Vec<Domain>> {
        let domains = sqlx::query_as::<_, Domain>(
            "SELECT * FROM domains WHERE tenant_id = $1 ORDER BY domain",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(domains)
    }

    async fn add_domain(&self, tenant_id: &str, domain: &str) -> DatabaseResult<Domain> {
        let created = sqlx::query_as::<_, Domain>(
            "INSERT INTO domains (domain, tenant_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(domain)
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }
}

/// In-memory directory, used by tests and single-clinic setups
#[derive(Default)]
pub struct StaticTenantDirectory {
    tenants: RwLock<BTreeMap<String, Tenant>>,
    domains: RwLock<Vec<Domain>>,
}

impl StaticTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(self, tenant: Tenant) -> Self {
        self.tenants.write().insert(tenant.id.clone(), tenant);
        self
    }
}

#[async_trait]
impl TenantDirectory for StaticTenantDirectory {
    async fn find(&self, id: &str) -> DatabaseResult<Option<Tenant>> {
        Ok(self
            .tenants
            .read()
            .get(id)
            .filter(|t| t.deleted_at.is_none())
            .cloned())
    }

    async fn list(&self, search: Option<&str>, limit: i64, offset: i64) -> DatabaseResult<(Vec<Tenant>, i64)> {
        let needle = search.map(|s| s.trim().to_lowercase());
        let matching: Vec<Tenant> = self
            .tenants
            .read()
            .values()
            .filter(|t| t.deleted_at.is_none())
            .filter(|t| match &needle {
                Some(n) => t.id.to_lowercase().contains(n) || t.name.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect();
        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let page = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect();
        Ok((page, total))
    }

    async fn create(&self, new: &NewTenant) -> DatabaseResult<Tenant> {
        let mut tenant = Tenant::new(new.id.clone(), new.name.clone());
        tenant.address = new.address.clone();
        tenant.whatsapp_phone = new.whatsapp_phone.clone();
        tenant.logo = new.logo.clone();
        tenant.rx_img = new.rx_img.clone();
        tenant.db_name = new.db_name.clone();
        tenant.db_username = new.db_username.clone();
        tenant.db_password = new.db_password.clone();
        self.tenants.write().insert(tenant.id.clone(), tenant.clone());
        Ok(tenant)
    }

    async fn update(&self, id: &str, changes: &TenantChanges) -> DatabaseResult<Option<Tenant>> {
        let mut tenants = self.tenants.write();
        Ok(tenants
            .get_mut(id)
            .filter(|t| t.deleted_at.is_none())
            .map(|tenant| {
                changes.apply(tenant);
                tenant.clone()
            }))
    }

    async fn delete(&self, id: &str) -> DatabaseResult<bool> {
        let removed = self.tenants.write().remove(id).is_some();
        if removed {
            self.domains.write().retain(|d| d.tenant_id != id);
        }
        Ok(removed)
    }

    async fn domains(&self, tenant_id: &str) -> DatabaseResult<Vec<Domain>> {
        Ok(self
            .domains
            .read()
            .iter()
            .filter(|d| d.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn add_domain(&self, tenant_id: &str, domain: &str) -> DatabaseResult<Domain> {
        let mut domains = self.domains.write();
        let now = Utc::now();
        let created = Domain {
            id: i64::try_from(domains.len()).unwrap_or(i64::MAX) + 1,
            domain: domain.to_string(),
            tenant_id: tenant_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        domains.push(created.clone());
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_directory_lifecycle() {
        let directory = StaticTenantDirectory::new();
        directory.create(&NewTenant::new("alnoor", "Al Noor Dental")).await.unwrap();
        directory.create(&NewTenant::new("smile", "Smile Clinic")).await.unwrap();

        assert!(directory.find("alnoor").await.unwrap().is_some());

        let (page, total) = directory.list(Some("SMILE"), 10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].id, "smile");

        let changes = TenantChanges {
            name: Some("Al Noor Center".to_string()),
            send_msg: Some(true),
            ..TenantChanges::default()
        };
        let updated = directory.update("alnoor", &changes).await.unwrap().unwrap();
        assert_eq!(updated.name, "Al Noor Center");
        assert!(updated.send_msg);
        assert!(!changes.touches_credentials());

        assert!(directory.delete("alnoor").await.unwrap());
        assert!(!directory.delete("alnoor").await.unwrap());
        assert!(directory.find("alnoor").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleted_id_can_be_registered_again() {
        let directory = StaticTenantDirectory::new();
        directory.create(&NewTenant::new("_smile", "Smile")).await.unwrap();
        directory.add_domain("_smile", "smile.clinic.test").await.unwrap();
        assert!(directory.delete("_smile").await.unwrap());

        let (_, total) = directory.list(None, 10, 0).await.unwrap();
        assert_eq!(total, 0);
        assert!(directory.domains("_smile").await.unwrap().is_empty());

        let again = directory.create(&NewTenant::new("_smile", "Smile Again")).await.unwrap();
        assert!(again.deleted_at.is_none());
        let found = directory.find("_smile").await.unwrap().unwrap();
        assert_eq!(found.name, "Smile Again");
    }

    #[tokio::test]
    async fn test_domains_are_per_tenant() {
        let directory = StaticTenantDirectory::new()
            .with_tenant(Tenant::new("a", "A"))
            .with_tenant(Tenant::new("b", "B"));
        directory.add_domain("a", "a.clinic.test").await.unwrap();
        directory.add_domain("b", "b.clinic.test").await.unwrap();

        let domains = directory.domains("a").await.unwrap();
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].domain, "a.clinic.test");
    }

    #[test]
    fn test_unknown_tenant_is_none() {
        let directory = StaticTenantDirectory::new().with_tenant(Tenant::new("a", "A"));
        assert!(tokio_test::block_on(directory.find("missing")).unwrap().is_none());
        assert_eq!(tokio_test::block_on(directory.find("a")).unwrap().map(|t| t.name).as_deref(), Some("A"));
    }

    #[test]
    fn test_password_never_serialized() {
        let mut tenant = Tenant::new("x", "X");
        tenant.db_password = Some("hunter2".to_string());
        let json = serde_json::to_string(&tenant).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("db_password"));
    }

    #[test]
    fn test_credential_changes_detected() {
        let changes = TenantChanges {
            db_password: Some("new".to_string()),
            ..TenantChanges::default()
        };
        assert!(changes.touches_credentials());
    }
}
