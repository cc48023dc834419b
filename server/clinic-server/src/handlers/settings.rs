//! Setting definitions and per-clinic settings.
//!
//! Every tenant database carries its own copy of the definitions next to
//! the clinic's values. Super admins edit definitions through any tenant;
//! the change is then applied to every clinic. Clinic owners only change
//! values of keys that already exist.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use database_layer::seed::sync_clinic_settings;
use database_layer::TenantConnection;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::error::{api_message, ApiError, ApiResponse};
use crate::middleware::{AuthContext, TenantDb};
use crate::server::ClinicServer;
use crate::types::de::optional_bool;
use crate::types::Query;
use crate::validation::RequestValidation;
use crate::{validate_field, validate_length, validate_one_of};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Category key and its display label
pub const SETTING_CATEGORIES: [(&str, &str); 6] = [
    ("general", "General Information"),
    ("appointment", "Appointment Settings"),
    ("notification", "Notification Settings"),
    ("financial", "Financial Settings"),
    ("display", "Display Settings"),
    ("social", "Social Media"),
];

pub const SETTING_TYPES: [&str; 4] = ["string", "boolean", "integer", "json"];

lazy_static! {
    static ref SETTING_KEY: Option<Regex> = Regex::new(r"^[a-z_]+$").ok();
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SettingDefinition {
    pub id: i64,
    pub setting_key: String,
    pub setting_type: String,
    pub default_value: Option<String>,
    pub description: Option<String>,
    pub category: String,
    pub display_order: i32,
    pub is_required: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const DEFINITION_COLUMNS: &str = "id, setting_key, setting_type, default_value, description, category, \
     display_order, is_required, is_active, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
struct SettingRow {
    id: i64,
    setting_key: String,
    setting_value: Option<String>,
    setting_type: String,
    description: Option<String>,
    is_active: bool,
    category: Option<String>,
    display_order: Option<i32>,
    updated_at: DateTime<Utc>,
}

const SETTING_SELECT: &str = r#"
    SELECT cs.id, cs.setting_key, cs.setting_value, cs.setting_type, cs.description, cs.is_active,
           d.category, d.display_order, cs.updated_at
    FROM clinic_settings cs
    LEFT JOIN setting_definitions d ON d.setting_key = cs.setting_key
"#;

/// A clinic setting with its value decoded by type
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ClinicSetting {
    pub id: i64,
    pub setting_key: String,
    /// Stored text form
    pub setting_value: Option<String>,
    pub setting_type: String,
    /// Value decoded according to `setting_type`
    #[schema(value_type = Object)]
    pub value: Value,
    pub description: Option<String>,
    pub category: String,
    pub display_order: i32,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<SettingRow> for ClinicSetting {
    fn from(row: SettingRow) -> Self {
        let value = decode_value(&row.setting_type, row.setting_value.as_deref());
        Self {
            id: row.id,
            setting_key: row.setting_key,
            setting_value: row.setting_value,
            setting_type: row.setting_type,
            value,
            description: row.description,
            category: row.category.unwrap_or_else(|| "general".to_string()),
            display_order: row.display_order.unwrap_or(0),
            is_active: row.is_active,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettingGroup {
    pub category: String,
    pub label: String,
    pub settings: Vec<ClinicSetting>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkUpdateResult {
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListDefinitionsParams {
    pub category: Option<String>,
    #[serde(default, deserialize_with = "optional_bool")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DeleteDefinitionParams {
    /// Also remove the setting from every clinic
    #[serde(default, deserialize_with = "optional_bool")]
    pub remove_from_clinics: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SettingDefinitionRequest {
    pub setting_key: Option<String>,
    pub setting_type: Option<String>,
    pub default_value: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub display_order: Option<i32>,
    pub is_required: Option<bool>,
    pub is_active: Option<bool>,
}

impl RequestValidation for SettingDefinitionRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(setting_key) = &self.setting_key {
            validate_length!(setting_key, 1, 100, "The setting key may not be greater than 100 characters.");
            validate_field!(
                setting_key,
                is_setting_key(setting_key),
                "The setting key may only contain lowercase letters and underscores."
            );
        }
        if let Some(setting_type) = &self.setting_type {
            validate_one_of!(
                setting_type,
                ["string", "boolean", "integer", "json"],
                "The selected setting type is invalid."
            );
        }
        if let Some(category) = &self.category {
            validate_field!(
                category,
                category_label(category).is_some(),
                "The selected category is invalid."
            );
        }
        if let Some(display_order) = self.display_order {
            validate_field!(display_order, display_order >= 0, "The display order must be at least 0.");
        }
        Ok(())
    }
}

impl SettingDefinitionRequest {
    fn validate_create(&self) -> Result<(), ApiError> {
        self.validate()?;
        if self.setting_key.is_none() {
            return Err(ApiError::field("setting_key", "The setting key field is required."));
        }
        if self.setting_type.is_none() {
            return Err(ApiError::field("setting_type", "The setting type field is required."));
        }
        if self.category.is_none() {
            return Err(ApiError::field("category", "The category field is required."));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSettingRequest {
    #[schema(value_type = Object)]
    pub value: Value,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkSettingItem {
    pub key: String,
    #[schema(value_type = Object)]
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkUpdateSettingsRequest {
    pub settings: Vec<BulkSettingItem>,
}

const UNKNOWN_SETTING: &str = "Setting not found. Only Super Admin can create new setting keys.";

// ============================================================================
// HELPERS
// ============================================================================

fn is_setting_key(key: &str) -> bool {
    SETTING_KEY.as_ref().is_some_and(|re| re.is_match(key))
}

pub fn category_label(category: &str) -> Option<&'static str> {
    SETTING_CATEGORIES
        .iter()
        .find(|(key, _)| *key == category)
        .map(|(_, label)| *label)
}

/// Text stored for `value` under `setting_type`; `None` stores NULL
pub fn encode_value(setting_type: &str, value: &Value) -> Result<Option<String>, String> {
    if value.is_null() {
        return Ok(None);
    }
    let encoded = match setting_type {
        "boolean" => match value {
            Value::Bool(b) => Some(b),
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(&true),
                Some(0) => Some(&false),
                _ => None,
            },
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "1" | "true" => Some(&true),
                "0" | "false" => Some(&false),
                _ => None,
            },
            _ => None,
        }
        .map(|b| if *b { "1" } else { "0" }.to_string())
        .ok_or_else(|| "The value must be true or false.".to_string())?,
        "integer" => match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .map(|n| n.to_string())
        .ok_or_else(|| "The value must be an integer.".to_string())?,
        "json" => match value {
            Value::String(s) => s.clone(),
            other => serde_json::to_string(other).map_err(|e| e.to_string())?,
        },
        _ => match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return Err("The value must be a string.".to_string()),
        },
    };
    Ok(Some(encoded))
}

/// Stored text decoded for API output
pub fn decode_value(setting_type: &str, raw: Option<&str>) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    match setting_type {
        "boolean" => Value::Bool(matches!(raw, "1" | "true")),
        "integer" => raw.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
        "json" => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
        _ => Value::String(raw.to_string()),
    }
}

/// Settings grouped by category in the fixed category order
fn group_settings(settings: Vec<ClinicSetting>) -> Vec<SettingGroup> {
    let mut by_category: BTreeMap<String, Vec<ClinicSetting>> = BTreeMap::new();
    for setting in settings {
        by_category.entry(setting.category.clone()).or_default().push(setting);
    }

    let mut groups = Vec::new();
    for (category, label) in SETTING_CATEGORIES {
        if let Some(settings) = by_category.remove(category) {
            groups.push(SettingGroup {
                category: category.to_string(),
                label: label.to_string(),
                settings,
            });
        }
    }
    for (category, settings) in by_category {
        groups.push(SettingGroup {
            label: category.clone(),
            category,
            settings,
        });
    }
    groups
}

/// Connections to every active tenant; tenants that cannot be reached are
/// logged and skipped
async fn all_tenant_connections(server: &ClinicServer) -> Result<Vec<TenantConnection>, ApiError> {
    const PAGE: i64 = 100;
    let mut connections = Vec::new();
    let mut offset = 0;
    loop {
        let (tenants, total) = server.tenants.list(None, PAGE, offset).await?;
        let fetched = i64::try_from(tenants.len()).unwrap_or(PAGE);
        for tenant in tenants {
            let tenant_id = tenant.id.clone();
            match server.pools.bootstrap(tenant).await {
                Ok(connection) => connections.push(connection),
                Err(e) => warn!(tenant_id = %tenant_id, error = %e, "Skipping unreachable tenant"),
            }
        }
        offset += fetched;
        if fetched == 0 || offset >= total {
            break;
        }
    }
    Ok(connections)
}

async fn find_definition(pool: &PgPool, id: i64) -> Result<SettingDefinition, ApiError> {
    sqlx::query_as::<_, SettingDefinition>(&format!(
        "SELECT {DEFINITION_COLUMNS} FROM setting_definitions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Setting definition"))
}

async fn upsert_definition(pool: &PgPool, def: &SettingDefinition) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO setting_definitions
            (setting_key, setting_type, default_value, description, category, display_order, is_required, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (setting_key) DO UPDATE SET
            setting_type = EXCLUDED.setting_type,
            default_value = EXCLUDED.default_value,
            description = EXCLUDED.description,
            category = EXCLUDED.category,
            display_order = EXCLUDED.display_order,
            is_required = EXCLUDED.is_required,
            is_active = EXCLUDED.is_active,
            updated_at = NOW()
        "#,
    )
    .bind(&def.setting_key)
    .bind(&def.setting_type)
    .bind(&def.default_value)
    .bind(&def.description)
    .bind(&def.category)
    .bind(def.display_order)
    .bind(def.is_required)
    .bind(def.is_active)
    .execute(pool)
    .await?;
    Ok(())
}

async fn find_setting(pool: &PgPool, key: &str) -> Result<Option<SettingRow>, sqlx::Error> {
    sqlx::query_as::<_, SettingRow>(&format!("{SETTING_SELECT} WHERE cs.setting_key = $1"))
        .bind(key)
        .fetch_optional(pool)
        .await
}

async fn store_value(pool: &PgPool, key: &str, value: Option<&str>) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE clinic_settings SET setting_value = $2, updated_at = NOW() WHERE setting_key = $1")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    Ok(())
}

fn bulk_message(updated: usize, skipped: &[String]) -> String {
    let mut message = format!("{} settings updated successfully", updated);
    if !skipped.is_empty() {
        message.push_str(&format!(". Skipped {} unknown keys: {}", skipped.len(), skipped.join(", ")));
    }
    message
}

// ============================================================================
// SETTING DEFINITION HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/setting-definitions",
    params(ListDefinitionsParams),
    responses((status = 200, description = "Setting definitions retrieved successfully", body = Vec<SettingDefinition>)),
    tag = "settings",
    security(("bearer_auth" = []))
)]
pub async fn list_setting_definitions(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ListDefinitionsParams>,
) -> Result<Json<ApiResponse<Vec<SettingDefinition>>>, ApiError> {
    auth.require_permission("manage-setting-definitions")?;

    let definitions = sqlx::query_as::<_, SettingDefinition>(&format!(
        "SELECT {DEFINITION_COLUMNS} FROM setting_definitions \
         WHERE ($1::TEXT IS NULL OR category = $1) AND ($2::BOOLEAN IS NULL OR is_active = $2) \
         ORDER BY category, display_order, id"
    ))
    .bind(&params.category)
    .bind(params.is_active)
    .fetch_all(db.pool())
    .await?;

    Ok(Json(api_message(definitions, "Setting definitions retrieved successfully")))
}

#[utoipa::path(
    get,
    path = "/api/setting-definitions/categories",
    responses((status = 200, description = "Setting categories retrieved successfully", body = Vec<CategoryOption>)),
    tag = "settings",
    security(("bearer_auth" = []))
)]
pub async fn setting_categories(auth: AuthContext) -> Result<Json<ApiResponse<Vec<CategoryOption>>>, ApiError> {
    auth.require_permission("manage-setting-definitions")?;
    let categories = SETTING_CATEGORIES
        .iter()
        .map(|(value, label)| CategoryOption {
            value: value.to_string(),
            label: label.to_string(),
        })
        .collect();
    Ok(Json(api_message(categories, "Setting categories retrieved successfully")))
}

#[utoipa::path(
    get,
    path = "/api/setting-definitions/types",
    responses((status = 200, description = "Setting types retrieved successfully", body = Vec<String>)),
    tag = "settings",
    security(("bearer_auth" = []))
)]
pub async fn setting_types(auth: AuthContext) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    auth.require_permission("manage-setting-definitions")?;
    let types = SETTING_TYPES.iter().map(|t| t.to_string()).collect();
    Ok(Json(api_message(types, "Setting types retrieved successfully")))
}

#[utoipa::path(
    post,
    path = "/api/setting-definitions",
    request_body = SettingDefinitionRequest,
    responses(
        (status = 201, description = "Setting definition created and synced to every clinic", body = SettingDefinition),
        (status = 422, description = "Validation failed")
    ),
    tag = "settings",
    security(("bearer_auth" = []))
)]
pub async fn create_setting_definition(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<SettingDefinitionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SettingDefinition>>), ApiError> {
    auth.require_permission("manage-setting-definitions")?;
    req.validate_create()?;

    let setting_key = req.setting_key.clone().unwrap_or_default();
    let setting_type = req.setting_type.clone().unwrap_or_default();
    let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM setting_definitions WHERE setting_key = $1)")
        .bind(&setting_key)
        .fetch_one(db.pool())
        .await?;
    if taken {
        return Err(ApiError::field("setting_key", "The setting key has already been taken."));
    }
    if let Some(default_value) = &req.default_value {
        encode_value(&setting_type, &Value::String(default_value.clone()))
            .map_err(|e| ApiError::field("default_value", e))?;
    }

    let definition = sqlx::query_as::<_, SettingDefinition>(&format!(
        r#"
        INSERT INTO setting_definitions
            (setting_key, setting_type, default_value, description, category, display_order, is_required, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {DEFINITION_COLUMNS}
        "#
    ))
    .bind(&setting_key)
    .bind(&setting_type)
    .bind(&req.default_value)
    .bind(&req.description)
    .bind(&req.category)
    .bind(req.display_order.unwrap_or(0))
    .bind(req.is_required.unwrap_or(false))
    .bind(req.is_active.unwrap_or(true))
    .fetch_one(db.pool())
    .await?;

    let mut synced = 0u64;
    for connection in all_tenant_connections(&server).await? {
        let pool = connection.pool();
        let result: Result<u64, ApiError> = async {
            upsert_definition(pool, &definition).await?;
            sync_clinic_settings(pool).await.map_err(ApiError::from)
        }
        .await;
        match result {
            Ok(created) if created > 0 => synced += 1,
            Ok(_) => {}
            Err(e) => warn!(tenant_id = %connection.tenant_id(), error = %e, "Setting definition sync failed"),
        }
    }
    info!(setting_key = %definition.setting_key, clinics = synced, "Setting definition created");

    Ok((
        StatusCode::CREATED,
        Json(api_message(
            definition,
            format!("Setting definition created and synced to {} clinics", synced),
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/api/setting-definitions/{id}",
    params(("id" = i64, Path, description = "Setting definition ID")),
    responses(
        (status = 200, description = "Setting definition retrieved successfully", body = SettingDefinition),
        (status = 404, description = "Setting definition not found")
    ),
    tag = "settings",
    security(("bearer_auth" = []))
)]
pub async fn get_setting_definition(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SettingDefinition>>, ApiError> {
    auth.require_permission("manage-setting-definitions")?;
    let definition = find_definition(db.pool(), id).await?;
    Ok(Json(api_message(definition, "Setting definition retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/setting-definitions/{id}",
    params(("id" = i64, Path, description = "Setting definition ID")),
    request_body = SettingDefinitionRequest,
    responses(
        (status = 200, description = "Setting definition updated", body = SettingDefinition),
        (status = 404, description = "Setting definition not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "settings",
    security(("bearer_auth" = []))
)]
pub async fn update_setting_definition(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<SettingDefinitionRequest>,
) -> Result<Json<ApiResponse<SettingDefinition>>, ApiError> {
    auth.require_permission("manage-setting-definitions")?;
    req.validate()?;
    let current = find_definition(db.pool(), id).await?;
    if req.setting_key.as_deref().is_some_and(|k| k != current.setting_key) {
        return Err(ApiError::field("setting_key", "The setting key cannot be changed."));
    }

    let definition = sqlx::query_as::<_, SettingDefinition>(&format!(
        r#"
        UPDATE setting_definitions SET
            setting_type = $2, default_value = $3, description = $4, category = $5,
            display_order = $6, is_required = $7, is_active = $8, updated_at = NOW()
        WHERE id = $1
        RETURNING {DEFINITION_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(req.setting_type.unwrap_or(current.setting_type))
    .bind(req.default_value.or(current.default_value))
    .bind(req.description.or(current.description))
    .bind(req.category.unwrap_or(current.category))
    .bind(req.display_order.unwrap_or(current.display_order))
    .bind(req.is_required.unwrap_or(current.is_required))
    .bind(req.is_active.unwrap_or(current.is_active))
    .fetch_one(db.pool())
    .await?;

    let mut updated = 0u64;
    for connection in all_tenant_connections(&server).await? {
        let pool = connection.pool();
        let result: Result<u64, sqlx::Error> = async {
            upsert_definition(pool, &definition).await?;
            let rows = sqlx::query(
                "UPDATE clinic_settings SET setting_type = $2, description = $3, updated_at = NOW() \
                 WHERE setting_key = $1",
            )
            .bind(&definition.setting_key)
            .bind(&definition.setting_type)
            .bind(&definition.description)
            .execute(pool)
            .await?
            .rows_affected();
            Ok(rows)
        }
        .await;
        match result {
            Ok(rows) => updated += rows,
            Err(e) => warn!(tenant_id = %connection.tenant_id(), error = %e, "Setting definition update failed"),
        }
    }

    Ok(Json(api_message(
        definition,
        format!("Setting definition updated. {} clinic settings updated.", updated),
    )))
}

#[utoipa::path(
    delete,
    path = "/api/setting-definitions/{id}",
    params(("id" = i64, Path, description = "Setting definition ID"), DeleteDefinitionParams),
    responses(
        (status = 200, description = "Setting definition deleted"),
        (status = 404, description = "Setting definition not found")
    ),
    tag = "settings",
    security(("bearer_auth" = []))
)]
pub async fn delete_setting_definition(
    State(server): State<ClinicServer>,
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Query(params): Query<DeleteDefinitionParams>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_permission("manage-setting-definitions")?;
    let definition = find_definition(db.pool(), id).await?;
    let remove_from_clinics = params.remove_from_clinics.unwrap_or(false);

    let mut removed = 0u64;
    for connection in all_tenant_connections(&server).await? {
        let pool = connection.pool();
        let result: Result<u64, sqlx::Error> = async {
            sqlx::query("DELETE FROM setting_definitions WHERE setting_key = $1")
                .bind(&definition.setting_key)
                .execute(pool)
                .await?;
            if !remove_from_clinics {
                return Ok(0);
            }
            let rows = sqlx::query("DELETE FROM clinic_settings WHERE setting_key = $1")
                .bind(&definition.setting_key)
                .execute(pool)
                .await?
                .rows_affected();
            Ok(rows)
        }
        .await;
        match result {
            Ok(rows) => removed += rows,
            Err(e) => warn!(tenant_id = %connection.tenant_id(), error = %e, "Setting definition removal failed"),
        }
    }

    let message = if remove_from_clinics {
        format!("Setting definition deleted. Removed from {} clinics.", removed)
    } else {
        "Setting definition deleted. Clinic settings preserved.".to_string()
    };
    Ok(Json(api_message((), message)))
}

#[utoipa::path(
    post,
    path = "/api/setting-definitions/sync-all",
    responses((status = 200, description = "Missing settings created in every clinic")),
    tag = "settings",
    security(("bearer_auth" = []))
)]
pub async fn sync_all_settings(
    State(server): State<ClinicServer>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<u64>>, ApiError> {
    auth.require_permission("manage-setting-definitions")?;

    let mut synced = 0u64;
    for connection in all_tenant_connections(&server).await? {
        match sync_clinic_settings(connection.pool()).await {
            Ok(created) => synced += created,
            Err(e) => warn!(tenant_id = %connection.tenant_id(), error = %e, "Clinic settings sync failed"),
        }
    }

    Ok(Json(api_message(
        synced,
        format!("Synced {} settings across all clinics", synced),
    )))
}

// ============================================================================
// CLINIC SETTING HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/clinic-settings",
    responses((status = 200, description = "Clinic settings retrieved successfully", body = Vec<SettingGroup>)),
    tag = "settings",
    security(("bearer_auth" = []))
)]
pub async fn list_clinic_settings(
    db: TenantDb,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<SettingGroup>>>, ApiError> {
    auth.require_permission("view-clinic-settings")?;
    sync_clinic_settings(db.pool()).await?;

    let rows = sqlx::query_as::<_, SettingRow>(&format!(
        "{SETTING_SELECT} WHERE cs.is_active ORDER BY d.display_order NULLS LAST, cs.setting_key"
    ))
    .fetch_all(db.pool())
    .await?;

    let groups = group_settings(rows.into_iter().map(ClinicSetting::from).collect());
    Ok(Json(api_message(groups, "Clinic settings retrieved successfully")))
}

#[utoipa::path(
    get,
    path = "/api/clinic-settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 200, description = "Clinic setting retrieved successfully", body = ClinicSetting),
        (status = 404, description = "Setting not found")
    ),
    tag = "settings",
    security(("bearer_auth" = []))
)]
pub async fn get_clinic_setting(
    db: TenantDb,
    auth: AuthContext,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<ClinicSetting>>, ApiError> {
    auth.require_permission("view-clinic-settings")?;
    let row = find_setting(db.pool(), &key)
        .await?
        .ok_or_else(|| ApiError::not_found("Setting"))?;
    Ok(Json(api_message(ClinicSetting::from(row), "Clinic setting retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/clinic-settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    request_body = UpdateSettingRequest,
    responses(
        (status = 200, description = "Clinic setting updated successfully", body = ClinicSetting),
        (status = 404, description = "Unknown setting key"),
        (status = 422, description = "Value does not match the setting type")
    ),
    tag = "settings",
    security(("bearer_auth" = []))
)]
pub async fn update_clinic_setting(
    db: TenantDb,
    auth: AuthContext,
    Path(key): Path<String>,
    Json(req): Json<UpdateSettingRequest>,
) -> Result<Json<ApiResponse<ClinicSetting>>, ApiError> {
    auth.require_permission("edit-clinic-settings")?;
    let current = find_setting(db.pool(), &key)
        .await?
        .ok_or_else(|| ApiError::not_found_message(UNKNOWN_SETTING))?;

    let encoded = encode_value(&current.setting_type, &req.value).map_err(|e| ApiError::field("value", e))?;
    store_value(db.pool(), &key, encoded.as_deref()).await?;

    let row = find_setting(db.pool(), &key)
        .await?
        .ok_or_else(|| ApiError::not_found("Setting"))?;
    Ok(Json(api_message(ClinicSetting::from(row), "Clinic setting updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/clinic-settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 200, description = "Clinic setting deleted successfully"),
        (status = 404, description = "Setting not found")
    ),
    tag = "settings",
    security(("bearer_auth" = []))
)]
pub async fn delete_clinic_setting(
    db: TenantDb,
    auth: AuthContext,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_permission("edit-clinic-settings")?;
    let deleted = sqlx::query("DELETE FROM clinic_settings WHERE setting_key = $1")
        .bind(&key)
        .execute(db.pool())
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::not_found("Setting"));
    }
    Ok(Json(api_message((), "Clinic setting deleted successfully")))
}

#[utoipa::path(
    post,
    path = "/api/clinic-settings/bulk-update",
    request_body = BulkUpdateSettingsRequest,
    responses(
        (status = 200, description = "Settings updated", body = BulkUpdateResult),
        (status = 422, description = "A value does not match its setting type")
    ),
    tag = "settings",
    security(("bearer_auth" = []))
)]
pub async fn bulk_update_clinic_settings(
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<BulkUpdateSettingsRequest>,
) -> Result<Json<ApiResponse<BulkUpdateResult>>, ApiError> {
    auth.require_permission("edit-clinic-settings")?;

    // Validate everything before writing anything
    let mut pending = Vec::new();
    let mut skipped = Vec::new();
    for item in req.settings.iter().filter(|item| !item.value.is_null()) {
        match find_setting(db.pool(), &item.key).await? {
            Some(current) => {
                let encoded = encode_value(&current.setting_type, &item.value)
                    .map_err(|e| ApiError::field(&format!("settings.{}", item.key), e))?;
                pending.push((item.key.clone(), encoded));
            }
            None => skipped.push(item.key.clone()),
        }
    }

    let mut tx = db.pool().begin().await?;
    for (key, value) in &pending {
        sqlx::query("UPDATE clinic_settings SET setting_value = $2, updated_at = NOW() WHERE setting_key = $1")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let updated: Vec<String> = pending.into_iter().map(|(key, _)| key).collect();
    let message = bulk_message(updated.len(), &skipped);
    Ok(Json(api_message(BulkUpdateResult { updated, skipped }, message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boolean_values() {
        assert_eq!(encode_value("boolean", &json!(true)).unwrap().as_deref(), Some("1"));
        assert_eq!(encode_value("boolean", &json!("false")).unwrap().as_deref(), Some("0"));
        assert_eq!(encode_value("boolean", &json!(0)).unwrap().as_deref(), Some("0"));
        assert!(encode_value("boolean", &json!("maybe")).is_err());
        assert!(encode_value("boolean", &json!(7)).is_err());
    }

    #[test]
    fn test_integer_values() {
        assert_eq!(encode_value("integer", &json!(30)).unwrap().as_deref(), Some("30"));
        assert_eq!(encode_value("integer", &json!(" 45 ")).unwrap().as_deref(), Some("45"));
        assert!(encode_value("integer", &json!(1.5)).is_err());
        assert!(encode_value("integer", &json!("thirty")).is_err());
    }

    #[test]
    fn test_json_and_string_values() {
        assert_eq!(
            encode_value("json", &json!({"friday": "Closed"})).unwrap().as_deref(),
            Some(r#"{"friday":"Closed"}"#)
        );
        assert_eq!(encode_value("json", &json!("[1,2]")).unwrap().as_deref(), Some("[1,2]"));
        assert_eq!(encode_value("string", &json!("USD")).unwrap().as_deref(), Some("USD"));
        assert!(encode_value("string", &json!(["a"])).is_err());
        assert_eq!(encode_value("string", &Value::Null).unwrap(), None);
    }

    #[test]
    fn test_decode_by_type() {
        assert_eq!(decode_value("boolean", Some("1")), json!(true));
        assert_eq!(decode_value("boolean", Some("0")), json!(false));
        assert_eq!(decode_value("integer", Some("24")), json!(24));
        assert_eq!(decode_value("json", Some(r#"{"a":1}"#)), json!({"a": 1}));
        assert_eq!(decode_value("json", Some("not json")), json!("not json"));
        assert_eq!(decode_value("string", None), Value::Null);
    }

    #[test]
    fn test_setting_key_format() {
        assert!(is_setting_key("reminder_hours"));
        assert!(!is_setting_key("Reminder-Hours"));
        assert!(!is_setting_key("tax_rate_2"));

        let req = SettingDefinitionRequest {
            setting_key: Some("a".repeat(101)),
            setting_type: Some("string".to_string()),
            category: Some("general".to_string()),
            ..Default::default()
        };
        assert!(req.validate_create().is_err());

        let req = SettingDefinitionRequest {
            setting_key: Some("instagram_url".to_string()),
            setting_type: Some("string".to_string()),
            category: Some("social".to_string()),
            ..Default::default()
        };
        assert!(req.validate_create().is_ok());
    }

    #[test]
    fn test_groups_follow_category_order() {
        let setting = |key: &str, category: &str| ClinicSetting {
            id: 1,
            setting_key: key.to_string(),
            setting_value: None,
            setting_type: "string".to_string(),
            value: Value::Null,
            description: None,
            category: category.to_string(),
            display_order: 0,
            is_active: true,
            updated_at: Utc::now(),
        };
        let groups = group_settings(vec![
            setting("currency", "financial"),
            setting("clinic_name", "general"),
            setting("theme_color", "display"),
        ]);
        let order: Vec<&str> = groups.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(order, ["general", "financial", "display"]);
        assert_eq!(groups[0].label, "General Information");
    }

    #[test]
    fn test_bulk_message() {
        assert_eq!(bulk_message(2, &[]), "2 settings updated successfully");
        assert_eq!(
            bulk_message(1, &["foo".to_string(), "bar".to_string()]),
            "1 settings updated successfully. Skipped 2 unknown keys: foo, bar"
        );
    }
}
