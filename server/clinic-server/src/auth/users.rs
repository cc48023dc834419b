//! Tenant and central user lookups shared by auth, doctor and secretary
//! handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::auth::roles::{effective_permissions, Role};

// ===== TENANT USERS =====

/// Row of the tenant `users` table, password hash included
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    pub password: String,
    pub is_active: bool,
    pub onesignal_player_id: Option<String>,
    pub central_user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the API shows of a user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    pub is_active: bool,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user: &UserRecord, roles: Vec<String>, direct: &[String]) -> Self {
        let permissions = effective_permissions(&roles, direct);
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            is_active: user.is_active,
            roles,
            permissions,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub phone: &'a str,
    pub password_hash: &'a str,
    pub is_active: bool,
    pub central_user_id: Option<i64>,
}

pub const USER_COLUMNS: &str = "id, name, email, phone, password, is_active, onesignal_player_id, \
                            central_user_id, created_at, updated_at";

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<UserRecord>, sqlx::Error> {
    sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_phone(pool: &PgPool, phone: &str) -> Result<Option<UserRecord>, sqlx::Error> {
    sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE phone = $1 AND deleted_at IS NULL"
    ))
    .bind(phone)
    .fetch_optional(pool)
    .await
}

pub async fn roles_of(pool: &PgPool, user_id: i64) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role")
        .bind(user_id)
        .fetch_all(pool)
        .await
}

pub async fn direct_permissions_of(pool: &PgPool, user_id: i64) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT permission FROM user_permissions WHERE user_id = $1 ORDER BY permission")
        .bind(user_id)
        .fetch_all(pool)
        .await
}

/// Profile with roles and effective permissions loaded
pub async fn load_profile(pool: &PgPool, user: &UserRecord) -> Result<UserProfile, sqlx::Error> {
    let roles = roles_of(pool, user.id).await?;
    let direct = direct_permissions_of(pool, user.id).await?;
    Ok(UserProfile::new(user, roles, &direct))
}

/// Profiles for a page of users with two queries instead of two per user
pub async fn load_profiles(pool: &PgPool, records: &[UserRecord]) -> Result<Vec<UserProfile>, sqlx::Error> {
    let ids: Vec<i64> = records.iter().map(|u| u.id).collect();
    let roles: Vec<(i64, String)> =
        sqlx::query_as("SELECT user_id, role FROM user_roles WHERE user_id = ANY($1) ORDER BY role")
            .bind(&ids)
            .fetch_all(pool)
            .await?;
    let direct: Vec<(i64, String)> = sqlx::query_as(
        "SELECT user_id, permission FROM user_permissions WHERE user_id = ANY($1) ORDER BY permission",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut roles_by_user: HashMap<i64, Vec<String>> = HashMap::new();
    for (user_id, role) in roles {
        roles_by_user.entry(user_id).or_default().push(role);
    }
    let mut direct_by_user: HashMap<i64, Vec<String>> = HashMap::new();
    for (user_id, permission) in direct {
        direct_by_user.entry(user_id).or_default().push(permission);
    }

    Ok(records
        .iter()
        .map(|user| {
            let direct = direct_by_user.remove(&user.id).unwrap_or_default();
            UserProfile::new(user, roles_by_user.remove(&user.id).unwrap_or_default(), &direct)
        })
        .collect())
}

/// Whether an admin edit has to end the user's current sessions: the account
/// was switched on or off, its roles or permissions were replaced, or its
/// password was reset
pub fn ends_sessions(current: &UserRecord, is_active: bool, grants_changed: bool, password_changed: bool) -> bool {
    current.is_active != is_active || grants_changed || password_changed
}

/// Contact and status fields an admin may change
pub struct UserChanges<'a> {
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub phone: &'a str,
    pub is_active: bool,
}

pub async fn update_user(conn: &mut PgConnection, user_id: i64, changes: &UserChanges<'_>) -> Result<UserRecord, sqlx::Error> {
    sqlx::query_as::<_, UserRecord>(&format!(
        r#"
        UPDATE users SET name = $2, email = $3, phone = $4, is_active = $5, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(changes.name)
    .bind(changes.email)
    .bind(changes.phone)
    .bind(changes.is_active)
    .fetch_one(conn)
    .await
}

pub async fn count_users(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(pool).await
}

/// Email or phone already used by another live user
pub async fn contact_taken(
    pool: &PgPool,
    column: &str,
    value: &str,
    except_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let column = if column == "email" { "email" } else { "phone" };
    sqlx::query_scalar(&format!(
        "SELECT EXISTS (SELECT 1 FROM users WHERE {column} = $1 AND ($2::BIGINT IS NULL OR id <> $2))"
    ))
    .bind(value)
    .bind(except_id)
    .fetch_one(pool)
    .await
}

pub async fn insert_user(conn: &mut PgConnection, user: &NewUser<'_>) -> Result<UserRecord, sqlx::Error> {
    sqlx::query_as::<_, UserRecord>(&format!(
        r#"
        INSERT INTO users (name, email, phone, password, is_active, central_user_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user.name)
    .bind(user.email)
    .bind(user.phone)
    .bind(user.password_hash)
    .bind(user.is_active)
    .bind(user.central_user_id)
    .fetch_one(conn)
    .await
}

/// Replace the user's roles with `roles`
pub async fn sync_roles(conn: &mut PgConnection, user_id: i64, roles: &[Role]) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    for role in roles {
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Replace the user's direct permissions with `permissions`
pub async fn sync_permissions(
    conn: &mut PgConnection,
    user_id: i64,
    permissions: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    for permission in permissions {
        sqlx::query("INSERT INTO user_permissions (user_id, permission) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(permission)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn update_password<'e, E: PgExecutor<'e>>(executor: E, user_id: i64, password_hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(password_hash)
        .execute(executor)
        .await?;
    Ok(())
}

// ===== CENTRAL USERS =====

/// Row of the central `users` table joined with its clinic name
#[derive(Debug, Clone, FromRow)]
pub struct CentralUser {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    pub password: String,
    pub clinic_id: Option<String>,
    pub clinic_name: Option<String>,
    pub role: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CentralClinic {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub whatsapp_phone: Option<String>,
    pub logo: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub async fn central_find_by_phone(central: &PgPool, phone: &str) -> Result<Option<CentralUser>, sqlx::Error> {
    sqlx::query_as::<_, CentralUser>(
        r#"
        SELECT u.id, u.name, u.email, u.phone, u.password, u.clinic_id,
               c.name AS clinic_name, u.role, u.is_active
        FROM users u
        LEFT JOIN clinics c ON c.id = u.clinic_id AND c.deleted_at IS NULL
        WHERE u.phone = $1
        "#,
    )
    .bind(phone)
    .fetch_optional(central)
    .await
}

pub async fn central_contact_taken(central: &PgPool, column: &str, value: &str) -> Result<bool, sqlx::Error> {
    let column = if column == "email" { "email" } else { "phone" };
    sqlx::query_scalar(&format!("SELECT EXISTS (SELECT 1 FROM users WHERE {column} = $1)"))
        .bind(value)
        .fetch_one(central)
        .await
}

pub async fn central_find_clinic(central: &PgPool, id: &str) -> Result<Option<CentralClinic>, sqlx::Error> {
    sqlx::query_as::<_, CentralClinic>(
        "SELECT id, name, address, whatsapp_phone, logo, created_at FROM clinics WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(central)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(is_active: bool) -> UserRecord {
        UserRecord {
            id: 5,
            name: "Hiba".to_string(),
            email: None,
            phone: "07701234567".to_string(),
            password: String::new(),
            is_active,
            onesignal_player_id: None,
            central_user_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_contact_edits_keep_sessions() {
        assert!(!ends_sessions(&record(true), true, false, false));
    }

    #[test]
    fn test_access_edits_end_sessions() {
        assert!(ends_sessions(&record(true), false, false, false));
        assert!(ends_sessions(&record(true), true, true, false));
        assert!(ends_sessions(&record(true), true, false, true));
    }
}
