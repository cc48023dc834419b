//! Default rows every tenant database starts with.
//!
//! Seeding is idempotent: rows that already exist (matched by name or key)
//! are left alone, so it is safe to run on every provisioning.

use crate::error::DatabaseResult;
use sqlx::PgPool;
use tracing::info;

/// (name_ar, name_en, color, order)
pub const DEFAULT_STATUSES: &[(&str, &str, &str, i32)] = &[
    ("جديد", "New", "#3B82F6", 1),
    ("قيد التقدم", "In Progress", "#F59E0B", 2),
    ("مكتمل", "Completed", "#10B981", 3),
    ("ملغي", "Cancelled", "#EF4444", 4),
    ("معلق", "On Hold", "#6B7280", 5),
];

/// (name, order, item_cost)
pub const DEFAULT_CASE_CATEGORIES: &[(&str, i32, i64)] = &[
    ("General Examination", 1, 5_000),
    ("Teeth Cleaning", 2, 10_000),
    ("Tooth Filling", 3, 15_000),
    ("Tooth Extraction", 4, 20_000),
    ("Root Canal Treatment", 5, 50_000),
    ("Crown Installation", 6, 80_000),
    ("Orthodontics", 7, 100_000),
    ("Dental Implant", 8, 150_000),
    ("Teeth Whitening", 9, 25_000),
];

/// (name, name_ar, description, order)
pub const DEFAULT_PATIENT_SOURCES: &[(&str, &str, &str, i32)] = &[
    ("Social Media", "وسائل التواصل الاجتماعي", "Facebook, Instagram and similar platforms", 1),
    ("Google Search", "بحث جوجل", "Found the clinic through a web search", 2),
    ("Friend Referral", "توصية صديق", "Recommended by a friend or relative", 3),
    ("Walk-in", "زيارة مباشرة", "Visited without a prior referral", 4),
    ("Doctor Referral", "تحويل من طبيب", "Referred by another doctor", 5),
    ("Advertisement", "إعلان", "Printed, radio or TV advertisement", 6),
    ("Website", "الموقع الإلكتروني", "Clinic website", 7),
    ("Insurance Company", "شركة التأمين", "Referred by an insurance provider", 8),
];

pub const WORKING_HOURS_DEFAULT: &str = r#"{"sunday":"9:00 AM - 5:00 PM","monday":"9:00 AM - 5:00 PM","tuesday":"9:00 AM - 5:00 PM","wednesday":"9:00 AM - 5:00 PM","thursday":"9:00 AM - 5:00 PM","friday":"Closed","saturday":"Closed"}"#;

/// A built-in setting definition
#[derive(Debug, Clone, Copy)]
pub struct SettingSeed {
    pub key: &'static str,
    pub setting_type: &'static str,
    pub default_value: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub display_order: i32,
}

const fn setting(
    key: &'static str,
    setting_type: &'static str,
    default_value: &'static str,
    description: &'static str,
    category: &'static str,
    display_order: i32,
) -> SettingSeed {
    SettingSeed {
        key,
        setting_type,
        default_value,
        description,
        category,
        display_order,
    }
}

pub const DEFAULT_SETTING_DEFINITIONS: &[SettingSeed] = &[
    setting("clinic_name", "string", "", "Official clinic name", "general", 1),
    setting("logo", "string", "", "Clinic logo image path", "general", 2),
    setting("phone", "string", "", "Primary contact phone number", "general", 3),
    setting("email", "string", "", "Primary contact email", "general", 4),
    setting("address", "string", "", "Clinic physical address", "general", 5),
    setting("website", "string", "", "Clinic website URL", "general", 6),
    setting("appointment_duration", "integer", "30", "Default appointment duration in minutes", "appointment", 1),
    setting("enable_online_booking", "boolean", "1", "Enable online appointment booking", "appointment", 2),
    setting("booking_buffer", "integer", "15", "Minutes kept free between appointments", "appointment", 3),
    setting("max_daily_appointments", "integer", "20", "Maximum appointments per day", "appointment", 4),
    setting("working_hours", "json", WORKING_HOURS_DEFAULT, "Clinic working hours", "appointment", 5),
    setting("enable_sms", "boolean", "1", "Enable SMS notifications", "notification", 1),
    setting("enable_email", "boolean", "1", "Enable email notifications", "notification", 2),
    setting("enable_whatsapp", "boolean", "0", "Enable WhatsApp notifications", "notification", 3),
    setting("reminder_hours", "integer", "24", "Send appointment reminders this many hours before", "notification", 4),
    setting("currency", "string", "USD", "Currency code", "financial", 1),
    setting("tax_rate", "integer", "0", "Tax rate percentage", "financial", 2),
    setting("late_payment_fee", "integer", "0", "Fee added to overdue bills", "financial", 3),
    setting("payment_terms", "string", "Payment due upon service", "Payment terms printed on bills", "financial", 4),
    setting("theme_color", "string", "#1e40af", "Primary interface color", "display", 1),
];

/// Counts of rows inserted by [`seed_tenant`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
pub struct SeedSummary {
    pub statuses: u64,
    pub case_categories: u64,
    pub patient_sources: u64,
    pub setting_definitions: u64,
    pub clinic_settings: u64,
}

pub async fn seed_tenant(pool: &PgPool) -> DatabaseResult<SeedSummary> {
    let mut summary = SeedSummary::default();
    let mut tx = pool.begin().await?;

    for (name_ar, name_en, color, order) in DEFAULT_STATUSES {
        summary.statuses += sqlx::query(
            r#"
            INSERT INTO statuses (name_ar, name_en, color, sort_order)
            SELECT $1, $2, $3, $4
            WHERE NOT EXISTS (SELECT 1 FROM statuses WHERE name_en = $2)
            "#,
        )
        .bind(name_ar)
        .bind(name_en)
        .bind(color)
        .bind(order)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for (name, order, item_cost) in DEFAULT_CASE_CATEGORIES {
        summary.case_categories += sqlx::query(
            r#"
            INSERT INTO case_categories (name, sort_order, item_cost)
            SELECT $1, $2, $3
            WHERE NOT EXISTS (SELECT 1 FROM case_categories WHERE name = $1 AND deleted_at IS NULL)
            "#,
        )
        .bind(name)
        .bind(order)
        .bind(item_cost)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for (name, name_ar, description, order) in DEFAULT_PATIENT_SOURCES {
        summary.patient_sources += sqlx::query(
            r#"
            INSERT INTO from_where_comes (name, name_ar, description, sort_order)
            SELECT $1, $2, $3, $4
            WHERE NOT EXISTS (SELECT 1 FROM from_where_comes WHERE name = $1)
            "#,
        )
        .bind(name)
        .bind(name_ar)
        .bind(description)
        .bind(order)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for def in DEFAULT_SETTING_DEFINITIONS {
        summary.setting_definitions += sqlx::query(
            r#"
            INSERT INTO setting_definitions
                (setting_key, setting_type, default_value, description, category, display_order)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (setting_key) DO NOTHING
            "#,
        )
        .bind(def.key)
        .bind(def.setting_type)
        .bind(def.default_value)
        .bind(def.description)
        .bind(def.category)
        .bind(def.display_order)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    tx.commit().await?;

    summary.clinic_settings = sync_clinic_settings(pool).await?;
    info!(?summary, "Tenant seed complete");
    Ok(summary)
}

/// Create a clinic setting, holding the default value, for every active
/// definition that has none yet. Returns the number of settings created.
pub async fn sync_clinic_settings(pool: &PgPool) -> DatabaseResult<u64> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO clinic_settings (setting_key, setting_value, setting_type, description, is_active)
        SELECT d.setting_key, d.default_value, d.setting_type, d.description, TRUE
        FROM setting_definitions d
        WHERE d.is_active
        ON CONFLICT (setting_key) DO NOTHING
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_setting_keys_unique() {
        let keys: HashSet<&str> = DEFAULT_SETTING_DEFINITIONS.iter().map(|d| d.key).collect();
        assert_eq!(keys.len(), DEFAULT_SETTING_DEFINITIONS.len());
    }

    #[test]
    fn test_setting_defaults_match_their_type() {
        for def in DEFAULT_SETTING_DEFINITIONS {
            match def.setting_type {
                "integer" => assert!(def.default_value.parse::<i64>().is_ok(), "{}", def.key),
                "boolean" => assert!(matches!(def.default_value, "0" | "1"), "{}", def.key),
                "json" => assert!(serde_json::from_str::<serde_json::Value>(def.default_value).is_ok()),
                "string" => {}
                other => panic!("unexpected type {other}"),
            }
        }
    }

    #[test]
    fn test_status_order_is_sequential() {
        let orders: Vec<i32> = DEFAULT_STATUSES.iter().map(|s| s.3).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5]);
        assert_eq!(DEFAULT_CASE_CATEGORIES.len(), 9);
        assert_eq!(DEFAULT_PATIENT_SOURCES.len(), 8);
    }
}
