//! Tests against a live Postgres. They run when `DATABASE_URL` is set and
//! return early otherwise. Each test migrates a fresh schema of its own and
//! drops it afterwards.

use chrono::{Duration, Utc};
use clinic_server::auth::users::{self, NewUser, UserChanges};
use clinic_server::auth::Role;
use database_layer::migrate::{CENTRAL_MIGRATOR, TENANT_MIGRATOR};
use database_layer::{NewTenant, PgTenantDirectory, TenantChanges, TenantDirectory};
use sqlx::migrate::Migrator;
use reporting_engine::{DoctorScope, ReportFilter, ReportsRepository};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

struct TenantSchema {
    admin: PgPool,
    name: String,
    pool: PgPool,
}

impl TenantSchema {
    async fn create() -> Option<Self> {
        Self::migrated(&TENANT_MIGRATOR).await
    }

    async fn migrated(migrator: &Migrator) -> Option<Self> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let name = format!("it_{}", Uuid::new_v4().simple());

        let admin = PgPool::connect(&url).await.unwrap();
        sqlx::query(&format!("CREATE SCHEMA {name}")).execute(&admin).await.unwrap();

        let options = PgConnectOptions::from_str(&url)
            .unwrap()
            .options([("search_path", name.as_str())]);
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .unwrap();
        migrator.run(&pool).await.unwrap();

        Some(Self { admin, name, pool })
    }

    async fn remove(self) {
        self.pool.close().await;
        sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.name))
            .execute(&self.admin)
            .await
            .unwrap();
    }
}

async fn add_user(pool: &PgPool, phone: &str, role: Role) -> i64 {
    let mut conn = pool.acquire().await.unwrap();
    let user = users::insert_user(
        &mut conn,
        &NewUser {
            name: "Dr. Layla",
            email: None,
            phone,
            password_hash: "hash",
            is_active: true,
            central_user_id: None,
        },
    )
    .await
    .unwrap();
    users::sync_roles(&mut conn, user.id, &[role]).await.unwrap();
    user.id
}

async fn add_patient(pool: &PgPool, doctor_id: i64) -> i64 {
    sqlx::query_scalar("INSERT INTO patients (public_token, name, doctor_id) VALUES ($1, 'Omar', $2) RETURNING id")
        .bind(Uuid::new_v4())
        .bind(doctor_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn add_case(pool: &PgPool, patient_id: i64, doctor_id: i64, price: i64) -> i64 {
    sqlx::query_scalar("INSERT INTO cases (patient_id, doctor_id, price) VALUES ($1, $2, $3) RETURNING id")
        .bind(patient_id)
        .bind(doctor_id)
        .bind(price)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn add_bill(pool: &PgPool, patient_id: i64, case_id: i64, doctor_id: i64, price: i64, is_paid: bool) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO bills (patient_id, billable_id, billable_type, price, doctor_id, is_paid) \
         VALUES ($1, $2, 'case', $3, $4, $5) RETURNING id",
    )
    .bind(patient_id)
    .bind(case_id)
    .bind(price)
    .bind(doctor_id)
    .bind(is_paid)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn case_paid(pool: &PgPool, case_id: i64) -> bool {
    sqlx::query_scalar("SELECT is_paid FROM cases WHERE id = $1")
        .bind(case_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn exec(pool: &PgPool, sql: &str, id: i64) {
    sqlx::query(sql).bind(id).execute(pool).await.unwrap();
}

#[tokio::test]
async fn case_is_paid_follows_its_bills() {
    let Some(schema) = TenantSchema::create().await else {
        return;
    };
    let pool = &schema.pool;
    let doctor = add_user(pool, "07700000001", Role::Doctor).await;
    let patient = add_patient(pool, doctor).await;
    let case_id = add_case(pool, patient, doctor, 300).await;

    let first = add_bill(pool, patient, case_id, doctor, 100, true).await;
    assert!(!case_paid(pool, case_id).await);

    let second = add_bill(pool, patient, case_id, doctor, 200, false).await;
    assert!(!case_paid(pool, case_id).await);

    exec(pool, "UPDATE bills SET is_paid = TRUE WHERE id = $1", second).await;
    assert!(case_paid(pool, case_id).await);

    exec(pool, "UPDATE cases SET price = 400 WHERE id = $1", case_id).await;
    assert!(!case_paid(pool, case_id).await);

    exec(pool, "UPDATE cases SET price = 300 WHERE id = $1", case_id).await;
    assert!(case_paid(pool, case_id).await);

    exec(pool, "UPDATE bills SET deleted_at = NOW() WHERE id = $1", first).await;
    assert!(!case_paid(pool, case_id).await);

    exec(pool, "UPDATE bills SET deleted_at = NULL WHERE id = $1", first).await;
    assert!(case_paid(pool, case_id).await);

    exec(pool, "DELETE FROM bills WHERE id = $1", second).await;
    assert!(!case_paid(pool, case_id).await);

    schema.remove().await;
}

#[tokio::test]
async fn bill_reports_respect_payment_scope_and_range() {
    let Some(schema) = TenantSchema::create().await else {
        return;
    };
    let pool = &schema.pool;
    let layla = add_user(pool, "07700000002", Role::Doctor).await;
    let karim = add_user(pool, "07700000003", Role::Doctor).await;
    let patient = add_patient(pool, layla).await;
    let case_a = add_case(pool, patient, layla, 500).await;
    let case_b = add_case(pool, patient, karim, 150).await;

    add_bill(pool, patient, case_a, layla, 200, true).await;
    add_bill(pool, patient, case_a, layla, 300, false).await;
    add_bill(pool, patient, case_b, karim, 150, true).await;

    let reports = ReportsRepository::new(pool.clone());
    let all = ReportFilter::default();

    let summary = reports.bills_summary(&all).await.unwrap();
    assert_eq!(summary.total_bills, 3);
    assert_eq!(summary.paid_bills, 2);
    assert_eq!(summary.total_revenue, 350);
    assert_eq!(summary.total_outstanding, 300);

    let by_doctor = reports.revenue_by_doctor(&all).await.unwrap();
    assert_eq!(by_doctor[0].doctor_id, layla);
    assert_eq!(by_doctor[0].total_revenue, 200);
    assert_eq!(by_doctor[1].total_revenue, 150);

    let statistics = reports.bill_statistics(&all).await.unwrap();
    assert_eq!(statistics.total_case_price, 650);
    assert_eq!(statistics.paid_case_price, 150);
    assert_eq!(statistics.unpaid_case_price, 500);

    let own = all.clone().with_scope(DoctorScope::Doctor(karim));
    let summary = reports.bills_summary(&own).await.unwrap();
    assert_eq!(summary.total_bills, 1);
    assert_eq!(summary.total_revenue, 150);

    let future = (Utc::now() + Duration::days(2)).date_naive();
    let later = ReportFilter::new(Some(future), None).unwrap();
    assert_eq!(reports.bills_summary(&later).await.unwrap().total_bills, 0);
    assert_eq!(reports.revenue_total(&later).await.unwrap(), 0);

    schema.remove().await;
}

#[tokio::test]
async fn account_reload_sees_deactivation_and_new_roles() {
    let Some(schema) = TenantSchema::create().await else {
        return;
    };
    let pool = &schema.pool;
    let user_id = add_user(pool, "07700000004", Role::Doctor).await;

    let record = users::find_by_id(pool, user_id).await.unwrap().unwrap();
    let profile = users::load_profile(pool, &record).await.unwrap();
    assert_eq!(profile.roles, vec!["doctor".to_string()]);

    let mut conn = pool.acquire().await.unwrap();
    users::sync_roles(&mut conn, user_id, &[Role::Secretary]).await.unwrap();
    let record = users::find_by_id(pool, user_id).await.unwrap().unwrap();
    let profile = users::load_profile(pool, &record).await.unwrap();
    assert_eq!(profile.roles, vec!["secretary".to_string()]);

    let updated = users::update_user(
        &mut conn,
        user_id,
        &UserChanges {
            name: &record.name,
            email: None,
            phone: &record.phone,
            is_active: false,
        },
    )
    .await
    .unwrap();
    assert!(users::ends_sessions(&record, updated.is_active, false, false));
    drop(conn);

    let reloaded = users::find_by_id(pool, user_id).await.unwrap().unwrap();
    assert!(!reloaded.is_active);

    exec(pool, "UPDATE users SET deleted_at = NOW() WHERE id = $1", user_id).await;
    assert!(users::find_by_id(pool, user_id).await.unwrap().is_none());

    schema.remove().await;
}

async fn clinic_name(pool: &PgPool, id: &str) -> Option<String> {
    sqlx::query_scalar("SELECT name FROM clinics WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn central_tenant_update_and_delete_keep_clinic_row_in_step() {
    let Some(schema) = TenantSchema::migrated(&CENTRAL_MIGRATOR).await else {
        return;
    };
    let pool = &schema.pool;
    let directory = PgTenantDirectory::new(pool.clone());

    directory.create(&NewTenant::new("_smile", "Smile")).await.unwrap();
    exec_text(pool, "INSERT INTO clinics (id, name) VALUES ($1, 'Smile')", "_smile").await;
    exec_text(pool, "INSERT INTO users (name, phone, password, clinic_id) VALUES ('Sara', '0770', 'x', $1)", "_smile").await;
    directory.add_domain("_smile", "smile.clinic.test").await.unwrap();

    let changes = TenantChanges {
        name: Some("Smile Dental".to_string()),
        ..TenantChanges::default()
    };
    directory.update("_smile", &changes).await.unwrap().unwrap();
    assert_eq!(clinic_name(pool, "_smile").await.as_deref(), Some("Smile Dental"));

    assert!(directory.delete("_smile").await.unwrap());
    assert_eq!(clinic_name(pool, "_smile").await, None);
    assert!(directory.domains("_smile").await.unwrap().is_empty());
    let (clinic_id, is_active): (Option<String>, bool) =
        sqlx::query_as("SELECT clinic_id, is_active FROM users WHERE phone = '0770'")
            .fetch_one(pool)
            .await
            .unwrap();
    assert_eq!(clinic_id, None);
    assert!(!is_active);

    let again = directory.create(&NewTenant::new("_smile", "Smile")).await.unwrap();
    assert_eq!(again.id, "_smile");

    schema.remove().await;
}

async fn exec_text(pool: &PgPool, sql: &str, value: &str) {
    sqlx::query(sql).bind(value).execute(pool).await.unwrap();
}
