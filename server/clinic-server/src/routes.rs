pub mod paths;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::{
    handlers::{
        auth, bills, case_categories, cases, doctors, expenses, health, images, notes, notifications, patients,
        public_patients, recipes, reports, reservations, secretaries, settings, tenants,
    },
    openapi,
    server::ClinicServer,
};

/// Create health check routes
pub fn health_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::health::HEALTH, get(health::health_check))
        .route(paths::health::VERSION, get(health::version_info))
}

/// Tenant registry management (central database, super admin only)
pub fn tenant_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::tenants::TENANTS, get(tenants::list_tenants))
        .route(paths::tenants::TENANTS, post(tenants::create_tenant))
        .route(paths::tenants::PREVIEW, get(tenants::preview_tenant_id))
        .route(paths::tenants::TENANT_BY_ID, get(tenants::get_tenant))
        .route(paths::tenants::TENANT_BY_ID, put(tenants::update_tenant))
        .route(paths::tenants::TENANT_BY_ID, delete(tenants::delete_tenant))
        .route(paths::tenants::DOMAINS, get(tenants::list_domains))
        .route(paths::tenants::DOMAINS, post(tenants::add_domain))
        .route(paths::tenants::MIGRATE, post(tenants::migrate_tenant))
        .route(paths::tenants::SEED, post(tenants::seed_tenant))
}

/// Create authentication routes
pub fn auth_routes() -> Router<ClinicServer> {
    Router::new()
        // Central
        .route(paths::auth::REGISTER, post(auth::register))
        .route(paths::auth::CHECK_CREDENTIALS, post(auth::check_credentials))
        .route(paths::auth::SMART_LOGIN, post(auth::smart_login))
        // Tenant
        .route(paths::auth::LOGIN, post(auth::login))
        .route(paths::auth::ME, get(auth::me))
        .route(paths::auth::LOGOUT, post(auth::logout))
        .route(paths::auth::REFRESH, post(auth::refresh))
        .route(paths::auth::CHANGE_PASSWORD, post(auth::change_password))
}

/// Patients and their public profile management
pub fn patient_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::patients::PATIENTS, get(patients::list_patients))
        .route(paths::patients::PATIENTS, post(patients::create_patient))
        .route(paths::patients::PATIENT_BY_ID, get(patients::get_patient))
        .route(paths::patients::PATIENT_BY_ID, put(patients::update_patient))
        .route(paths::patients::PATIENT_BY_ID, delete(patients::delete_patient))
        .route(paths::patients::SEARCH_PHONE, get(patients::search_by_phone))
        .route(paths::patients::SEARCH_EMAIL, get(patients::search_by_email))
        .route(paths::patients::TOOTH_DETAILS, put(patients::update_tooth_details))
        .route(paths::patients::PUBLIC_PROFILE, get(patients::get_public_profile))
        .route(paths::patients::PUBLIC_PROFILE_ENABLE, post(patients::enable_public_profile))
        .route(paths::patients::PUBLIC_PROFILE_DISABLE, post(patients::disable_public_profile))
        .route(paths::patients::PUBLIC_PROFILE_REGENERATE, post(patients::regenerate_public_token))
        .route(paths::patients::QR_CODE, get(patients::get_qr_code))
}

/// Public patient profile (tenant header, no token)
pub fn public_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::public::PROFILE, get(public_patients::show_public_profile))
        .route(paths::public::CASES, get(public_patients::public_cases))
        .route(paths::public::IMAGES, get(public_patients::public_images))
        .route(paths::public::RESERVATIONS, get(public_patients::public_reservations))
}

/// Cases, reservations, recipes, notes and images
pub fn clinical_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::clinical::CASES, get(cases::list_cases))
        .route(paths::clinical::CASES, post(cases::create_case))
        .route(paths::clinical::CASE_BY_ID, get(cases::get_case))
        .route(paths::clinical::CASE_BY_ID, put(cases::update_case))
        .route(paths::clinical::CASE_BY_ID, delete(cases::delete_case))
        .route(paths::clinical::CASE_CATEGORIES, get(case_categories::list_case_categories))
        .route(paths::clinical::CASE_CATEGORIES, post(case_categories::create_case_category))
        .route(paths::clinical::CASE_CATEGORY_BY_ID, get(case_categories::get_case_category))
        .route(paths::clinical::CASE_CATEGORY_BY_ID, put(case_categories::update_case_category))
        .route(paths::clinical::CASE_CATEGORY_BY_ID, delete(case_categories::delete_case_category))
        .route(paths::clinical::RESERVATIONS, get(reservations::list_reservations))
        .route(paths::clinical::RESERVATIONS, post(reservations::create_reservation))
        .route(paths::clinical::RESERVATION_BY_ID, get(reservations::get_reservation))
        .route(paths::clinical::RESERVATION_BY_ID, put(reservations::update_reservation))
        .route(paths::clinical::RESERVATION_BY_ID, delete(reservations::delete_reservation))
        .route(paths::clinical::RECIPES, get(recipes::list_recipes))
        .route(paths::clinical::RECIPES, post(recipes::create_recipe))
        .route(paths::clinical::RECIPE_BY_ID, get(recipes::get_recipe))
        .route(paths::clinical::RECIPE_BY_ID, put(recipes::update_recipe))
        .route(paths::clinical::RECIPE_BY_ID, delete(recipes::delete_recipe))
        .route(paths::clinical::NOTES, get(notes::list_notes))
        .route(paths::clinical::NOTES, post(notes::create_note))
        .route(paths::clinical::NOTE_BY_ID, get(notes::get_note))
        .route(paths::clinical::NOTE_BY_ID, put(notes::update_note))
        .route(paths::clinical::NOTE_BY_ID, delete(notes::delete_note))
        .route(paths::clinical::NOTES_FOR, get(notes::notes_for))
        .route(paths::clinical::IMAGES, get(images::list_images))
        .route(paths::clinical::IMAGES, post(images::create_image))
        .route(paths::clinical::IMAGES_BY_IMAGEABLE, get(images::images_by_imageable))
        .route(paths::clinical::IMAGE_STATISTICS, get(images::image_statistics))
        .route(paths::clinical::IMAGE_BY_ID, get(images::get_image))
        .route(paths::clinical::IMAGE_BY_ID, put(images::update_image))
        .route(paths::clinical::IMAGE_BY_ID, delete(images::delete_image))
        .route(paths::clinical::IMAGE_ORDER, patch(images::update_image_order))
}

/// Bills, expense categories and clinic expenses
pub fn billing_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::billing::BILLS, get(bills::list_bills))
        .route(paths::billing::BILLS, post(bills::create_bill))
        .route(paths::billing::BILL_BY_ID, get(bills::get_bill))
        .route(paths::billing::BILL_BY_ID, put(bills::update_bill))
        .route(paths::billing::BILL_BY_ID, delete(bills::delete_bill))
        .route(paths::billing::MARK_PAID, patch(bills::mark_bill_paid))
        .route(paths::billing::MARK_UNPAID, patch(bills::mark_bill_unpaid))
        .route(paths::billing::PATIENT_BILLS, get(bills::patient_bills))
        .route(paths::billing::STATISTICS, get(bills::bill_statistics))
        .route(paths::expenses::CATEGORIES, get(expenses::list_expense_categories))
        .route(paths::expenses::CATEGORIES, post(expenses::create_expense_category))
        .route(paths::expenses::CATEGORIES_ACTIVE, get(expenses::active_expense_categories))
        .route(paths::expenses::CATEGORY_BY_ID, get(expenses::get_expense_category))
        .route(paths::expenses::CATEGORY_BY_ID, put(expenses::update_expense_category))
        .route(paths::expenses::CATEGORY_BY_ID, delete(expenses::delete_expense_category))
        .route(paths::expenses::EXPENSES, get(expenses::list_expenses))
        .route(paths::expenses::EXPENSES, post(expenses::create_expense))
        .route(paths::expenses::EXPENSE_BY_ID, get(expenses::get_expense))
        .route(paths::expenses::EXPENSE_BY_ID, put(expenses::update_expense))
        .route(paths::expenses::EXPENSE_BY_ID, delete(expenses::delete_expense))
        .route(paths::expenses::MARK_PAID, patch(expenses::mark_expense_paid))
        .route(paths::expenses::MARK_UNPAID, patch(expenses::mark_expense_unpaid))
        .route(paths::expenses::STATISTICS, get(expenses::expense_statistics))
        .route(paths::expenses::UNPAID, get(expenses::unpaid_expenses))
        .route(paths::expenses::BY_DATE_RANGE, get(expenses::expenses_by_date_range))
}

/// Doctors and secretaries of the clinic
pub fn staff_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::staff::DOCTORS, get(doctors::list_doctors))
        .route(paths::staff::DOCTORS, post(doctors::create_doctor))
        .route(paths::staff::DOCTORS_ACTIVE, get(doctors::active_doctors))
        .route(paths::staff::DOCTOR_BY_ID, get(doctors::get_doctor_by_id))
        .route(paths::staff::DOCTOR_BY_ID, put(doctors::update_doctor))
        .route(paths::staff::DOCTOR_BY_ID, delete(doctors::delete_doctor))
        .route(paths::staff::DOCTOR_BY_EMAIL, get(doctors::search_doctor_by_email))
        .route(paths::staff::DOCTOR_BY_PHONE, get(doctors::search_doctor_by_phone))
        .route(paths::staff::SECRETARIES, get(secretaries::list_secretaries))
        .route(paths::staff::SECRETARIES, post(secretaries::create_secretary))
        .route(
            paths::staff::SECRETARY_PERMISSIONS_AVAILABLE,
            get(secretaries::list_available_permissions),
        )
        .route(paths::staff::SECRETARY_BY_ID, get(secretaries::get_secretary_by_id))
        .route(paths::staff::SECRETARY_BY_ID, put(secretaries::update_secretary))
        .route(paths::staff::SECRETARY_BY_ID, delete(secretaries::delete_secretary))
        .route(paths::staff::SECRETARY_PERMISSIONS, patch(secretaries::update_secretary_permissions))
        .route(paths::staff::SECRETARY_TOGGLE_STATUS, patch(secretaries::toggle_secretary_status))
}

/// Setting definitions and clinic settings
pub fn settings_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::settings::DEFINITIONS, get(settings::list_setting_definitions))
        .route(paths::settings::DEFINITIONS, post(settings::create_setting_definition))
        .route(paths::settings::DEFINITION_CATEGORIES, get(settings::setting_categories))
        .route(paths::settings::DEFINITION_TYPES, get(settings::setting_types))
        .route(paths::settings::DEFINITIONS_SYNC_ALL, post(settings::sync_all_settings))
        .route(paths::settings::DEFINITION_BY_ID, get(settings::get_setting_definition))
        .route(paths::settings::DEFINITION_BY_ID, put(settings::update_setting_definition))
        .route(paths::settings::DEFINITION_BY_ID, delete(settings::delete_setting_definition))
        .route(paths::settings::CLINIC_SETTINGS, get(settings::list_clinic_settings))
        .route(paths::settings::CLINIC_SETTINGS_BULK, post(settings::bulk_update_clinic_settings))
        .route(paths::settings::CLINIC_SETTING_BY_KEY, get(settings::get_clinic_setting))
        .route(paths::settings::CLINIC_SETTING_BY_KEY, put(settings::update_clinic_setting))
        .route(paths::settings::CLINIC_SETTING_BY_KEY, delete(settings::delete_clinic_setting))
}

/// In-app notifications
pub fn notification_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::notifications::NOTIFICATIONS, get(notifications::list_notifications))
        .route(paths::notifications::NOTIFICATIONS, post(notifications::create_notification))
        .route(paths::notifications::UNREAD_COUNT, get(notifications::notification_unread_count))
        .route(paths::notifications::STATISTICS, get(notifications::notification_statistics))
        .route(paths::notifications::BROADCAST, post(notifications::broadcast_notification))
        .route(paths::notifications::MARK_MULTIPLE_READ, post(notifications::mark_multiple_read))
        .route(paths::notifications::MARK_ALL_READ, post(notifications::mark_all_read))
        .route(paths::notifications::PLAYER_ID, post(notifications::update_player_id))
        .route(paths::notifications::TEST, post(notifications::send_test_notification))
        .route(paths::notifications::NOTIFICATION_BY_ID, get(notifications::get_notification))
        .route(paths::notifications::NOTIFICATION_BY_ID, delete(notifications::delete_notification))
        .route(paths::notifications::MARK_READ, patch(notifications::mark_notification_read))
}

/// Reports and analytics
pub fn report_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::reports::DASHBOARD_OVERVIEW, get(reports::dashboard_overview))
        .route(paths::reports::DASHBOARD_TODAY, get(reports::dashboard_today))
        .route(paths::reports::PATIENTS_SUMMARY, get(reports::patients_summary))
        .route(paths::reports::PATIENTS_BY_SOURCE, get(reports::patients_by_source))
        .route(paths::reports::PATIENTS_BY_DOCTOR, get(reports::patients_by_doctor))
        .route(paths::reports::PATIENTS_TREND, get(reports::patients_trend))
        .route(paths::reports::PATIENTS_AGE, get(reports::patients_age_distribution))
        .route(paths::reports::CASES_SUMMARY, get(reports::cases_summary))
        .route(paths::reports::CASES_BY_CATEGORY, get(reports::cases_by_category))
        .route(paths::reports::CASES_BY_STATUS, get(reports::cases_by_status))
        .route(paths::reports::CASES_BY_DOCTOR, get(reports::cases_by_doctor))
        .route(paths::reports::CASES_TREND, get(reports::cases_trend))
        .route(paths::reports::RESERVATIONS_SUMMARY, get(reports::reservations_summary))
        .route(paths::reports::RESERVATIONS_BY_STATUS, get(reports::reservations_by_status))
        .route(paths::reports::RESERVATIONS_BY_DOCTOR, get(reports::reservations_by_doctor))
        .route(paths::reports::RESERVATIONS_TREND, get(reports::reservations_trend))
        .route(paths::reports::BILLS_SUMMARY, get(reports::bills_summary))
        .route(paths::reports::BILLS_BY_PAYMENT_STATUS, get(reports::bills_by_payment_status))
        .route(paths::reports::REVENUE_BY_DOCTOR, get(reports::revenue_by_doctor))
        .route(paths::reports::REVENUE_TREND, get(reports::revenue_trend))
        .route(paths::reports::EXPENSES_SUMMARY, get(reports::expenses_summary))
        .route(paths::reports::EXPENSES_BY_CATEGORY, get(reports::expenses_by_category))
        .route(paths::reports::EXPENSES_TREND, get(reports::expenses_trend))
        .route(paths::reports::PROFIT_LOSS, get(reports::profit_loss))
        .route(paths::reports::PROFIT_LOSS_TREND, get(reports::profit_loss_trend))
        .route(paths::reports::DOCTOR_PERFORMANCE, get(reports::doctor_performance))
        .route(paths::reports::LEGACY_BILLS, get(reports::legacy_bill_report))
}

/// Create all application routes
pub fn create_routes() -> Router<ClinicServer> {
    Router::new()
        .merge(health_routes())
        .merge(tenant_routes())
        .merge(auth_routes())
        .merge(patient_routes())
        .merge(public_routes())
        .merge(clinical_routes())
        .merge(billing_routes())
        .merge(staff_routes())
        .merge(settings_routes())
        .merge(notification_routes())
        .merge(report_routes())
        .merge(openapi::create_docs_routes())
}
