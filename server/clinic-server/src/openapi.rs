use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::server::ClinicServer;

/// Main OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        // health
        crate::handlers::health::health_check,
        crate::handlers::health::version_info,
        // tenants
        crate::handlers::tenants::list_tenants,
        crate::handlers::tenants::preview_tenant_id,
        crate::handlers::tenants::create_tenant,
        crate::handlers::tenants::get_tenant,
        crate::handlers::tenants::update_tenant,
        crate::handlers::tenants::delete_tenant,
        crate::handlers::tenants::list_domains,
        crate::handlers::tenants::add_domain,
        crate::handlers::tenants::migrate_tenant,
        crate::handlers::tenants::seed_tenant,
        // auth
        crate::handlers::auth::register,
        crate::handlers::auth::check_credentials,
        crate::handlers::auth::login,
        crate::handlers::auth::smart_login,
        crate::handlers::auth::me,
        crate::handlers::auth::logout,
        crate::handlers::auth::refresh,
        crate::handlers::auth::change_password,
        // patients
        crate::handlers::patients::list_patients,
        crate::handlers::patients::create_patient,
        crate::handlers::patients::get_patient,
        crate::handlers::patients::update_patient,
        crate::handlers::patients::delete_patient,
        crate::handlers::patients::search_by_phone,
        crate::handlers::patients::search_by_email,
        crate::handlers::patients::update_tooth_details,
        crate::handlers::patients::get_public_profile,
        crate::handlers::patients::enable_public_profile,
        crate::handlers::patients::disable_public_profile,
        crate::handlers::patients::regenerate_public_token,
        crate::handlers::patients::get_qr_code,
        // public patients
        crate::handlers::public_patients::show_public_profile,
        crate::handlers::public_patients::public_cases,
        crate::handlers::public_patients::public_images,
        crate::handlers::public_patients::public_reservations,
        // cases
        crate::handlers::cases::list_cases,
        crate::handlers::cases::create_case,
        crate::handlers::cases::get_case,
        crate::handlers::cases::update_case,
        crate::handlers::cases::delete_case,
        // case categories
        crate::handlers::case_categories::list_case_categories,
        crate::handlers::case_categories::create_case_category,
        crate::handlers::case_categories::get_case_category,
        crate::handlers::case_categories::update_case_category,
        crate::handlers::case_categories::delete_case_category,
        // reservations
        crate::handlers::reservations::list_reservations,
        crate::handlers::reservations::create_reservation,
        crate::handlers::reservations::get_reservation,
        crate::handlers::reservations::update_reservation,
        crate::handlers::reservations::delete_reservation,
        // recipes
        crate::handlers::recipes::list_recipes,
        crate::handlers::recipes::create_recipe,
        crate::handlers::recipes::get_recipe,
        crate::handlers::recipes::update_recipe,
        crate::handlers::recipes::delete_recipe,
        // notes
        crate::handlers::notes::list_notes,
        crate::handlers::notes::notes_for,
        crate::handlers::notes::create_note,
        crate::handlers::notes::get_note,
        crate::handlers::notes::update_note,
        crate::handlers::notes::delete_note,
        // images
        crate::handlers::images::list_images,
        crate::handlers::images::images_by_imageable,
        crate::handlers::images::image_statistics,
        crate::handlers::images::create_image,
        crate::handlers::images::get_image,
        crate::handlers::images::update_image,
        crate::handlers::images::update_image_order,
        crate::handlers::images::delete_image,
        // bills
        crate::handlers::bills::list_bills,
        crate::handlers::bills::create_bill,
        crate::handlers::bills::get_bill,
        crate::handlers::bills::update_bill,
        crate::handlers::bills::delete_bill,
        crate::handlers::bills::mark_bill_paid,
        crate::handlers::bills::mark_bill_unpaid,
        crate::handlers::bills::patient_bills,
        crate::handlers::bills::bill_statistics,
        // expenses
        crate::handlers::expenses::list_expense_categories,
        crate::handlers::expenses::active_expense_categories,
        crate::handlers::expenses::create_expense_category,
        crate::handlers::expenses::get_expense_category,
        crate::handlers::expenses::update_expense_category,
        crate::handlers::expenses::delete_expense_category,
        crate::handlers::expenses::list_expenses,
        crate::handlers::expenses::create_expense,
        crate::handlers::expenses::get_expense,
        crate::handlers::expenses::update_expense,
        crate::handlers::expenses::delete_expense,
        crate::handlers::expenses::mark_expense_paid,
        crate::handlers::expenses::mark_expense_unpaid,
        crate::handlers::expenses::expense_statistics,
        crate::handlers::expenses::unpaid_expenses,
        crate::handlers::expenses::expenses_by_date_range,
        // doctors
        crate::handlers::doctors::list_doctors,
        crate::handlers::doctors::active_doctors,
        crate::handlers::doctors::create_doctor,
        crate::handlers::doctors::get_doctor_by_id,
        crate::handlers::doctors::update_doctor,
        crate::handlers::doctors::delete_doctor,
        crate::handlers::doctors::search_doctor_by_email,
        crate::handlers::doctors::search_doctor_by_phone,
        // secretaries
        crate::handlers::secretaries::list_secretaries,
        crate::handlers::secretaries::list_available_permissions,
        crate::handlers::secretaries::create_secretary,
        crate::handlers::secretaries::get_secretary_by_id,
        crate::handlers::secretaries::update_secretary,
        crate::handlers::secretaries::delete_secretary,
        crate::handlers::secretaries::update_secretary_permissions,
        crate::handlers::secretaries::toggle_secretary_status,
        // settings
        crate::handlers::settings::list_setting_definitions,
        crate::handlers::settings::setting_categories,
        crate::handlers::settings::setting_types,
        crate::handlers::settings::create_setting_definition,
        crate::handlers::settings::get_setting_definition,
        crate::handlers::settings::update_setting_definition,
        crate::handlers::settings::delete_setting_definition,
        crate::handlers::settings::sync_all_settings,
        crate::handlers::settings::list_clinic_settings,
        crate::handlers::settings::get_clinic_setting,
        crate::handlers::settings::update_clinic_setting,
        crate::handlers::settings::delete_clinic_setting,
        crate::handlers::settings::bulk_update_clinic_settings,
        // notifications
        crate::handlers::notifications::list_notifications,
        crate::handlers::notifications::notification_unread_count,
        crate::handlers::notifications::notification_statistics,
        crate::handlers::notifications::get_notification,
        crate::handlers::notifications::create_notification,
        crate::handlers::notifications::broadcast_notification,
        crate::handlers::notifications::mark_notification_read,
        crate::handlers::notifications::mark_multiple_read,
        crate::handlers::notifications::mark_all_read,
        crate::handlers::notifications::delete_notification,
        crate::handlers::notifications::update_player_id,
        crate::handlers::notifications::send_test_notification,
        // reports
        crate::handlers::reports::dashboard_overview,
        crate::handlers::reports::dashboard_today,
        crate::handlers::reports::patients_summary,
        crate::handlers::reports::patients_by_source,
        crate::handlers::reports::patients_by_doctor,
        crate::handlers::reports::patients_trend,
        crate::handlers::reports::patients_age_distribution,
        crate::handlers::reports::cases_summary,
        crate::handlers::reports::cases_by_category,
        crate::handlers::reports::cases_by_status,
        crate::handlers::reports::cases_by_doctor,
        crate::handlers::reports::cases_trend,
        crate::handlers::reports::reservations_summary,
        crate::handlers::reports::reservations_by_status,
        crate::handlers::reports::reservations_by_doctor,
        crate::handlers::reports::reservations_trend,
        crate::handlers::reports::bills_summary,
        crate::handlers::reports::revenue_by_doctor,
        crate::handlers::reports::revenue_trend,
        crate::handlers::reports::bills_by_payment_status,
        crate::handlers::reports::expenses_summary,
        crate::handlers::reports::expenses_by_category,
        crate::handlers::reports::expenses_trend,
        crate::handlers::reports::profit_loss,
        crate::handlers::reports::profit_loss_trend,
        crate::handlers::reports::doctor_performance,
        crate::handlers::reports::legacy_bill_report,
    ),
    components(
        schemas(
            crate::error::ApiErrorResponse,
            crate::auth::roles::PermissionInfo,
            crate::services::NotificationKind,
            reporting_engine::Period,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and version endpoints"),
        (name = "tenants", description = "Clinic (tenant) registry and database provisioning"),
        (name = "auth", description = "Registration, login and token lifecycle"),
        (name = "patients", description = "Patients and their public profiles"),
        (name = "public", description = "Read-only public patient profile"),
        (name = "cases", description = "Treatment cases"),
        (name = "case-categories", description = "Case categories and their default cost"),
        (name = "reservations", description = "Appointments"),
        (name = "recipes", description = "Prescriptions"),
        (name = "notes", description = "Notes on patients and cases"),
        (name = "images", description = "Image metadata"),
        (name = "bills", description = "Bills and payment state"),
        (name = "expenses", description = "Clinic expenses and expense categories"),
        (name = "doctors", description = "Doctor accounts"),
        (name = "secretaries", description = "Secretary accounts and their permissions"),
        (name = "settings", description = "Setting definitions and clinic settings"),
        (name = "notifications", description = "In-app and push notifications"),
        (name = "reports", description = "Dashboards and statistics"),
    ),
    info(
        title = "Clinic Engine API",
        version = "1.0.0",
        description = "Multi-tenant dental clinic API. Tenant-scoped endpoints need an X-Tenant-ID (or X-Clinic-ID) header.",
        license(name = "MIT OR Apache-2.0"),
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
)]
pub struct ApiDoc;

/// Registers the JWT bearer scheme referenced by `security(("bearer_auth" = []))`
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Swagger UI and the raw OpenAPI document
pub fn create_docs_routes() -> Router<ClinicServer> {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_tenant_and_report_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/tenants/{id}"));
        assert!(doc.paths.paths.contains_key("/api/reports/financial/profit-loss/trend"));
        assert!(doc.paths.paths.contains_key("/api/clinic-settings/bulk-update"));
    }

    #[test]
    fn test_bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
