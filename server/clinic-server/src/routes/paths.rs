//! Route path constants, grouped by resource

pub mod health {
    pub const HEALTH: &str = "/health";
    pub const VERSION: &str = "/version";
}

pub mod tenants {
    pub const TENANTS: &str = "/api/tenants";
    pub const PREVIEW: &str = "/api/tenants/preview";
    pub const TENANT_BY_ID: &str = "/api/tenants/:id";
    pub const DOMAINS: &str = "/api/tenants/:id/domains";
    pub const MIGRATE: &str = "/api/tenants/:id/migrate";
    pub const SEED: &str = "/api/tenants/:id/seed";
}

pub mod auth {
    pub const REGISTER: &str = "/api/auth/register";
    pub const CHECK_CREDENTIALS: &str = "/api/auth/check-credentials";
    pub const SMART_LOGIN: &str = "/api/auth/smart-login";
    pub const LOGIN: &str = "/api/auth/login";
    pub const ME: &str = "/api/auth/me";
    pub const LOGOUT: &str = "/api/auth/logout";
    pub const REFRESH: &str = "/api/auth/refresh";
    pub const CHANGE_PASSWORD: &str = "/api/auth/change-password";
}

pub mod patients {
    pub const PATIENTS: &str = "/api/patients";
    pub const PATIENT_BY_ID: &str = "/api/patients/:id";
    pub const SEARCH_PHONE: &str = "/api/patients/search/phone/:phone";
    pub const SEARCH_EMAIL: &str = "/api/patients/search/email/:email";
    pub const TOOTH_DETAILS: &str = "/api/patients/:id/tooth-details";
    pub const PUBLIC_PROFILE: &str = "/api/patients/:id/public-profile";
    pub const PUBLIC_PROFILE_ENABLE: &str = "/api/patients/:id/public-profile/enable";
    pub const PUBLIC_PROFILE_DISABLE: &str = "/api/patients/:id/public-profile/disable";
    pub const PUBLIC_PROFILE_REGENERATE: &str = "/api/patients/:id/public-profile/regenerate-token";
    pub const QR_CODE: &str = "/api/patients/:id/qr-code";
}

pub mod public {
    pub const PROFILE: &str = "/api/public/patients/:token";
    pub const CASES: &str = "/api/public/patients/:token/cases";
    pub const IMAGES: &str = "/api/public/patients/:token/images";
    pub const RESERVATIONS: &str = "/api/public/patients/:token/reservations";
}

pub mod clinical {
    pub const CASES: &str = "/api/cases";
    pub const CASE_BY_ID: &str = "/api/cases/:id";
    pub const CASE_CATEGORIES: &str = "/api/case-categories";
    pub const CASE_CATEGORY_BY_ID: &str = "/api/case-categories/:id";
    pub const RESERVATIONS: &str = "/api/reservations";
    pub const RESERVATION_BY_ID: &str = "/api/reservations/:id";
    pub const RECIPES: &str = "/api/recipes";
    pub const RECIPE_BY_ID: &str = "/api/recipes/:id";
    pub const NOTES: &str = "/api/notes";
    pub const NOTE_BY_ID: &str = "/api/notes/:id";
    /// `/notes/{noteable_type}/{noteable_id}`; the first segment shares the
    /// `:id` name with [`NOTE_BY_ID`] because sibling parameters must match
    pub const NOTES_FOR: &str = "/api/notes/:id/:noteable_id";
    pub const IMAGES: &str = "/api/images";
    pub const IMAGES_BY_IMAGEABLE: &str = "/api/images/by-imageable";
    pub const IMAGE_STATISTICS: &str = "/api/images/statistics";
    pub const IMAGE_BY_ID: &str = "/api/images/:id";
    pub const IMAGE_ORDER: &str = "/api/images/:id/order";
}

pub mod billing {
    pub const BILLS: &str = "/api/bills";
    pub const BILL_BY_ID: &str = "/api/bills/:id";
    pub const MARK_PAID: &str = "/api/bills/:id/mark-paid";
    pub const MARK_UNPAID: &str = "/api/bills/:id/mark-unpaid";
    pub const PATIENT_BILLS: &str = "/api/bills/patient/:patient_id";
    pub const STATISTICS: &str = "/api/bills/statistics/summary";
}

pub mod expenses {
    pub const CATEGORIES: &str = "/api/clinic-expense-categories";
    pub const CATEGORIES_ACTIVE: &str = "/api/clinic-expense-categories-active";
    pub const CATEGORY_BY_ID: &str = "/api/clinic-expense-categories/:id";
    pub const EXPENSES: &str = "/api/clinic-expenses";
    pub const EXPENSE_BY_ID: &str = "/api/clinic-expenses/:id";
    pub const MARK_PAID: &str = "/api/clinic-expenses/:id/mark-paid";
    pub const MARK_UNPAID: &str = "/api/clinic-expenses/:id/mark-unpaid";
    pub const STATISTICS: &str = "/api/clinic-expenses-statistics";
    pub const UNPAID: &str = "/api/clinic-expenses-unpaid";
    pub const BY_DATE_RANGE: &str = "/api/clinic-expenses-by-date-range";
}

pub mod staff {
    pub const DOCTORS: &str = "/api/doctors";
    pub const DOCTORS_ACTIVE: &str = "/api/doctors-active";
    pub const DOCTOR_BY_ID: &str = "/api/doctors/:id";
    pub const DOCTOR_BY_EMAIL: &str = "/api/doctors/search/email/:email";
    pub const DOCTOR_BY_PHONE: &str = "/api/doctors/search/phone/:phone";
    pub const SECRETARIES: &str = "/api/secretaries";
    pub const SECRETARY_PERMISSIONS_AVAILABLE: &str = "/api/secretaries/available-permissions";
    pub const SECRETARY_BY_ID: &str = "/api/secretaries/:id";
    pub const SECRETARY_PERMISSIONS: &str = "/api/secretaries/:id/permissions";
    pub const SECRETARY_TOGGLE_STATUS: &str = "/api/secretaries/:id/toggle-status";
}

pub mod settings {
    pub const DEFINITIONS: &str = "/api/setting-definitions";
    pub const DEFINITION_CATEGORIES: &str = "/api/setting-definitions/categories";
    pub const DEFINITION_TYPES: &str = "/api/setting-definitions/types";
    pub const DEFINITIONS_SYNC_ALL: &str = "/api/setting-definitions/sync-all";
    pub const DEFINITION_BY_ID: &str = "/api/setting-definitions/:id";
    pub const CLINIC_SETTINGS: &str = "/api/clinic-settings";
    pub const CLINIC_SETTINGS_BULK: &str = "/api/clinic-settings/bulk-update";
    pub const CLINIC_SETTING_BY_KEY: &str = "/api/clinic-settings/:key";
}

pub mod notifications {
    pub const NOTIFICATIONS: &str = "/api/notifications";
    pub const UNREAD_COUNT: &str = "/api/notifications/unread-count";
    pub const STATISTICS: &str = "/api/notifications/statistics";
    pub const BROADCAST: &str = "/api/notifications/broadcast";
    pub const MARK_MULTIPLE_READ: &str = "/api/notifications/mark-multiple-read";
    pub const MARK_ALL_READ: &str = "/api/notifications/mark-all-read";
    pub const PLAYER_ID: &str = "/api/notifications/player-id";
    pub const TEST: &str = "/api/notifications/test";
    pub const NOTIFICATION_BY_ID: &str = "/api/notifications/:id";
    pub const MARK_READ: &str = "/api/notifications/:id/read";
}

pub mod reports {
    pub const DASHBOARD_OVERVIEW: &str = "/api/reports/dashboard/overview";
    pub const DASHBOARD_TODAY: &str = "/api/reports/dashboard/today";
    pub const PATIENTS_SUMMARY: &str = "/api/reports/patients/summary";
    pub const PATIENTS_BY_SOURCE: &str = "/api/reports/patients/by-source";
    pub const PATIENTS_BY_DOCTOR: &str = "/api/reports/patients/by-doctor";
    pub const PATIENTS_TREND: &str = "/api/reports/patients/trend";
    pub const PATIENTS_AGE: &str = "/api/reports/patients/age-distribution";
    pub const CASES_SUMMARY: &str = "/api/reports/cases/summary";
    pub const CASES_BY_CATEGORY: &str = "/api/reports/cases/by-category";
    pub const CASES_BY_STATUS: &str = "/api/reports/cases/by-status";
    pub const CASES_BY_DOCTOR: &str = "/api/reports/cases/by-doctor";
    pub const CASES_TREND: &str = "/api/reports/cases/trend";
    pub const RESERVATIONS_SUMMARY: &str = "/api/reports/reservations/summary";
    pub const RESERVATIONS_BY_STATUS: &str = "/api/reports/reservations/by-status";
    pub const RESERVATIONS_BY_DOCTOR: &str = "/api/reports/reservations/by-doctor";
    pub const RESERVATIONS_TREND: &str = "/api/reports/reservations/trend";
    pub const BILLS_SUMMARY: &str = "/api/reports/financial/bills/summary";
    pub const BILLS_BY_PAYMENT_STATUS: &str = "/api/reports/financial/bills/by-payment-status";
    pub const REVENUE_BY_DOCTOR: &str = "/api/reports/financial/revenue/by-doctor";
    pub const REVENUE_TREND: &str = "/api/reports/financial/revenue/trend";
    pub const EXPENSES_SUMMARY: &str = "/api/reports/financial/expenses/summary";
    pub const EXPENSES_BY_CATEGORY: &str = "/api/reports/financial/expenses/by-category";
    pub const EXPENSES_TREND: &str = "/api/reports/financial/expenses/trend";
    pub const PROFIT_LOSS: &str = "/api/reports/financial/profit-loss";
    pub const PROFIT_LOSS_TREND: &str = "/api/reports/financial/profit-loss/trend";
    pub const DOCTOR_PERFORMANCE: &str = "/api/reports/financial/doctor-performance";
    pub const LEGACY_BILLS: &str = "/api/reports/bills";
}
