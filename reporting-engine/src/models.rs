//! Report result shapes

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct PatientsSummary {
    pub total: i64,
    pub male: i64,
    pub female: i64,
    #[schema(value_type = f64)]
    pub male_percentage: Decimal,
    #[schema(value_type = f64)]
    pub female_percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct PatientsBySource {
    pub source_id: Option<i64>,
    pub source_name: String,
    pub source_name_ar: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct CountByDoctor {
    pub doctor_id: i64,
    pub doctor_name: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct PeriodCount {
    pub period: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct PeriodTotal {
    pub period: String,
    #[schema(value_type = f64)]
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct AgeGroupCount {
    pub age_group: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow, ToSchema)]
pub struct BillsSummary {
    pub total_bills: i64,
    pub paid_bills: i64,
    pub unpaid_bills: i64,
    pub total_revenue: i64,
    pub total_outstanding: i64,
    #[sqlx(skip)]
    #[schema(value_type = f64)]
    pub collection_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct RevenueByDoctor {
    pub doctor_id: i64,
    pub doctor_name: String,
    pub total_revenue: i64,
    pub bills_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PaymentStatusShare {
    /// `paid` or `unpaid`
    pub status: String,
    pub count: i64,
    #[schema(value_type = f64)]
    pub percentage: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ReservationsSummary {
    pub total: i64,
    pub waiting: i64,
    pub confirmed: i64,
    #[schema(value_type = f64)]
    pub waiting_percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct CountByStatus {
    pub status_id: i64,
    pub status_name: String,
    pub status_name_ar: String,
    pub color: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct CasesSummary {
    pub total: i64,
    pub paid: i64,
    pub unpaid: i64,
    pub total_value: i64,
    #[schema(value_type = f64)]
    pub paid_percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct CasesByCategory {
    pub category_id: i64,
    pub category_name: String,
    pub count: i64,
    pub total_value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct CasesByDoctor {
    pub doctor_id: i64,
    pub doctor_name: String,
    pub count: i64,
    pub total_value: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow, ToSchema)]
pub struct ExpensesSummary {
    pub total_expenses: i64,
    pub paid_expenses: i64,
    pub unpaid_expenses: i64,
    #[schema(value_type = f64)]
    pub total_amount: Decimal,
    #[schema(value_type = f64)]
    pub paid_amount: Decimal,
    #[schema(value_type = f64)]
    pub unpaid_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct ExpensesByCategory {
    pub category_id: i64,
    pub category_name: String,
    pub count: i64,
    #[schema(value_type = f64)]
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProfitLoss {
    pub total_revenue: i64,
    #[schema(value_type = f64)]
    pub total_expenses: Decimal,
    #[schema(value_type = f64)]
    pub profit_loss: Decimal,
    #[schema(value_type = f64)]
    pub profit_margin: Decimal,
    pub is_profit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProfitLossPoint {
    pub period: String,
    #[schema(value_type = f64)]
    pub revenue: Decimal,
    #[schema(value_type = f64)]
    pub expenses: Decimal,
    #[schema(value_type = f64)]
    pub profit_loss: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct DoctorPerformance {
    pub doctor_id: i64,
    pub doctor_name: String,
    pub doctor_email: Option<String>,
    pub total_patients: i64,
    pub total_cases: i64,
    pub total_reservations: i64,
    pub total_revenue: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct DashboardOverview {
    pub patients: PatientsSummary,
    pub bills: BillsSummary,
    pub reservations: ReservationsSummary,
    pub cases: CasesSummary,
    pub expenses: ExpensesSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct TodaySummary {
    pub new_patients: i64,
    pub reservations_today: i64,
    pub revenue_today: i64,
    pub cases_today: i64,
    #[schema(value_type = f64)]
    pub expenses_today: Decimal,
}

/// Bill, case and expense totals over one filter, as shown on the billing screen
#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow, ToSchema)]
pub struct BillStatistics {
    pub total_bills: i64,
    pub paid_bills: i64,
    pub unpaid_bills: i64,
    pub total_paid_price: i64,
    pub total_unpaid_price: i64,
    /// Sum of case prices created in the range
    pub total_case_price: i64,
    pub paid_case_price: i64,
    pub unpaid_case_price: i64,
    #[schema(value_type = f64)]
    pub total_expenses: Decimal,
    #[schema(value_type = f64)]
    pub total_paid_expenses: Decimal,
    #[schema(value_type = f64)]
    pub total_unpaid_expenses: Decimal,
}
