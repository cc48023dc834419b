//! Report endpoints. Every report is read-only, requires `view-reports`
//! and is limited to the caller's own rows when the caller is a plain
//! doctor.

use axum::Json;
use chrono::{NaiveDate, Utc};
use reporting_engine::{
    AgeGroupCount, BillStatistics, BillsSummary, CasesByCategory, CasesByDoctor, CasesSummary, CountByDoctor,
    CountByStatus, DashboardOverview, DoctorPerformance, ExpensesByCategory, ExpensesSummary, PatientsBySource,
    PatientsSummary, PaymentStatusShare, Period, PeriodCount, PeriodTotal, ProfitLoss, ProfitLossPoint,
    ReportFilter, ReportsRepository, ReservationsSummary, RevenueByDoctor, TodaySummary,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::handlers::bills::statistics_scope;
use crate::middleware::{AuthContext, TenantDb};
use crate::types::de::{optional_date, optional_number};
use crate::types::Query;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReportParams {
    /// Inclusive start date (YYYY-MM-DD)
    #[serde(default, deserialize_with = "optional_date")]
    pub date_from: Option<NaiveDate>,
    /// Inclusive end date (YYYY-MM-DD); must not precede `date_from`
    #[serde(default, deserialize_with = "optional_date")]
    pub date_to: Option<NaiveDate>,
    /// day, week, month or year; anything else means month
    pub period: Option<String>,
    /// Doctor performance and the bill report only
    #[serde(default, deserialize_with = "optional_number")]
    pub doctor_id: Option<i64>,
}

/// Echo of the parameters a report was computed with
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AppliedFilters {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
    pub filters: AppliedFilters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<&'static str>,
}

type ReportJson<T> = Result<Json<ReportResponse<T>>, ApiError>;

// ============================================================================
// HELPERS
// ============================================================================

/// Validate parameters and apply the caller's doctor scope
fn report_filter(auth: &AuthContext, params: &ReportParams) -> Result<ReportFilter, ApiError> {
    auth.require_permission("view-reports")?;
    Ok(ReportFilter::new(params.date_from, params.date_to)?
        .with_period(Period::parse_or_default(params.period.as_deref()))
        .with_scope(auth.doctor_scope()))
}

fn repository(db: &TenantDb) -> ReportsRepository {
    ReportsRepository::new(db.pool().clone())
}

struct Report<'a> {
    filter: &'a ReportFilter,
    message: &'static str,
    chart_type: Option<&'static str>,
    with_period: bool,
}

impl<'a> Report<'a> {
    fn new(filter: &'a ReportFilter, message: &'static str) -> Self {
        Self {
            filter,
            message,
            chart_type: None,
            with_period: false,
        }
    }

    fn chart(mut self, chart_type: &'static str) -> Self {
        self.chart_type = Some(chart_type);
        self
    }

    /// Trend reports also echo the grouping period
    fn trend(mut self, chart_type: &'static str) -> Self {
        self.with_period = true;
        self.chart(chart_type)
    }

    fn respond<T>(self, data: T) -> ReportJson<T> {
        Ok(Json(ReportResponse {
            success: true,
            message: self.message.to_string(),
            data,
            filters: AppliedFilters {
                date_from: self.filter.date_from,
                date_to: self.filter.date_to,
                period: self.with_period.then_some(self.filter.period),
            },
            chart_type: self.chart_type,
        }))
    }
}

// ============================================================================
// DASHBOARD
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/reports/dashboard/overview",
    params(ReportParams),
    responses(
        (status = 200, description = "Dashboard overview retrieved successfully", body = DashboardOverview),
        (status = 422, description = "date_to precedes date_from")
    ),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn dashboard_overview(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<DashboardOverview> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).dashboard_overview(&filter).await?;
    Report::new(&filter, "Dashboard overview retrieved successfully").respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/dashboard/today",
    responses((status = 200, description = "Today's summary retrieved successfully", body = TodaySummary)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn dashboard_today(db: TenantDb, auth: AuthContext) -> ReportJson<TodaySummary> {
    auth.require_permission("view-reports")?;
    let today = Utc::now().date_naive();
    let filter = ReportFilter::day(today).with_scope(auth.doctor_scope());
    let data = repository(&db).today_summary(today, &filter).await?;
    Report::new(&filter, "Today's summary retrieved successfully").respond(data)
}

// ============================================================================
// PATIENTS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/reports/patients/summary",
    params(ReportParams),
    responses((status = 200, description = "Patient summary retrieved successfully", body = PatientsSummary)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn patients_summary(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<PatientsSummary> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).patients_summary(&filter).await?;
    Report::new(&filter, "Patient summary retrieved successfully").respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/patients/by-source",
    params(ReportParams),
    responses((status = 200, description = "Patients by source retrieved successfully", body = Vec<PatientsBySource>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn patients_by_source(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<PatientsBySource>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).patients_by_source(&filter).await?;
    Report::new(&filter, "Patients by source retrieved successfully")
        .chart("pie")
        .respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/patients/by-doctor",
    params(ReportParams),
    responses((status = 200, description = "Patients by doctor retrieved successfully", body = Vec<CountByDoctor>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn patients_by_doctor(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<CountByDoctor>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).patients_by_doctor(&filter).await?;
    Report::new(&filter, "Patients by doctor retrieved successfully")
        .chart("bar")
        .respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/patients/trend",
    params(ReportParams),
    responses((status = 200, description = "Patient trend retrieved successfully", body = Vec<PeriodCount>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn patients_trend(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<PeriodCount>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).patients_trend(&filter).await?;
    Report::new(&filter, "Patient trend retrieved successfully")
        .trend("line")
        .respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/patients/age-distribution",
    params(ReportParams),
    responses((status = 200, description = "Patient age distribution retrieved successfully", body = Vec<AgeGroupCount>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn patients_age_distribution(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<AgeGroupCount>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).patients_age_distribution(&filter).await?;
    Report::new(&filter, "Patient age distribution retrieved successfully")
        .chart("bar")
        .respond(data)
}

// ============================================================================
// CASES
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/reports/cases/summary",
    params(ReportParams),
    responses((status = 200, description = "Cases summary retrieved successfully", body = CasesSummary)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn cases_summary(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<CasesSummary> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).cases_summary(&filter).await?;
    Report::new(&filter, "Cases summary retrieved successfully").respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/cases/by-category",
    params(ReportParams),
    responses((status = 200, description = "Cases by category retrieved successfully", body = Vec<CasesByCategory>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn cases_by_category(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<CasesByCategory>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).cases_by_category(&filter).await?;
    Report::new(&filter, "Cases by category retrieved successfully")
        .chart("pie")
        .respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/cases/by-status",
    params(ReportParams),
    responses((status = 200, description = "Cases by status retrieved successfully", body = Vec<CountByStatus>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn cases_by_status(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<CountByStatus>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).cases_by_status(&filter).await?;
    Report::new(&filter, "Cases by status retrieved successfully")
        .chart("donut")
        .respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/cases/by-doctor",
    params(ReportParams),
    responses((status = 200, description = "Cases by doctor retrieved successfully", body = Vec<CasesByDoctor>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn cases_by_doctor(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<CasesByDoctor>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).cases_by_doctor(&filter).await?;
    Report::new(&filter, "Cases by doctor retrieved successfully")
        .chart("bar")
        .respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/cases/trend",
    params(ReportParams),
    responses((status = 200, description = "Cases trend retrieved successfully", body = Vec<PeriodCount>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn cases_trend(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<PeriodCount>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).cases_trend(&filter).await?;
    Report::new(&filter, "Cases trend retrieved successfully")
        .trend("line")
        .respond(data)
}

// ============================================================================
// RESERVATIONS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/reports/reservations/summary",
    params(ReportParams),
    responses((status = 200, description = "Reservations summary retrieved successfully", body = ReservationsSummary)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn reservations_summary(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<ReservationsSummary> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).reservations_summary(&filter).await?;
    Report::new(&filter, "Reservations summary retrieved successfully").respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/reservations/by-status",
    params(ReportParams),
    responses((status = 200, description = "Reservations by status retrieved successfully", body = Vec<CountByStatus>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn reservations_by_status(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<CountByStatus>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).reservations_by_status(&filter).await?;
    Report::new(&filter, "Reservations by status retrieved successfully")
        .chart("donut")
        .respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/reservations/by-doctor",
    params(ReportParams),
    responses((status = 200, description = "Reservations by doctor retrieved successfully", body = Vec<CountByDoctor>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn reservations_by_doctor(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<CountByDoctor>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).reservations_by_doctor(&filter).await?;
    Report::new(&filter, "Reservations by doctor retrieved successfully")
        .chart("bar")
        .respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/reservations/trend",
    params(ReportParams),
    responses((status = 200, description = "Reservations trend retrieved successfully", body = Vec<PeriodCount>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn reservations_trend(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<PeriodCount>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).reservations_trend(&filter).await?;
    Report::new(&filter, "Reservations trend retrieved successfully")
        .trend("line")
        .respond(data)
}

// ============================================================================
// FINANCIAL
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/reports/financial/bills/summary",
    params(ReportParams),
    responses((status = 200, description = "Bills summary retrieved successfully", body = BillsSummary)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn bills_summary(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<BillsSummary> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).bills_summary(&filter).await?;
    Report::new(&filter, "Bills summary retrieved successfully").respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/financial/revenue/by-doctor",
    params(ReportParams),
    responses((status = 200, description = "Revenue by doctor retrieved successfully", body = Vec<RevenueByDoctor>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn revenue_by_doctor(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<RevenueByDoctor>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).revenue_by_doctor(&filter).await?;
    Report::new(&filter, "Revenue by doctor retrieved successfully")
        .chart("bar")
        .respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/financial/revenue/trend",
    params(ReportParams),
    responses((status = 200, description = "Revenue trend retrieved successfully", body = Vec<PeriodTotal>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn revenue_trend(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<PeriodTotal>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).revenue_trend(&filter).await?;
    Report::new(&filter, "Revenue trend retrieved successfully")
        .trend("area")
        .respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/financial/bills/by-payment-status",
    params(ReportParams),
    responses((status = 200, description = "Bills by payment status retrieved successfully", body = Vec<PaymentStatusShare>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn bills_by_payment_status(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<PaymentStatusShare>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).bills_by_payment_status(&filter).await?;
    Report::new(&filter, "Bills by payment status retrieved successfully")
        .chart("pie")
        .respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/financial/expenses/summary",
    params(ReportParams),
    responses((status = 200, description = "Expenses summary retrieved successfully", body = ExpensesSummary)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn expenses_summary(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<ExpensesSummary> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).expenses_summary(&filter).await?;
    Report::new(&filter, "Expenses summary retrieved successfully").respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/financial/expenses/by-category",
    params(ReportParams),
    responses((status = 200, description = "Expenses by category retrieved successfully", body = Vec<ExpensesByCategory>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn expenses_by_category(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<ExpensesByCategory>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).expenses_by_category(&filter).await?;
    Report::new(&filter, "Expenses by category retrieved successfully")
        .chart("pie")
        .respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/financial/expenses/trend",
    params(ReportParams),
    responses((status = 200, description = "Expenses trend retrieved successfully", body = Vec<PeriodTotal>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn expenses_trend(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<PeriodTotal>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).expenses_trend(&filter).await?;
    Report::new(&filter, "Expenses trend retrieved successfully")
        .trend("area")
        .respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/financial/profit-loss",
    params(ReportParams),
    responses((status = 200, description = "Profit/Loss report retrieved successfully", body = ProfitLoss)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn profit_loss(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<ProfitLoss> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).profit_loss(&filter).await?;
    Report::new(&filter, "Profit/Loss report retrieved successfully").respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/financial/profit-loss/trend",
    params(ReportParams),
    responses((status = 200, description = "Profit/Loss trend retrieved successfully", body = Vec<ProfitLossPoint>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn profit_loss_trend(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<ProfitLossPoint>> {
    let filter = report_filter(&auth, &params)?;
    let data = repository(&db).profit_loss_trend(&filter).await?;
    Report::new(&filter, "Profit/Loss trend retrieved successfully")
        .trend("combo")
        .respond(data)
}

#[utoipa::path(
    get,
    path = "/api/reports/financial/doctor-performance",
    params(ReportParams),
    responses((status = 200, description = "Doctor performance retrieved successfully", body = Vec<DoctorPerformance>)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn doctor_performance(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<Vec<DoctorPerformance>> {
    let filter = report_filter(&auth, &params)?.with_doctor(params.doctor_id);
    let data = repository(&db).doctor_performance(&filter).await?;
    Report::new(&filter, "Doctor performance retrieved successfully")
        .chart("table")
        .respond(data)
}

/// Older bill report kept for existing clients; an explicit `doctor_id`
/// narrows the result for callers that are not scoped already
#[utoipa::path(
    get,
    path = "/api/reports/bills",
    params(ReportParams),
    responses((status = 200, description = "Bill report retrieved successfully", body = BillStatistics)),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn legacy_bill_report(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ReportParams>,
) -> ReportJson<BillStatistics> {
    let filter = report_filter(&auth, &params)?.with_scope(statistics_scope(&auth, params.doctor_id));
    let data = repository(&db).bill_statistics(&filter).await?;
    Report::new(&filter, "Bill report retrieved successfully").respond(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use reporting_engine::DoctorScope;

    fn auth(roles: &[&str], permissions: &[&str]) -> AuthContext {
        AuthContext::with_permissions(
            5,
            Some("_clinic"),
            roles.iter().map(|r| r.to_string()).collect(),
            permissions.iter().map(|p| p.to_string()).collect(),
        )
    }

    fn params(from: Option<&str>, to: Option<&str>, period: Option<&str>) -> ReportParams {
        ReportParams {
            date_from: from.and_then(|d| d.parse().ok()),
            date_to: to.and_then(|d| d.parse().ok()),
            period: period.map(str::to_string),
            doctor_id: None,
        }
    }

    #[test]
    fn test_reports_require_permission() {
        let err = report_filter(&auth(&["secretary"], &[]), &params(None, None, None)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        let err = report_filter(
            &auth(&["clinic_super_doctor"], &["view-reports"]),
            &params(Some("2024-03-10"), Some("2024-03-01"), None),
        )
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_filter_carries_period_and_scope() {
        let filter = report_filter(
            &auth(&["doctor"], &["view-reports"]),
            &params(Some("2024-01-01"), Some("2024-01-31"), Some("week")),
        )
        .unwrap();
        assert_eq!(filter.period, Period::Week);
        assert_eq!(filter.scope, DoctorScope::Doctor(5));

        let filter = report_filter(
            &auth(&["clinic_super_doctor"], &["view-reports"]),
            &params(None, None, Some("fortnight")),
        )
        .unwrap();
        assert_eq!(filter.period, Period::Month);
        assert_eq!(filter.scope, DoctorScope::All);
    }

    #[test]
    fn test_trend_response_echoes_period() {
        let filter = ReportFilter::new(None, None).unwrap().with_period(Period::Year);
        let Json(response) = Report::new(&filter, "Cases trend retrieved successfully")
            .trend("line")
            .respond(Vec::<PeriodCount>::new())
            .unwrap();
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["filters"]["period"], "year");
        assert_eq!(body["chart_type"], "line");
        assert!(body["filters"]["date_from"].is_null());

        let Json(response) = Report::new(&filter, "Cases summary retrieved successfully")
            .respond(CasesSummary::default())
            .unwrap();
        let body = serde_json::to_value(&response).unwrap();
        assert!(body["filters"].get("period").is_none());
        assert!(body.get("chart_type").is_none());
    }
}
