//! Executes report queries against one tenant database

use crate::error::ReportResult;
use crate::filter::{ReportFilter, CASES, PATIENTS, RESERVATIONS};
use crate::models::*;
use crate::queries;
use crate::stats::{decimal_percentage, merge_profit_loss_trend, percentage, round2, sort_age_groups};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::debug;

/// All report aggregates for a tenant
#[derive(Clone)]
pub struct ReportsRepository {
    pool: PgPool,
}

impl ReportsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ============================================================================
    // DASHBOARD
    // ============================================================================

    pub async fn dashboard_overview(&self, filter: &ReportFilter) -> ReportResult<DashboardOverview> {
        Ok(DashboardOverview {
            patients: self.patients_summary(filter).await?,
            bills: self.bills_summary(filter).await?,
            reservations: self.reservations_summary(filter).await?,
            cases: self.cases_summary(filter).await?,
            expenses: self.expenses_summary(filter).await?,
        })
    }

    /// Figures for a single day; `reservations_today` counts reservations
    /// whose span covers the day rather than those starting on it
    pub async fn today_summary(&self, today: NaiveDate, filter: &ReportFilter) -> ReportResult<TodaySummary> {
        let day = ReportFilter::day(today).with_scope(filter.scope);

        let reservations_today: i64 = queries::reservations_covering(today, &day)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok(TodaySummary {
            new_patients: self.count_patients(&day).await?,
            reservations_today,
            revenue_today: self.revenue_total(&day).await?,
            cases_today: self.count_cases(&day).await?,
            expenses_today: self.expenses_total(&day).await?,
        })
    }

    // ============================================================================
    // PATIENTS
    // ============================================================================

    pub async fn patients_summary(&self, filter: &ReportFilter) -> ReportResult<PatientsSummary> {
        let (total, male, female): (i64, i64, i64) = queries::patients_summary(filter)
            .build_query_as()
            .fetch_one(&self.pool)
            .await?;

        Ok(PatientsSummary {
            total,
            male,
            female,
            male_percentage: percentage(male, total),
            female_percentage: percentage(female, total),
        })
    }

    pub async fn count_patients(&self, filter: &ReportFilter) -> ReportResult<i64> {
        let count = queries::count(&PATIENTS, filter)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn patients_by_source(&self, filter: &ReportFilter) -> ReportResult<Vec<PatientsBySource>> {
        let rows = queries::patients_by_source(filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn patients_by_doctor(&self, filter: &ReportFilter) -> ReportResult<Vec<CountByDoctor>> {
        let rows = queries::count_by_doctor(&PATIENTS, filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn patients_trend(&self, filter: &ReportFilter) -> ReportResult<Vec<PeriodCount>> {
        let rows = queries::trend_count(&PATIENTS, filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn patients_age_distribution(&self, filter: &ReportFilter) -> ReportResult<Vec<AgeGroupCount>> {
        let mut rows: Vec<AgeGroupCount> = queries::patients_age_distribution(filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        sort_age_groups(&mut rows);
        Ok(rows)
    }

    // ============================================================================
    // BILLS AND REVENUE
    // ============================================================================

    pub async fn bills_summary(&self, filter: &ReportFilter) -> ReportResult<BillsSummary> {
        let mut summary: BillsSummary = queries::bills_summary(filter)
            .build_query_as()
            .fetch_one(&self.pool)
            .await?;
        summary.collection_rate = percentage(summary.paid_bills, summary.total_bills);
        Ok(summary)
    }

    /// Sum of paid bills
    pub async fn revenue_total(&self, filter: &ReportFilter) -> ReportResult<i64> {
        let total = queries::revenue_total(filter)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    pub async fn revenue_trend(&self, filter: &ReportFilter) -> ReportResult<Vec<PeriodTotal>> {
        let rows: Vec<PeriodTotal> = queries::revenue_trend(filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rounded(rows))
    }

    pub async fn revenue_by_doctor(&self, filter: &ReportFilter) -> ReportResult<Vec<RevenueByDoctor>> {
        let rows = queries::revenue_by_doctor(filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn bills_by_payment_status(&self, filter: &ReportFilter) -> ReportResult<Vec<PaymentStatusShare>> {
        let summary = self.bills_summary(filter).await?;
        let total = summary.paid_bills + summary.unpaid_bills;
        Ok(vec![
            PaymentStatusShare {
                status: "paid".to_string(),
                count: summary.paid_bills,
                percentage: percentage(summary.paid_bills, total),
            },
            PaymentStatusShare {
                status: "unpaid".to_string(),
                count: summary.unpaid_bills,
                percentage: percentage(summary.unpaid_bills, total),
            },
        ])
    }

    /// Bills, case prices and expenses over the same range
    pub async fn bill_statistics(&self, filter: &ReportFilter) -> ReportResult<BillStatistics> {
        let bills = self.bills_summary(filter).await?;
        let (total_case_price, paid_case_price): (i64, i64) = queries::case_price_totals(filter)
            .build_query_as()
            .fetch_one(&self.pool)
            .await?;
        let expenses = self.expenses_summary(filter).await?;

        Ok(BillStatistics {
            total_bills: bills.total_bills,
            paid_bills: bills.paid_bills,
            unpaid_bills: bills.unpaid_bills,
            total_paid_price: bills.total_revenue,
            total_unpaid_price: bills.total_outstanding,
            total_case_price,
            paid_case_price,
            unpaid_case_price: total_case_price - paid_case_price,
            total_expenses: expenses.total_amount,
            total_paid_expenses: expenses.paid_amount,
            total_unpaid_expenses: expenses.unpaid_amount,
        })
    }

    // ============================================================================
    // RESERVATIONS
    // ============================================================================

    pub async fn reservations_summary(&self, filter: &ReportFilter) -> ReportResult<ReservationsSummary> {
        let (total, waiting, confirmed): (i64, i64, i64) = queries::reservations_summary(filter)
            .build_query_as()
            .fetch_one(&self.pool)
            .await?;

        Ok(ReservationsSummary {
            total,
            waiting,
            confirmed,
            waiting_percentage: percentage(waiting, total),
        })
    }

    pub async fn reservations_by_status(&self, filter: &ReportFilter) -> ReportResult<Vec<CountByStatus>> {
        let rows = queries::count_by_status(&RESERVATIONS, filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn reservations_by_doctor(&self, filter: &ReportFilter) -> ReportResult<Vec<CountByDoctor>> {
        let rows = queries::count_by_doctor(&RESERVATIONS, filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn reservations_trend(&self, filter: &ReportFilter) -> ReportResult<Vec<PeriodCount>> {
        let rows = queries::trend_count(&RESERVATIONS, filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // ============================================================================
    // CASES
    // ============================================================================

    pub async fn cases_summary(&self, filter: &ReportFilter) -> ReportResult<CasesSummary> {
        let (total, paid, unpaid, total_value): (i64, i64, i64, i64) = queries::cases_summary(filter)
            .build_query_as()
            .fetch_one(&self.pool)
            .await?;

        Ok(CasesSummary {
            total,
            paid,
            unpaid,
            total_value,
            paid_percentage: percentage(paid, total),
        })
    }

    pub async fn count_cases(&self, filter: &ReportFilter) -> ReportResult<i64> {
        let count = queries::count(&CASES, filter)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn cases_by_category(&self, filter: &ReportFilter) -> ReportResult<Vec<CasesByCategory>> {
        let rows = queries::cases_by_category(filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn cases_by_status(&self, filter: &ReportFilter) -> ReportResult<Vec<CountByStatus>> {
        let rows = queries::count_by_status(&CASES, filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn cases_by_doctor(&self, filter: &ReportFilter) -> ReportResult<Vec<CasesByDoctor>> {
        let rows = queries::cases_by_doctor(filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn cases_trend(&self, filter: &ReportFilter) -> ReportResult<Vec<PeriodCount>> {
        let rows = queries::trend_count(&CASES, filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // ============================================================================
    // EXPENSES
    // ============================================================================

    pub async fn expenses_summary(&self, filter: &ReportFilter) -> ReportResult<ExpensesSummary> {
        let mut summary: ExpensesSummary = queries::expenses_summary(filter)
            .build_query_as()
            .fetch_one(&self.pool)
            .await?;
        summary.total_amount = round2(summary.total_amount);
        summary.paid_amount = round2(summary.paid_amount);
        summary.unpaid_amount = round2(summary.unpaid_amount);
        Ok(summary)
    }

    pub async fn expenses_total(&self, filter: &ReportFilter) -> ReportResult<Decimal> {
        let total: Decimal = queries::expenses_total(filter)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(round2(total))
    }

    pub async fn expenses_by_category(&self, filter: &ReportFilter) -> ReportResult<Vec<ExpensesByCategory>> {
        let rows: Vec<ExpensesByCategory> = queries::expenses_by_category(filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|mut row| {
                row.total_amount = round2(row.total_amount);
                row
            })
            .collect())
    }

    pub async fn expenses_trend(&self, filter: &ReportFilter) -> ReportResult<Vec<PeriodTotal>> {
        let rows: Vec<PeriodTotal> = queries::expenses_trend(filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rounded(rows))
    }

    // ============================================================================
    // PROFIT AND LOSS
    // ============================================================================

    pub async fn profit_loss(&self, filter: &ReportFilter) -> ReportResult<ProfitLoss> {
        let revenue = self.revenue_total(filter).await?;
        let expenses = self.expenses_total(filter).await?;
        Ok(profit_loss_of(revenue, expenses))
    }

    pub async fn profit_loss_trend(&self, filter: &ReportFilter) -> ReportResult<Vec<ProfitLossPoint>> {
        let revenue = self.revenue_trend(filter).await?;
        let expenses = self.expenses_trend(filter).await?;
        debug!(
            revenue_periods = revenue.len(),
            expense_periods = expenses.len(),
            "Merging profit/loss trend"
        );
        Ok(merge_profit_loss_trend(&revenue, &expenses))
    }

    pub async fn doctor_performance(&self, filter: &ReportFilter) -> ReportResult<Vec<DoctorPerformance>> {
        let rows = queries::doctor_performance(filter)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

fn rounded(rows: Vec<PeriodTotal>) -> Vec<PeriodTotal> {
    rows.into_iter()
        .map(|mut row| {
            row.total = round2(row.total);
            row
        })
        .collect()
}

/// Profit, margin and sign from revenue and expense totals
pub fn profit_loss_of(revenue: i64, expenses: Decimal) -> ProfitLoss {
    let revenue_dec = Decimal::from(revenue);
    let profit_loss = round2(revenue_dec - expenses);
    ProfitLoss {
        total_revenue: revenue,
        total_expenses: expenses,
        profit_loss,
        profit_margin: decimal_percentage(profit_loss, revenue_dec),
        is_profit: profit_loss >= Decimal::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_profit_loss_margin() {
        let report = profit_loss_of(10_000, Decimal::from_str("2500.50").unwrap());
        assert_eq!(report.profit_loss, Decimal::from_str("7499.50").unwrap());
        assert_eq!(report.profit_margin, Decimal::from_str("75.00").unwrap());
        assert!(report.is_profit);
    }

    #[test]
    fn test_loss_without_revenue_has_zero_margin() {
        let report = profit_loss_of(0, Decimal::from(300));
        assert_eq!(report.profit_loss, Decimal::from(-300));
        assert_eq!(report.profit_margin, Decimal::ZERO);
        assert!(!report.is_profit);
    }

    #[test]
    fn test_break_even_counts_as_profit() {
        assert!(profit_loss_of(500, Decimal::from(500)).is_profit);
    }
}
