//! Report parameters: inclusive date range, grouping period and doctor scope.

use crate::error::{ReportError, ReportResult};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use utoipa::ToSchema;

/// Time bucket for trend reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl Period {
    /// Parse a query value; missing or unknown values fall back to month
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("day") => Period::Day,
            Some("week") => Period::Week,
            Some("year") => Period::Year,
            _ => Period::Month,
        }
    }

    /// `to_char` pattern producing the period key. Weeks are ISO weeks.
    pub fn sql_format(self) -> &'static str {
        match self {
            Period::Day => "YYYY-MM-DD",
            Period::Week => "IYYY-IW",
            Period::Month => "YYYY-MM",
            Period::Year => "YYYY",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }
}

/// Which rows the caller may aggregate over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoctorScope {
    /// Everything in the tenant database
    #[default]
    All,
    /// Only rows whose `doctor_id` is this user
    Doctor(i64),
}

impl DoctorScope {
    pub fn doctor_id(self) -> Option<i64> {
        match self {
            DoctorScope::All => None,
            DoctorScope::Doctor(id) => Some(id),
        }
    }
}

/// Whether a column holds a `DATE` or a `TIMESTAMPTZ`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    Date,
    Timestamp,
}

/// A report source table: its alias-qualified date and doctor columns
#[derive(Debug, Clone, Copy)]
pub(crate) struct Source {
    pub table: &'static str,
    pub alias: &'static str,
    pub date_column: &'static str,
    pub kind: ColumnKind,
    pub doctor_column: &'static str,
}

pub(crate) const PATIENTS: Source = Source {
    table: "patients",
    alias: "p",
    date_column: "p.created_at",
    kind: ColumnKind::Timestamp,
    doctor_column: "p.doctor_id",
};

pub(crate) const CASES: Source = Source {
    table: "cases",
    alias: "c",
    date_column: "c.created_at",
    kind: ColumnKind::Timestamp,
    doctor_column: "c.doctor_id",
};

pub(crate) const BILLS: Source = Source {
    table: "bills",
    alias: "b",
    date_column: "b.created_at",
    kind: ColumnKind::Timestamp,
    doctor_column: "b.doctor_id",
};

pub(crate) const RESERVATIONS: Source = Source {
    table: "reservations",
    alias: "r",
    date_column: "r.reservation_start_date",
    kind: ColumnKind::Date,
    doctor_column: "r.doctor_id",
};

pub(crate) const EXPENSES: Source = Source {
    table: "clinic_expenses",
    alias: "e",
    date_column: "e.date",
    kind: ColumnKind::Date,
    doctor_column: "e.doctor_id",
};

/// Validated report parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub period: Period,
    pub scope: DoctorScope,
    /// Restrict doctor performance to a single doctor
    pub doctor_id: Option<i64>,
}

impl ReportFilter {
    /// Build a filter, rejecting ranges whose end precedes their start
    pub fn new(date_from: Option<NaiveDate>, date_to: Option<NaiveDate>) -> ReportResult<Self> {
        if let (Some(from), Some(to)) = (date_from, date_to) {
            if to < from {
                return Err(ReportError::InvalidDateRange { from, to });
            }
        }
        Ok(Self {
            date_from,
            date_to,
            ..Self::default()
        })
    }

    /// A single calendar day
    pub fn day(date: NaiveDate) -> Self {
        Self {
            date_from: Some(date),
            date_to: Some(date),
            ..Self::default()
        }
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    pub fn with_scope(mut self, scope: DoctorScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_doctor(mut self, doctor_id: Option<i64>) -> Self {
        self.doctor_id = doctor_id;
        self
    }

    /// Inclusive lower bound: `date_from 00:00:00`
    pub fn start_bound(&self) -> Option<NaiveDateTime> {
        self.date_from.map(|d| d.and_time(NaiveTime::MIN))
    }

    /// Inclusive upper bound: `date_to 23:59:59`
    pub fn end_bound(&self) -> Option<NaiveDateTime> {
        self.date_to
            .and_then(|d| d.and_hms_opt(23, 59, 59))
    }

    /// Append ` AND <date column> >= ... AND <= ...` for `source`
    pub(crate) fn push_date_range(&self, qb: &mut QueryBuilder<'static, Postgres>, source: &Source) {
        match source.kind {
            ColumnKind::Date => {
                if let Some(from) = self.date_from {
                    qb.push(format!(" AND {} >= ", source.date_column)).push_bind(from);
                }
                if let Some(to) = self.date_to {
                    qb.push(format!(" AND {} <= ", source.date_column)).push_bind(to);
                }
            }
            ColumnKind::Timestamp => {
                if let Some(from) = self.start_bound() {
                    qb.push(format!(" AND {} >= ", source.date_column)).push_bind(from);
                }
                if let Some(to) = self.end_bound() {
                    qb.push(format!(" AND {} <= ", source.date_column)).push_bind(to);
                }
            }
        }
    }

    /// Append the doctor restriction for `source`, if any
    pub(crate) fn push_scope(&self, qb: &mut QueryBuilder<'static, Postgres>, source: &Source) {
        if let Some(doctor_id) = self.scope.doctor_id() {
            qb.push(format!(" AND {} = ", source.doctor_column)).push_bind(doctor_id);
        }
    }

    /// Range and scope together
    pub(crate) fn push_conditions(&self, qb: &mut QueryBuilder<'static, Postgres>, source: &Source) {
        self.push_date_range(qb, source);
        self.push_scope(qb, source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_range_must_be_ordered() {
        let err = ReportFilter::new(Some(date("2024-05-10")), Some(date("2024-05-01"))).unwrap_err();
        assert!(matches!(err, ReportError::InvalidDateRange { .. }));
        assert!(ReportFilter::new(Some(date("2024-05-01")), Some(date("2024-05-01"))).is_ok());
        assert!(ReportFilter::new(None, Some(date("2024-05-01"))).is_ok());
    }

    #[test]
    fn test_bounds_cover_whole_days() {
        let filter = ReportFilter::new(Some(date("2024-01-01")), Some(date("2024-01-31"))).unwrap();
        assert_eq!(filter.start_bound().unwrap().to_string(), "2024-01-01 00:00:00");
        assert_eq!(filter.end_bound().unwrap().to_string(), "2024-01-31 23:59:59");
        assert_eq!(ReportFilter::default().start_bound(), None);
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!(Period::parse_or_default(Some("WEEK")), Period::Week);
        assert_eq!(Period::parse_or_default(Some("fortnight")), Period::Month);
        assert_eq!(Period::parse_or_default(None), Period::Month);
        assert_eq!(Period::Week.sql_format(), "IYYY-IW");
        assert_eq!(Period::Day.sql_format(), "YYYY-MM-DD");
    }

    #[test]
    fn test_conditions_sql() {
        let filter = ReportFilter::new(Some(date("2024-01-01")), Some(date("2024-01-31")))
            .unwrap()
            .with_scope(DoctorScope::Doctor(7));

        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM cases c WHERE c.deleted_at IS NULL");
        filter.push_conditions(&mut qb, &CASES);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM cases c WHERE c.deleted_at IS NULL \
             AND c.created_at >= $1 AND c.created_at <= $2 AND c.doctor_id = $3"
        );
    }

    #[test]
    fn test_unscoped_filter_adds_nothing() {
        let mut qb = QueryBuilder::new("SELECT 1 FROM reservations r WHERE TRUE");
        ReportFilter::default().push_conditions(&mut qb, &RESERVATIONS);
        assert_eq!(qb.sql(), "SELECT 1 FROM reservations r WHERE TRUE");
    }
}
