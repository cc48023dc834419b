//! SQL for every report, built with `sqlx::QueryBuilder` so the date range
//! and doctor scope are always bound parameters.

use crate::filter::{ReportFilter, Source, BILLS, CASES, EXPENSES, PATIENTS, RESERVATIONS};
use chrono::NaiveDate;
use sqlx::{Postgres, QueryBuilder};

pub(crate) type Query = QueryBuilder<'static, Postgres>;

/// Line total of an expense row
const EXPENSE_AMOUNT: &str = "COALESCE(e.quantity, 1) * e.price";

/// `SELECT <select> FROM <table> <alias> <joins> WHERE <alias>.deleted_at IS NULL`
fn select(select: &str, source: &Source, joins: &str) -> Query {
    let mut sql = format!("SELECT {select} FROM {} {}", source.table, source.alias);
    if !joins.is_empty() {
        sql.push(' ');
        sql.push_str(joins);
    }
    sql.push_str(&format!(" WHERE {}.deleted_at IS NULL", source.alias));
    QueryBuilder::new(sql)
}

fn filtered(select_list: &str, source: &Source, joins: &str, filter: &ReportFilter) -> Query {
    let mut qb = select(select_list, source, joins);
    filter.push_conditions(&mut qb, source);
    qb
}

pub(crate) fn count(source: &Source, filter: &ReportFilter) -> Query {
    filtered("COUNT(*)", source, "", filter)
}

pub(crate) fn patients_summary(filter: &ReportFilter) -> Query {
    filtered(
        "COUNT(*), COUNT(*) FILTER (WHERE p.sex = 1), COUNT(*) FILTER (WHERE p.sex = 2)",
        &PATIENTS,
        "",
        filter,
    )
}

pub(crate) fn patients_by_source(filter: &ReportFilter) -> Query {
    let mut qb = filtered(
        "p.from_where_come_id AS source_id, \
         COALESCE(s.name, 'Unknown') AS source_name, \
         COALESCE(s.name_ar, 'غير معروف') AS source_name_ar, \
         COUNT(*) AS count",
        &PATIENTS,
        "LEFT JOIN from_where_comes s ON s.id = p.from_where_come_id",
        filter,
    );
    qb.push(" GROUP BY p.from_where_come_id, s.name, s.name_ar ORDER BY count DESC");
    qb
}

pub(crate) fn patients_age_distribution(filter: &ReportFilter) -> Query {
    let mut qb = QueryBuilder::new(
        "SELECT CASE \
            WHEN a.age IS NULL THEN 'Unknown' \
            WHEN a.age < 18 THEN '0-17' \
            WHEN a.age <= 30 THEN '18-30' \
            WHEN a.age <= 45 THEN '31-45' \
            WHEN a.age <= 60 THEN '46-60' \
            ELSE '60+' END AS age_group, \
         COUNT(*) AS count \
         FROM (SELECT COALESCE(p.age, date_part('year', age(p.birth_date))::INT) AS age \
               FROM patients p WHERE p.deleted_at IS NULL",
    );
    filter.push_conditions(&mut qb, &PATIENTS);
    qb.push(") a GROUP BY 1");
    qb
}

/// Row counts per doctor, skipping rows without one
pub(crate) fn count_by_doctor(source: &Source, filter: &ReportFilter) -> Query {
    let a = source.alias;
    let mut qb = filtered(
        &format!("{a}.doctor_id AS doctor_id, COALESCE(u.name, 'Unknown') AS doctor_name, COUNT(*) AS count"),
        source,
        &format!("LEFT JOIN users u ON u.id = {a}.doctor_id"),
        filter,
    );
    qb.push(format!(" AND {a}.doctor_id IS NOT NULL GROUP BY {a}.doctor_id, u.name ORDER BY count DESC"));
    qb
}

/// Row counts per status with the status' labels and color
pub(crate) fn count_by_status(source: &Source, filter: &ReportFilter) -> Query {
    let a = source.alias;
    let mut qb = filtered(
        &format!(
            "{a}.status_id AS status_id, \
             COALESCE(st.name_en, 'Unknown') AS status_name, \
             COALESCE(st.name_ar, 'غير معروف') AS status_name_ar, \
             COALESCE(st.color, '#000000') AS color, \
             COUNT(*) AS count"
        ),
        source,
        &format!("LEFT JOIN statuses st ON st.id = {a}.status_id"),
        filter,
    );
    qb.push(format!(
        " AND {a}.status_id IS NOT NULL GROUP BY {a}.status_id, st.name_en, st.name_ar, st.color ORDER BY count DESC"
    ));
    qb
}

/// `{period, count}` rows grouped by the filter's period
pub(crate) fn trend_count(source: &Source, filter: &ReportFilter) -> Query {
    let mut qb = filtered(
        &format!(
            "to_char({}, '{}') AS period, COUNT(*) AS count",
            source.date_column,
            filter.period.sql_format()
        ),
        source,
        "",
        filter,
    );
    qb.push(" GROUP BY 1 ORDER BY 1");
    qb
}

/// `{period, total}` rows summing `amount`; `condition` is appended verbatim
fn trend_sum(source: &Source, amount: &str, condition: &str, filter: &ReportFilter) -> Query {
    let mut qb = filtered(
        &format!(
            "to_char({}, '{}') AS period, COALESCE(SUM({amount}), 0)::NUMERIC AS total",
            source.date_column,
            filter.period.sql_format()
        ),
        source,
        "",
        filter,
    );
    qb.push(condition);
    qb.push(" GROUP BY 1 ORDER BY 1");
    qb
}

pub(crate) fn bills_summary(filter: &ReportFilter) -> Query {
    filtered(
        "COUNT(*) AS total_bills, \
         COUNT(*) FILTER (WHERE b.is_paid) AS paid_bills, \
         COUNT(*) FILTER (WHERE NOT b.is_paid) AS unpaid_bills, \
         COALESCE(SUM(b.price) FILTER (WHERE b.is_paid), 0)::BIGINT AS total_revenue, \
         COALESCE(SUM(b.price) FILTER (WHERE NOT b.is_paid), 0)::BIGINT AS total_outstanding",
        &BILLS,
        "",
        filter,
    )
}

/// Sum of paid bill prices
pub(crate) fn revenue_total(filter: &ReportFilter) -> Query {
    let mut qb = filtered("COALESCE(SUM(b.price), 0)::BIGINT", &BILLS, "", filter);
    qb.push(" AND b.is_paid");
    qb
}

pub(crate) fn revenue_trend(filter: &ReportFilter) -> Query {
    trend_sum(&BILLS, "b.price", " AND b.is_paid", filter)
}

pub(crate) fn revenue_by_doctor(filter: &ReportFilter) -> Query {
    let mut qb = filtered(
        "b.doctor_id AS doctor_id, COALESCE(u.name, 'Unknown') AS doctor_name, \
         COALESCE(SUM(b.price), 0)::BIGINT AS total_revenue, COUNT(*) AS bills_count",
        &BILLS,
        "LEFT JOIN users u ON u.id = b.doctor_id",
        filter,
    );
    qb.push(" AND b.is_paid AND b.doctor_id IS NOT NULL GROUP BY b.doctor_id, u.name ORDER BY total_revenue DESC");
    qb
}

pub(crate) fn reservations_summary(filter: &ReportFilter) -> Query {
    filtered(
        "COUNT(*), COUNT(*) FILTER (WHERE r.is_waiting), COUNT(*) FILTER (WHERE NOT r.is_waiting)",
        &RESERVATIONS,
        "",
        filter,
    )
}

/// Reservations whose span covers `date`; an open end means a one-day reservation
pub(crate) fn reservations_covering(date: NaiveDate, filter: &ReportFilter) -> Query {
    let mut qb = select("COUNT(*)", &RESERVATIONS, "");
    qb.push(" AND r.reservation_start_date <= ")
        .push_bind(date)
        .push(" AND COALESCE(r.reservation_end_date, r.reservation_start_date) >= ")
        .push_bind(date);
    filter.push_scope(&mut qb, &RESERVATIONS);
    qb
}

pub(crate) fn cases_summary(filter: &ReportFilter) -> Query {
    filtered(
        "COUNT(*), COUNT(*) FILTER (WHERE c.is_paid), COUNT(*) FILTER (WHERE NOT c.is_paid), \
         COALESCE(SUM(c.price), 0)::BIGINT",
        &CASES,
        "",
        filter,
    )
}

pub(crate) fn cases_by_category(filter: &ReportFilter) -> Query {
    let mut qb = filtered(
        "c.case_categores_id AS category_id, COALESCE(cc.name, 'Unknown') AS category_name, \
         COUNT(*) AS count, COALESCE(SUM(c.price), 0)::BIGINT AS total_value",
        &CASES,
        "LEFT JOIN case_categories cc ON cc.id = c.case_categores_id",
        filter,
    );
    qb.push(" AND c.case_categores_id IS NOT NULL GROUP BY c.case_categores_id, cc.name ORDER BY count DESC");
    qb
}

pub(crate) fn cases_by_doctor(filter: &ReportFilter) -> Query {
    let mut qb = filtered(
        "c.doctor_id AS doctor_id, COALESCE(u.name, 'Unknown') AS doctor_name, \
         COUNT(*) AS count, COALESCE(SUM(c.price), 0)::BIGINT AS total_value",
        &CASES,
        "LEFT JOIN users u ON u.id = c.doctor_id",
        filter,
    );
    qb.push(" AND c.doctor_id IS NOT NULL GROUP BY c.doctor_id, u.name ORDER BY count DESC");
    qb
}

/// Total, paid and unpaid case prices
pub(crate) fn case_price_totals(filter: &ReportFilter) -> Query {
    filtered(
        "COALESCE(SUM(c.price), 0)::BIGINT, COALESCE(SUM(c.price) FILTER (WHERE c.is_paid), 0)::BIGINT",
        &CASES,
        "",
        filter,
    )
}

pub(crate) fn expenses_summary(filter: &ReportFilter) -> Query {
    filtered(
        &format!(
            "COUNT(*) AS total_expenses, \
             COUNT(*) FILTER (WHERE e.is_paid) AS paid_expenses, \
             COUNT(*) FILTER (WHERE NOT e.is_paid) AS unpaid_expenses, \
             COALESCE(SUM({EXPENSE_AMOUNT}), 0)::NUMERIC AS total_amount, \
             COALESCE(SUM({EXPENSE_AMOUNT}) FILTER (WHERE e.is_paid), 0)::NUMERIC AS paid_amount, \
             COALESCE(SUM({EXPENSE_AMOUNT}) FILTER (WHERE NOT e.is_paid), 0)::NUMERIC AS unpaid_amount"
        ),
        &EXPENSES,
        "",
        filter,
    )
}

pub(crate) fn expenses_total(filter: &ReportFilter) -> Query {
    filtered(&format!("COALESCE(SUM({EXPENSE_AMOUNT}), 0)::NUMERIC"), &EXPENSES, "", filter)
}

pub(crate) fn expenses_by_category(filter: &ReportFilter) -> Query {
    let mut qb = filtered(
        &format!(
            "e.clinic_expense_category_id AS category_id, COALESCE(ec.name, 'Unknown') AS category_name, \
             COUNT(*) AS count, COALESCE(SUM({EXPENSE_AMOUNT}), 0)::NUMERIC AS total_amount"
        ),
        &EXPENSES,
        "LEFT JOIN clinic_expense_categories ec ON ec.id = e.clinic_expense_category_id",
        filter,
    );
    qb.push(
        " AND e.clinic_expense_category_id IS NOT NULL \
         GROUP BY e.clinic_expense_category_id, ec.name ORDER BY total_amount DESC",
    );
    qb
}

pub(crate) fn expenses_trend(filter: &ReportFilter) -> Query {
    trend_sum(&EXPENSES, EXPENSE_AMOUNT, "", filter)
}

/// One row per user holding a clinical role, with activity counts inside the range
pub(crate) fn doctor_performance(filter: &ReportFilter) -> Query {
    let mut qb = QueryBuilder::new(
        "SELECT u.id AS doctor_id, u.name AS doctor_name, u.email AS doctor_email, \
         (SELECT COUNT(*) FROM patients p WHERE p.deleted_at IS NULL AND p.doctor_id = u.id",
    );
    filter.push_date_range(&mut qb, &PATIENTS);
    qb.push(") AS total_patients, (SELECT COUNT(*) FROM cases c WHERE c.deleted_at IS NULL AND c.doctor_id = u.id");
    filter.push_date_range(&mut qb, &CASES);
    qb.push(
        ") AS total_cases, (SELECT COUNT(*) FROM reservations r WHERE r.deleted_at IS NULL AND r.doctor_id = u.id",
    );
    filter.push_date_range(&mut qb, &RESERVATIONS);
    qb.push(
        ") AS total_reservations, (SELECT COALESCE(SUM(b.price), 0)::BIGINT FROM bills b \
         WHERE b.deleted_at IS NULL AND b.is_paid AND b.doctor_id = u.id",
    );
    filter.push_date_range(&mut qb, &BILLS);
    qb.push(
        ") AS total_revenue FROM users u WHERE u.deleted_at IS NULL AND EXISTS \
         (SELECT 1 FROM user_roles ur WHERE ur.user_id = u.id \
         AND ur.role IN ('doctor', 'clinic_super_doctor', 'super_admin'))",
    );
    if let Some(doctor_id) = filter.doctor_id {
        qb.push(" AND u.id = ").push_bind(doctor_id);
    }
    if let Some(own_id) = filter.scope.doctor_id() {
        qb.push(" AND u.id = ").push_bind(own_id);
    }
    qb.push(" ORDER BY u.name");
    qb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{DoctorScope, Period};

    fn january() -> ReportFilter {
        ReportFilter::new(
            NaiveDate::from_ymd_opt(2024, 1, 1),
            NaiveDate::from_ymd_opt(2024, 1, 31),
        )
        .unwrap()
    }

    #[test]
    fn test_count_hides_soft_deleted() {
        let qb = count(&PATIENTS, &ReportFilter::default());
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM patients p WHERE p.deleted_at IS NULL");
    }

    #[test]
    fn test_trend_uses_period_format() {
        let filter = january().with_period(Period::Week);
        let sql = trend_count(&CASES, &filter).into_sql();
        assert!(sql.starts_with("SELECT to_char(c.created_at, 'IYYY-IW') AS period, COUNT(*) AS count"));
        assert!(sql.ends_with("AND c.created_at <= $2 GROUP BY 1 ORDER BY 1"));
    }

    #[test]
    fn test_expense_trend_sums_line_totals_by_date() {
        let sql = expenses_trend(&january()).into_sql();
        assert!(sql.contains("SUM(COALESCE(e.quantity, 1) * e.price)"));
        assert!(sql.contains("to_char(e.date, 'YYYY-MM')"));
        assert!(sql.contains("e.date >= $1 AND e.date <= $2"));
    }

    #[test]
    fn test_revenue_only_counts_paid_bills() {
        let sql = revenue_trend(&ReportFilter::default()).into_sql();
        assert!(sql.contains("AND b.is_paid GROUP BY 1"));
        assert!(revenue_total(&ReportFilter::default()).into_sql().ends_with("AND b.is_paid"));
    }

    #[test]
    fn test_doctor_scope_applies_to_grouped_queries() {
        let filter = ReportFilter::default().with_scope(DoctorScope::Doctor(4));
        let sql = count_by_status(&RESERVATIONS, &filter).into_sql();
        assert!(sql.contains("LEFT JOIN statuses st ON st.id = r.status_id"));
        assert!(sql.contains("AND r.doctor_id = $1 AND r.status_id IS NOT NULL"));
    }

    #[test]
    fn test_reservations_covering_a_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let sql = reservations_covering(day, &ReportFilter::default()).into_sql();
        assert!(sql.contains(
            "r.reservation_start_date <= $1 AND COALESCE(r.reservation_end_date, r.reservation_start_date) >= $2"
        ));
    }

    #[test]
    fn test_doctor_performance_binds_each_subquery_range() {
        let filter = january().with_doctor(Some(3));
        let sql = doctor_performance(&filter).into_sql();
        assert!(sql.contains("p.created_at >= $1 AND p.created_at <= $2"));
        assert!(sql.contains("r.reservation_start_date >= $5"));
        assert!(sql.contains("b.created_at <= $8"));
        assert!(sql.contains("AND u.id = $9 ORDER BY u.name"));
    }

    #[test]
    fn test_age_distribution_falls_back_to_birth_date() {
        let sql = patients_age_distribution(&ReportFilter::default()).into_sql();
        assert!(sql.contains("COALESCE(p.age, date_part('year', age(p.birth_date))::INT)"));
        assert!(sql.ends_with(") a GROUP BY 1"));
    }
}
