// Arithmetic shared by the reports
use crate::models::{AgeGroupCount, PeriodTotal, ProfitLossPoint};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;

/// Age buckets in display order
pub const AGE_GROUPS: [&str; 6] = ["0-17", "18-30", "31-45", "46-60", "60+", "Unknown"];

/// Round to two places, halves away from zero
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `part / total * 100` rounded to two places; 0 when `total` is 0
pub fn percentage(part: i64, total: i64) -> Decimal {
    decimal_percentage(Decimal::from(part), Decimal::from(total))
}

pub fn decimal_percentage(part: Decimal, total: Decimal) -> Decimal {
    if total <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round2(part * Decimal::ONE_HUNDRED / total)
}

/// Put age buckets in [`AGE_GROUPS`] order; unexpected labels go last
pub fn sort_age_groups(rows: &mut [AgeGroupCount]) {
    rows.sort_by_key(|row| {
        AGE_GROUPS
            .iter()
            .position(|g| *g == row.age_group)
            .unwrap_or(AGE_GROUPS.len())
    });
}

/// Join revenue and expense trends on their period keys.
///
/// Every period present in either series appears once, in ascending order;
/// a period missing from one side counts as zero there.
pub fn merge_profit_loss_trend(revenue: &[PeriodTotal], expenses: &[PeriodTotal]) -> Vec<ProfitLossPoint> {
    let mut periods: BTreeMap<&str, (Decimal, Decimal)> = BTreeMap::new();
    for point in revenue {
        periods.entry(point.period.as_str()).or_default().0 += point.total;
    }
    for point in expenses {
        periods.entry(point.period.as_str()).or_default().1 += point.total;
    }

    periods
        .into_iter()
        .map(|(period, (revenue, expenses))| ProfitLossPoint {
            period: period.to_string(),
            revenue,
            expenses,
            profit_loss: round2(revenue - expenses),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn total(period: &str, value: &str) -> PeriodTotal {
        PeriodTotal {
            period: period.to_string(),
            total: dec(value),
        }
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 3), dec("33.33"));
        assert_eq!(percentage(2, 3), dec("66.67"));
        assert_eq!(percentage(5, 0), Decimal::ZERO);
        assert_eq!(percentage(0, 10), Decimal::ZERO);
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round2(dec("2.345")), dec("2.35"));
        assert_eq!(round2(dec("-2.345")), dec("-2.35"));
        assert_eq!(round2(dec("2.344")), dec("2.34"));
    }

    #[test]
    fn test_age_groups_sorted() {
        let mut rows: Vec<AgeGroupCount> = ["Unknown", "60+", "0-17", "31-45"]
            .iter()
            .map(|g| AgeGroupCount {
                age_group: g.to_string(),
                count: 1,
            })
            .collect();
        sort_age_groups(&mut rows);
        let order: Vec<&str> = rows.iter().map(|r| r.age_group.as_str()).collect();
        assert_eq!(order, vec!["0-17", "31-45", "60+", "Unknown"]);
    }

    #[test]
    fn test_merge_union_of_periods() {
        let revenue = vec![total("2024-01", "1000"), total("2024-03", "500")];
        let expenses = vec![total("2024-02", "200.50"), total("2024-03", "700")];

        let merged = merge_profit_loss_trend(&revenue, &expenses);
        let periods: Vec<&str> = merged.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(periods, vec!["2024-01", "2024-02", "2024-03"]);

        assert_eq!(merged[0].profit_loss, dec("1000"));
        assert_eq!(merged[1].revenue, Decimal::ZERO);
        assert_eq!(merged[1].profit_loss, dec("-200.50"));
        assert_eq!(merged[2].profit_loss, dec("-200"));
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_profit_loss_trend(&[], &[]).is_empty());
    }
}
