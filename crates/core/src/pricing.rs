use thiserror::Error;

use crate::catalog::{CatalogRecord, TierSchedule};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("rental duration must be a positive number of days, got {0}")]
    InvalidDuration(i64),
    #[error("record `{model_key}` carries {prices} prices for a {columns}-column schedule")]
    SchemaMismatch { model_key: String, prices: usize, columns: usize },
}

/// Total rental cost for a record over `rental_days`: the per-day rate of the
/// first tier whose breakpoint covers the duration (saturating at the last
/// tier), multiplied by the day count.
pub fn compute_total(
    record: &CatalogRecord,
    rental_days: i64,
    schedule: &TierSchedule,
) -> Result<i64, PricingError> {
    if rental_days <= 0 {
        return Err(PricingError::InvalidDuration(rental_days));
    }
    if record.tier_prices.len() != schedule.column_count() {
        return Err(PricingError::SchemaMismatch {
            model_key: record.model_key().0,
            prices: record.tier_prices.len(),
            columns: schedule.column_count(),
        });
    }

    let capped_days = u32::try_from(rental_days).unwrap_or(u32::MAX);
    let rate = record.tier_prices[schedule.column_for(capped_days)];
    Ok(rate.saturating_mul(rental_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogRecord;

    fn record_fixture() -> CatalogRecord {
        CatalogRecord {
            category: "Drill".to_string(),
            brand: "BrandX".to_string(),
            model: "ModelY".to_string(),
            tier_prices: vec![100, 80, 60],
            photo_url: None,
            detail_text: None,
            cargo_weight_kg: 2.4,
        }
    }

    fn schedule() -> TierSchedule {
        TierSchedule::new(vec![1, 3, 7]).expect("schedule")
    }

    #[test]
    fn reference_schedule_selects_expected_tiers() {
        let record = record_fixture();
        let schedule = schedule();

        assert_eq!(compute_total(&record, 1, &schedule), Ok(100));
        assert_eq!(compute_total(&record, 2, &schedule), Ok(160));
        assert_eq!(compute_total(&record, 3, &schedule), Ok(240));
        assert_eq!(compute_total(&record, 4, &schedule), Ok(240));
        assert_eq!(compute_total(&record, 5, &schedule), Ok(300));
        assert_eq!(compute_total(&record, 7, &schedule), Ok(420));
    }

    #[test]
    fn saturates_at_the_last_tier_beyond_all_breakpoints() {
        let record = record_fixture();
        let schedule = schedule();

        assert_eq!(compute_total(&record, 8, &schedule), Ok(480));
        assert_eq!(compute_total(&record, 30, &schedule), Ok(1800));
    }

    #[test]
    fn total_is_monotonically_non_decreasing_in_duration() {
        let record = record_fixture();
        let schedule = schedule();

        let mut previous = 0;
        for days in 1..=60 {
            let total = compute_total(&record, days, &schedule).expect("total");
            assert!(
                total >= previous,
                "total dropped from {previous} to {total} at {days} days"
            );
            previous = total;
        }
    }

    #[test]
    fn rejects_non_positive_durations() {
        let record = record_fixture();
        let schedule = schedule();

        assert_eq!(
            compute_total(&record, 0, &schedule),
            Err(PricingError::InvalidDuration(0))
        );
        assert_eq!(
            compute_total(&record, -3, &schedule),
            Err(PricingError::InvalidDuration(-3))
        );
    }

    #[test]
    fn rejects_records_that_do_not_match_the_schedule() {
        let mut record = record_fixture();
        record.tier_prices.pop();

        assert!(matches!(
            compute_total(&record, 2, &schedule()),
            Err(PricingError::SchemaMismatch { .. })
        ));
    }
}
