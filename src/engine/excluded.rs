use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::limits::MAX_RANGE_WALK_DAYS;
use crate::model::{BookingConfig, CacheEntry};

use super::error::EngineError;
use super::ranges;

// ── Excluded-Days Resolver ───────────────────────────────────────

/// Expand the cached fully-booked ranges into individual dates, union the
/// configuration's manually excluded days, dedupe and sort.
///
/// The cache is persisted state that external tooling can edit by hand; a
/// range that no longer parses is reported as `UnparseableRange`.
pub fn resolve(config: &BookingConfig, entry: &CacheEntry) -> Result<Vec<NaiveDate>, EngineError> {
    let mut days: BTreeSet<NaiveDate> = BTreeSet::new();

    for raw in &entry.fully_booked {
        let (start, end) =
            ranges::parse_range(raw).ok_or_else(|| EngineError::UnparseableRange(raw.clone()))?;

        let mut day = start;
        let mut walked: i64 = 0;
        while day <= end {
            if walked > MAX_RANGE_WALK_DAYS {
                tracing::warn!(range = %raw, "cached range expansion clamped");
                break;
            }
            days.insert(day);
            walked += 1;
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
    }

    for d in &config.excluded_days {
        days.insert(*d);
    }

    Ok(days.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookingRules, DaySelection};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config(excluded_days: Vec<NaiveDate>) -> BookingConfig {
        BookingConfig {
            rules: BookingRules::Days {
                selection: DaySelection::SingleDay,
                excluded_weekdays: vec![],
            },
            quantity_per_slot: None,
            excluded_days,
        }
    }

    fn entry(fully_booked: &[&str]) -> CacheEntry {
        CacheEntry {
            fully_booked: fully_booked.iter().map(|s| s.to_string()).collect(),
            slot_counts: Default::default(),
        }
    }

    #[test]
    fn expands_ranges_to_dates() {
        let resolved = resolve(
            &config(vec![]),
            &entry(&["2024-01-10..2024-01-12", "2024-02-01"]),
        )
        .unwrap();
        assert_eq!(
            resolved,
            vec![
                date(2024, 1, 10),
                date(2024, 1, 11),
                date(2024, 1, 12),
                date(2024, 2, 1),
            ]
        );
    }

    #[test]
    fn unions_manual_exclusions_and_dedupes() {
        let resolved = resolve(
            &config(vec![date(2024, 1, 11), date(2023, 12, 24)]),
            &entry(&["2024-01-10..2024-01-12"]),
        )
        .unwrap();
        assert_eq!(
            resolved,
            vec![
                date(2023, 12, 24),
                date(2024, 1, 10),
                date(2024, 1, 11),
                date(2024, 1, 12),
            ]
        );
    }

    #[test]
    fn empty_inputs_resolve_empty() {
        assert!(resolve(&config(vec![]), &entry(&[])).unwrap().is_empty());
    }

    #[test]
    fn malformed_range_is_a_sentinel_failure() {
        let result = resolve(&config(vec![]), &entry(&["not-a-date..2024-01-12"]));
        assert!(matches!(result, Err(EngineError::UnparseableRange(_))));
    }

    #[test]
    fn oversized_range_is_clamped() {
        let resolved = resolve(&config(vec![]), &entry(&["2024-01-01..9999-01-01"])).unwrap();
        assert_eq!(resolved.len() as i64, MAX_RANGE_WALK_DAYS + 1);
    }
}
