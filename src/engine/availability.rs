use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};

use crate::limits::{MAX_CACHED_RANGES, MAX_RANGE_WALK_DAYS};
use crate::model::*;

use super::aggregate::{DayOccupancy, Occupancy, RangeOccupancy, SlotOccupancy};
use super::ranges;

// ── Availability Calculator ──────────────────────────────────────

/// The calculator's output for one field: merged fully-booked day ranges
/// plus, for timeslots mode, per-slot active-booking counts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Computed {
    pub ranges: Vec<DayRange>,
    pub slot_counts: BTreeMap<String, u32>,
}

/// Turn occupancy counts + configuration into the fully-booked set.
///
/// Fully-booked days from the mode-specific rule are unioned with the
/// manually excluded days, mapped to day-offsets and merged.
pub fn fully_booked(config: &BookingConfig, occupancy: &Occupancy, min_date: NaiveDate) -> Computed {
    let quantity = config.quantity();
    let mut slot_counts = BTreeMap::new();

    let mut days: BTreeSet<NaiveDate> = match (&config.rules, occupancy) {
        (
            BookingRules::Days {
                selection: DaySelection::SingleDay,
                ..
            },
            Occupancy::SingleDay(rows),
        ) => single_day_fully_booked(rows, quantity),
        (
            BookingRules::Days {
                selection: DaySelection::DateRange { .. },
                ..
            },
            Occupancy::DateRange(rows),
        ) => date_range_fully_booked(rows, quantity, min_date),
        (BookingRules::Timeslots { groups }, Occupancy::Timeslots(rows)) => {
            let (full, counts) = timeslot_fully_booked(groups, rows, quantity);
            slot_counts = counts;
            full
        }
        (_, occupancy) => {
            tracing::warn!(?occupancy, "occupancy does not match configured mode");
            BTreeSet::new()
        }
    };

    for d in &config.excluded_days {
        days.insert(*d);
    }

    let offsets: BTreeSet<DayOffset> = days.iter().map(|d| day_offset(*d)).collect();
    let mut merged = ranges::merge_offsets(&offsets);
    if merged.len() > MAX_CACHED_RANGES {
        tracing::warn!(
            total = merged.len(),
            kept = MAX_CACHED_RANGES,
            "fully-booked range overflow, truncated"
        );
        merged.truncate(MAX_CACHED_RANGES);
    }

    Computed {
        ranges: merged,
        slot_counts,
    }
}

/// single_day: a date is fully booked iff its count reaches the quantity.
pub fn single_day_fully_booked(rows: &[DayOccupancy], quantity: u32) -> BTreeSet<NaiveDate> {
    rows.iter()
        .filter(|r| r.count >= quantity)
        .map(|r| r.date)
        .collect()
}

/// date_range: fold every aggregate row into per-day counters, then keep
/// days whose accumulated counter reaches the quantity. Overlapping ranges
/// accumulate — concurrent partial bookings on the same day must combine.
///
/// `Nights` stops one day before `end` (the checkout day is not occupied).
/// The walk never goes past `min_date + MAX_RANGE_WALK_DAYS`.
pub fn date_range_fully_booked(
    rows: &[RangeOccupancy],
    quantity: u32,
    min_date: NaiveDate,
) -> BTreeSet<NaiveDate> {
    let horizon = min_date
        .checked_add_signed(chrono::Duration::days(MAX_RANGE_WALK_DAYS))
        .unwrap_or(NaiveDate::MAX);

    let mut counters: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for row in rows {
        let last = match row.count_mode {
            CountMode::Days => Some(row.end),
            CountMode::Nights => row.end.pred_opt(),
        };
        let Some(last) = last else { continue };
        if last > horizon {
            tracing::warn!(
                start = %row.start,
                end = %row.end,
                "range walk clamped to horizon"
            );
        }
        let last = last.min(horizon);

        let mut day = row.start.max(min_date);
        while day <= last {
            *counters.entry(day).or_insert(0) += row.count;
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
    }

    counters
        .into_iter()
        .filter(|(_, count)| *count >= quantity)
        .map(|(day, _)| day)
        .collect()
}

/// weekday → slot list, where the first group that lists a weekday wins.
pub fn slot_index(groups: &[SlotGroup]) -> [Option<&[TimeSlot]>; 7] {
    let mut index: [Option<&[TimeSlot]>; 7] = [None; 7];
    for group in groups {
        for day in &group.days {
            let i = weekday_index(*day) as usize;
            if index[i].is_none() {
                index[i] = Some(group.slots.as_slice());
            }
        }
    }
    index
}

/// timeslots: a slot is booked once its count reaches the quantity; a date
/// is fully booked once every slot of its weekday's list is booked. Dates
/// whose weekday has no configured slots never report fully booked.
///
/// Counts for every configured slot with occupancy are returned for the
/// cache, keyed `"date slot-key"`.
pub fn timeslot_fully_booked(
    groups: &[SlotGroup],
    rows: &[SlotOccupancy],
    quantity: u32,
) -> (BTreeSet<NaiveDate>, BTreeMap<String, u32>) {
    let index = slot_index(groups);
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    let mut booked: BTreeMap<NaiveDate, BTreeSet<String>> = BTreeMap::new();

    for row in rows {
        let weekday = row.date.weekday().num_days_from_monday() as usize;
        let Some(slots) = index[weekday] else { continue };
        if !slots.contains(&row.slot) {
            // slot no longer configured for that weekday
            continue;
        }
        let slot_key = row.slot.key();
        let key = format!("{} {}", format_date(row.date), slot_key);
        let total = counts.entry(key).or_insert(0);
        *total += row.count;
        if *total >= quantity {
            booked.entry(row.date).or_default().insert(slot_key);
        }
    }

    let mut full_days = BTreeSet::new();
    for (date, booked_keys) in &booked {
        let weekday = date.weekday().num_days_from_monday() as usize;
        let Some(slots) = index[weekday] else { continue };
        if !slots.is_empty() && slots.iter().all(|s| booked_keys.contains(&s.key())) {
            full_days.insert(*date);
        }
    }

    (full_days, counts)
}
