use std::collections::BTreeSet;

use crate::model::{BookingConfig, BookingRules, CacheEntry, DayOffset, DayRange, day_offset, weekday_index};

use super::ranges;

// ── Geometry Encoder ─────────────────────────────────────────────
//
// Merged intervals rendered as 2-point line segments on the x axis,
// joined into one multi-line-string. Purely an indexable encoding for
// spatial/filter queries; all interval logic lives in the Range Merger.

/// `MULTILINESTRING((s 0,e 0),…)`, or `None` for an empty set.
pub fn multi_linestring(ranges: &[DayRange]) -> Option<String> {
    if ranges.is_empty() {
        return None;
    }
    let segments: Vec<String> = ranges
        .iter()
        .map(|r| format!("({} 0,{} 0)", r.start, r.end))
        .collect();
    Some(format!("MULTILINESTRING({})", segments.join(",")))
}

/// Encode the configuration's available weekdays (indices 0–6, Monday = 0)
/// as merged segments. Days mode: all weekdays minus the excluded ones;
/// timeslots mode: the union of the groups' weekdays.
pub fn weekday_linestring(config: &BookingConfig) -> Option<String> {
    let indices: BTreeSet<DayOffset> = match &config.rules {
        BookingRules::Days {
            excluded_weekdays, ..
        } => {
            let excluded: BTreeSet<DayOffset> =
                excluded_weekdays.iter().map(|w| weekday_index(*w)).collect();
            (0..7).filter(|i| !excluded.contains(i)).collect()
        }
        BookingRules::Timeslots { groups } => groups
            .iter()
            .flat_map(|g| g.days.iter().map(|w| weekday_index(*w)))
            .collect(),
    };
    multi_linestring(&ranges::merge_offsets(&indices))
}

/// Encode the cached fully-booked ranges as day-offset segments. Malformed
/// range strings are skipped individually — corruption must not blank the
/// whole encoding.
pub fn excluded_day_linestring(entry: &CacheEntry) -> Option<String> {
    let parsed: Vec<DayRange> = entry
        .fully_booked
        .iter()
        .filter_map(|raw| match ranges::parse_range(raw) {
            Some((start, end)) => Some(DayRange::new(day_offset(start), day_offset(end))),
            None => {
                tracing::warn!(range = %raw, "unparseable cached range, skipped");
                None
            }
        })
        .collect();
    multi_linestring(&ranges::coalesce(parsed))
}
