use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::model::{DayOffset, DayRange, date_from_offset, format_date, parse_date};

// ── Range Merger ─────────────────────────────────────────────────

/// Merge a set of day-offsets (or weekday indices) into minimal sorted
/// closed intervals. A 1-length interval has `start == end`.
///
/// Idempotent: expanding the output and merging again is a no-op.
pub fn merge_offsets(offsets: &BTreeSet<DayOffset>) -> Vec<DayRange> {
    let mut merged: Vec<DayRange> = Vec::new();
    for &off in offsets {
        if let Some(last) = merged.last_mut()
            && off == last.end + 1
        {
            last.end = off;
            continue;
        }
        merged.push(DayRange::new(off, off));
    }
    merged
}

/// Coalesce a list of closed ranges into the merged invariant form:
/// sorted ascending, pairwise non-overlapping, non-adjacent.
pub fn coalesce(mut ranges: Vec<DayRange>) -> Vec<DayRange> {
    ranges.sort_by_key(|r| r.start);
    let mut merged: Vec<DayRange> = Vec::new();
    for range in ranges {
        if let Some(last) = merged.last_mut()
            && range.start <= last.end + 1
        {
            last.end = last.end.max(range.end);
            continue;
        }
        merged.push(range);
    }
    merged
}

// ── Serialization ────────────────────────────────────────────────

/// `"2024-01-10"` for a single day, `"2024-01-10..2024-01-13"` for a pair.
pub fn format_range(range: &DayRange) -> Option<String> {
    let start = date_from_offset(range.start)?;
    if range.start == range.end {
        return Some(format_date(start));
    }
    let end = date_from_offset(range.end)?;
    Some(format!("{}..{}", format_date(start), format_date(end)))
}

pub fn format_ranges(ranges: &[DayRange]) -> Vec<String> {
    ranges
        .iter()
        .filter_map(|r| {
            let s = format_range(r);
            if s.is_none() {
                tracing::warn!(start = r.start, end = r.end, "range outside calendar, dropped");
            }
            s
        })
        .collect()
}

/// Inverse of `format_range`. A trailing single date with no `..` parses as
/// a 1-length range.
pub fn parse_range(s: &str) -> Option<(NaiveDate, NaiveDate)> {
    match s.split_once("..") {
        Some((start, end)) => {
            let start = parse_date(start)?;
            let end = parse_date(end)?;
            if start > end {
                return None;
            }
            Some((start, end))
        }
        None => {
            let d = parse_date(s)?;
            Some((d, d))
        }
    }
}
