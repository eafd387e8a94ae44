use chrono::NaiveDate;

use crate::model::{AggregateMode, AggregateRow, CountMode, TimeSlot};

// ── Occupancy ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayOccupancy {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeOccupancy {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub count_mode: CountMode,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotOccupancy {
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub count: u32,
}

/// Per-date (or per-range, per-slot) active-booking counts, derived from the
/// ledger's aggregate rows. Ephemeral — rebuilt on every recompute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Occupancy {
    SingleDay(Vec<DayOccupancy>),
    DateRange(Vec<RangeOccupancy>),
    Timeslots(Vec<SlotOccupancy>),
}

/// Fold ledger rows into a typed occupancy for the requested mode. Rows of
/// the wrong shape for the mode are skipped with a warning, not fatal.
pub fn build_occupancy(mode: AggregateMode, rows: Vec<AggregateRow>) -> Occupancy {
    match mode {
        AggregateMode::SingleDay => {
            let mut days = Vec::with_capacity(rows.len());
            for row in rows {
                match row {
                    AggregateRow::Day { date, count } => days.push(DayOccupancy { date, count }),
                    other => skip(mode, &other),
                }
            }
            Occupancy::SingleDay(days)
        }
        AggregateMode::DateRange => {
            let mut ranges = Vec::with_capacity(rows.len());
            for row in rows {
                match row {
                    AggregateRow::Range {
                        start,
                        end,
                        count_mode,
                        count,
                    } => ranges.push(RangeOccupancy {
                        start,
                        end,
                        count_mode,
                        count,
                    }),
                    other => skip(mode, &other),
                }
            }
            Occupancy::DateRange(ranges)
        }
        AggregateMode::Timeslots => {
            let mut slots = Vec::with_capacity(rows.len());
            for row in rows {
                match row {
                    AggregateRow::Slot { date, slot, count } => {
                        slots.push(SlotOccupancy { date, slot, count })
                    }
                    other => skip(mode, &other),
                }
            }
            Occupancy::Timeslots(slots)
        }
    }
}

fn skip(mode: AggregateMode, row: &AggregateRow) {
    tracing::warn!(?mode, ?row, "aggregate row shape does not match mode, skipped");
}
