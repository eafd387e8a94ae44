use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Days since 1970-01-01 — the only date-offset type.
pub type DayOffset = i64;

/// Shared epoch for all day-offset arithmetic (range merging, geometry).
pub fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch: valid constant date")
}

pub fn day_offset(date: NaiveDate) -> DayOffset {
    (date - epoch()).num_days()
}

pub fn date_from_offset(offset: DayOffset) -> Option<NaiveDate> {
    epoch().checked_add_signed(chrono::Duration::days(offset))
}

/// Weekday index with Monday = 0, matching the recurrence configuration.
pub fn weekday_index(weekday: Weekday) -> DayOffset {
    weekday.num_days_from_monday() as DayOffset
}

pub const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// A recurring timeslot within a day, identified by its from/to pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSlot {
    pub from: NaiveTime,
    pub to: NaiveTime,
}

impl TimeSlot {
    pub fn new(from: NaiveTime, to: NaiveTime) -> Self {
        debug_assert!(from < to, "TimeSlot from must be before to");
        Self { from, to }
    }

    /// Slot key, e.g. `"09:00-11:00"`. Distinguishes slots on the same day.
    pub fn key(&self) -> String {
        format!(
            "{}-{}",
            self.from.format(TIME_FORMAT),
            self.to.format(TIME_FORMAT)
        )
    }
}

/// One recurrence group: these slots repeat on these weekdays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotGroup {
    pub days: Vec<Weekday>,
    pub slots: Vec<TimeSlot>,
}

/// How a days-mode product is booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaySelection {
    SingleDay,
    DateRange { min_length: u32, max_length: u32 },
}

/// Mode-specific booking rules. Invalid mode/field combinations are
/// unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingRules {
    Days {
        selection: DaySelection,
        excluded_weekdays: Vec<Weekday>,
    },
    Timeslots {
        groups: Vec<SlotGroup>,
    },
}

/// Immutable booking configuration for one product field, supplied by the
/// external configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfig {
    pub rules: BookingRules,
    /// Max concurrent active bookings per date (or date+slot). None or 0
    /// means 1.
    pub quantity_per_slot: Option<u32>,
    /// Manually excluded dates, always unioned into the fully-booked output.
    pub excluded_days: Vec<NaiveDate>,
}

impl BookingConfig {
    pub fn quantity(&self) -> u32 {
        match self.quantity_per_slot {
            Some(q) if q >= 1 => q,
            _ => 1,
        }
    }

    pub fn aggregate_mode(&self) -> AggregateMode {
        match &self.rules {
            BookingRules::Days { selection, .. } => match selection {
                DaySelection::SingleDay => AggregateMode::SingleDay,
                DaySelection::DateRange { .. } => AggregateMode::DateRange,
            },
            BookingRules::Timeslots { .. } => AggregateMode::Timeslots,
        }
    }
}

/// Whether the last day of a date-range booking is itself occupied (`Days`)
/// or is the checkout day (`Nights`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CountMode {
    Days,
    Nights,
}

/// Parent order status. The active set is externally defined; everything
/// outside it never counts toward occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    SubscriptionActive,
    Cancelled,
    Refunded,
    Failed,
}

impl OrderStatus {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OrderStatus::Processing | OrderStatus::Completed | OrderStatus::SubscriptionActive
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Active,
    Cancelled,
}

/// What a single order booked. Mirrors the three booking modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookedDates {
    SingleDay {
        date: NaiveDate,
    },
    DateRange {
        start: NaiveDate,
        end: NaiveDate,
        count_mode: CountMode,
    },
    Timeslot {
        date: NaiveDate,
        slot: TimeSlot,
    },
}

/// One placed booking as the external order ledger stores it. Read-only from
/// this crate's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub order_id: Ulid,
    pub product_id: u64,
    pub field_key: String,
    pub booked: BookedDates,
    pub booking_status: BookingStatus,
    pub order_status: OrderStatus,
}

impl LedgerRecord {
    pub fn counts_toward_occupancy(&self) -> bool {
        self.booking_status == BookingStatus::Active && self.order_status.is_active()
    }
}

/// Which grouping the ledger query applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateMode {
    SingleDay,
    DateRange,
    Timeslots,
}

/// A typed aggregate row from the order ledger: one group plus its total
/// active-booking count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateRow {
    Day {
        date: NaiveDate,
        count: u32,
    },
    Range {
        start: NaiveDate,
        end: NaiveDate,
        count_mode: CountMode,
        count: u32,
    },
    Slot {
        date: NaiveDate,
        slot: TimeSlot,
        count: u32,
    },
}

/// Closed interval `[start, end]` of day-offsets (or weekday indices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub start: DayOffset,
    pub end: DayOffset,
}

impl DayRange {
    pub fn new(start: DayOffset, end: DayOffset) -> Self {
        debug_assert!(start <= end, "DayRange start must not exceed end");
        Self { start, end }
    }

    pub fn len_days(&self) -> i64 {
        self.end - self.start + 1
    }
}

/// Cached availability for one product field. Written whole on recompute,
/// never partially.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheEntry {
    /// `"date"` or `"start..end"` strings, merged, sorted, non-adjacent.
    pub fully_booked: Vec<String>,
    /// `"date slot-key"` → active-booking count. Timeslots mode only.
    pub slot_counts: std::collections::BTreeMap<String, u32>,
}

impl CacheEntry {
    pub fn is_empty(&self) -> bool {
        self.fully_booked.is_empty() && self.slot_counts.is_empty()
    }
}

/// Ledger mutations broadcast through the notify hub. The recompute
/// listener consumes these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    BookingPlaced {
        order_id: Ulid,
        product_id: u64,
        field_key: String,
    },
    BookingCancelled {
        order_id: Ulid,
        product_id: u64,
        field_key: String,
    },
    OrderStatusChanged {
        order_id: Ulid,
        product_id: u64,
        field_key: String,
        status: OrderStatus,
    },
}

impl LedgerEvent {
    pub fn product_id(&self) -> u64 {
        match self {
            LedgerEvent::BookingPlaced { product_id, .. }
            | LedgerEvent::BookingCancelled { product_id, .. }
            | LedgerEvent::OrderStatusChanged { product_id, .. } => *product_id,
        }
    }

    pub fn field_key(&self) -> &str {
        match self {
            LedgerEvent::BookingPlaced { field_key, .. }
            | LedgerEvent::BookingCancelled { field_key, .. }
            | LedgerEvent::OrderStatusChanged { field_key, .. } => field_key,
        }
    }
}
