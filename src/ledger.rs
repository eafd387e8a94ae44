use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;

/// The order ledger is external; its only failure mode at this seam is
/// "could not be queried".
#[derive(Debug)]
pub enum LedgerError {
    Unavailable(String),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Unavailable(e) => write!(f, "ledger unavailable: {e}"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Read-only aggregate query capability over the external order ledger.
///
/// Implementations must reflect only bookings whose parent order status is
/// in the active set and whose booking-level status is not cancelled, group
/// by the mode's key, and drop groups entirely before `min_date`.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn aggregate(
        &self,
        product_id: u64,
        field_key: &str,
        mode: AggregateMode,
        min_date: NaiveDate,
    ) -> Result<Vec<AggregateRow>, LedgerError>;
}

/// Reference ledger backed by a concurrent map. Publishes every mutation
/// through the notify hub so subscribed engines can recompute.
pub struct InMemoryLedger {
    records: DashMap<Ulid, LedgerRecord>,
    notify: Arc<NotifyHub>,
}

impl InMemoryLedger {
    pub fn new(notify: Arc<NotifyHub>) -> Self {
        Self {
            records: DashMap::new(),
            notify,
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Insert a placed booking and broadcast it.
    pub fn place(&self, record: LedgerRecord) {
        let event = LedgerEvent::BookingPlaced {
            order_id: record.order_id,
            product_id: record.product_id,
            field_key: record.field_key.clone(),
        };
        let product_id = record.product_id;
        self.records.insert(record.order_id, record);
        self.notify.send(product_id, &event);
    }

    /// Mark a booking cancelled. Returns false for an unknown order.
    pub fn cancel(&self, order_id: &Ulid) -> bool {
        let Some(mut record) = self.records.get_mut(order_id) else {
            return false;
        };
        record.booking_status = BookingStatus::Cancelled;
        let event = LedgerEvent::BookingCancelled {
            order_id: *order_id,
            product_id: record.product_id,
            field_key: record.field_key.clone(),
        };
        let product_id = record.product_id;
        drop(record);
        self.notify.send(product_id, &event);
        true
    }

    /// Update the parent order status. Returns false for an unknown order.
    pub fn set_order_status(&self, order_id: &Ulid, status: OrderStatus) -> bool {
        let Some(mut record) = self.records.get_mut(order_id) else {
            return false;
        };
        record.order_status = status;
        let event = LedgerEvent::OrderStatusChanged {
            order_id: *order_id,
            product_id: record.product_id,
            field_key: record.field_key.clone(),
            status,
        };
        let product_id = record.product_id;
        drop(record);
        self.notify.send(product_id, &event);
        true
    }
}

#[async_trait]
impl OrderLedger for InMemoryLedger {
    async fn aggregate(
        &self,
        product_id: u64,
        field_key: &str,
        mode: AggregateMode,
        min_date: NaiveDate,
    ) -> Result<Vec<AggregateRow>, LedgerError> {
        let mut day_counts: BTreeMap<NaiveDate, u32> = BTreeMap::new();
        let mut range_counts: BTreeMap<(NaiveDate, NaiveDate, CountMode), u32> = BTreeMap::new();
        let mut slot_counts: BTreeMap<(NaiveDate, TimeSlot), u32> = BTreeMap::new();

        for record in self.records.iter() {
            if record.product_id != product_id
                || record.field_key != field_key
                || !record.counts_toward_occupancy()
            {
                continue;
            }
            match (mode, &record.booked) {
                (AggregateMode::SingleDay, BookedDates::SingleDay { date }) => {
                    if *date >= min_date {
                        *day_counts.entry(*date).or_insert(0) += 1;
                    }
                }
                (
                    AggregateMode::DateRange,
                    BookedDates::DateRange {
                        start,
                        end,
                        count_mode,
                    },
                ) => {
                    if *end >= min_date {
                        *range_counts.entry((*start, *end, *count_mode)).or_insert(0) += 1;
                    }
                }
                (AggregateMode::Timeslots, BookedDates::Timeslot { date, slot }) => {
                    if *date >= min_date {
                        *slot_counts.entry((*date, *slot)).or_insert(0) += 1;
                    }
                }
                // records of another booking mode don't contribute
                _ => {}
            }
        }

        let rows = match mode {
            AggregateMode::SingleDay => day_counts
                .into_iter()
                .map(|(date, count)| AggregateRow::Day { date, count })
                .collect(),
            AggregateMode::DateRange => range_counts
                .into_iter()
                .map(|((start, end, count_mode), count)| AggregateRow::Range {
                    start,
                    end,
                    count_mode,
                    count,
                })
                .collect(),
            AggregateMode::Timeslots => slot_counts
                .into_iter()
                .map(|((date, slot), count)| AggregateRow::Slot { date, slot, count })
                .collect(),
        };
        Ok(rows)
    }
}
