//! daybook — booking availability and overbooking detection.
//!
//! Given a product's booking configuration (single day, date range, or
//! recurring timeslots) and the external order ledger, the engine computes
//! which calendar dates or date+timeslot combinations are fully booked,
//! caches the result per product field, and serves it to the calendar UI
//! and the search/filter layer.

pub mod engine;
pub mod ledger;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod store;
