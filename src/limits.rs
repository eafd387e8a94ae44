/// Hard cap on how many days beyond `min_date` a date-range occupancy walk
/// (or a cached-range expansion) may cover. ~10 years.
pub const MAX_RANGE_WALK_DAYS: i64 = 3_660;

/// Max length of a product field key.
pub const MAX_FIELD_KEY_LEN: usize = 128;

/// Max merged ranges persisted per field before the overflow is dropped.
pub const MAX_CACHED_RANGES: usize = 4_096;
