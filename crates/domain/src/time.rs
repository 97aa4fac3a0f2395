//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for sample times, `created_at`, debounce bookkeeping, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Milliseconds elapsed from `earlier` to `later`.
///
/// Negative when the clock went backwards between the two readings.
#[must_use]
pub fn elapsed_millis(earlier: Timestamp, later: Timestamp) -> i64 {
    (later - earlier).num_milliseconds()
}
