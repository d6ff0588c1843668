//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp carried by state changes; used to discard stale notifications.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}
