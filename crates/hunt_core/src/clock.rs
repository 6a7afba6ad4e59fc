//! Write timestamps for optimistic concurrency.

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Current time at storage precision (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A storage-precision timestamp strictly later than `previous`, so that
/// every successful write changes the `updated_at` a concurrent editor holds.
pub fn next_after(previous: DateTime<Utc>) -> DateTime<Utc> {
    let candidate = now();
    if candidate > previous {
        candidate
    } else {
        previous.trunc_subsecs(6) + Duration::microseconds(1)
    }
}
