//! Long-poll budget derived from the time left until the session deadline.

use std::time::Duration;

/// Longest single long-poll wait. Bounds how long the loop can go without re-checking the deadline.
pub const LONG_POLL_CAP_SECS: u64 = 20;

/// Seconds to request for the next long-poll: `ceil(remaining)` clamped to `[1, LONG_POLL_CAP_SECS]`.
/// Callers pass `deadline.saturating_duration_since(now)`, so an expired deadline arrives as zero.
pub fn next_wait(remaining: Duration) -> u64 {
    let secs = remaining
        .as_secs()
        .saturating_add(u64::from(remaining.subsec_nanos() > 0));
    secs.clamp(1, LONG_POLL_CAP_SECS)
}
