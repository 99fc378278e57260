//! Poll timing utilities
//!
//! Pure functions over explicit instants so schedules can be tested
//! without waiting on a clock.

use std::time::{Duration, Instant};

/// Check if a deadline has been reached.
///
/// # Returns
/// `true` if `deadline` is at or before `now`, `false` if it is in the
/// future or there is no deadline at all
pub fn deadline_reached(deadline: Option<Instant>, now: Instant) -> bool {
    match deadline {
        Some(at) => at <= now,
        None => false,
    }
}

/// First tick of a fixed-period schedule that falls strictly after `now`.
///
/// The schedule is anchored at `last_tick`; ticks between `last_tick` and
/// `now` are skipped rather than replayed.
pub fn next_tick_after(last_tick: Instant, period: Duration, now: Instant) -> Instant {
    if period.is_zero() {
        return now;
    }

    let elapsed = now.saturating_duration_since(last_tick);
    if elapsed < period {
        return last_tick + period;
    }

    let missed = elapsed.as_nanos() / period.as_nanos() + 1;
    u32::try_from(missed)
        .ok()
        .and_then(|n| period.checked_mul(n))
        .and_then(|offset| last_tick.checked_add(offset))
        .unwrap_or(now + period)
}

/// Time left until `deadline`, zero once it has passed
pub fn time_until(deadline: Instant, now: Instant) -> Duration {
    deadline.saturating_duration_since(now)
}
