//! Clock-based time allocation.

use std::time::Duration;

/// Time held back for communication latency.
const OVERHEAD_MS: f64 = 10.0;

/// Splits a game clock into `(soft, hard)` limits for one move.
///
/// The soft limit is an even share of the usable time over `moves_to_go`
/// moves plus three quarters of the increment. The hard limit caps how far a
/// single move may overrun that share:
///
/// |                     | no increment | increment |
/// |---------------------|--------------|-----------|
/// | share of usable     | 12%          | 25%       |
/// | multiple of soft    | 2.5x         | 3.0x      |
///
/// Both limits are at least one millisecond.
pub fn compute_limits(
    remaining: Duration,
    increment: Duration,
    moves_to_go: u32,
) -> (Duration, Duration) {
    let floor = Duration::from_millis(1);
    let remaining_ms = remaining.as_secs_f64() * 1000.0;
    if remaining_ms < OVERHEAD_MS {
        return (floor, floor);
    }

    let usable = (remaining_ms - OVERHEAD_MS).max(1.0);
    let increment_ms = increment.as_secs_f64() * 1000.0;
    let (share, ratio) = if increment_ms > 0.0 {
        (0.25, 3.0)
    } else {
        (0.12, 2.5)
    };

    let soft = usable / f64::from(moves_to_go.max(1)) + increment_ms * 0.75;
    let hard = (usable * share).min(soft * ratio);

    let clamp = |ms: f64| Duration::from_millis(ms.clamp(1.0, usable) as u64);
    (clamp(soft), clamp(hard))
}
