// Staleness Module - Drops packets that waited too long behind a running animation
use std::time::{Duration, SystemTime};

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5);

/// True when the packet was captured more than `threshold` before `now`.
/// Timestamps ahead of the local clock are never stale.
pub fn is_stale(captured_at: SystemTime, now: SystemTime, threshold: Duration) -> bool {
    match now.duration_since(captured_at) {
        Ok(delay) => delay > threshold,
        Err(_) => false,
    }
}

/// Capture delay for logging; zero if the capture clock is ahead.
pub fn delay(captured_at: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(captured_at).unwrap_or_default()
}
