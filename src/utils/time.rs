//! Time helpers

use std::time::Duration;
use tokio::time::Instant;

/// Roughly 30 years; far enough out to mean "never" for a running process
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + after`, saturating to a far-future instant instead of overflowing
///
/// Backoff windows and rate-limit intervals come straight from configuration,
/// so they can be arbitrarily large.
pub fn deadline_after(start: Instant, after: Duration) -> Instant {
    start
        .checked_add(after)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}
