//! Staleness policy for cached catalog data.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default time-to-live for cached playlist data.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Whether cached data must be re-fetched.
///
/// Data is stale when it was never fetched, or when its age exceeds `ttl`.
/// Pure function; the same policy gates playlist-list refresh and track
/// refresh.
pub fn is_stale(last_fetched_at: Option<DateTime<Utc>>, now: DateTime<Utc>, ttl: Duration) -> bool {
    match last_fetched_at {
        None => true,
        Some(last) => now.signed_duration_since(last).num_seconds() > ttl.as_secs() as i64,
    }
}
