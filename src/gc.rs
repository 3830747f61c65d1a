use crate::state::AppState;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use std::time::Duration;
use tracing::info;

/// Drops GPS fixes older than `threshold`. The bus stays listed and falls
/// back to "No GPS yet". Returns how many fixes were dropped.
pub fn expire_stale_locations(state: &AppState, threshold: Duration, now: DateTime<Utc>) -> usize {
    let threshold_secs = threshold.as_secs() as i64;

    let stale: Vec<CompactString> = state
        .locations
        .iter()
        .filter(|r| now.signed_duration_since(r.value().updated_at).num_seconds() > threshold_secs)
        .map(|r| r.key().clone())
        .collect();

    let count = stale.len();
    if count > 0 {
        for bus_id in &stale {
            state.locations.remove(bus_id);
        }
        state.notify_changed();
        info!(count, "expired stale bus locations");
    }
    count
}
