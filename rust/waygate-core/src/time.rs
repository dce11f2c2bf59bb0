//! Wall-clock helpers shared by every Waygate service.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in whole seconds since the unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
