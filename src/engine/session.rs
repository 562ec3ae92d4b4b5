//! Per-run counters and timing

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::events::StopReason;

/// One start-to-stop run of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub throws: u32,
    pub catches: u32,
    pub stop_reason: StopReason,
    pub duration_ms: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::begin()
    }
}

impl Session {
    pub fn begin() -> Self {
        Self {
            started_at: Utc::now(),
            stopped_at: None,
            throws: 0,
            catches: 0,
            stop_reason: StopReason::Manual,
            duration_ms: 0,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Catches per throw as a percentage
    pub fn catch_rate(&self) -> f64 {
        if self.throws == 0 {
            0.0
        } else {
            self.catches as f64 / self.throws as f64 * 100.0
        }
    }
}

/// `1h 2m 3s`; hours are omitted when zero, minutes when both are zero
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h ", hours));
    }
    if minutes > 0 || hours > 0 {
        out.push_str(&format!("{}m ", minutes));
    }
    out.push_str(&format!("{}s", seconds));
    out
}
