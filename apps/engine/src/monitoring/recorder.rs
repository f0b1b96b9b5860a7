use anyhow::Result;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

use super::types::{CheckOutcome, CheckResult, MonitorStatus};
use crate::database::Database;
use crate::database::models::{LiveState, Monitor};

/// Result recorder - persists one completed check and refreshes the
/// monitor's denormalized live fields
pub struct ResultRecorder {
    database: Arc<dyn Database>,
}

/// Rolling uptime percentage over the 24h window, rounded to two
/// decimals. An empty window yields `None` so the stored value is
/// left untouched.
pub fn rolling_uptime(total: u64, successful: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let raw = 100.0 * successful as f64 / total as f64;
    Some((raw * 100.0).round() / 100.0)
}

impl ResultRecorder {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    /// Persist the outcome of one completed check.
    ///
    /// The history row is appended unconditionally; the live-state
    /// update follows in the same call so a partial write can only be
    /// the monitor-fields half, which the next check corrects.
    pub async fn record(&self, monitor: &Monitor, outcome: &CheckOutcome) -> Result<()> {
        let result = CheckResult::from_outcome(monitor.uuid, outcome);
        self.database.insert_check_result(&result).await?;

        let now = SystemTime::now();
        let mut state = LiveState {
            last_check: now,
            current_status: outcome.status,
            avg_response_time: outcome.response_time,
            last_up_time: None,
            last_down_time: None,
            uptime_percentage: None,
        };
        match outcome.status {
            MonitorStatus::Up => state.last_up_time = Some(now),
            MonitorStatus::Down => state.last_down_time = Some(now),
            MonitorStatus::Unknown => {}
        }

        match self.database.compute_24h_stats(monitor.uuid).await {
            Ok((total, successful)) => {
                state.uptime_percentage = rolling_uptime(total, successful);
            }
            Err(e) => {
                // Stale uptime is corrected by the next successful recompute
                warn!("24h stats recompute failed for monitor {}: {e}", monitor.uuid);
            }
        }

        self.database.update_monitor_live_state(monitor.uuid, &state).await?;
        Ok(())
    }
}
