//! Per-monitor mutual exclusion.
//!
//! At most one check per monitor may be in flight. The scheduler
//! try-acquires before dispatching; a held slot means the monitor is
//! skipped that tick and re-evaluated at the next one. Release happens
//! in `Drop` so every completion path, panics included, frees the slot.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct SingleFlight {
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim the slot for a monitor. Returns `None` while a
    /// previous check for the same monitor is still outstanding.
    pub fn try_acquire(&self, monitor_uuid: Uuid) -> Option<FlightGuard> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if in_flight.insert(monitor_uuid) {
            Some(FlightGuard { monitor_uuid, in_flight: Arc::clone(&self.in_flight) })
        } else {
            None
        }
    }

    /// Number of checks currently outstanding
    pub fn len(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holds a monitor's single-flight slot until dropped
pub struct FlightGuard {
    monitor_uuid: Uuid,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.monitor_uuid);
    }
}
