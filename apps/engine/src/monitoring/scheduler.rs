use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{Semaphore, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use super::executor::CheckExecutor;
use super::notifier::TransitionNotifier;
use super::recorder::ResultRecorder;
use super::single_flight::SingleFlight;
use crate::database::Database;

/// Monitoring scheduler - ticks on a fixed cadence, scans for due
/// monitors and dispatches checks without waiting for them.
pub struct Scheduler {
    database: Arc<dyn Database>,
    executor: Arc<CheckExecutor>,
    recorder: Arc<ResultRecorder>,
    notifier: Arc<TransitionNotifier>,
    flights: SingleFlight,
    permits: Arc<Semaphore>,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(
        database: Arc<dyn Database>,
        executor: Arc<CheckExecutor>,
        recorder: Arc<ResultRecorder>,
        notifier: Arc<TransitionNotifier>,
        tick_interval: Duration,
        max_concurrent_checks: usize,
    ) -> Self {
        Self {
            database,
            executor,
            recorder,
            notifier,
            flights: SingleFlight::new(),
            permits: Arc::new(Semaphore::new(max_concurrent_checks)),
            tick_interval,
        }
    }

    /// Drive ticks until the shutdown channel fires. In-flight checks
    /// are left to finish on their own; each is bounded by its
    /// monitor's timeout.
    pub async fn run(&self, mut shutdown: watch::Receiver<()>) {
        let mut timer = interval(self.tick_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "scheduler started (tick every {:?}, {} checks in flight max)",
            self.tick_interval,
            self.permits.available_permits()
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    info!("scheduler stopping, {} check(s) still in flight", self.flights.len());
                    break;
                }

                _ = timer.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// One due-scan. Never blocks on check I/O and never fails the
    /// process; a store error just means this tick is skipped.
    pub async fn tick(&self) {
        let monitors = match self.database.list_active_monitors().await {
            Ok(monitors) => monitors,
            Err(e) => {
                error!("due-scan failed, retrying next tick: {e}");
                return;
            }
        };

        let now = SystemTime::now();
        for monitor in monitors {
            if !monitor.is_due(now) {
                continue;
            }

            // Single-flight: a monitor with an outstanding check is
            // deferred to the next due evaluation, not queued
            let Some(guard) = self.flights.try_acquire(monitor.uuid) else {
                debug!("monitor {} still in flight, skipped this tick", monitor.uuid);
                continue;
            };

            let executor = Arc::clone(&self.executor);
            let recorder = Arc::clone(&self.recorder);
            let notifier = Arc::clone(&self.notifier);
            let permits = Arc::clone(&self.permits);

            tokio::spawn(async move {
                // Guard held while waiting for a permit, so a saturated
                // pool still serializes per-monitor checks
                let _guard = guard;
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };

                let prior = monitor.current_status;
                let outcome = executor.execute(&monitor).await;

                // Record before the flight slot is released (guard
                // drops at end of scope); checks for one monitor are
                // strictly serialized
                if let Err(e) = recorder.record(&monitor, &outcome).await {
                    error!("failed to record check for monitor {}: {e}", monitor.uuid);
                }

                notifier.handle_transition(&monitor, prior, outcome.status).await;
            });
        }
    }

    /// Number of checks currently holding a flight slot.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}
