//! Monitoring engine module - the core check pipeline
//!
//! This module is responsible for:
//! - Deciding which monitors are due (scheduler)
//! - Executing HTTP/HTTPS/TCP/DNS/ping probes (checker, executor)
//! - Recording results and rolling uptime (recorder)
//! - Alerting on status transitions (notifier)

pub mod checker;
pub mod executor;
pub mod notifier;
pub mod recorder;
pub mod scheduler;
pub mod single_flight;
pub mod status_codes;
pub mod types;

#[cfg(test)]
mod tests;

pub use executor::CheckExecutor;
pub use notifier::{HttpPushSender, PushSender, TransitionNotifier};
pub use recorder::ResultRecorder;
pub use scheduler::Scheduler;
pub use types::{CheckOutcome, CheckResult};
