use anyhow::Result;

use super::checker::{Checker, DnsChecker, HttpChecker, PingChecker, TcpChecker};
use super::types::CheckOutcome;
use crate::database::models::Monitor;

/// Check executor - routes a monitor to its protocol checker
pub struct CheckExecutor {
    http_checker: HttpChecker,
    tcp_checker: TcpChecker,
    dns_checker: DnsChecker,
    ping_checker: PingChecker,
}

impl CheckExecutor {
    /// Create a new check executor
    pub fn new() -> Result<Self> {
        Ok(Self {
            http_checker: HttpChecker::new()?,
            tcp_checker: TcpChecker,
            dns_checker: DnsChecker::new(),
            ping_checker: PingChecker,
        })
    }

    /// Execute exactly one probe for one monitor
    pub async fn execute(&self, monitor: &Monitor) -> CheckOutcome {
        let checker: &dyn Checker = match monitor.check_type.as_str() {
            "http" | "https" => &self.http_checker,
            "tcp" => &self.tcp_checker,
            "dns" => &self.dns_checker,
            "ping" => &self.ping_checker,
            other => {
                return CheckOutcome::down(format!("Unsupported monitor type: {other}"));
            }
        };

        checker.check(monitor).await
    }
}
