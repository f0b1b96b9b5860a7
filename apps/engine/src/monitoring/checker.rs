use anyhow::Result;
use async_trait::async_trait;
use rand::random;
use std::collections::HashSet;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::RecordType;
use surge_ping::{Config as PingConfig, ICMP, PingIdentifier, PingSequence};

use super::status_codes::parse_status_codes;
use super::types::CheckOutcome;
use crate::database::models::Monitor;

/// Redirects followed before an HTTP probe gives up
const MAX_REDIRECTS: usize = 5;

/// Checker trait for different types of monitoring checks.
///
/// A checker performs exactly one probe and normalizes every failure
/// mode into a [`CheckOutcome`]; probe failures are data, not errors.
#[async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, monitor: &Monitor) -> CheckOutcome;
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> Result<Self> {
        // Timeout is per-monitor, so it is applied per request rather
        // than on the shared client
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self { client })
    }
}

/// Classify an HTTP response code against the accepted set
fn status_outcome(code: u16, elapsed_ms: u64, accepted: &HashSet<u16>) -> CheckOutcome {
    if accepted.contains(&code) {
        CheckOutcome::up(elapsed_ms, Some(code))
    } else {
        CheckOutcome::down(format!("Status code {code} not in accepted set"))
            .with_response_time(elapsed_ms)
            .with_status_code(code)
    }
}

#[async_trait]
impl Checker for HttpChecker {
    async fn check(&self, monitor: &Monitor) -> CheckOutcome {
        let Some(url) = monitor.url.as_deref() else {
            return CheckOutcome::down("HTTP monitor has no URL configured");
        };

        let accepted = match parse_status_codes(monitor.accepted_status_codes.as_deref()) {
            Ok(set) => set,
            Err(e) => return CheckOutcome::down(format!("Invalid accepted status codes: {e}")),
        };

        let method = match reqwest::Method::from_bytes(monitor.method.as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                return CheckOutcome::down(format!("Invalid HTTP method: {}", monitor.method));
            }
        };

        let start = Instant::now();
        let response = self
            .client
            .request(method, url)
            .timeout(Duration::from_secs(monitor.timeout))
            .send()
            .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match response {
            Ok(response) => status_outcome(response.status().as_u16(), elapsed_ms, &accepted),
            Err(e) => CheckOutcome::down(format!("HTTP request failed: {e}")),
        }
    }
}

/// TCP port checker
pub struct TcpChecker;

#[async_trait]
impl Checker for TcpChecker {
    async fn check(&self, monitor: &Monitor) -> CheckOutcome {
        let (Some(hostname), Some(port)) = (monitor.hostname.as_deref(), monitor.port) else {
            return CheckOutcome::down("TCP monitor has no hostname/port configured");
        };

        let start = Instant::now();
        let connect = tokio::net::TcpStream::connect((hostname, port));

        match timeout(Duration::from_secs(monitor.timeout), connect).await {
            Ok(Ok(_stream)) => CheckOutcome::up(start.elapsed().as_millis() as u64, None),
            Ok(Err(e)) => CheckOutcome::down(format!("TCP connection failed: {e}"))
                .with_response_time(start.elapsed().as_millis() as u64),
            Err(_) => CheckOutcome::down("Connection timeout")
                .with_response_time(start.elapsed().as_millis() as u64),
        }
    }
}

/// DNS resolution checker
pub struct DnsChecker {
    resolver: TokioAsyncResolver,
}

impl DnsChecker {
    pub fn new() -> Self {
        let resolver =
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        Self { resolver }
    }
}

#[async_trait]
impl Checker for DnsChecker {
    async fn check(&self, monitor: &Monitor) -> CheckOutcome {
        let Some(hostname) = monitor.hostname.as_deref() else {
            return CheckOutcome::down("DNS monitor has no hostname configured");
        };

        let raw_type = monitor.dns_record_type.as_deref().unwrap_or("A");
        let record_type = match RecordType::from_str(&raw_type.to_uppercase()) {
            Ok(record_type) => record_type,
            Err(_) => {
                return CheckOutcome::down(format!("Unsupported DNS record type: {raw_type}"));
            }
        };

        let start = Instant::now();
        let lookup = self.resolver.lookup(hostname, record_type);

        // Any successful resolution counts as up, empty answers included
        match timeout(Duration::from_secs(monitor.timeout), lookup).await {
            Ok(Ok(_lookup)) => CheckOutcome::up(start.elapsed().as_millis() as u64, None),
            Ok(Err(e)) => CheckOutcome::down(format!("DNS resolution failed: {e}")),
            Err(_) => CheckOutcome::down("DNS resolution timeout"),
        }
    }
}

/// ICMP echo checker, native sockets instead of shelling out to ping.
/// Needs CAP_NET_RAW or unprivileged-ICMP sysctls; a socket setup
/// failure surfaces as a down outcome.
pub struct PingChecker;

impl PingChecker {
    async fn resolve(&self, hostname: &str, deadline: Duration) -> Result<IpAddr, String> {
        let lookup = tokio::net::lookup_host((hostname, 0u16));
        match timeout(deadline, lookup).await {
            Ok(Ok(mut addrs)) => addrs
                .next()
                .map(|addr| addr.ip())
                .ok_or_else(|| format!("Ping failed: no address for {hostname}")),
            Ok(Err(e)) => Err(format!("Ping failed: {e}")),
            Err(_) => Err(format!("Ping failed: resolving {hostname} timed out")),
        }
    }

    async fn probe(&self, hostname: &str, deadline: Duration) -> CheckOutcome {
        let ip = match self.resolve(hostname, deadline).await {
            Ok(ip) => ip,
            Err(message) => return CheckOutcome::down(message),
        };

        let config = match ip {
            IpAddr::V4(_) => PingConfig::default(),
            IpAddr::V6(_) => PingConfig::builder().kind(ICMP::V6).build(),
        };
        let client = match surge_ping::Client::new(&config) {
            Ok(client) => client,
            Err(e) => return CheckOutcome::down(format!("Ping failed: {e}")),
        };

        let mut pinger = client.pinger(ip, PingIdentifier(random())).await;
        pinger.timeout(deadline);

        match pinger.ping(PingSequence(0), &[]).await {
            Ok((_reply, round_trip)) => {
                CheckOutcome::up(round_trip.as_millis() as u64, None)
            }
            Err(e) => CheckOutcome::down(format!("Ping failed: {e}")),
        }
    }
}

#[async_trait]
impl Checker for PingChecker {
    async fn check(&self, monitor: &Monitor) -> CheckOutcome {
        let Some(hostname) = monitor.hostname.as_deref() else {
            return CheckOutcome::down("Ping monitor has no hostname configured");
        };

        // Resolution and echo share one deadline; the whole probe is
        // bounded by the monitor's timeout, not each stage separately
        let deadline = Duration::from_secs(monitor.timeout);
        match timeout(deadline, self.probe(hostname, deadline)).await {
            Ok(outcome) => outcome,
            Err(_) => CheckOutcome::down("Ping failed: timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::MonitorStatus;

    #[test]
    fn rejected_status_keeps_code_and_elapsed() {
        let accepted = parse_status_codes(Some("200-299")).unwrap();
        let outcome = status_outcome(503, 17, &accepted);
        assert_eq!(outcome.status, MonitorStatus::Down);
        assert_eq!(outcome.status_code, Some(503));
        assert_eq!(outcome.response_time, Some(17));
        assert!(outcome.error_message.unwrap().contains("503"));
    }

    #[test]
    fn accepted_status_is_up() {
        let accepted = parse_status_codes(Some("200-299")).unwrap();
        let outcome = status_outcome(204, 9, &accepted);
        assert_eq!(outcome.status, MonitorStatus::Up);
        assert_eq!(outcome.status_code, Some(204));
        assert!(outcome.error_message.is_none());
    }

    #[tokio::test]
    async fn tcp_checker_requires_target_fields() {
        let monitor = Monitor::new("partial".to_string(), "tcp".to_string());
        let outcome = TcpChecker.check(&monitor).await;
        assert_eq!(outcome.status, MonitorStatus::Down);
        assert!(outcome.error_message.unwrap().contains("hostname"));
    }

    #[tokio::test]
    async fn tcp_refused_connection_reports_elapsed() {
        let mut monitor = Monitor::new("refused".to_string(), "tcp".to_string());
        monitor.hostname = Some("127.0.0.1".to_string());
        // Reserved port that nothing listens on in the test environment
        monitor.port = Some(1);
        monitor.timeout = 2;

        let outcome = TcpChecker.check(&monitor).await;
        assert_eq!(outcome.status, MonitorStatus::Down);
        assert!(outcome.response_time.is_some());
    }

    #[tokio::test]
    async fn ping_check_is_bounded_by_a_single_timeout() {
        let mut monitor = Monitor::new("blackhole".to_string(), "ping".to_string());
        // TEST-NET-3 address, guaranteed not to answer echo requests
        monitor.hostname = Some("203.0.113.1".to_string());
        monitor.timeout = 1;

        let start = Instant::now();
        let outcome = PingChecker.check(&monitor).await;

        // Resolution plus echo must fit in one timeout budget, not one each
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(outcome.status, MonitorStatus::Down);
    }
}
