use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Live status of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Unknown,
    Up,
    Down,
}

impl MonitorStatus {
    /// Parse a stored status string; anything unrecognized is Unknown
    pub fn parse(raw: &str) -> Self {
        match raw {
            "up" => MonitorStatus::Up,
            "down" => MonitorStatus::Down,
            _ => MonitorStatus::Unknown,
        }
    }
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorStatus::Unknown => write!(f, "unknown"),
            MonitorStatus::Up => write!(f, "up"),
            MonitorStatus::Down => write!(f, "down"),
        }
    }
}

/// Normalized outcome of one probe, protocol details erased
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub status: MonitorStatus,
    /// Wall-clock milliseconds to completion, when measurable
    pub response_time: Option<u64>,
    /// HTTP status code, HTTP/HTTPS probes only
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
}

impl CheckOutcome {
    /// Successful probe
    pub fn up(response_time: u64, status_code: Option<u16>) -> Self {
        Self {
            status: MonitorStatus::Up,
            response_time: Some(response_time),
            status_code,
            error_message: None,
        }
    }

    /// Failed probe with an explanatory message
    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: MonitorStatus::Down,
            response_time: None,
            status_code: None,
            error_message: Some(message.into()),
        }
    }

    /// Attach the elapsed time to a failed outcome
    pub fn with_response_time(mut self, response_time: u64) -> Self {
        self.response_time = Some(response_time);
        self
    }

    /// Attach the observed HTTP status code to a failed outcome
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }
}

/// One completed check, ready to append to history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub monitor_uuid: Uuid,
    pub status: MonitorStatus,
    pub response_time: Option<u64>,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
}

impl CheckResult {
    pub fn from_outcome(monitor_uuid: Uuid, outcome: &CheckOutcome) -> Self {
        Self {
            monitor_uuid,
            status: outcome.status,
            response_time: outcome.response_time,
            status_code: outcome.status_code,
            error_message: outcome.error_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_tolerates_unknown_strings() {
        assert_eq!(MonitorStatus::parse("up"), MonitorStatus::Up);
        assert_eq!(MonitorStatus::parse("down"), MonitorStatus::Down);
        assert_eq!(MonitorStatus::parse("degraded"), MonitorStatus::Unknown);
        assert_eq!(MonitorStatus::parse(""), MonitorStatus::Unknown);
    }

    #[test]
    fn down_outcome_keeps_elapsed_and_code() {
        let outcome = CheckOutcome::down("Status code 503 not accepted")
            .with_response_time(42)
            .with_status_code(503);
        assert_eq!(outcome.status, MonitorStatus::Down);
        assert_eq!(outcome.response_time, Some(42));
        assert_eq!(outcome.status_code, Some(503));
    }
}
