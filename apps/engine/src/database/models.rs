use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::monitoring::types::MonitorStatus;

/// Monitor model - persisted configuration plus engine-owned live state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub id: Option<i64>,
    pub uuid: Uuid,
    /// Owning user; mutually exclusive with `group_id`
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub name: String,
    /// One of: http, https, ping, tcp, dns
    pub check_type: String,
    pub url: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub dns_record_type: Option<String>,
    pub method: String,
    /// Comma-separated codes/ranges counting as "up"; None means "200"
    pub accepted_status_codes: Option<String>,
    /// Seconds between checks, >= 1
    pub check_interval: u64,
    /// Probe deadline in seconds
    pub timeout: u64,
    pub notify_on_down: bool,
    pub notify_on_up: bool,
    pub active: bool,

    // Live state, written only by the engine
    pub current_status: MonitorStatus,
    pub last_check: Option<SystemTime>,
    pub last_up_time: Option<SystemTime>,
    pub last_down_time: Option<SystemTime>,
    /// Most recent response-time sample in milliseconds. The field keeps
    /// its historical name even though it is not a running average.
    pub avg_response_time: Option<u64>,
    /// Rolling 24h uptime, 0-100
    pub uptime_percentage: Option<f64>,

    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Monitor {
    /// Create a new monitor with engine defaults
    pub fn new(name: String, check_type: String) -> Self {
        let now = SystemTime::now();
        Self {
            id: None,
            uuid: Uuid::new_v4(),
            user_id: None,
            group_id: None,
            name,
            check_type,
            url: None,
            hostname: None,
            port: None,
            dns_record_type: None,
            method: "GET".to_string(),
            accepted_status_codes: None,
            check_interval: 60,
            timeout: 10,
            notify_on_down: true,
            notify_on_up: true,
            active: true,
            current_status: MonitorStatus::Unknown,
            last_check: None,
            last_up_time: None,
            last_down_time: None,
            avg_response_time: None,
            uptime_percentage: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Due predicate: never checked, or the interval has elapsed since
    /// the last check. Granularity is bounded by the scheduler tick.
    pub fn is_due(&self, now: SystemTime) -> bool {
        match self.last_check {
            None => true,
            Some(last) => now
                .duration_since(last)
                .map(|elapsed| elapsed.as_secs() >= self.check_interval)
                .unwrap_or(false),
        }
    }

    /// Convert SystemTime to Unix timestamp
    pub fn timestamp_to_i64(time: SystemTime) -> i64 {
        time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
    }

    /// Convert Unix timestamp to SystemTime
    pub fn i64_to_timestamp(timestamp: i64) -> SystemTime {
        UNIX_EPOCH + std::time::Duration::from_secs(timestamp as u64)
    }
}

/// One immutable history row as read back from the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRow {
    pub id: Option<i64>,
    pub monitor_uuid: Uuid,
    pub status: MonitorStatus,
    pub response_time: Option<u64>,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    pub checked_at: SystemTime,
}

/// Engine-owned live fields written after every completed check.
///
/// `None` optionals leave the stored value untouched so one UPDATE
/// statement covers all outcome shapes.
#[derive(Debug, Clone)]
pub struct LiveState {
    pub last_check: SystemTime,
    pub current_status: MonitorStatus,
    pub avg_response_time: Option<u64>,
    pub last_up_time: Option<SystemTime>,
    pub last_down_time: Option<SystemTime>,
    pub uptime_percentage: Option<f64>,
}

/// Push-notification endpoint owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub token: String,
    pub user_id: String,
    pub created_at: SystemTime,
}

impl Device {
    pub fn new(token: String, user_id: String) -> Self {
        Self { token, user_id, created_at: SystemTime::now() }
    }
}
