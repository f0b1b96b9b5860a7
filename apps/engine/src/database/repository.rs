use anyhow::Result;
use async_trait::async_trait;
use libsql::{Row, params};
use uuid::Uuid;

use super::models::{CheckRow, Device, LiveState, Monitor};
use crate::monitoring::types::{CheckResult, MonitorStatus};
use crate::pool::LibsqlPool;
use crate::validation::validate_monitor;

/// Rolling window for uptime statistics, in seconds
const UPTIME_WINDOW_SECONDS: i64 = 24 * 3600;

/// Database trait for abstracting database operations
#[async_trait]
pub trait Database: Send + Sync {
    /// Get all monitors eligible for scheduling (`active = 1` only)
    async fn list_active_monitors(&self) -> Result<Vec<Monitor>>;

    /// Get a monitor by UUID
    async fn get_monitor_by_uuid(&self, uuid: Uuid) -> Result<Option<Monitor>>;

    /// Validate and save a monitor (insert or update by id)
    async fn save_monitor(&self, monitor: &Monitor) -> Result<i64>;

    /// Delete a monitor by UUID
    async fn delete_monitor(&self, uuid: Uuid) -> Result<()>;

    /// Append one immutable history row; `checked_at` is set at write time
    async fn insert_check_result(&self, result: &CheckResult) -> Result<i64>;

    /// Refresh a monitor's live fields. A vanished monitor is a no-op,
    /// not an error.
    async fn update_monitor_live_state(&self, uuid: Uuid, state: &LiveState) -> Result<()>;

    /// `(total, successful)` check counts over the trailing 24 hours
    async fn compute_24h_stats(&self, uuid: Uuid) -> Result<(u64, u64)>;

    /// Get recent history rows for a monitor, newest first
    async fn get_recent_results(&self, uuid: Uuid, limit: usize) -> Result<Vec<CheckRow>>;

    /// Register a notification device
    async fn save_device(&self, device: &Device) -> Result<()>;

    /// Get all notification devices registered by a user
    async fn list_devices_for_user(&self, user_id: &str) -> Result<Vec<Device>>;

    /// Remove a device token the transport reported as gone
    async fn delete_device(&self, token: &str) -> Result<()>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

const MONITOR_COLUMNS: &str = "id, uuid, user_id, group_id, name, check_type, url, hostname, \
     port, dns_record_type, method, accepted_status_codes, check_interval, timeout, \
     notify_on_down, notify_on_up, active, current_status, last_check, last_up_time, \
     last_down_time, avg_response_time, uptime_percentage, created_at, updated_at";

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    fn monitor_from_row(row: &Row) -> Result<Monitor> {
        let uuid_str: String = row.get(1)?;
        let status_str: String = row.get(17)?;

        Ok(Monitor {
            id: Some(row.get(0)?),
            uuid: Uuid::parse_str(&uuid_str)?,
            user_id: row.get(2)?,
            group_id: row.get(3)?,
            name: row.get(4)?,
            check_type: row.get(5)?,
            url: row.get(6)?,
            hostname: row.get(7)?,
            port: row.get::<Option<i64>>(8)?.map(|v| v as u16),
            dns_record_type: row.get(9)?,
            method: row.get(10)?,
            accepted_status_codes: row.get(11)?,
            check_interval: row.get::<i64>(12)? as u64,
            timeout: row.get::<i64>(13)? as u64,
            notify_on_down: row.get::<i64>(14)? != 0,
            notify_on_up: row.get::<i64>(15)? != 0,
            active: row.get::<i64>(16)? != 0,
            current_status: MonitorStatus::parse(&status_str),
            last_check: row.get::<Option<i64>>(18)?.map(Monitor::i64_to_timestamp),
            last_up_time: row.get::<Option<i64>>(19)?.map(Monitor::i64_to_timestamp),
            last_down_time: row.get::<Option<i64>>(20)?.map(Monitor::i64_to_timestamp),
            avg_response_time: row.get::<Option<i64>>(21)?.map(|v| v as u64),
            uptime_percentage: row.get(22)?,
            created_at: Monitor::i64_to_timestamp(row.get(23)?),
            updated_at: Monitor::i64_to_timestamp(row.get(24)?),
        })
    }
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn list_active_monitors(&self) -> Result<Vec<Monitor>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE active = 1"))
            .await?;

        let mut rows = stmt.query(()).await?;
        let mut monitors = Vec::new();

        while let Some(row) = rows.next().await? {
            monitors.push(Self::monitor_from_row(&row)?);
        }

        Ok(monitors)
    }

    async fn get_monitor_by_uuid(&self, uuid: Uuid) -> Result<Option<Monitor>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE uuid = ?"))
            .await?;

        let mut rows = stmt.query(params![uuid.to_string()]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::monitor_from_row(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn save_monitor(&self, monitor: &Monitor) -> Result<i64> {
        validate_monitor(monitor)?;

        let conn = self.get_conn().await?;
        let created_at = Monitor::timestamp_to_i64(monitor.created_at);
        let updated_at = Monitor::timestamp_to_i64(monitor.updated_at);

        if let Some(id) = monitor.id {
            // Update existing monitor
            conn.execute(
                "UPDATE monitors SET user_id = ?, group_id = ?, name = ?, check_type = ?, \
                 url = ?, hostname = ?, port = ?, dns_record_type = ?, method = ?, \
                 accepted_status_codes = ?, check_interval = ?, timeout = ?, \
                 notify_on_down = ?, notify_on_up = ?, active = ?, updated_at = ? WHERE id = ?",
                params![
                    monitor.user_id.clone(),
                    monitor.group_id.clone(),
                    monitor.name.clone(),
                    monitor.check_type.clone(),
                    monitor.url.clone(),
                    monitor.hostname.clone(),
                    monitor.port.map(|v| v as i64),
                    monitor.dns_record_type.clone(),
                    monitor.method.clone(),
                    monitor.accepted_status_codes.clone(),
                    monitor.check_interval as i64,
                    monitor.timeout as i64,
                    if monitor.notify_on_down { 1 } else { 0 },
                    if monitor.notify_on_up { 1 } else { 0 },
                    if monitor.active { 1 } else { 0 },
                    updated_at,
                    id
                ],
            )
            .await?;
            Ok(id)
        } else {
            // Insert new monitor
            conn.execute(
                "INSERT INTO monitors (uuid, user_id, group_id, name, check_type, url, \
                 hostname, port, dns_record_type, method, accepted_status_codes, \
                 check_interval, timeout, notify_on_down, notify_on_up, active, \
                 current_status, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    monitor.uuid.to_string(),
                    monitor.user_id.clone(),
                    monitor.group_id.clone(),
                    monitor.name.clone(),
                    monitor.check_type.clone(),
                    monitor.url.clone(),
                    monitor.hostname.clone(),
                    monitor.port.map(|v| v as i64),
                    monitor.dns_record_type.clone(),
                    monitor.method.clone(),
                    monitor.accepted_status_codes.clone(),
                    monitor.check_interval as i64,
                    monitor.timeout as i64,
                    if monitor.notify_on_down { 1 } else { 0 },
                    if monitor.notify_on_up { 1 } else { 0 },
                    if monitor.active { 1 } else { 0 },
                    monitor.current_status.to_string(),
                    created_at,
                    updated_at
                ],
            )
            .await?;

            Ok(conn.last_insert_rowid())
        }
    }

    async fn delete_monitor(&self, uuid: Uuid) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM monitors WHERE uuid = ?", params![uuid.to_string()])
            .await?;
        Ok(())
    }

    async fn insert_check_result(&self, result: &CheckResult) -> Result<i64> {
        let conn = self.get_conn().await?;
        let checked_at = Monitor::timestamp_to_i64(std::time::SystemTime::now());

        conn.execute(
            "INSERT INTO check_results (monitor_uuid, status, response_time, status_code, \
             error_message, checked_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                result.monitor_uuid.to_string(),
                result.status.to_string(),
                result.response_time.map(|v| v as i64),
                result.status_code.map(|v| v as i64),
                result.error_message.clone(),
                checked_at
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn update_monitor_live_state(&self, uuid: Uuid, state: &LiveState) -> Result<()> {
        let conn = self.get_conn().await?;
        let now = Monitor::timestamp_to_i64(std::time::SystemTime::now());

        // COALESCE keeps stored values for fields this check produced no
        // sample for (e.g. uptime when the 24h window is empty)
        let affected = conn
            .execute(
                "UPDATE monitors SET \
                 last_check = ?, \
                 current_status = ?, \
                 avg_response_time = COALESCE(?, avg_response_time), \
                 last_up_time = COALESCE(?, last_up_time), \
                 last_down_time = COALESCE(?, last_down_time), \
                 uptime_percentage = COALESCE(?, uptime_percentage), \
                 updated_at = ? \
                 WHERE uuid = ?",
                params![
                    Monitor::timestamp_to_i64(state.last_check),
                    state.current_status.to_string(),
                    state.avg_response_time.map(|v| v as i64),
                    state.last_up_time.map(Monitor::timestamp_to_i64),
                    state.last_down_time.map(Monitor::timestamp_to_i64),
                    state.uptime_percentage,
                    now,
                    uuid.to_string()
                ],
            )
            .await?;

        if affected == 0 {
            // Monitor deleted mid-check; its history row stays, the
            // live-state write is dropped
            tracing::debug!("live-state update for vanished monitor {} ignored", uuid);
        }

        Ok(())
    }

    async fn compute_24h_stats(&self, uuid: Uuid) -> Result<(u64, u64)> {
        let conn = self.get_conn().await?;
        let cutoff =
            Monitor::timestamp_to_i64(std::time::SystemTime::now()) - UPTIME_WINDOW_SECONDS;

        let mut rows = conn
            .query(
                "SELECT COUNT(*), SUM(CASE WHEN status = 'up' THEN 1 ELSE 0 END) \
                 FROM check_results WHERE monitor_uuid = ? AND checked_at >= ?",
                params![uuid.to_string(), cutoff],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            let total: i64 = row.get(0)?;
            let successful: Option<i64> = row.get(1)?;
            Ok((total as u64, successful.unwrap_or(0) as u64))
        } else {
            Ok((0, 0))
        }
    }

    async fn get_recent_results(&self, uuid: Uuid, limit: usize) -> Result<Vec<CheckRow>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(
                "SELECT id, monitor_uuid, status, response_time, status_code, error_message, \
                 checked_at FROM check_results WHERE monitor_uuid = ? \
                 ORDER BY checked_at DESC LIMIT ?",
            )
            .await?;

        let mut rows = stmt.query(params![uuid.to_string(), limit as i64]).await?;
        let mut results = Vec::new();

        while let Some(row) = rows.next().await? {
            let monitor_uuid_str: String = row.get(1)?;
            let status_str: String = row.get(2)?;

            results.push(CheckRow {
                id: Some(row.get(0)?),
                monitor_uuid: Uuid::parse_str(&monitor_uuid_str)?,
                status: MonitorStatus::parse(&status_str),
                response_time: row.get::<Option<i64>>(3)?.map(|v| v as u64),
                status_code: row.get::<Option<i64>>(4)?.map(|v| v as u16),
                error_message: row.get(5)?,
                checked_at: Monitor::i64_to_timestamp(row.get(6)?),
            });
        }

        Ok(results)
    }

    async fn save_device(&self, device: &Device) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT OR REPLACE INTO devices (token, user_id, created_at) VALUES (?, ?, ?)",
            params![
                device.token.clone(),
                device.user_id.clone(),
                Monitor::timestamp_to_i64(device.created_at)
            ],
        )
        .await?;
        Ok(())
    }

    async fn list_devices_for_user(&self, user_id: &str) -> Result<Vec<Device>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare("SELECT token, user_id, created_at FROM devices WHERE user_id = ?")
            .await?;

        let mut rows = stmt.query(params![user_id]).await?;
        let mut devices = Vec::new();

        while let Some(row) = rows.next().await? {
            devices.push(Device {
                token: row.get(0)?,
                user_id: row.get(1)?,
                created_at: Monitor::i64_to_timestamp(row.get(2)?),
            });
        }

        Ok(devices)
    }

    async fn delete_device(&self, token: &str) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM devices WHERE token = ?", params![token]).await?;
        Ok(())
    }
}
