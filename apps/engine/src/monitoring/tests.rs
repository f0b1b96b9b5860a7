/// Integration tests for the check pipeline
///
/// These tests verify end-to-end functionality of:
/// - Result recording (history append → live-state refresh → uptime)
/// - The persistence contract edge cases (vanished monitor, inactive
///   monitors, 24h stats)
/// - Transition notification against a fake push transport
use crate::database::models::{CheckRow, Device, LiveState, Monitor};
use crate::database::{Database, DatabaseImpl};
use crate::monitoring::executor::CheckExecutor;
use crate::monitoring::notifier::{Delivery, PushSender, SenderError, TransitionNotifier};
use crate::monitoring::recorder::ResultRecorder;
use crate::monitoring::scheduler::Scheduler;
use crate::monitoring::types::{CheckOutcome, CheckResult, MonitorStatus};
use crate::pool::{LibsqlManager, LibsqlPool};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::{TempDir, tempdir};
use uuid::Uuid;

/// Helper to create test database pool. The TempDir must stay alive
/// for as long as the pool is used.
async fn create_test_database() -> Result<(TempDir, Arc<dyn Database>)> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("test.db");

    let db = libsql::Builder::new_local(&db_path).build().await?;
    let manager = LibsqlManager::new(db);
    let pool: LibsqlPool = deadpool::managed::Pool::builder(manager)
        .config(deadpool::managed::PoolConfig::default())
        .build()?;

    // Initialize schema
    let conn = pool.get().await?;
    crate::database::initialize_database(&conn).await?;
    drop(conn);

    Ok((temp_dir, Arc::new(DatabaseImpl::new_from_pool(pool))))
}

fn http_monitor(name: &str) -> Monitor {
    let mut monitor = Monitor::new(name.to_string(), "https".to_string());
    monitor.url = Some(format!("https://{name}.example.com"));
    monitor
}

/// Fake transport that records every delivery attempt and reports the
/// configured tokens as permanently invalid
struct RecordingSender {
    sent: Mutex<Vec<String>>,
    invalid_tokens: HashSet<String>,
}

impl RecordingSender {
    fn new(invalid_tokens: impl IntoIterator<Item = &'static str>) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            invalid_tokens: invalid_tokens.into_iter().map(String::from).collect(),
        })
    }

    fn sent_tokens(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushSender for RecordingSender {
    async fn send(
        &self,
        token: &str,
        _title: &str,
        _body: &str,
        _payload: &Value,
    ) -> Result<Delivery, SenderError> {
        self.sent.lock().unwrap().push(token.to_string());
        if self.invalid_tokens.contains(token) {
            Ok(Delivery::PermanentlyInvalid)
        } else {
            Ok(Delivery::Delivered)
        }
    }
}

/// Store wrapper that stalls history writes, keeping the check
/// pipeline open long enough for another tick to observe it
struct SlowWriteDatabase {
    inner: Arc<dyn Database>,
}

#[async_trait]
impl Database for SlowWriteDatabase {
    async fn list_active_monitors(&self) -> Result<Vec<Monitor>> {
        self.inner.list_active_monitors().await
    }

    async fn get_monitor_by_uuid(&self, uuid: Uuid) -> Result<Option<Monitor>> {
        self.inner.get_monitor_by_uuid(uuid).await
    }

    async fn save_monitor(&self, monitor: &Monitor) -> Result<i64> {
        self.inner.save_monitor(monitor).await
    }

    async fn delete_monitor(&self, uuid: Uuid) -> Result<()> {
        self.inner.delete_monitor(uuid).await
    }

    async fn insert_check_result(&self, result: &CheckResult) -> Result<i64> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.inner.insert_check_result(result).await
    }

    async fn update_monitor_live_state(&self, uuid: Uuid, state: &LiveState) -> Result<()> {
        self.inner.update_monitor_live_state(uuid, state).await
    }

    async fn compute_24h_stats(&self, uuid: Uuid) -> Result<(u64, u64)> {
        self.inner.compute_24h_stats(uuid).await
    }

    async fn get_recent_results(&self, uuid: Uuid, limit: usize) -> Result<Vec<CheckRow>> {
        self.inner.get_recent_results(uuid, limit).await
    }

    async fn save_device(&self, device: &Device) -> Result<()> {
        self.inner.save_device(device).await
    }

    async fn list_devices_for_user(&self, user_id: &str) -> Result<Vec<Device>> {
        self.inner.list_devices_for_user(user_id).await
    }

    async fn delete_device(&self, token: &str) -> Result<()> {
        self.inner.delete_device(token).await
    }
}

#[tokio::test]
async fn test_tick_skips_monitor_with_outstanding_check() -> Result<()> {
    let (_dir, inner) = create_test_database().await?;

    // Local refused port: the check itself is instant, the stalled
    // history write is what holds the flight slot open
    let mut monitor = Monitor::new("serialized".to_string(), "tcp".to_string());
    monitor.hostname = Some("127.0.0.1".to_string());
    monitor.port = Some(1);
    monitor.timeout = 2;
    inner.save_monitor(&monitor).await?;

    let slow: Arc<dyn Database> = Arc::new(SlowWriteDatabase { inner: Arc::clone(&inner) });
    let scheduler = Scheduler::new(
        Arc::clone(&slow),
        Arc::new(CheckExecutor::new()?),
        Arc::new(ResultRecorder::new(Arc::clone(&slow))),
        Arc::new(TransitionNotifier::new(Arc::clone(&slow), None)),
        Duration::from_secs(60),
        4,
    );

    scheduler.tick().await;
    assert_eq!(scheduler.in_flight(), 1);

    // The monitor is still due (last_check has not been written yet),
    // but the outstanding flight must keep a second check from starting
    scheduler.tick().await;
    assert_eq!(scheduler.in_flight(), 1);

    for _ in 0..100 {
        if scheduler.in_flight() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(scheduler.in_flight(), 0);

    // Exactly one history row for the two ticks
    let history = inner.get_recent_results(monitor.uuid, 10).await?;
    assert_eq!(history.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_inactive_monitors_are_never_scanned() -> Result<()> {
    let (_dir, database) = create_test_database().await?;

    let mut active = http_monitor("active");
    active.last_check = None;
    database.save_monitor(&active).await?;

    let mut inactive = http_monitor("inactive");
    inactive.active = false;
    database.save_monitor(&inactive).await?;

    let scanned = database.list_active_monitors().await?;
    assert_eq!(scanned.len(), 1);
    assert_eq!(scanned[0].name, "active");

    Ok(())
}

#[tokio::test]
async fn test_recorder_appends_history_and_refreshes_live_state() -> Result<()> {
    let (_dir, database) = create_test_database().await?;
    let recorder = ResultRecorder::new(Arc::clone(&database));

    let monitor = http_monitor("api");
    database.save_monitor(&monitor).await?;

    let outcome = CheckOutcome::up(120, Some(200));
    recorder.record(&monitor, &outcome).await?;

    let stored = database.get_monitor_by_uuid(monitor.uuid).await?.unwrap();
    assert_eq!(stored.current_status, MonitorStatus::Up);
    assert!(stored.last_check.is_some());
    assert!(stored.last_up_time.is_some());
    assert!(stored.last_down_time.is_none());
    assert_eq!(stored.avg_response_time, Some(120));
    assert_eq!(stored.uptime_percentage, Some(100.0));

    let history = database.get_recent_results(monitor.uuid, 10).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, MonitorStatus::Up);
    assert_eq!(history[0].status_code, Some(200));

    Ok(())
}

#[tokio::test]
async fn test_down_outcome_is_recorded_with_error_message() -> Result<()> {
    let (_dir, database) = create_test_database().await?;
    let recorder = ResultRecorder::new(Arc::clone(&database));

    let monitor = http_monitor("flaky");
    database.save_monitor(&monitor).await?;

    let outcome = CheckOutcome::down("Status code 503 not in accepted set")
        .with_response_time(45)
        .with_status_code(503);
    recorder.record(&monitor, &outcome).await?;

    let stored = database.get_monitor_by_uuid(monitor.uuid).await?.unwrap();
    assert_eq!(stored.current_status, MonitorStatus::Down);
    assert!(stored.last_down_time.is_some());
    assert_eq!(stored.uptime_percentage, Some(0.0));

    let history = database.get_recent_results(monitor.uuid, 10).await?;
    assert_eq!(history[0].status_code, Some(503));
    assert_eq!(
        history[0].error_message.as_deref(),
        Some("Status code 503 not in accepted set")
    );

    Ok(())
}

#[tokio::test]
async fn test_24h_stats_count_up_share() -> Result<()> {
    let (_dir, database) = create_test_database().await?;

    let monitor = http_monitor("stats");
    database.save_monitor(&monitor).await?;

    for i in 0..10 {
        let outcome = if i < 8 {
            CheckOutcome::up(100, Some(200))
        } else {
            CheckOutcome::down("Connection timeout")
        };
        database
            .insert_check_result(&CheckResult::from_outcome(monitor.uuid, &outcome))
            .await?;
    }

    let (total, successful) = database.compute_24h_stats(monitor.uuid).await?;
    assert_eq!((total, successful), (10, 8));

    // Another monitor's history must not bleed in
    let (other_total, _) = database.compute_24h_stats(Uuid::new_v4()).await?;
    assert_eq!(other_total, 0);

    Ok(())
}

#[tokio::test]
async fn test_live_state_update_for_vanished_monitor_is_noop() -> Result<()> {
    let (_dir, database) = create_test_database().await?;

    let state = LiveState {
        last_check: SystemTime::now(),
        current_status: MonitorStatus::Up,
        avg_response_time: Some(10),
        last_up_time: Some(SystemTime::now()),
        last_down_time: None,
        uptime_percentage: Some(100.0),
    };

    // Monitor was never created (or was deleted mid-check)
    database.update_monitor_live_state(Uuid::new_v4(), &state).await?;

    Ok(())
}

#[tokio::test]
async fn test_empty_window_leaves_uptime_untouched() -> Result<()> {
    let (_dir, database) = create_test_database().await?;

    let monitor = http_monitor("preset");
    database.save_monitor(&monitor).await?;

    // Seed a stored uptime, then write live state without one
    let seeded = LiveState {
        last_check: SystemTime::now(),
        current_status: MonitorStatus::Up,
        avg_response_time: None,
        last_up_time: None,
        last_down_time: None,
        uptime_percentage: Some(55.5),
    };
    database.update_monitor_live_state(monitor.uuid, &seeded).await?;

    let without_uptime = LiveState { uptime_percentage: None, ..seeded };
    database.update_monitor_live_state(monitor.uuid, &without_uptime).await?;

    let stored = database.get_monitor_by_uuid(monitor.uuid).await?.unwrap();
    assert_eq!(stored.uptime_percentage, Some(55.5));

    Ok(())
}

#[tokio::test]
async fn test_notification_fires_once_per_device() -> Result<()> {
    let (_dir, database) = create_test_database().await?;

    let mut monitor = http_monitor("paged");
    monitor.user_id = Some("user-1".to_string());
    database.save_monitor(&monitor).await?;
    database.save_device(&Device::new("token-a".to_string(), "user-1".to_string())).await?;
    database.save_device(&Device::new("token-b".to_string(), "user-1".to_string())).await?;

    let sender = RecordingSender::new([]);
    let transport: Arc<dyn PushSender> = sender.clone();
    let notifier = TransitionNotifier::new(Arc::clone(&database), Some(transport));

    notifier
        .handle_transition(&monitor, MonitorStatus::Up, MonitorStatus::Down)
        .await;

    let mut sent = sender.sent_tokens();
    sent.sort();
    assert_eq!(sent, vec!["token-a".to_string(), "token-b".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_notify_flag_suppresses_alert() -> Result<()> {
    let (_dir, database) = create_test_database().await?;

    let mut monitor = http_monitor("silent");
    monitor.user_id = Some("user-1".to_string());
    monitor.notify_on_down = false;
    database.save_monitor(&monitor).await?;
    database.save_device(&Device::new("token-a".to_string(), "user-1".to_string())).await?;

    let sender = RecordingSender::new([]);
    let transport: Arc<dyn PushSender> = sender.clone();
    let notifier = TransitionNotifier::new(Arc::clone(&database), Some(transport));

    notifier
        .handle_transition(&monitor, MonitorStatus::Up, MonitorStatus::Down)
        .await;
    assert!(sender.sent_tokens().is_empty());

    // Unchanged status never alerts, whatever the flags say
    notifier
        .handle_transition(&monitor, MonitorStatus::Down, MonitorStatus::Down)
        .await;
    assert!(sender.sent_tokens().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_invalid_token_is_removed_and_siblings_still_delivered() -> Result<()> {
    let (_dir, database) = create_test_database().await?;

    let mut monitor = http_monitor("cleanup");
    monitor.user_id = Some("user-1".to_string());
    database.save_monitor(&monitor).await?;
    database.save_device(&Device::new("stale".to_string(), "user-1".to_string())).await?;
    database.save_device(&Device::new("fresh".to_string(), "user-1".to_string())).await?;

    let sender = RecordingSender::new(["stale"]);
    let transport: Arc<dyn PushSender> = sender.clone();
    let notifier = TransitionNotifier::new(Arc::clone(&database), Some(transport));

    notifier
        .handle_transition(&monitor, MonitorStatus::Up, MonitorStatus::Down)
        .await;

    // Both devices saw a delivery attempt
    assert_eq!(sender.sent_tokens().len(), 2);

    // The invalid one is gone from the store
    let remaining = database.list_devices_for_user("user-1").await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].token, "fresh");

    Ok(())
}

#[tokio::test]
async fn test_unconfigured_transport_is_a_noop() -> Result<()> {
    let (_dir, database) = create_test_database().await?;

    let mut monitor = http_monitor("quiet");
    monitor.user_id = Some("user-1".to_string());
    database.save_monitor(&monitor).await?;

    let notifier = TransitionNotifier::new(Arc::clone(&database), None);
    notifier
        .handle_transition(&monitor, MonitorStatus::Up, MonitorStatus::Down)
        .await;

    Ok(())
}

#[tokio::test]
async fn test_user_without_devices_is_skipped_silently() -> Result<()> {
    let (_dir, database) = create_test_database().await?;

    let mut monitor = http_monitor("no-devices");
    monitor.user_id = Some("user-without-devices".to_string());
    database.save_monitor(&monitor).await?;

    let sender = RecordingSender::new([]);
    let transport: Arc<dyn PushSender> = sender.clone();
    let notifier = TransitionNotifier::new(Arc::clone(&database), Some(transport));

    notifier
        .handle_transition(&monitor, MonitorStatus::Up, MonitorStatus::Down)
        .await;
    assert!(sender.sent_tokens().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_save_monitor_rejects_invalid_configuration() -> Result<()> {
    let (_dir, database) = create_test_database().await?;

    let mut monitor = http_monitor("bad-spec");
    monitor.accepted_status_codes = Some("not-a-code".to_string());
    assert!(database.save_monitor(&monitor).await.is_err());

    let unsupported = Monitor::new("odd".to_string(), "gopher".to_string());
    assert!(database.save_monitor(&unsupported).await.is_err());

    Ok(())
}
