use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::MonitorStatus;
use crate::database::Database;
use crate::database::models::Monitor;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// What the transport reported back for one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The token is gone for good (gateway analogue of HTTP 410);
    /// the device record should be dropped
    PermanentlyInvalid,
}

/// A trait for delivering one push notification to one device token.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        payload: &Value,
    ) -> Result<Delivery, SenderError>;
}

/// Push delivery over an HTTP gateway
pub struct HttpPushSender {
    client: reqwest::Client,
    gateway_url: String,
    api_key: Option<String>,
}

impl HttpPushSender {
    pub fn new(gateway_url: String, api_key: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), gateway_url, api_key }
    }
}

#[async_trait]
impl PushSender for HttpPushSender {
    async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        payload: &Value,
    ) -> Result<Delivery, SenderError> {
        let mut request = self.client.post(&self.gateway_url).json(&json!({
            "token": token,
            "title": title,
            "body": body,
            "data": payload,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::GONE {
            return Ok(Delivery::PermanentlyInvalid);
        }
        if !status.is_success() {
            return Err(SenderError::SendFailed(format!(
                "push gateway returned {status}"
            )));
        }

        Ok(Delivery::Delivered)
    }
}

/// Whether a status change warrants an alert under the monitor's flags.
/// A first observation (`unknown -> x`) goes through the same flag
/// check as any other transition.
pub fn should_notify(
    prior: MonitorStatus,
    new: MonitorStatus,
    notify_on_down: bool,
    notify_on_up: bool,
) -> bool {
    if prior == new {
        return false;
    }
    match new {
        MonitorStatus::Down => notify_on_down,
        MonitorStatus::Up => notify_on_up,
        MonitorStatus::Unknown => false,
    }
}

/// Transition notifier - reacts to status changes by pushing alerts to
/// every device of the monitor's owning user
pub struct TransitionNotifier {
    database: Arc<dyn Database>,
    sender: Option<Arc<dyn PushSender>>,
}

impl TransitionNotifier {
    pub fn new(database: Arc<dyn Database>, sender: Option<Arc<dyn PushSender>>) -> Self {
        Self { database, sender }
    }

    /// Handle the transition from `prior` to `new` for one monitor.
    /// Never fails the check: every error path logs and returns.
    pub async fn handle_transition(
        &self,
        monitor: &Monitor,
        prior: MonitorStatus,
        new: MonitorStatus,
    ) {
        if !should_notify(prior, new, monitor.notify_on_down, monitor.notify_on_up) {
            return;
        }

        let Some(sender) = &self.sender else {
            debug!("push transport not configured, skipping alert for {}", monitor.uuid);
            return;
        };

        // Group-owned monitors carry no user id; there is nobody to page
        let Some(user_id) = monitor.user_id.as_deref() else {
            debug!("monitor {} has no owning user, skipping alert", monitor.uuid);
            return;
        };

        let devices = match self.database.list_devices_for_user(user_id).await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("device lookup failed for user {user_id}: {e}");
                return;
            }
        };
        if devices.is_empty() {
            return;
        }

        let (title, body) = alert_text(monitor, new);
        let payload = json!({
            "monitor_id": monitor.uuid,
            "monitor_name": monitor.name,
            "status": new.to_string(),
            "timestamp": chrono::Utc::now().timestamp(),
        });

        info!(
            "monitor {} transitioned {prior} -> {new}, alerting {} device(s)",
            monitor.uuid,
            devices.len()
        );

        // Deliveries are independent; one bad token must not block
        // the rest
        for device in devices {
            let shown = redact_token(&device.token);
            match sender.send(&device.token, &title, &body, &payload).await {
                Ok(Delivery::Delivered) => {
                    debug!("alert delivered to device {shown}");
                }
                Ok(Delivery::PermanentlyInvalid) => {
                    info!("device token {shown} reported gone, removing");
                    if let Err(e) = self.database.delete_device(&device.token).await {
                        warn!("failed to remove stale device {shown}: {e}");
                    }
                }
                Err(e) => {
                    warn!("alert delivery to device {shown} failed: {e}");
                }
            }
        }
    }
}

/// Device tokens are credentials; logs only ever see a short prefix.
fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    if prefix.len() < token.len() {
        format!("{prefix}…")
    } else {
        prefix
    }
}

fn alert_text(monitor: &Monitor, new: MonitorStatus) -> (String, String) {
    match new {
        MonitorStatus::Down => {
            ("🔴 Monitor Down".to_string(), format!("{} is down", monitor.name))
        }
        _ => ("🟢 Monitor Up".to_string(), format!("{} is back up", monitor.name)),
    }
}
