//! Monitor validation applied at the write seam.
//!
//! The CRUD layer owns monitor editing, but every write funnels
//! through `save_monitor`, so malformed target configuration is
//! rejected here instead of surfacing as a down result at check time.

use anyhow::{Result, anyhow};
use url::Url;

use crate::database::models::Monitor;
use crate::monitoring::status_codes::parse_status_codes;

/// Validate a monitor's configuration before it is persisted
pub fn validate_monitor(monitor: &Monitor) -> Result<()> {
    if monitor.check_interval < 1 {
        return Err(anyhow!("check_interval must be at least 1 second"));
    }
    if monitor.timeout < 1 {
        return Err(anyhow!("timeout must be at least 1 second"));
    }
    if monitor.user_id.is_some() && monitor.group_id.is_some() {
        return Err(anyhow!("monitor cannot be owned by both a user and a group"));
    }

    match monitor.check_type.as_str() {
        "http" | "https" => validate_http_target(monitor),
        "tcp" => validate_tcp_target(monitor),
        "dns" | "ping" => validate_hostname_target(monitor),
        other => Err(anyhow!("Unsupported check type: {}", other)),
    }
}

/// Validate HTTP/HTTPS target and accepted-status-code spec
fn validate_http_target(monitor: &Monitor) -> Result<()> {
    let target = monitor
        .url
        .as_deref()
        .ok_or_else(|| anyhow!("HTTP monitor requires a URL"))?;

    let url = Url::parse(target).map_err(|e| anyhow!("Invalid URL: {}", e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Invalid scheme for HTTP monitor: {}", other)),
    }

    // Malformed specs are caught here, at creation time, not mid-check
    parse_status_codes(monitor.accepted_status_codes.as_deref())
        .map_err(|e| anyhow!("Invalid accepted status codes: {}", e))?;

    Ok(())
}

/// Validate TCP target
fn validate_tcp_target(monitor: &Monitor) -> Result<()> {
    let hostname = monitor
        .hostname
        .as_deref()
        .ok_or_else(|| anyhow!("TCP monitor requires a hostname"))?;

    if hostname.is_empty() {
        return Err(anyhow!("TCP monitor hostname cannot be empty"));
    }

    match monitor.port {
        Some(port) if port != 0 => Ok(()),
        Some(_) => Err(anyhow!("Invalid port number")),
        None => Err(anyhow!("TCP monitor requires a port")),
    }
}

/// Validate DNS/ping target
fn validate_hostname_target(monitor: &Monitor) -> Result<()> {
    match monitor.hostname.as_deref() {
        Some(hostname) if !hostname.is_empty() => Ok(()),
        _ => Err(anyhow!("{} monitor requires a hostname", monitor.check_type)),
    }
}
