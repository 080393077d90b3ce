//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the daemon can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP operations API.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Path of the backing store file.
    /// Env: `DATA_FILE`
    /// Default: the platform data directory.
    pub data_file: Option<PathBuf>,

    /// Chat that receives startup notices and delivery reports.
    /// Env: `OWNER_CHAT_ID`
    /// Default: none.
    pub owner_chat_id: Option<i64>,

    /// Channels a user must belong to before joining, comma-separated.
    /// Env: `REQUIRED_CHANNELS`
    /// Default: empty (no subscription requirement).
    pub required_channels: Vec<String>,

    /// Base URL of the membership service.  When unset, subscription
    /// checks pass unconditionally (development only).
    /// Env: `ORACLE_URL`
    pub oracle_url: Option<String>,

    /// Base URL of the notification delivery webhook.  When unset,
    /// notifications are logged and dropped.
    /// Env: `NOTIFY_URL`
    pub notify_url: Option<String>,

    /// Upper bound on a giveaway's winner count.
    /// Env: `MAX_WINNERS`
    /// Default: `10`
    pub max_winners: u32,

    /// Seconds a user must wait between joins.
    /// Env: `JOIN_COOLDOWN_SECS`
    /// Default: `300`
    pub join_cooldown_secs: u64,

    /// Period of the scheduler's reconciliation sweep, in seconds.
    /// Env: `SWEEP_INTERVAL_SECS`
    /// Default: `60`
    pub sweep_interval_secs: u64,

    /// Pause between individual winner notifications, in milliseconds.
    /// Env: `NOTIFY_PACING_MS`
    /// Default: `500`
    pub notify_pacing_ms: u64,

    /// Offset applied when rendering operator-facing times, in minutes
    /// east of UTC.
    /// Env: `DISPLAY_UTC_OFFSET_MINUTES`
    /// Default: `330` (UTC+05:30)
    pub display_offset_minutes: i32,

    /// Days of audit log history kept by the daily maintenance pass.
    /// Env: `LOG_RETENTION_DAYS`
    /// Default: `30`
    pub log_retention_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            data_file: None,
            owner_chat_id: None,
            required_channels: Vec::new(),
            oracle_url: None,
            notify_url: None,
            max_winners: 10,
            join_cooldown_secs: 300,
            sweep_interval_secs: 60,
            notify_pacing_ms: 500,
            display_offset_minutes: 330,
            log_retention_days: 30,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DATA_FILE") {
            config.data_file = Some(PathBuf::from(path));
        }

        if let Ok(val) = std::env::var("OWNER_CHAT_ID") {
            if let Ok(id) = val.parse::<i64>() {
                config.owner_chat_id = Some(id);
            } else {
                tracing::warn!(value = %val, "Invalid OWNER_CHAT_ID, ignoring");
            }
        }

        if let Ok(val) = std::env::var("REQUIRED_CHANNELS") {
            config.required_channels = parse_channel_list(&val);
        }

        if let Ok(url) = std::env::var("ORACLE_URL") {
            if !url.is_empty() {
                config.oracle_url = Some(url);
            }
        }

        if let Ok(url) = std::env::var("NOTIFY_URL") {
            if !url.is_empty() {
                config.notify_url = Some(url);
            }
        }

        if let Ok(val) = std::env::var("MAX_WINNERS") {
            if let Ok(n) = val.parse::<u32>() {
                config.max_winners = n;
            }
        }

        if let Ok(val) = std::env::var("JOIN_COOLDOWN_SECS") {
            if let Ok(n) = val.parse::<u64>() {
                config.join_cooldown_secs = n;
            }
        }

        if let Ok(val) = std::env::var("SWEEP_INTERVAL_SECS") {
            if let Ok(n) = val.parse::<u64>() {
                config.sweep_interval_secs = n;
            }
        }

        if let Ok(val) = std::env::var("NOTIFY_PACING_MS") {
            if let Ok(n) = val.parse::<u64>() {
                config.notify_pacing_ms = n;
            }
        }

        if let Ok(val) = std::env::var("DISPLAY_UTC_OFFSET_MINUTES") {
            if let Ok(n) = val.parse::<i32>() {
                config.display_offset_minutes = n;
            }
        }

        if let Ok(val) = std::env::var("LOG_RETENTION_DAYS") {
            if let Ok(n) = val.parse::<i64>() {
                config.log_retention_days = n;
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}

/// Split a comma-separated channel list, trimming blanks and any leading
/// `@` the operator typed out of platform habit.
fn parse_channel_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|c| c.trim().trim_start_matches('@').to_string())
        .filter(|c| !c.is_empty())
        .collect()
}
