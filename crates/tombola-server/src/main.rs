//! # tombola-server
//!
//! Owning process for the giveaway engine:
//! - opens the document **store** and runs startup recovery
//! - drives the **scheduler** (end timers + reconciliation sweep)
//! - exposes the **operations API** (axum) that frontends call
//! - bridges to the platform through outbound HTTP **adapters**
//!   (membership oracle, notification webhook)

mod adapters;
mod api;
mod config;
mod error;

use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tombola_engine::{
    clock, GiveawayScheduler, GiveawayService, SchedulerOptions, ServiceOptions,
    SubscriptionOracle, ValidationGate,
};
use tombola_store::Store;

use crate::adapters::{AllowAllOracle, HttpSubscriptionOracle, WebhookNotifier};
use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tombola_server=debug")),
        )
        .init();

    info!("Starting tombola server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = Arc::new(ServerConfig::from_env());
    info!(
        http = %config.http_addr,
        required_channels = config.required_channels.len(),
        oracle = config.oracle_url.is_some(),
        notify = config.notify_url.is_some(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Open the store
    // -----------------------------------------------------------------------
    let store = match &config.data_file {
        Some(path) => Store::open_at(path)?,
        None => Store::open_default()?,
    };

    // -----------------------------------------------------------------------
    // 4. Build adapters
    // -----------------------------------------------------------------------
    let oracle: Arc<dyn SubscriptionOracle> = match &config.oracle_url {
        Some(url) => Arc::new(HttpSubscriptionOracle::new(url.clone())),
        None => {
            if !config.required_channels.is_empty() {
                warn!("REQUIRED_CHANNELS set without ORACLE_URL; subscription checks will pass unconditionally");
            }
            Arc::new(AllowAllOracle)
        }
    };
    let sink = Arc::new(WebhookNotifier::new(config.notify_url.clone()));

    let display_offset = FixedOffset::east_opt(config.display_offset_minutes * 60)
        .unwrap_or_else(clock::default_display_offset);

    // -----------------------------------------------------------------------
    // 5. Start the scheduler (boot recovery + reconciliation sweep)
    // -----------------------------------------------------------------------
    let scheduler = GiveawayScheduler::new(
        store.clone(),
        sink,
        SchedulerOptions {
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            notify_pacing: Duration::from_millis(config.notify_pacing_ms),
            owner_chat: config.owner_chat_id,
            display_offset,
        },
    );
    scheduler.start().await?;
    scheduler.send_startup_notice().await;

    // -----------------------------------------------------------------------
    // 6. Wire the operations surface
    // -----------------------------------------------------------------------
    let gate = ValidationGate::new(
        store.clone(),
        oracle,
        config.required_channels.clone(),
    );
    let service = Arc::new(GiveawayService::new(
        store.clone(),
        scheduler.clone(),
        gate,
        ServiceOptions {
            max_winners: config.max_winners,
            join_cooldown: chrono::Duration::seconds(config.join_cooldown_secs as i64),
        },
    ));

    let state = AppState {
        store: store.clone(),
        service,
        config: config.clone(),
    };

    // -----------------------------------------------------------------------
    // 7. Daily housekeeping: expired cooldowns and old audit logs
    // -----------------------------------------------------------------------
    let maintenance_store = store.clone();
    let retention = chrono::Duration::days(config.log_retention_days);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
        loop {
            interval.tick().await;
            match maintenance_store.run_maintenance(retention).await {
                Ok(report) => info!(
                    cooldowns = report.cooldowns_evicted,
                    logs = report.logs_pruned,
                    "maintenance pass complete"
                ),
                Err(e) => warn!(error = %e, "maintenance pass failed"),
            }
        }
    });

    // -----------------------------------------------------------------------
    // 8. Serve until shutdown
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                scheduler.shutdown().await?;
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    scheduler.shutdown().await?;
    Ok(())
}
