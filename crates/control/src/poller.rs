use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use complyze_core::Settings;
use tracing::{info, warn};

use crate::client::ControlPlaneClient;
use crate::models::HeartbeatRequest;

const SETTINGS_POLL_INTERVAL: Duration = Duration::from_secs(10);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Polls `GET /api/proxy/settings` every 10 s and swaps the shared snapshot
/// in on success. On failure the previous snapshot is left untouched —
/// `ArcSwap` makes "do nothing" the correct no-op here.
pub async fn run_settings_poller(client: Arc<ControlPlaneClient>, settings: Arc<ArcSwap<Settings>>) {
    let mut ticker = tokio::time::interval(SETTINGS_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        match client.pull_settings().await {
            Ok(fresh) => {
                settings.store(Arc::new(fresh));
            }
            Err(err) => {
                warn!(error = %err, "settings pull failed, retaining cached snapshot");
            }
        }
    }
}

/// Posts a heartbeat every 15 s. Never retried on failure; just logged.
pub async fn run_heartbeat(
    client: Arc<ControlPlaneClient>,
    device_id: String,
    hostname: String,
    workspace_id: String,
) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    loop {
        ticker.tick().await;
        let request = HeartbeatRequest {
            device_id: device_id.clone(),
            hostname: hostname.clone(),
            os: std::env::consts::OS.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "Healthy",
            workspace_id: workspace_id.clone(),
            service_connectivity: true,
            traffic_routing: true,
            os_integration: true,
        };
        match client.heartbeat(request).await {
            Ok(_) => info!("heartbeat acknowledged"),
            Err(err) => warn!(error = %err, "heartbeat failed"),
        }
    }
}
