//! smartcam-monitor - Terminal Hub Monitor
//!
//! Connects to the AI results hub, watches the configured cameras, and logs
//! every detection, alert, and status push until interrupted. Intended for
//! backend debugging without the dashboard in front.
//!
//! Environment:
//! - `HUB_URL` (required), `HUB_TOKEN` (required)
//! - `CAMERA_IDS` - comma-separated camera ids to watch
//! - `DETECTION_DECAY_MS`, `ALERT_CAPACITY`, `RUST_LOG`

use std::env;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use smartcam_realtime::{RealtimeConfig, RealtimeSession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RealtimeConfig::from_env()?;
    let credential =
        env::var("HUB_TOKEN").map_err(|_| anyhow::anyhow!("HUB_TOKEN is not set"))?;
    let camera_ids: Vec<String> = env::var("CAMERA_IDS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    info!(hub_url = %config.hub_url, cameras = camera_ids.len(), "Starting hub monitor");

    let session = RealtimeSession::with_websocket(&config);
    if !session.connect(&credential).await {
        anyhow::bail!("could not connect to {}", config.hub_url);
    }

    for camera_id in &camera_ids {
        if let Err(e) = session.watch_camera(camera_id).await {
            warn!(camera_id = %camera_id, error = %e, "Could not watch camera");
        }
    }

    let _detections = session.router().on_detection(|event| {
        info!(
            camera_id = %event.camera_id,
            count = event.detection_count,
            timestamp = %event.timestamp,
            "Detection result"
        );
    });
    let _alerts = session.router().on_alert(|event| {
        info!(
            id = ?event.id,
            message = ?event.message,
            "Alert"
        );
    });
    let _status = session.router().on_camera_status(|event| {
        info!(camera_id = %event.camera_id, status = %event.status, "Camera status");
    });

    // Log connectivity transitions while we wait
    let mut state_rx = session.subscribe_state();
    let watcher = tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = *state_rx.borrow();
            info!(?state, "Connection state changed");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Interrupted - shutting down");
    session.shutdown().await;
    watcher.abort();
    Ok(())
}
