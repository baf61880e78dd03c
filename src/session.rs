//! RealtimeSession - Component Wiring
//!
//! ## Responsibilities
//!
//! - Own one instance of each realtime component and wire them together
//! - Feed hub frames through the router into the store and alert log
//! - Re-join camera groups after a reconnect
//! - Ordered teardown: listeners, groups, timers, connection
//!
//! UI-facing code talks to the session; components never reach around it to
//! talk to each other directly. A session is single use: `shutdown()` is
//! terminal, and a later `connect()` is refused (teardown revokes the hub's
//! dispatch wiring, so a re-connected session would deliver frames to no
//! one). Build a fresh session instead.

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::{info, warn};

use crate::alert_log::{AlertLog, DEFAULT_ALERT_CAPACITY};
use crate::detection_store::{DetectionStore, DEFAULT_DECAY_WINDOW};
use crate::error::{Error, Result};
use crate::event_router::{EventRouter, Subscription};
use crate::events::ConnectionState;
use crate::group_membership::GroupMembership;
use crate::hub_channel::transport::{HubTransport, WebSocketTransport};
use crate::hub_channel::HubChannel;

/// Session configuration
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Hub endpoint, e.g. `wss://host/hubs/detections`
    pub hub_url: String,
    /// How long a camera's detections stay renderable without a fresh result
    pub decay_window: Duration,
    /// Alerts retained before the oldest is evicted
    pub alert_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            hub_url: "ws://localhost:5000/hubs/detections".to_string(),
            decay_window: DEFAULT_DECAY_WINDOW,
            alert_capacity: DEFAULT_ALERT_CAPACITY,
        }
    }
}

impl RealtimeConfig {
    /// Load from environment variables, falling back to defaults
    ///
    /// - `HUB_URL` (required)
    /// - `DETECTION_DECAY_MS`
    /// - `ALERT_CAPACITY`
    pub fn from_env() -> Result<Self> {
        let hub_url = env::var("HUB_URL")
            .map_err(|_| Error::Config("HUB_URL is not set".to_string()))?;
        let decay_window = env::var("DETECTION_DECAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DECAY_WINDOW);
        let alert_capacity = env::var("ALERT_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_ALERT_CAPACITY);

        Ok(Self {
            hub_url,
            decay_window,
            alert_capacity,
        })
    }
}

/// One dashboard session over one hub connection
pub struct RealtimeSession {
    hub: Arc<HubChannel>,
    router: Arc<EventRouter>,
    detections: Arc<DetectionStore>,
    alerts: Arc<AlertLog>,
    groups: Arc<GroupMembership>,
    /// Internal store/log feeds; revoked on shutdown
    feeds: Vec<Subscription>,
    /// Set by `shutdown()`; a closed session refuses to connect again
    closed: AtomicBool,
}

impl RealtimeSession {
    /// Build a session over the given transport
    pub fn new(config: &RealtimeConfig, transport: Arc<dyn HubTransport>) -> Self {
        let hub = Arc::new(HubChannel::new(transport));
        let router = Arc::new(EventRouter::new());
        let detections = DetectionStore::with_decay_window(config.decay_window);
        let alerts = Arc::new(AlertLog::with_capacity(config.alert_capacity));
        let groups = Arc::new(GroupMembership::new());

        // Every raw frame goes through the router
        let dispatch_router = router.clone();
        hub.set_dispatch(move |raw| dispatch_router.dispatch_raw(raw));

        // Router -> store/log feeds
        let store = detections.clone();
        let feed_detections = router.on_detection(move |event| store.apply(event.clone()));
        let log = alerts.clone();
        let feed_alerts = router.on_alert(move |event| {
            log.append(event.clone());
        });

        // Server-side groups do not survive a reconnect
        let rejoin_groups = groups.clone();
        let rejoin_hub: Weak<HubChannel> = Arc::downgrade(&hub);
        hub.set_on_reconnected(move || {
            let groups = rejoin_groups.clone();
            let hub = rejoin_hub.clone();
            Box::pin(async move {
                if let Some(hub) = hub.upgrade() {
                    groups.rejoin_all(&hub).await;
                }
            })
        });

        Self {
            hub,
            router,
            detections,
            alerts,
            groups,
            feeds: vec![feed_detections, feed_alerts],
            closed: AtomicBool::new(false),
        }
    }

    /// Build a session over the production WebSocket transport
    pub fn with_websocket(config: &RealtimeConfig) -> Self {
        let transport = Arc::new(WebSocketTransport::new(config.hub_url.clone()));
        Self::new(config, transport)
    }

    /// Establish the hub connection; false on any failure or after
    /// `shutdown()`
    pub async fn connect(&self, credential: &str) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            warn!("connect() refused - session already shut down");
            return false;
        }
        self.hub.connect(credential).await
    }

    /// Manual re-dial from Disconnected using the stored credential
    pub async fn reconnect(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.hub.reconnect().await
    }

    pub fn state(&self) -> ConnectionState {
        self.hub.state()
    }

    pub fn subscribe_state(&self) -> tokio::sync::watch::Receiver<ConnectionState> {
        self.hub.subscribe_state()
    }

    /// Start receiving detection results for a camera
    pub async fn watch_camera(&self, camera_id: &str) -> Result<()> {
        self.groups.join(&self.hub, camera_id).await
    }

    /// Stop receiving detection results for a camera (best effort)
    pub async fn unwatch_camera(&self, camera_id: &str) {
        self.groups.leave(&self.hub, camera_id).await
    }

    pub fn watched_cameras(&self) -> Vec<String> {
        self.groups.joined()
    }

    /// Typed event subscriptions for UI components
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn detections(&self) -> &DetectionStore {
        &self.detections
    }

    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    /// Tear the session down in dependency order: stop deliveries first,
    /// release server groups, drop timed state, then close the connection.
    /// Terminal: the session refuses to connect afterwards.
    pub async fn shutdown(&self) {
        info!("Realtime session shutting down");
        self.closed.store(true, Ordering::SeqCst);
        for feed in &self.feeds {
            feed.unsubscribe();
        }
        self.router.clear();
        self.groups.leave_all(&self.hub).await;
        self.detections.clear();
        self.alerts.clear();
        self.hub.disconnect().await;
    }
}
