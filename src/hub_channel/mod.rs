//! HubChannel - Hub Connection Management
//!
//! ## Responsibilities
//!
//! - Owns the one logical connection to the AI results hub
//! - Connect/disconnect with an authentication credential
//! - Automatic reconnection with backoff on unexpected closure
//! - Raw frame handoff to a single dispatch hook
//!
//! HubChannel has no knowledge of camera or detection semantics; frame
//! contents are interpreted by the EventRouter. Transport failures never
//! cross this boundary as panics or errors - they surface only as
//! ConnectionState transitions.

pub mod transport;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::{ConnectionState, RawEvent};
use transport::{HubSink, HubTransport, TransportSignal};

/// Raw frame dispatch hook (consumed by the EventRouter)
pub type RawDispatch = Arc<dyn Fn(RawEvent) + Send + Sync>;

/// Hook invoked after a dropped connection has been re-established,
/// before any frame from the new connection is dispatched
pub type ReconnectedHook = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Default reconnect schedule: immediate, then 2s/10s/30s; the final delay
/// repeats until success or explicit disconnect
pub const DEFAULT_RECONNECT_DELAYS_MS: [u64; 4] = [0, 2_000, 10_000, 30_000];

struct Shared {
    transport: Arc<dyn HubTransport>,
    state_tx: watch::Sender<ConnectionState>,
    sink: RwLock<Option<Box<dyn HubSink>>>,
    dispatch: std::sync::RwLock<Option<RawDispatch>>,
    on_reconnected: std::sync::RwLock<Option<ReconnectedHook>>,
    credential: std::sync::Mutex<Option<String>>,
    /// Bumped on every explicit disconnect; stale pump/reconnect loops check
    /// it before touching shared state
    epoch: AtomicU64,
    reconnect_delays: Vec<Duration>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let prev = self.state_tx.send_replace(state);
        if prev != state {
            debug!(?prev, ?state, "Hub state transition");
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }
}

/// One logical connection to the push-event hub
pub struct HubChannel {
    shared: Arc<Shared>,
    pump: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl HubChannel {
    /// Create a channel over the given transport with the default reconnect
    /// schedule
    pub fn new(transport: Arc<dyn HubTransport>) -> Self {
        Self::with_reconnect_delays(
            transport,
            DEFAULT_RECONNECT_DELAYS_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }

    pub fn with_reconnect_delays(
        transport: Arc<dyn HubTransport>,
        reconnect_delays: Vec<Duration>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                transport,
                state_tx,
                sink: RwLock::new(None),
                dispatch: std::sync::RwLock::new(None),
                on_reconnected: std::sync::RwLock::new(None),
                credential: std::sync::Mutex::new(None),
                epoch: AtomicU64::new(0),
                reconnect_delays,
            }),
            pump: Mutex::new(None),
        }
    }

    /// Synchronous read of the current connection state
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Observe state transitions (UI connectivity indicator)
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Install the single raw-frame dispatch hook
    ///
    /// There is exactly one slot; reconnection reuses it, so handlers are
    /// never registered twice.
    pub fn set_dispatch(&self, hook: impl Fn(RawEvent) + Send + Sync + 'static) {
        *self.shared.dispatch.write().unwrap() = Some(Arc::new(hook));
    }

    /// Install the reconnected hook (group re-join)
    pub fn set_on_reconnected<F>(&self, hook: F)
    where
        F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        *self.shared.on_reconnected.write().unwrap() = Some(Arc::new(hook));
    }

    /// Establish the hub connection
    ///
    /// Fails closed: any transport or auth error leaves the channel
    /// Disconnected and returns false. Never panics across this boundary.
    pub async fn connect(&self, credential: &str) -> bool {
        match self.state() {
            ConnectionState::Disconnected => {}
            state => {
                warn!(?state, "connect() ignored - channel not idle");
                return state == ConnectionState::Connected;
            }
        }

        self.shared.set_state(ConnectionState::Connecting);
        *self.shared.credential.lock().unwrap() = Some(credential.to_string());

        match self.shared.transport.connect(credential).await {
            Ok(conn) => {
                let epoch = self.shared.epoch.load(Ordering::SeqCst);
                *self.shared.sink.write().await = Some(conn.sink);
                self.shared.set_state(ConnectionState::Connected);

                let handle = tokio::spawn(pump(self.shared.clone(), conn.signals, epoch));
                if let Some(old) = self.pump.lock().await.replace(handle) {
                    old.abort();
                }

                info!("Connected to hub");
                true
            }
            Err(e) => {
                warn!(error = %e, "Hub connection failed");
                self.shared.set_state(ConnectionState::Disconnected);
                false
            }
        }
    }

    /// Manual re-dial from Disconnected using the stored credential
    ///
    /// Returns false if the channel is not Disconnected or was explicitly
    /// disconnected (which clears the credential).
    pub async fn reconnect(&self) -> bool {
        if self.state() != ConnectionState::Disconnected {
            return false;
        }
        let credential = self.shared.credential.lock().unwrap().clone();
        match credential {
            Some(credential) => self.connect(&credential).await,
            None => false,
        }
    }

    /// Scoped teardown: stop the transport, clear the dispatch hook, state
    /// unconditionally Disconnected. Safe to call when already disconnected.
    pub async fn disconnect(&self) {
        let already_down =
            self.state() == ConnectionState::Disconnected && self.pump.lock().await.is_none();
        if already_down {
            return;
        }

        self.shared.set_state(ConnectionState::Disconnecting);
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);

        if let Some(handle) = self.pump.lock().await.take() {
            handle.abort();
        }
        if let Some(sink) = self.shared.sink.write().await.take() {
            sink.close().await;
        }
        *self.shared.dispatch.write().unwrap() = None;
        *self.shared.on_reconnected.write().unwrap() = None;
        *self.shared.credential.lock().unwrap() = None;

        self.shared.set_state(ConnectionState::Disconnected);
        info!("Disconnected from hub");
    }

    /// Best-effort remote invocation
    ///
    /// Fails with `NotConnected` rather than queuing; callers own the retry
    /// policy.
    pub async fn send(&self, method: &str, args: serde_json::Value) -> Result<()> {
        if self.state() != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        let sink = self.shared.sink.read().await;
        match sink.as_ref() {
            Some(sink) => sink.invoke(method, args).await,
            None => Err(Error::NotConnected),
        }
    }
}

/// Frame pump: runs for the lifetime of one connect() call, surviving
/// transport drops through the reconnect loop
async fn pump(
    shared: Arc<Shared>,
    mut signals: mpsc::UnboundedReceiver<TransportSignal>,
    epoch: u64,
) {
    loop {
        match signals.recv().await {
            Some(TransportSignal::Frame(raw)) => {
                let hook = shared.dispatch.read().unwrap().clone();
                if let Some(hook) = hook {
                    hook(raw);
                }
            }
            Some(TransportSignal::Closed) | None => {
                if shared.epoch.load(Ordering::SeqCst) != epoch {
                    // Explicit disconnect already tore things down
                    return;
                }
                warn!("Hub connection lost - reconnecting");
                shared.set_state(ConnectionState::Reconnecting);
                *shared.sink.write().await = None;

                match reconnect_with_backoff(&shared, epoch).await {
                    Some(new_signals) => {
                        signals = new_signals;
                        shared.set_state(ConnectionState::Connected);
                        info!("Hub connection re-established");

                        // Re-join hook runs before any frame from the new
                        // connection is dispatched
                        let hook = shared.on_reconnected.read().unwrap().clone();
                        if let Some(hook) = hook {
                            hook().await;
                        }
                    }
                    None => return,
                }
            }
        }
    }
}

/// Walk the backoff schedule until a connection is established or the epoch
/// changes (explicit disconnect). The final delay repeats indefinitely.
async fn reconnect_with_backoff(
    shared: &Arc<Shared>,
    epoch: u64,
) -> Option<mpsc::UnboundedReceiver<TransportSignal>> {
    let credential = shared.credential.lock().unwrap().clone()?;

    let mut attempt = 0usize;
    loop {
        let delay = shared
            .reconnect_delays
            .get(attempt)
            .or_else(|| shared.reconnect_delays.last())
            .copied()
            .unwrap_or(Duration::ZERO);
        tokio::time::sleep(delay).await;

        if shared.epoch.load(Ordering::SeqCst) != epoch {
            return None;
        }

        match shared.transport.connect(&credential).await {
            Ok(conn) => {
                if shared.epoch.load(Ordering::SeqCst) != epoch {
                    conn.sink.close().await;
                    return None;
                }
                *shared.sink.write().await = Some(conn.sink);
                return Some(conn.signals);
            }
            Err(e) => {
                warn!(error = %e, attempt = attempt + 1, "Reconnect attempt failed");
                attempt += 1;
            }
        }
    }
}
