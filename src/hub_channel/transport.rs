//! Hub transport seam
//!
//! HubChannel talks to the hub through these traits so tests (and any future
//! transport) can be substituted without touching the channel logic. The
//! production implementation dials a WebSocket and exchanges JSON frames of
//! the form `{"target": <eventName>, "arguments": [<payload>]}`.

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::events::RawEvent;

/// Signal from the transport read side
#[derive(Debug)]
pub enum TransportSignal {
    /// One decoded push frame
    Frame(RawEvent),
    /// The transport closed without an explicit disconnect
    Closed,
}

/// Write half of an established hub connection
#[async_trait]
pub trait HubSink: Send + Sync {
    /// Invoke a hub method (fire-and-forget)
    async fn invoke(&self, method: &str, args: serde_json::Value) -> Result<()>;

    /// Close the connection
    async fn close(&self);
}

/// An established hub connection
pub struct HubConnection {
    pub sink: Box<dyn HubSink>,
    pub signals: mpsc::UnboundedReceiver<TransportSignal>,
}

/// Transport factory: one call per (re)connection attempt
#[async_trait]
pub trait HubTransport: Send + Sync + 'static {
    async fn connect(&self, credential: &str) -> Result<HubConnection>;
}

/// WebSocket transport against the AI results hub
///
/// The credential is passed as an `access_token` query parameter at
/// handshake time; the hub accepts or rejects the upgrade based on it.
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl HubTransport for WebSocketTransport {
    async fn connect(&self, credential: &str) -> Result<HubConnection> {
        let url = format!("{}?access_token={}", self.url, credential);
        let (stream, response) =
            tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| match e {
                    tokio_tungstenite::tungstenite::Error::Http(resp)
                        if resp.status().as_u16() == 401 || resp.status().as_u16() == 403 =>
                    {
                        Error::Auth(format!("Handshake rejected: HTTP {}", resp.status()))
                    }
                    other => Error::Transport(other.to_string()),
                })?;

        debug!(status = %response.status(), "WebSocket handshake completed");

        let (write, mut read) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel();

        // Read pump: decode frames until the socket closes
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => match parse_frame(&text) {
                        Some(raw) => {
                            if tx.send(TransportSignal::Frame(raw)).is_err() {
                                // Receiver gone: channel torn down
                                return;
                            }
                        }
                        None => warn!(frame = %text, "Unparseable hub frame dropped"),
                    },
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            let _ = tx.send(TransportSignal::Closed);
        });

        Ok(HubConnection {
            sink: Box::new(WebSocketSink {
                write: Mutex::new(write),
            }),
            signals: rx,
        })
    }
}

struct WebSocketSink {
    write: Mutex<SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>>,
}

#[async_trait]
impl HubSink for WebSocketSink {
    async fn invoke(&self, method: &str, args: serde_json::Value) -> Result<()> {
        let frame = serde_json::json!({ "target": method, "arguments": [args] });
        let mut write = self.write.lock().await;
        write
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn close(&self) {
        let mut write = self.write.lock().await;
        let _ = write.send(Message::Close(None)).await;
    }
}

/// Decode one wire frame into a RawEvent
///
/// The payload is the first element of `arguments`; the hub sends exactly one
/// argument per push.
fn parse_frame(text: &str) -> Option<RawEvent> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let event_name = value.get("target")?.as_str()?.to_string();
    let payload = value
        .get("arguments")
        .and_then(|a| a.as_array())
        .and_then(|a| a.first())
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    Some(RawEvent {
        event_name,
        payload,
    })
}

/// Scripted in-memory transport for unit tests
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        reject_next: AtomicUsize,
        connects: AtomicUsize,
        invocations: Arc<StdMutex<Vec<(String, serde_json::Value)>>>,
        frame_tx: StdMutex<Option<mpsc::UnboundedSender<TransportSignal>>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Reject the next `n` connection attempts with a transport error
        pub fn reject_next_connects(&self, n: usize) {
            self.reject_next.store(n, Ordering::SeqCst);
        }

        pub fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        pub fn push_frame(&self, event_name: &str, payload: serde_json::Value) {
            let guard = self.frame_tx.lock().unwrap();
            let tx = guard.as_ref().expect("transport not connected");
            tx.send(TransportSignal::Frame(RawEvent {
                event_name: event_name.to_string(),
                payload,
            }))
            .expect("pump gone");
        }

        /// Simulate an unexpected connection drop
        pub fn drop_connection(&self) {
            if let Some(tx) = self.frame_tx.lock().unwrap().take() {
                let _ = tx.send(TransportSignal::Closed);
            }
        }

        pub fn invocations(&self) -> Vec<(String, serde_json::Value)> {
            self.invocations.lock().unwrap().clone()
        }
    }

    struct ScriptedSink {
        invocations: Arc<StdMutex<Vec<(String, serde_json::Value)>>>,
    }

    #[async_trait]
    impl HubSink for ScriptedSink {
        async fn invoke(&self, method: &str, args: serde_json::Value) -> Result<()> {
            self.invocations
                .lock()
                .unwrap()
                .push((method.to_string(), args));
            Ok(())
        }

        async fn close(&self) {}
    }

    #[async_trait]
    impl HubTransport for ScriptedTransport {
        async fn connect(&self, _credential: &str) -> Result<HubConnection> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.reject_next.load(Ordering::SeqCst) > 0 {
                self.reject_next.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::Transport("connection refused".to_string()));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            *self.frame_tx.lock().unwrap() = Some(tx);

            Ok(HubConnection {
                sink: Box::new(ScriptedSink {
                    invocations: self.invocations.clone(),
                }),
                signals: rx,
            })
        }
    }
}
