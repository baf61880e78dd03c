//! End-to-end flows over a scripted in-memory transport: frames pushed at
//! the wire boundary, state observed through the public session API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use smartcam_realtime::events::{invoke, push, ConnectionState, RawEvent};
use smartcam_realtime::hub_channel::transport::{
    HubConnection, HubSink, HubTransport, TransportSignal,
};
use smartcam_realtime::{Error, RealtimeConfig, RealtimeSession};

/// In-memory hub: scripts connection outcomes, records invocations, and
/// injects push frames
#[derive(Default)]
struct FakeHub {
    reject_next: AtomicUsize,
    connects: AtomicUsize,
    invocations: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
    frame_tx: Mutex<Option<mpsc::UnboundedSender<TransportSignal>>>,
}

impl FakeHub {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn reject_next_connects(&self, n: usize) {
        self.reject_next.store(n, Ordering::SeqCst);
    }

    fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn push_frame(&self, event_name: &str, payload: serde_json::Value) {
        let guard = self.frame_tx.lock().unwrap();
        let tx = guard.as_ref().expect("hub not connected");
        tx.send(TransportSignal::Frame(RawEvent {
            event_name: event_name.to_string(),
            payload,
        }))
        .expect("frame pump gone");
    }

    fn drop_connection(&self) {
        if let Some(tx) = self.frame_tx.lock().unwrap().take() {
            let _ = tx.send(TransportSignal::Closed);
        }
    }

    fn invocations_named(&self, method: &str) -> Vec<serde_json::Value> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, args)| args.clone())
            .collect()
    }
}

struct FakeSink {
    invocations: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

#[async_trait]
impl HubSink for FakeSink {
    async fn invoke(&self, method: &str, args: serde_json::Value) -> smartcam_realtime::Result<()> {
        self.invocations
            .lock()
            .unwrap()
            .push((method.to_string(), args));
        Ok(())
    }

    async fn close(&self) {}
}

#[async_trait]
impl HubTransport for FakeHub {
    async fn connect(&self, _credential: &str) -> smartcam_realtime::Result<HubConnection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.reject_next.load(Ordering::SeqCst) > 0 {
            self.reject_next.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Transport("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.frame_tx.lock().unwrap() = Some(tx);
        Ok(HubConnection {
            sink: Box::new(FakeSink {
                invocations: self.invocations.clone(),
            }),
            signals: rx,
        })
    }
}

fn detection_payload(camera_id: &str, count: u32, timestamp: &str) -> serde_json::Value {
    serde_json::json!({
        "cameraId": camera_id,
        "detections": [
            {
                "type": "person",
                "confidence": 0.93,
                "boundingBox": { "x": 12.0, "y": 8.0, "width": 40.0, "height": 90.0 }
            }
        ],
        "detectionCount": count,
        "timestamp": timestamp
    })
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test(start_paused = true)]
async fn detections_render_then_decay_after_the_window() {
    let hub = FakeHub::new();
    let session = RealtimeSession::new(&RealtimeConfig::default(), hub.clone());

    assert!(session.connect("token").await);
    session.watch_camera("cam1").await.unwrap();

    hub.push_frame(
        push::DETECTION_RESULT,
        detection_payload("cam1", 1, "2026-08-28T12:00:00Z"),
    );
    settle().await;

    let snapshot = session.detections().detections_for("cam1").unwrap();
    assert_eq!(snapshot.detections[0].detection_type, "person");
    assert!(session.detections().is_live("cam1"));

    tokio::time::sleep(Duration::from_millis(3_100)).await;

    assert!(session.detections().detections_for("cam1").is_none());
    assert!(!session.detections().is_live("cam1"));
    // Freshness outlives the boxes
    assert!(session.detections().latest_timestamp("cam1").is_some());
}

#[tokio::test(start_paused = true)]
async fn reconnect_restores_exactly_the_watched_groups() {
    let hub = FakeHub::new();
    let session = RealtimeSession::new(&RealtimeConfig::default(), hub.clone());

    assert!(session.connect("token").await);
    session.watch_camera("cam1").await.unwrap();
    session.watch_camera("cam2").await.unwrap();
    session.watch_camera("cam2").await.unwrap();
    session.unwatch_camera("cam1").await;

    hub.reject_next_connects(1);
    hub.drop_connection();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(session.state(), ConnectionState::Connected);
    assert_eq!(hub.connect_count(), 3);

    // cam1 was unwatched before the drop; only cam2 is re-joined
    let joins = hub.invocations_named(invoke::JOIN_CAMERA_GROUP);
    assert_eq!(joins, vec![
        serde_json::json!("cam1"),
        serde_json::json!("cam2"),
        serde_json::json!("cam2"),
    ]);

    // The restored connection still delivers
    hub.push_frame(
        push::DETECTION_RESULT,
        detection_payload("cam2", 4, "2026-08-28T12:01:00Z"),
    );
    settle().await;
    assert_eq!(session.detections().detections_for("cam2").unwrap().detection_count, 4);
}

#[tokio::test(start_paused = true)]
async fn watch_before_connect_fails_and_retry_joins_once() {
    let hub = FakeHub::new();
    let session = RealtimeSession::new(&RealtimeConfig::default(), hub.clone());

    let err = session.watch_camera("cam1").await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));
    assert!(session.watched_cameras().is_empty());

    assert!(session.connect("token").await);
    session.watch_camera("cam1").await.unwrap();

    assert_eq!(hub.invocations_named(invoke::JOIN_CAMERA_GROUP).len(), 1);
    assert_eq!(session.watched_cameras(), vec!["cam1"]);
}

#[tokio::test(start_paused = true)]
async fn alert_log_keeps_the_newest_ten_in_arrival_order() {
    let hub = FakeHub::new();
    let session = RealtimeSession::new(&RealtimeConfig::default(), hub.clone());
    assert!(session.connect("token").await);

    for i in 1..=11 {
        hub.push_frame(
            push::ALERT,
            serde_json::json!({"id": format!("a-{i}"), "message": "Motion detected"}),
        );
    }
    settle().await;

    let list = session.alerts().list();
    assert_eq!(list.len(), 10);
    assert_eq!(
        list.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
        (2..=11).map(|i| format!("a-{i}")).collect::<Vec<_>>()
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_after_reconnect_storm_leaves_a_quiet_session() {
    let hub = FakeHub::new();
    let session = RealtimeSession::new(&RealtimeConfig::default(), hub.clone());

    assert!(session.connect("token").await);
    session.watch_camera("cam1").await.unwrap();

    hub.reject_next_connects(usize::MAX);
    hub.drop_connection();
    settle().await;
    assert_eq!(session.state(), ConnectionState::Reconnecting);

    session.shutdown().await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(session.watched_cameras().is_empty());

    // No further dial attempts after teardown
    let attempts = hub.connect_count();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(hub.connect_count(), attempts);
}
