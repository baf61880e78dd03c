//! EventRouter - Typed Event Distribution
//!
//! ## Responsibilities
//!
//! - Classify raw hub frames by event name into typed events
//! - Fan out each event to every registered listener of that type
//! - Isolate listener panics so one bad subscriber cannot break delivery
//!
//! Dispatch snapshots the listener set before iterating, so a listener may
//! subscribe or unsubscribe from inside its own callback without deadlock;
//! mutations made during a dispatch take effect from the next event.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::events::{push, AlertEvent, CameraStatusEvent, DetectionEvent, RawEvent};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by subscribe; revokes the listener on demand
///
/// Unsubscribing twice is a no-op, as is unsubscribing after the router has
/// been dropped. Dropping the handle without calling `unsubscribe` leaves the
/// listener registered.
pub struct Subscription {
    cancel: Box<dyn Fn() + Send + Sync>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        (self.cancel)();
    }
}

struct Registry<T> {
    listeners: Arc<Mutex<HashMap<u64, Listener<T>>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T: 'static> Registry<T> {
    fn subscribe(&self, id: u64, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.listeners
            .lock()
            .unwrap()
            .insert(id, Arc::new(listener));

        let weak: Weak<Mutex<HashMap<u64, Listener<T>>>> = Arc::downgrade(&self.listeners);
        Subscription {
            cancel: Box::new(move || {
                if let Some(listeners) = weak.upgrade() {
                    listeners.lock().unwrap().remove(&id);
                }
            }),
        }
    }

    /// Deliver one event to a snapshot of the current listeners
    fn dispatch(&self, event: &T) {
        let snapshot: Vec<Listener<T>> =
            self.listeners.lock().unwrap().values().cloned().collect();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!("Event listener panicked; continuing with remaining listeners");
            }
        }
    }

    fn clear(&self) {
        self.listeners.lock().unwrap().clear();
    }

    fn len(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

/// Typed fan-out hub for push events
#[derive(Default)]
pub struct EventRouter {
    next_id: AtomicU64,
    detections: Registry<DetectionEvent>,
    alerts: Registry<AlertEvent>,
    camera_status: Registry<CameraStatusEvent>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn on_detection(
        &self,
        listener: impl Fn(&DetectionEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.detections.subscribe(self.next_id(), listener)
    }

    pub fn on_alert(&self, listener: impl Fn(&AlertEvent) + Send + Sync + 'static) -> Subscription {
        self.alerts.subscribe(self.next_id(), listener)
    }

    pub fn on_camera_status(
        &self,
        listener: impl Fn(&CameraStatusEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.camera_status.subscribe(self.next_id(), listener)
    }

    /// Classify and deliver one raw frame
    ///
    /// Unknown event names and undecodable payloads are dropped with a log
    /// line; they never reach listeners.
    pub fn dispatch_raw(&self, raw: RawEvent) {
        match raw.event_name.as_str() {
            push::DETECTION_RESULT => match decode::<DetectionEvent>(raw.payload) {
                Ok(event) => self.detections.dispatch(&event),
                Err(e) => warn!(error = %e, "Undecodable detection payload dropped"),
            },
            push::ALERT => match decode::<AlertEvent>(raw.payload) {
                Ok(event) => self.alerts.dispatch(&event),
                Err(e) => warn!(error = %e, "Undecodable alert payload dropped"),
            },
            push::CAMERA_STATUS => match decode::<CameraStatusEvent>(raw.payload) {
                Ok(event) => self.camera_status.dispatch(&event),
                Err(e) => warn!(error = %e, "Undecodable camera status payload dropped"),
            },
            other => debug!(event_name = %other, "Unknown hub event dropped"),
        }
    }

    /// Drop every registered listener (session teardown)
    pub fn clear(&self) {
        self.detections.clear();
        self.alerts.clear();
        self.camera_status.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.detections.len() + self.alerts.len() + self.camera_status.len()
    }
}

/// Decode one payload into its typed event
fn decode<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T> {
    serde_json::from_value(payload).map_err(Error::from)
}
