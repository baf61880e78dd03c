//! DetectionStore - Per-Camera Detection State
//!
//! ## Responsibilities
//!
//! - Hold the latest detection snapshot per camera (last write wins)
//! - Expire each camera's snapshot after a decay window with no new results
//! - Expose liveness and freshness reads for overlay rendering
//!
//! Every applied result aborts the camera's pending decay timer and starts a
//! fresh one, so there is at most one pending timer per camera. A per-camera
//! generation counter guards the narrow window where a timer has already
//! woken but not yet cleared. The last seen timestamp deliberately survives
//! decay so the UI can keep showing "last activity" after boxes clear.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

use crate::events::{Detection, DetectionEvent};

/// Snapshots expire after this long without a fresh result
pub const DEFAULT_DECAY_WINDOW: Duration = Duration::from_secs(3);

/// Current renderable state for one camera
#[derive(Debug, Clone, PartialEq)]
pub struct CameraDetections {
    pub detections: Vec<Detection>,
    pub detection_count: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct Entry {
    /// None once the decay window elapses
    snapshot: Option<CameraDetections>,
    /// Timestamp of the newest result ever applied; survives decay
    latest_timestamp: Option<DateTime<Utc>>,
    /// Bumped on every apply; a decay task only fires if its generation is
    /// still current
    generation: u64,
    /// The one pending decay task, aborted and replaced on every apply
    decay_task: Option<tokio::task::JoinHandle<()>>,
}

pub struct DetectionStore {
    weak_self: Weak<DetectionStore>,
    decay_window: Duration,
    entries: Mutex<HashMap<String, Entry>>,
    /// Bumped whenever any camera's renderable state changes
    revision: watch::Sender<u64>,
}

impl DetectionStore {
    pub fn new() -> Arc<Self> {
        Self::with_decay_window(DEFAULT_DECAY_WINDOW)
    }

    pub fn with_decay_window(decay_window: Duration) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            weak_self: weak.clone(),
            decay_window,
            entries: Mutex::new(HashMap::new()),
            revision: watch::channel(0).0,
        })
    }

    /// Apply one detection result, replacing the camera's previous snapshot
    /// and restarting its decay timer
    pub fn apply(&self, event: DetectionEvent) {
        let snapshot = CameraDetections {
            detections: event.detections,
            detection_count: event.detection_count,
            timestamp: event.timestamp,
        };

        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(event.camera_id.clone()).or_default();
        let changed = entry.snapshot.as_ref() != Some(&snapshot);
        entry.latest_timestamp = Some(event.timestamp);
        entry.snapshot = Some(snapshot);
        entry.generation += 1;
        if changed {
            self.revision.send_modify(|r| *r += 1);
        }

        if let Some(task) = entry.decay_task.take() {
            task.abort();
        }
        let generation = entry.generation;
        let weak = self.weak_self.clone();
        let camera_id = event.camera_id;
        let window = self.decay_window;
        entry.decay_task = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(store) = weak.upgrade() {
                store.decay(&camera_id, generation);
            }
        }));
    }

    /// Clear one camera's snapshot if no newer result superseded `generation`
    fn decay(&self, camera_id: &str, generation: u64) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(camera_id) {
            if entry.generation == generation && entry.snapshot.is_some() {
                entry.snapshot = None;
                entry.decay_task = None;
                debug!(camera_id = %camera_id, "Detection snapshot decayed");
                self.revision.send_modify(|r| *r += 1);
            }
        }
    }

    /// Current (non-decayed) snapshot for a camera
    pub fn detections_for(&self, camera_id: &str) -> Option<CameraDetections> {
        self.entries
            .lock()
            .unwrap()
            .get(camera_id)
            .and_then(|e| e.snapshot.clone())
    }

    /// True while the camera has a live snapshot
    pub fn is_live(&self, camera_id: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(camera_id)
            .is_some_and(|e| e.snapshot.is_some())
    }

    /// Timestamp of the newest result ever seen for a camera, live or not
    pub fn latest_timestamp(&self, camera_id: &str) -> Option<DateTime<Utc>> {
        self.entries
            .lock()
            .unwrap()
            .get(camera_id)
            .and_then(|e| e.latest_timestamp)
    }

    /// Number of cameras with a live snapshot
    pub fn live_camera_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.snapshot.is_some())
            .count()
    }

    /// Sum of detection counts across live snapshots
    pub fn total_detection_count(&self) -> u32 {
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter_map(|e| e.snapshot.as_ref())
            .map(|s| s.detection_count)
            .sum()
    }

    /// Observe renderable-state changes without polling
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Drop all state and abort every pending decay timer
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.values_mut() {
            if let Some(task) = entry.decay_task.take() {
                task.abort();
            }
        }
        entries.clear();
        self.revision.send_modify(|r| *r += 1);
    }

    #[cfg(test)]
    fn pending_decay_tasks(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.decay_task.as_ref().is_some_and(|t| !t.is_finished()))
            .count()
    }
}
