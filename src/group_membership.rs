//! GroupMembership - Camera Group Scoping
//!
//! ## Responsibilities
//!
//! - Track which per-camera server groups this session has joined
//! - Join/leave groups over the hub channel
//! - Re-join every tracked group after a reconnect
//!
//! A camera is recorded as joined only after the join invocation was accepted
//! for send; a failed join leaves no trace, so the caller's retry produces no
//! duplicate state. Leaving is best effort: local membership is dropped even
//! when the hub is unreachable, since a dead connection has no server-side
//! membership left to clean up.

use std::collections::BTreeSet;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::events::invoke;
use crate::hub_channel::HubChannel;

#[derive(Default)]
pub struct GroupMembership {
    joined: Mutex<BTreeSet<String>>,
}

impl GroupMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a camera's group; no-op when already joined
    pub async fn join(&self, hub: &HubChannel, camera_id: &str) -> Result<()> {
        if self.joined.lock().unwrap().contains(camera_id) {
            return Ok(());
        }

        hub.send(invoke::JOIN_CAMERA_GROUP, serde_json::json!(camera_id))
            .await?;
        self.joined.lock().unwrap().insert(camera_id.to_string());
        info!(camera_id = %camera_id, "Joined camera group");
        Ok(())
    }

    /// Leave a camera's group; membership is dropped even if the hub send
    /// fails. No-op when not joined.
    pub async fn leave(&self, hub: &HubChannel, camera_id: &str) {
        let was_joined = self.joined.lock().unwrap().remove(camera_id);
        if !was_joined {
            return;
        }

        if let Err(e) = hub
            .send(invoke::LEAVE_CAMERA_GROUP, serde_json::json!(camera_id))
            .await
        {
            debug!(camera_id = %camera_id, error = %e, "Leave not delivered");
        }
        info!(camera_id = %camera_id, "Left camera group");
    }

    /// Re-join every tracked group on the current connection
    ///
    /// Server-side group membership does not survive a reconnect; this runs
    /// before any frame from the new connection is processed. Failures keep
    /// the membership so a later reconnect retries them.
    pub async fn rejoin_all(&self, hub: &HubChannel) {
        let cameras: Vec<String> = self.joined.lock().unwrap().iter().cloned().collect();
        for camera_id in cameras {
            match hub
                .send(invoke::JOIN_CAMERA_GROUP, serde_json::json!(camera_id))
                .await
            {
                Ok(()) => debug!(camera_id = %camera_id, "Re-joined camera group"),
                Err(e) => warn!(camera_id = %camera_id, error = %e, "Re-join failed"),
            }
        }
    }

    /// Best-effort leave of every tracked group (session teardown)
    pub async fn leave_all(&self, hub: &HubChannel) {
        let cameras: Vec<String> = std::mem::take(&mut *self.joined.lock().unwrap())
            .into_iter()
            .collect();
        for camera_id in cameras {
            if let Err(e) = hub
                .send(invoke::LEAVE_CAMERA_GROUP, serde_json::json!(camera_id))
                .await
            {
                debug!(camera_id = %camera_id, error = %e, "Leave not delivered");
            }
        }
    }

    /// Currently joined camera ids, sorted
    pub fn joined(&self) -> Vec<String> {
        self.joined.lock().unwrap().iter().cloned().collect()
    }
}
