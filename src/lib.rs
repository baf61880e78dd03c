//! SmartCamera Realtime Client
//!
//! Real-time detection/event distribution client for the SmartCamera
//! dashboard. Maintains the one persistent push channel to the backend AI
//! results hub and keeps a bounded, self-expiring view of current detections
//! per camera so the UI never renders stale bounding boxes.
//!
//! ## Architecture (5 Components)
//!
//! 1. HubChannel - hub connection, reconnect with backoff, raw frame dispatch
//! 2. EventRouter - typed event classification and listener fan-out
//! 3. DetectionStore - per-camera detection snapshots with decay
//! 4. AlertLog - bounded ring buffer of recent alerts
//! 5. GroupMembership - per-camera join/leave scoping
//!
//! ## Design Principles
//!
//! - One physical connection per dashboard session, however many UI
//!   components subscribe
//! - Transport errors surface as state transitions, never as panics crossing
//!   component boundaries
//! - No replay: after a reconnect, detection state refills from fresh events

pub mod alert_log;
pub mod detection_store;
pub mod error;
pub mod event_router;
pub mod events;
pub mod group_membership;
pub mod hub_channel;
pub mod session;

pub use error::{Error, Result};
pub use session::{RealtimeConfig, RealtimeSession};
