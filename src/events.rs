//! Wire data model for the AI results hub
//!
//! Shapes mirror the hub contract: camelCase JSON, one payload object per
//! push. `RawEvent` is transient; it is consumed by the EventRouter and never
//! stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hub connection state
///
/// Exactly one HubChannel owns this value at a time; it is the single source
/// of truth for UI connectivity indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Disconnecting,
}

/// Raw tagged payload as received from the wire
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub event_name: String,
    pub payload: serde_json::Value,
}

/// Server -> client push names
pub mod push {
    pub const DETECTION_RESULT: &str = "ReceiveDetectionResult";
    pub const ALERT: &str = "ReceiveAlert";
    pub const CAMERA_STATUS: &str = "CameraStatusUpdate";
}

/// Client -> server invocation names
pub mod invoke {
    pub const JOIN_CAMERA_GROUP: &str = "JoinCameraGroup";
    pub const LEAVE_CAMERA_GROUP: &str = "LeaveCameraGroup";
}

/// Bounding box in source-frame pixel units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Single AI detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Detection class ("person", "vehicle", ...)
    #[serde(rename = "type")]
    pub detection_type: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

/// Per-camera detection push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    pub camera_id: String,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub detection_count: u32,
    pub timestamp: DateTime<Utc>,
}

/// Alert push as received from the wire
///
/// `id` and `timestamp` are optional on the wire; AlertLog normalizes them
/// on append.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Server-defined fields carried through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Normalized alert as retained by AlertLog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Camera status push
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStatusEvent {
    pub camera_id: String,
    pub status: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
