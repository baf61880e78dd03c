//! AlertLog - Bounded Alert History
//!
//! ## Responsibilities
//!
//! - Retain the most recent alerts in arrival order, up to a fixed capacity
//! - Normalize wire alerts on append (fill in a generated id and a receipt
//!   timestamp when the server omits them)
//!
//! The log is append-only from the caller's perspective; the oldest entry is
//! evicted silently once capacity is reached.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::events::{AlertEvent, AlertRecord};

/// Alerts retained before the oldest is evicted
pub const DEFAULT_ALERT_CAPACITY: usize = 10;

pub struct AlertLog {
    capacity: usize,
    alerts: Mutex<VecDeque<AlertRecord>>,
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ALERT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            alerts: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Normalize and append one alert, returning the retained record
    pub fn append(&self, event: AlertEvent) -> AlertRecord {
        let record = AlertRecord {
            id: event.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            message: event.message,
            timestamp: event.timestamp.unwrap_or_else(Utc::now),
            extra: event.extra,
        };

        let mut alerts = self.alerts.lock().unwrap();
        alerts.push_back(record.clone());
        while alerts.len() > self.capacity {
            let evicted = alerts.pop_front();
            if let Some(evicted) = evicted {
                debug!(alert_id = %evicted.id, "Oldest alert evicted");
            }
        }
        record
    }

    /// Retained alerts in arrival order, oldest first
    pub fn list(&self) -> Vec<AlertRecord> {
        self.alerts.lock().unwrap().iter().cloned().collect()
    }

    /// Retained alerts newest first (display convenience)
    pub fn recent(&self) -> Vec<AlertRecord> {
        self.alerts.lock().unwrap().iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.alerts.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn alert(id: Option<&str>, message: &str, timestamp: Option<DateTime<Utc>>) -> AlertEvent {
        AlertEvent {
            id: id.map(str::to_string),
            message: Some(message.to_string()),
            timestamp,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_append_preserves_server_id_and_timestamp() {
        let log = AlertLog::new();
        let ts = Utc.with_ymd_and_hms(2026, 8, 28, 9, 30, 0).unwrap();

        let record = log.append(alert(Some("a-1"), "Motion detected", Some(ts)));
        assert_eq!(record.id, "a-1");
        assert_eq!(record.timestamp, ts);
    }

    #[test]
    fn test_append_fills_missing_id_and_timestamp() {
        let log = AlertLog::new();
        let before = Utc::now();

        let record = log.append(alert(None, "Motion detected", None));
        assert!(!record.id.is_empty());
        assert!(record.timestamp >= before);

        // Generated ids are unique per append
        let other = log.append(alert(None, "Motion detected", None));
        assert_ne!(record.id, other.id);
    }

    #[test]
    fn test_list_is_arrival_order_and_recent_is_reversed() {
        let log = AlertLog::new();
        log.append(alert(Some("a-1"), "first", None));
        log.append(alert(Some("a-2"), "second", None));

        let list = log.list();
        assert_eq!(list[0].id, "a-1");
        assert_eq!(list[1].id, "a-2");

        let recent = log.recent();
        assert_eq!(recent[0].id, "a-2");
        assert_eq!(recent[1].id, "a-1");
    }

    #[test]
    fn test_capacity_evicts_oldest_keeping_arrival_order() {
        let log = AlertLog::new();
        for i in 1..=11 {
            log.append(alert(Some(&format!("a-{i}")), "m", None));
        }

        let list = log.list();
        assert_eq!(list.len(), DEFAULT_ALERT_CAPACITY);
        assert_eq!(list.first().unwrap().id, "a-2");
        assert_eq!(list.last().unwrap().id, "a-11");
    }

    #[test]
    fn test_clear_empties_the_log() {
        let log = AlertLog::with_capacity(3);
        log.append(alert(Some("a-1"), "m", None));
        assert!(!log.is_empty());

        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
    }
}
