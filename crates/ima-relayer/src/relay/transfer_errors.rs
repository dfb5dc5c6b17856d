// Bounded history of transfer failures and the set of failing categories
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, VecDeque};
use std::fmt::Display;
use tracing::debug;

use crate::events::{DispatchError, DispatchedEvent, EventDispatcher};
use crate::utils::unix_timestamp_now;

/// Maximum number of records kept in the history
pub const MAX_LAST_TRANSFER_ERRORS: usize = 20;

/// Category used when the caller passes an empty one
pub const DEFAULT_CATEGORY: &str = "default";

/// Fired by [`TransferErrorTracker::save_transfer_error`]; detail is the record
pub const TRANSFER_ERROR_EVENT: &str = "error";

/// Fired by [`TransferErrorTracker::save_transfer_success`]; detail is `{category}`
pub const TRANSFER_SUCCESS_EVENT: &str = "success";

/// Map an empty category name to [`DEFAULT_CATEGORY`]
pub fn verify_transfer_error_category_name(category: &str) -> String {
    if category.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        category.to_string()
    }
}

/// One recorded transfer failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferErrorRecord {
    /// Unix time in seconds
    pub ts: i64,
    pub category: String,
    #[serde(rename = "textLog", default, skip_serializing_if = "Option::is_none")]
    pub text_log: Option<String>,
}

/// Per-worker transfer error state
#[derive(Debug)]
pub struct TransferErrorTracker {
    history: VecDeque<TransferErrorRecord>,
    categories: BTreeSet<String>,
    progressive_events_scan: bool,
    events: EventDispatcher,
}

impl TransferErrorTracker {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(MAX_LAST_TRANSFER_ERRORS + 1),
            categories: BTreeSet::new(),
            progressive_events_scan: true,
            events: EventDispatcher::new(),
        }
    }

    /// Tracker with the progressive scan flag taken from configuration
    pub fn with_progressive_events_scan(enabled: bool) -> Self {
        let mut tracker = Self::new();
        tracker.progressive_events_scan = enabled;
        tracker
    }

    /// Dispatcher firing `"error"` and `"success"` events
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Record a failed transfer. A `ts` of `None` or `0` means "now".
    ///
    /// State is updated before the `"error"` event is dispatched, so a failing
    /// listener never loses the record.
    pub fn save_transfer_error(
        &mut self,
        category: &str,
        text_log: impl Display,
        ts: Option<i64>,
    ) -> Result<(), DispatchError> {
        let ts = match ts {
            Some(ts) if ts != 0 => ts,
            _ => unix_timestamp_now(),
        };
        let category = verify_transfer_error_category_name(category);
        let record = TransferErrorRecord {
            ts,
            category: category.clone(),
            text_log: Some(text_log.to_string()),
        };

        self.history.push_back(record.clone());
        while self.history.len() > MAX_LAST_TRANSFER_ERRORS {
            self.history.pop_front();
        }
        self.categories.insert(category);
        debug!(
            "Saved transfer error in category '{}', {} record(s) kept",
            record.category,
            self.history.len()
        );

        let detail = serde_json::to_value(&record).unwrap_or_else(|_| {
            json!({ "ts": record.ts, "category": record.category })
        });
        self.events
            .dispatch_event(&DispatchedEvent::new(TRANSFER_ERROR_EVENT, detail))
    }

    /// Record that transfers in `category` work again
    pub fn save_transfer_success(&mut self, category: &str) -> Result<(), DispatchError> {
        let category = verify_transfer_error_category_name(category);
        self.categories.remove(&category);
        self.events.dispatch_event(&DispatchedEvent::new(
            TRANSFER_SUCCESS_EVENT,
            json!({ "category": category }),
        ))
    }

    /// Forget every failing category, e.g. after a clean relay round
    pub fn save_transfer_success_all(&mut self) {
        self.categories.clear();
    }

    /// Copy of the history, oldest first
    pub fn last_transfer_errors(&self, include_text_log: bool) -> Vec<TransferErrorRecord> {
        self.history
            .iter()
            .cloned()
            .map(|mut record| {
                if !include_text_log {
                    record.text_log = None;
                }
                record
            })
            .collect()
    }

    /// Categories with an unresolved failure
    pub fn last_error_categories(&self) -> Vec<String> {
        self.categories.iter().cloned().collect()
    }

    pub fn progressive_events_scan(&self) -> bool {
        self.progressive_events_scan
    }

    pub fn set_progressive_events_scan(&mut self, enabled: bool) {
        self.progressive_events_scan = enabled;
    }
}

impl Default for TransferErrorTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_category_is_default() {
        assert_eq!(verify_transfer_error_category_name(""), "default");
        assert_eq!(verify_transfer_error_category_name("oracle"), "oracle");
    }

    #[test]
    fn test_zero_timestamp_means_now() {
        let mut tracker = TransferErrorTracker::new();
        tracker.save_transfer_error("m2s", "boom", Some(0)).unwrap();
        tracker.save_transfer_error("m2s", "boom", Some(42)).unwrap();

        let records = tracker.last_transfer_errors(true);
        assert!(records[0].ts > 42);
        assert_eq!(records[1].ts, 42);
    }

    #[test]
    fn test_record_json_shape() {
        let record = TransferErrorRecord {
            ts: 7,
            category: "s2s".to_string(),
            text_log: Some("failed".to_string()),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({ "ts": 7, "category": "s2s", "textLog": "failed" }));

        let stripped = TransferErrorRecord { text_log: None, ..record };
        let value = serde_json::to_value(&stripped).unwrap();
        assert!(value.get("textLog").is_none());
    }

    #[test]
    fn test_progressive_scan_flag_is_stored() {
        let mut tracker = TransferErrorTracker::default();
        assert!(tracker.progressive_events_scan());
        tracker.set_progressive_events_scan(false);
        assert!(!tracker.progressive_events_scan());
        assert!(!TransferErrorTracker::with_progressive_events_scan(false).progressive_events_scan());
    }
}
