// Forwarding of transfer outcomes from loop workers to the main tracker
//
// Each worker owns its own `TransferErrorTracker`. The main thread keeps the
// aggregate view, so workers forward every "error"/"success" event over a
// channel and the main side replays them into its tracker.
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::transfer_errors::{
    TransferErrorRecord, TransferErrorTracker, TRANSFER_ERROR_EVENT, TRANSFER_SUCCESS_EVENT,
};
use crate::events::{listener, DispatchError, EventDispatcher, ListenerId};

/// Message sent from a worker to the main thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "message")]
pub enum WorkerMessage {
    #[serde(rename = "saveTransferError")]
    SaveTransferError {
        category: String,
        #[serde(rename = "textLog", default)]
        text_log: String,
        ts: i64,
    },
    #[serde(rename = "saveTransferSuccess")]
    SaveTransferSuccess { category: String },
}

impl From<TransferErrorRecord> for WorkerMessage {
    fn from(record: TransferErrorRecord) -> Self {
        WorkerMessage::SaveTransferError {
            category: record.category,
            text_log: record.text_log.unwrap_or_default(),
            ts: record.ts,
        }
    }
}

#[derive(Deserialize)]
struct SuccessDetail {
    category: String,
}

/// Registrations created by [`forward_transfer_events`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardingHandle {
    error_listener: ListenerId,
    success_listener: ListenerId,
}

impl ForwardingHandle {
    /// Stop forwarding
    pub fn detach(self, events: &EventDispatcher) {
        events.remove_listener(self.error_listener);
        events.remove_listener(self.success_listener);
    }
}

/// Subscribe to a worker tracker's events and push them to `sender`.
///
/// A closed receiver (main side shut down) is logged, not reported as a
/// listener failure.
pub fn forward_transfer_events(
    events: &EventDispatcher,
    sender: mpsc::UnboundedSender<WorkerMessage>,
) -> ForwardingHandle {
    let error_sender = sender.clone();
    let error_listener = events.on(
        TRANSFER_ERROR_EVENT,
        listener(move |_, event| {
            let record: TransferErrorRecord = serde_json::from_value(event.detail.clone())?;
            if error_sender.send(record.into()).is_err() {
                warn!("Transfer error not forwarded, main receiver is closed");
            }
            Ok(())
        }),
    );

    let success_listener = events.on(
        TRANSFER_SUCCESS_EVENT,
        listener(move |_, event| {
            let detail: SuccessDetail = serde_json::from_value(event.detail.clone())?;
            let message = WorkerMessage::SaveTransferSuccess {
                category: detail.category,
            };
            if sender.send(message).is_err() {
                warn!("Transfer success not forwarded, main receiver is closed");
            }
            Ok(())
        }),
    );

    ForwardingHandle {
        error_listener,
        success_listener,
    }
}

/// Replay one worker message into `tracker`
pub fn apply_worker_message(
    tracker: &mut TransferErrorTracker,
    message: WorkerMessage,
) -> Result<(), DispatchError> {
    match message {
        WorkerMessage::SaveTransferError {
            category,
            text_log,
            ts,
        } => tracker.save_transfer_error(&category, text_log, Some(ts)),
        WorkerMessage::SaveTransferSuccess { category } => tracker.save_transfer_success(&category),
    }
}

/// Apply worker messages until every sender is dropped.
/// Returns the number of messages applied.
pub async fn run_worker_message_loop(
    mut receiver: mpsc::UnboundedReceiver<WorkerMessage>,
    tracker: Arc<Mutex<TransferErrorTracker>>,
) -> usize {
    info!("Starting worker message loop for transfer events");
    let mut applied = 0;

    while let Some(message) = receiver.recv().await {
        debug!("Worker message received: {:?}", message);
        let outcome = {
            let mut tracker = tracker.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            apply_worker_message(&mut tracker, message)
        };
        if let Err(e) = outcome {
            warn!("Main tracker listener failed on worker message: {}", e);
        }
        applied += 1;
    }

    info!("Worker message loop stopped after {} message(s)", applied);
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let message = WorkerMessage::SaveTransferError {
            category: "s2s".to_string(),
            text_log: "nonce too low".to_string(),
            ts: 1700000000,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "method": "saveTransferError",
                "message": { "category": "s2s", "textLog": "nonce too low", "ts": 1700000000 }
            })
        );

        let parsed: WorkerMessage = serde_json::from_value(json!({
            "method": "saveTransferSuccess",
            "message": { "category": "oracle" }
        }))
        .unwrap();
        assert_eq!(
            parsed,
            WorkerMessage::SaveTransferSuccess {
                category: "oracle".to_string()
            }
        );
    }

    #[test]
    fn test_detach_stops_forwarding() {
        let mut worker = TransferErrorTracker::new();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let handle = forward_transfer_events(worker.events(), sender);

        worker.save_transfer_error("m2s", "first", Some(1)).unwrap();
        handle.detach(worker.events());
        worker.save_transfer_error("m2s", "second", Some(2)).unwrap();

        assert!(matches!(
            receiver.try_recv(),
            Ok(WorkerMessage::SaveTransferError { ts: 1, .. })
        ));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_closed_receiver_is_not_a_listener_failure() {
        let mut worker = TransferErrorTracker::new();
        let (sender, receiver) = mpsc::unbounded_channel();
        forward_transfer_events(worker.events(), sender);
        drop(receiver);

        assert!(worker.save_transfer_error("m2s", "lost", None).is_ok());
        assert!(worker.save_transfer_success("m2s").is_ok());
    }
}
