// Metrics and monitoring

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

use crate::discovery::RefreshOutcome;
use crate::events::{listener, EventDispatcher, ListenerId};
use crate::relay::{TRANSFER_ERROR_EVENT, TRANSFER_SUCCESS_EVENT};

/// Relayer metrics
pub struct RelayerMetrics {
    // Transfer metrics
    pub transfer_errors: IntCounterVec,
    pub transfer_successes: IntCounter,

    // Discovery metrics
    pub topology_refreshes: IntCounterVec,

    registry: Arc<Registry>,
}

impl RelayerMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transfer_errors = IntCounterVec::new(
            Opts::new("ima_transfer_errors_total", "Transfer errors by category"),
            &["category"],
        )?;
        let transfer_successes =
            IntCounter::new("ima_transfer_successes_total", "Transfer success notifications")?;
        let topology_refreshes = IntCounterVec::new(
            Opts::new("ima_topology_refreshes_total", "Topology cache refreshes by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(transfer_errors.clone()))?;
        registry.register(Box::new(transfer_successes.clone()))?;
        registry.register(Box::new(topology_refreshes.clone()))?;

        Ok(Self {
            transfer_errors,
            transfer_successes,
            topology_refreshes,
            registry,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Count the "error" and "success" events fired by a transfer tracker
    pub fn observe_transfers(&self, events: &EventDispatcher) -> [ListenerId; 2] {
        let errors = self.transfer_errors.clone();
        let on_error = events.on(
            TRANSFER_ERROR_EVENT,
            listener(move |_, event| {
                let category = event.detail["category"].as_str().unwrap_or_default();
                errors.with_label_values(&[category]).inc();
                Ok(())
            }),
        );

        let successes = self.transfer_successes.clone();
        let on_success = events.on(
            TRANSFER_SUCCESS_EVENT,
            listener(move |_, _| {
                successes.inc();
                Ok(())
            }),
        );

        [on_error, on_success]
    }

    pub fn record_refresh(&self, outcome: &RefreshOutcome) {
        self.topology_refreshes
            .with_label_values(&[outcome.label()])
            .inc();
    }
}
