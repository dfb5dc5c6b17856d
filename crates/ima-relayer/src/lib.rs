// IMA Relayer Library
// Transfer error tracking, chain topology cache and endpoint selection for the relay loops

pub mod config;
pub mod discovery;
pub mod events;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod relay;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{DiscoveryConfig, RelayerConfig, TransferConfig};
pub use discovery::{
    find_chain_index_by_name, ChainInfo, ChainNode, DiscoveryError, NodeSelector, RefreshOutcome,
    SelectionError, TopologyCache, TopologySnapshot,
};
pub use events::{listener, DispatchError, DispatchedEvent, EventDispatcher, Listener, ListenerId};
#[cfg(feature = "metrics")]
pub use metrics::RelayerMetrics;
pub use relay::{TransferErrorRecord, TransferErrorTracker, WorkerMessage};
