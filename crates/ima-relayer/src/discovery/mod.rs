// Chain discovery: cached topology snapshot and endpoint selection

pub mod cache;
pub mod endpoints;
pub mod selector;
pub mod types;

use thiserror::Error;

pub use cache::{
    find_chain_index_by_name, parse_snapshot, FileSnapshotSource, RefreshOutcome, SnapshotSource,
    TopologyCache,
};
pub use endpoints::calc_endpoints;
pub use selector::{
    pick_random_node, pick_random_node_index, pick_random_url, NodeSelector, SelectionError,
};
pub use types::{ChainInfo, ChainNode, EndpointSet, NodeEndpoints, PortSet, TopologySnapshot};

/// Errors loading a snapshot or deriving node endpoints
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("cannot read {origin}: {error}")]
    Io {
        origin: String,
        error: std::io::Error,
    },

    #[error("{origin} is not valid JSON: {error}")]
    Json {
        origin: String,
        error: serde_json::Error,
    },

    #[error("bad data format, snapshot is not a JSON object")]
    NotAnObject,

    #[error("bad data format, missing '{0}' field")]
    MissingField(&'static str),

    #[error("bad data format, unusable '{0}' field")]
    InvalidField(&'static str),

    #[error("chain {0} is not found in the node chain list")]
    ChainNotInNode(String),

    #[error("node {0} has no chain hash list")]
    MissingChainHashes(String),

    #[error("port {0} is out of range")]
    PortOutOfRange(u64),
}
