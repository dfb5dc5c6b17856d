// Random node selection for spreading outbound calls across a chain
use thiserror::Error;

use super::types::{ChainInfo, ChainNode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("chain {0} has no nodes to select from")]
    NoNodes(String),

    #[error("node {node} of chain {chain} has no endpoint data")]
    MissingEndpoints { chain: String, node: String },
}

/// Uniform, stateless node picker. No stickiness and no weighting: every
/// call is independent of the previous ones.
#[derive(Debug, Clone)]
pub struct NodeSelector {
    rng: fastrand::Rng,
}

impl NodeSelector {
    pub fn new() -> Self {
        Self {
            rng: fastrand::Rng::new(),
        }
    }

    /// Reproducible selection sequence
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    pub fn pick_random_node_index(&mut self, chain: &ChainInfo) -> Result<usize, SelectionError> {
        if chain.nodes.is_empty() {
            return Err(SelectionError::NoNodes(chain.name.clone()));
        }
        Ok(self.rng.usize(0..chain.nodes.len()))
    }

    pub fn pick_random_node<'a>(
        &mut self,
        chain: &'a ChainInfo,
    ) -> Result<&'a ChainNode, SelectionError> {
        let index = self.pick_random_node_index(chain)?;
        Ok(&chain.nodes[index])
    }

    /// HTTP endpoint (by public IP) of a randomly chosen node
    pub fn pick_random_url(&mut self, chain: &ChainInfo) -> Result<String, SelectionError> {
        let node = self.pick_random_node(chain)?;
        node.endpoints
            .as_ref()
            .map(|endpoints| endpoints.ip.http.clone())
            .ok_or_else(|| SelectionError::MissingEndpoints {
                chain: chain.name.clone(),
                node: node.name.clone(),
            })
    }
}

impl Default for NodeSelector {
    fn default() -> Self {
        Self::new()
    }
}

pub fn pick_random_node_index(chain: &ChainInfo) -> Result<usize, SelectionError> {
    NodeSelector::new().pick_random_node_index(chain)
}

pub fn pick_random_node(chain: &ChainInfo) -> Result<&ChainNode, SelectionError> {
    NodeSelector::new().pick_random_node(chain)
}

pub fn pick_random_url(chain: &ChainInfo) -> Result<String, SelectionError> {
    NodeSelector::new().pick_random_url(chain)
}
