// Per-chain port and URL derivation for a node
//
// A node hosts several chains. Each chain gets a block of PORTS_PER_CHAIN
// ports starting at `node.port + index * PORTS_PER_CHAIN`, where `index` is the
// position of the chain hash in the node's chain list.

use super::types::{ChainNode, EndpointSet, NodeEndpoints, PortSet};
use super::DiscoveryError;

pub const PORTS_PER_CHAIN: u64 = 64;

/// Port offsets inside a chain's port block
pub mod port_offset {
    pub const PROPOSAL: u64 = 0;
    pub const CATCHUP: u64 = 1;
    pub const WS_JSON: u64 = 2;
    pub const HTTP_JSON: u64 = 3;
    pub const BINARY_CONSENSUS: u64 = 4;
    pub const ZMQ_BROADCAST: u64 = 5;
    pub const IMA_MONITORING: u64 = 6;
    pub const WSS_JSON: u64 = 7;
    pub const HTTPS_JSON: u64 = 8;
    pub const INFO_HTTP_JSON: u64 = 9;
}

/// Which node address the URLs are built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointHost {
    DomainName,
    PublicIp,
}

pub fn chain_index_in_node(chain_hash: &str, chain_hashes: &[String]) -> Result<usize, DiscoveryError> {
    chain_hashes
        .iter()
        .position(|hash| hash == chain_hash)
        .ok_or_else(|| DiscoveryError::ChainNotInNode(chain_hash.to_string()))
}

pub fn calc_chain_base_port(node_base_port: u64, chain_index: usize) -> Result<u64, DiscoveryError> {
    (chain_index as u64)
        .checked_mul(PORTS_PER_CHAIN)
        .and_then(|block_start| node_base_port.checked_add(block_start))
        .ok_or(DiscoveryError::PortOutOfRange(node_base_port))
}

fn port_at(base_port: u64, offset: u64) -> Result<u16, DiscoveryError> {
    let port = base_port
        .checked_add(offset)
        .ok_or(DiscoveryError::PortOutOfRange(base_port))?;
    u16::try_from(port).map_err(|_| DiscoveryError::PortOutOfRange(port))
}

pub fn calc_ports(chain_base_port: u64) -> Result<PortSet, DiscoveryError> {
    Ok(PortSet {
        http: port_at(chain_base_port, port_offset::HTTP_JSON)?,
        https: port_at(chain_base_port, port_offset::HTTPS_JSON)?,
        ws: port_at(chain_base_port, port_offset::WS_JSON)?,
        wss: port_at(chain_base_port, port_offset::WSS_JSON)?,
        info_http: port_at(chain_base_port, port_offset::INFO_HTTP_JSON)?,
    })
}

pub fn compose_endpoints(node: &ChainNode, ports: &PortSet, host: EndpointHost) -> EndpointSet {
    let host = match host {
        EndpointHost::DomainName => node.domain_name.as_str(),
        EndpointHost::PublicIp => node.public_ip.as_str(),
    };
    EndpointSet {
        http: format!("http://{}:{}", host, ports.http),
        https: format!("https://{}:{}", host, ports.https),
        ws: format!("ws://{}:{}", host, ports.ws),
        wss: format!("wss://{}:{}", host, ports.wss),
        info_http: format!("http://{}:{}", host, ports.info_http),
    }
}

/// Derive the endpoints under which `node` serves the chain with `chain_hash`
pub fn calc_endpoints(node: &ChainNode, chain_hash: &str) -> Result<NodeEndpoints, DiscoveryError> {
    let hashes = node
        .schain_hashes
        .as_deref()
        .ok_or_else(|| DiscoveryError::MissingChainHashes(node.name.clone()))?;
    let index = chain_index_in_node(chain_hash, hashes)?;
    let ports = calc_ports(calc_chain_base_port(node.port, index)?)?;
    Ok(NodeEndpoints {
        domain: compose_endpoints(node, &ports, EndpointHost::DomainName),
        ip: compose_endpoints(node, &ports, EndpointHost::PublicIp),
        ports,
    })
}
