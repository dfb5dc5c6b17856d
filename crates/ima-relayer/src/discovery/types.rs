// Topology snapshot data written by the network browser
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

/// Read an integer written either as a JSON number or as a decimal string.
/// The network browser stringifies big integers.
pub(crate) fn parse_integer<T: FromStr>(value: &Value) -> Option<T> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Integer field that falls back to zero on anything unreadable
fn lenient_integer<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_integer(&value).unwrap_or_default())
}

fn lenient_optional_integer<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_integer(&value))
}

/// Decode each entry on its own, dropping the ones that do not fit
pub(crate) fn decode_entries<T: DeserializeOwned>(entries: Vec<Value>, kind: &str) -> Vec<T> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(position, entry)| match serde_json::from_value(entry) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("Skipping malformed {} entry #{}: {}", kind, position, e);
                None
            }
        })
        .collect()
}

fn lenient_nodes<'de, D>(deserializer: D) -> Result<Vec<ChainNode>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(entries) => Ok(decode_entries(entries, "node")),
        _ => Ok(Vec::new()),
    }
}

/// A versioned list of chains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    /// Version stamp; a new snapshot is only adopted when this changes
    #[serde(rename = "updatedAt", deserialize_with = "lenient_integer")]
    pub updated_at: i64,
    pub chains: Vec<ChainInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mainnet_owner: String,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub index_in_owner_list: u64,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub part_of_node: u64,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub lifetime: u64,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub start_date: u64,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub start_block: u64,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub deposit: u128,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub index: u64,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub generation: u64,
    #[serde(default)]
    pub originator: String,
    #[serde(default, deserialize_with = "lenient_nodes")]
    pub nodes: Vec<ChainNode>,
    #[serde(
        default,
        deserialize_with = "lenient_optional_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub chain_id: Option<u64>,
}

impl ChainInfo {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainNode {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(rename = "publicIP", default)]
    pub public_ip: String,
    /// Node base port; per-chain ports are derived from it
    #[serde(default, deserialize_with = "lenient_integer")]
    pub port: u64,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub start_block: u64,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub last_reward_date: u64,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub finish_time: u64,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub status: u32,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub validator_id: u64,
    #[serde(default)]
    pub domain_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<NodeEndpoints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schain_hashes: Option<Vec<String>>,
}

/// Ports and URLs under which a node serves one chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEndpoints {
    pub ports: PortSet,
    /// URLs using the node domain name
    pub domain: EndpointSet,
    /// URLs using the node public IP
    pub ip: EndpointSet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSet {
    pub http: u16,
    pub https: u16,
    pub ws: u16,
    pub wss: u16,
    pub info_http: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSet {
    #[serde(default)]
    pub http: String,
    #[serde(default)]
    pub https: String,
    #[serde(default)]
    pub ws: String,
    #[serde(default)]
    pub wss: String,
    #[serde(default)]
    pub info_http: String,
}
