// Pull-based cache of the chain topology snapshot
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use super::types::{decode_entries, parse_integer, ChainInfo, TopologySnapshot};
use super::DiscoveryError;
use crate::config::DiscoveryConfig;
use crate::utils::thread_description;

/// Where snapshot documents come from
pub trait SnapshotSource: Send + Sync {
    /// Read the raw snapshot document
    fn load(&self) -> Result<Value, DiscoveryError>;

    /// Location shown in diagnostics
    fn describe(&self) -> String;
}

/// JSON file rewritten periodically by the network browser
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for FileSnapshotSource {
    fn load(&self) -> Result<Value, DiscoveryError> {
        let content = std::fs::read_to_string(&self.path).map_err(|error| DiscoveryError::Io {
            origin: self.describe(),
            error,
        })?;
        serde_json::from_str(&content).map_err(|error| DiscoveryError::Json {
            origin: self.describe(),
            error,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Check the required top-level fields, then decode the chain entries.
///
/// Only `chains` (or the browser's `schains`) and `updatedAt` are required.
/// Entries that cannot be decoded are skipped rather than failing the load.
pub fn parse_snapshot(raw: Value) -> Result<TopologySnapshot, DiscoveryError> {
    let Value::Object(mut object) = raw else {
        return Err(DiscoveryError::NotAnObject);
    };
    let chains = object
        .remove("chains")
        .or_else(|| object.remove("schains"))
        .ok_or(DiscoveryError::MissingField("chains"))?;
    let updated_at = object
        .get("updatedAt")
        .ok_or(DiscoveryError::MissingField("updatedAt"))?;

    let updated_at = parse_integer(updated_at).ok_or(DiscoveryError::InvalidField("updatedAt"))?;
    let Value::Array(entries) = chains else {
        return Err(DiscoveryError::InvalidField("chains"));
    };
    Ok(TopologySnapshot {
        updated_at,
        chains: decode_entries(entries, "chain"),
    })
}

/// Result of one refresh attempt
#[derive(Debug)]
pub enum RefreshOutcome {
    /// A snapshot with a new version stamp was adopted
    Updated { updated_at: i64, chain_count: usize },
    /// Source carries the version stamp already held
    Unchanged,
    /// No snapshot source configured
    NotConfigured,
    /// Source unreadable or malformed; held snapshot kept
    Failed(DiscoveryError),
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, RefreshOutcome::Updated { .. })
    }

    /// Short label for metrics and status output
    pub fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Updated { .. } => "updated",
            RefreshOutcome::Unchanged => "unchanged",
            RefreshOutcome::NotConfigured => "not_configured",
            RefreshOutcome::Failed(_) => "failed",
        }
    }
}

/// Locally held view of the connected chains.
///
/// `refresh` is cheap against an unchanged source: only the version stamp is
/// compared, and the snapshot is swapped wholesale when it differs.
pub struct TopologyCache {
    source: Option<Box<dyn SnapshotSource>>,
    snapshot: Option<TopologySnapshot>,
}

impl TopologyCache {
    pub fn new(source: Box<dyn SnapshotSource>) -> Self {
        Self {
            source: Some(source),
            snapshot: None,
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(FileSnapshotSource::new(path)))
    }

    /// Cache without a source; every refresh is a no-op
    pub fn unconfigured() -> Self {
        Self {
            source: None,
            snapshot: None,
        }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        match &config.network_browser_path {
            Some(path) => Self::from_path(path.clone()),
            None => Self::unconfigured(),
        }
    }

    pub fn source_description(&self) -> Option<String> {
        self.source.as_ref().map(|source| source.describe())
    }

    /// Reload from the source and report what happened
    pub fn refresh_outcome(&mut self) -> RefreshOutcome {
        let Some(source) = self.source.as_ref() else {
            return RefreshOutcome::NotConfigured;
        };

        let loaded = source.load().and_then(parse_snapshot);
        let snapshot = match loaded {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(
                    "Connected chains cache in {} was not updated from {}: {}",
                    thread_description(),
                    source.describe(),
                    e
                );
                return RefreshOutcome::Failed(e);
            }
        };

        if self.updated_at() == Some(snapshot.updated_at) {
            return RefreshOutcome::Unchanged;
        }

        let outcome = RefreshOutcome::Updated {
            updated_at: snapshot.updated_at,
            chain_count: snapshot.chains.len(),
        };
        debug!(
            "Connected chains cache in {} was updated from {}: updatedAt={}, {} chain(s)",
            thread_description(),
            source.describe(),
            snapshot.updated_at,
            snapshot.chains.len()
        );
        self.snapshot = Some(snapshot);
        outcome
    }

    /// `true` only when a new snapshot was adopted
    pub fn refresh(&mut self) -> bool {
        self.refresh_outcome().is_updated()
    }

    /// Refresh, then return a copy of the chain list (empty when nothing is held)
    pub fn cached_chains(&mut self) -> Vec<ChainInfo> {
        self.refresh();
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.chains.clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Option<&TopologySnapshot> {
        self.snapshot.as_ref()
    }

    pub fn updated_at(&self) -> Option<i64> {
        self.snapshot.as_ref().map(|snapshot| snapshot.updated_at)
    }
}

impl std::fmt::Debug for TopologyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyCache")
            .field("source", &self.source_description())
            .field("updated_at", &self.updated_at())
            .finish()
    }
}

/// Position of the first chain named `name`
pub fn find_chain_index_by_name(chains: &[ChainInfo], name: &str) -> Option<usize> {
    chains.iter().position(|chain| chain.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rejects_missing_fields() {
        assert!(matches!(
            parse_snapshot(json!({ "updatedAt": 1 })),
            Err(DiscoveryError::MissingField("chains"))
        ));
        assert!(matches!(
            parse_snapshot(json!({ "chains": [] })),
            Err(DiscoveryError::MissingField("updatedAt"))
        ));
        assert!(matches!(parse_snapshot(json!([1, 2])), Err(DiscoveryError::NotAnObject)));
    }

    #[test]
    fn test_parse_accepts_either_list_key() {
        let a = parse_snapshot(json!({ "updatedAt": 3, "chains": [{ "name": "c1" }] })).unwrap();
        let b = parse_snapshot(json!({ "updatedAt": 3, "schains": [{ "name": "c1" }] })).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_prefers_chains_over_schains() {
        let snapshot = parse_snapshot(json!({
            "updatedAt": "4",
            "chains": [{ "name": "current" }],
            "schains": [{ "name": "legacy" }]
        }))
        .unwrap();
        assert_eq!(snapshot.updated_at, 4);
        assert_eq!(snapshot.chains.len(), 1);
        assert_eq!(snapshot.chains[0].name, "current");
    }

    #[test]
    fn test_parse_rejects_unusable_top_level_values() {
        assert!(matches!(
            parse_snapshot(json!({ "updatedAt": "soon", "chains": [] })),
            Err(DiscoveryError::InvalidField("updatedAt"))
        ));
        assert!(matches!(
            parse_snapshot(json!({ "updatedAt": 1, "chains": { "name": "c1" } })),
            Err(DiscoveryError::InvalidField("chains"))
        ));
    }

    #[test]
    fn test_parse_skips_malformed_chain_entries() {
        let snapshot = parse_snapshot(json!({
            "updatedAt": 2,
            "chains": [{ "name": "c1" }, 7, { "name": ["bad"] }, { "nodes": [] }]
        }))
        .unwrap();
        let names: Vec<&str> = snapshot.chains.iter().map(|chain| chain.name.as_str()).collect();
        assert_eq!(names, vec!["c1", ""]);
    }

    #[test]
    fn test_unconfigured_cache_is_inert() {
        let mut cache = TopologyCache::unconfigured();
        assert!(matches!(cache.refresh_outcome(), RefreshOutcome::NotConfigured));
        assert!(!cache.refresh());
        assert!(cache.cached_chains().is_empty());
        assert_eq!(cache.source_description(), None);
    }

    #[test]
    fn test_find_chain_index_returns_first_match() {
        let chains: Vec<ChainInfo> = serde_json::from_value(json!([
            { "name": "a" }, { "name": "b" }, { "name": "b" }
        ]))
        .unwrap();
        assert_eq!(find_chain_index_by_name(&chains, "b"), Some(1));
        assert_eq!(find_chain_index_by_name(&chains, "z"), None);
        assert_eq!(find_chain_index_by_name(&[], "a"), None);
    }
}
