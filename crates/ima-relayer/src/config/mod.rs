use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment variables overriding file settings,
/// e.g. `RELAYER__DISCOVERY__NETWORK_BROWSER_PATH`
pub const ENV_PREFIX: &str = "RELAYER";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayerConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub transfers: TransferConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Log level for the relayer
    pub log_level: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// JSON file written by the network browser. Discovery is off when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_browser_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Whether event log scans should walk block ranges progressively
    pub progressive_events_scan: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            progressive_events_scan: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Collect Prometheus counters
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl RelayerConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RelayerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load an optional TOML file and overlay `RELAYER__*` environment variables
    pub fn load_layered<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()).required(false))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Save configuration to TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
