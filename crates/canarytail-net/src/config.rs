use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::NetError;

pub const DEFAULT_MONERO_NODE_LIST_URL: &str = "https://monero.fail/nodes.json";
pub const DEFAULT_BITCOIN_API_URL: &str = "https://blockchain.info";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Chain used for freshness anchors. Bitcoin is kept for older canaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[default]
    Monero,
    Bitcoin,
}

/// Oracle settings.
///
/// ```toml
/// chain = "monero"
/// monero_node = "http://node.example:18081"
/// timeout_secs = 30
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub chain: Chain,
    /// Daemon base URL. A random node from `monero_node_list_url` when unset.
    pub monero_node: Option<String>,
    pub monero_node_list_url: String,
    pub bitcoin_api_url: String,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            chain: Chain::Monero,
            monero_node: None,
            monero_node_list_url: DEFAULT_MONERO_NODE_LIST_URL.to_string(),
            bitcoin_api_url: DEFAULT_BITCOIN_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl OracleConfig {
    pub fn from_file(path: &Path) -> Result<Self, NetError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, NetError> {
        let config: Self = toml::from_str(content).map_err(|e| NetError::Config(e.to_string()))?;
        if config.timeout_secs == 0 {
            return Err(NetError::Config("timeout_secs must be positive".into()));
        }
        Ok(config)
    }
}
