//! Network collaborators for CanaryTail: blockchain block-time oracles, the
//! latest-block source used as a freshness anchor, and canary retrieval.
//!
//! All calls are blocking. Nothing here retries; a failed lookup surfaces
//! as an error and the caller decides.

pub mod bitcoin;
pub mod config;
pub mod error;
pub mod fetch;
pub mod monero;

use std::time::Duration;

use canarytail_protocol::{BlockTimeOracle, CanaryError};

pub use bitcoin::BitcoinClient;
pub use config::{Chain, OracleConfig};
pub use error::NetError;
pub use monero::MoneroClient;

/// A blockchain that can date a block and name its newest one.
pub trait ChainClient: Send + Sync {
    /// Unix seconds at which the block with this hex hash was produced.
    fn block_time(&self, block_hash: &str) -> Result<i64, NetError>;

    /// Hex hash of the chain's current tip.
    fn latest_block_hash(&self) -> Result<String, NetError>;
}

/// Block-time oracle backed by the chain chosen in [`OracleConfig`].
pub struct ChainOracle {
    client: Box<dyn ChainClient>,
}

impl ChainOracle {
    pub fn new(client: Box<dyn ChainClient>) -> Self {
        Self { client }
    }

    pub fn from_config(config: &OracleConfig) -> Result<Self, NetError> {
        let client: Box<dyn ChainClient> = match config.chain {
            Chain::Monero => Box::new(MoneroClient::from_config(config)?),
            Chain::Bitcoin => Box::new(BitcoinClient::from_config(config)?),
        };
        tracing::debug!(chain = ?config.chain, "Block time oracle configured");
        Ok(Self::new(client))
    }

    /// Freshness anchor for a canary issued now.
    pub fn latest_block_hash(&self) -> Result<String, NetError> {
        self.client.latest_block_hash()
    }
}

impl BlockTimeOracle for ChainOracle {
    fn block_time(&self, block_hash: &str) -> Result<i64, CanaryError> {
        Ok(self.client.block_time(block_hash)?)
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::blocking::Client, NetError> {
    reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(timeout_secs.min(15)))
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("canarytail/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| NetError::Http { status: None, message: e.to_string() })
}

/// Fail with `Http` on a non-success status, carrying the body as message.
pub(crate) fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, NetError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .unwrap_or_else(|_| "unable to read response body".to_string());
    Err(NetError::Http { status: Some(status.as_u16()), message })
}
