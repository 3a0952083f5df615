//! Legacy Bitcoin anchors through the blockchain.info Data API.

use serde::Deserialize;

use canarytail_protocol::crypto::decode_block_hash;

use crate::config::OracleConfig;
use crate::{check_status, http_client, ChainClient, NetError};

pub struct BitcoinClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    time: i64,
}

impl BitcoinClient {
    pub fn from_config(config: &OracleConfig) -> Result<Self, NetError> {
        Ok(Self {
            http: http_client(config.timeout_secs)?,
            base_url: config.bitcoin_api_url.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, path: &str) -> Result<reqwest::blocking::Response, NetError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(url = %url, "Bitcoin Data API request");
        let response = self.http.get(&url).send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(NetError::NotFound(path.to_string()));
        }
        check_status(response)
    }
}

impl ChainClient for BitcoinClient {
    fn block_time(&self, block_hash: &str) -> Result<i64, NetError> {
        decode_block_hash(block_hash).map_err(|e| NetError::InvalidHash(e.to_string()))?;
        let response = self.get(&format!("/rawblock/{}", block_hash.trim()))?;
        parse_raw_block_time(&response.bytes()?)
    }

    fn latest_block_hash(&self) -> Result<String, NetError> {
        let response = self.get("/q/latesthash")?;
        parse_latest_hash(&response.text()?)
    }
}

/// `time` of a `/rawblock/<hash>` document.
pub fn parse_raw_block_time(body: &[u8]) -> Result<i64, NetError> {
    let block: RawBlock = serde_json::from_slice(body)?;
    Ok(block.time)
}

/// The plain-text body of `/q/latesthash`.
pub fn parse_latest_hash(body: &str) -> Result<String, NetError> {
    let hash = body.trim();
    decode_block_hash(hash).map_err(|e| NetError::InvalidHash(e.to_string()))?;
    Ok(hash.to_ascii_lowercase())
}
