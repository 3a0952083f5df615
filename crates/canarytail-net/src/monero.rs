//! Monero daemon JSON-RPC.
//!
//! `get_block_header_by_hash` dates a block, `get_info` names the tip.
//! Without a configured node a random clearnet node is taken from the
//! monero.fail list on every call.

use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::json;

use canarytail_protocol::crypto::decode_block_hash;

use crate::config::OracleConfig;
use crate::{check_status, http_client, ChainClient, NetError};

pub struct MoneroClient {
    http: reqwest::blocking::Client,
    node: Option<String>,
    node_list_url: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct BlockHeaderResult {
    block_header: BlockHeader,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct InfoResult {
    top_block_hash: String,
}

#[derive(Debug, Deserialize)]
struct NodeList {
    monero: NodeGroups,
}

#[derive(Debug, Deserialize)]
struct NodeGroups {
    #[serde(default)]
    clear: Vec<String>,
}

impl MoneroClient {
    pub fn from_config(config: &OracleConfig) -> Result<Self, NetError> {
        Ok(Self {
            http: http_client(config.timeout_secs)?,
            node: config.monero_node.clone().filter(|n| !n.trim().is_empty()),
            node_list_url: config.monero_node_list_url.clone(),
        })
    }

    fn node(&self) -> Result<String, NetError> {
        if let Some(node) = &self.node {
            return Ok(node.clone());
        }
        let response = check_status(self.http.get(&self.node_list_url).send()?)?;
        let nodes = parse_node_list(&response.bytes()?)?;
        let node = choose_node(&nodes, &mut rand::thread_rng())?;
        tracing::info!(node = %node, "No Monero node configured, chose one at random");
        Ok(node)
    }

    fn call(&self, method: &str, params: serde_json::Value) -> Result<Vec<u8>, NetError> {
        let node = self.node()?;
        let endpoint = format!("{}/json_rpc", node.trim_end_matches('/'));
        let body = json!({
            "jsonrpc": "2.0",
            "id": "0",
            "method": method,
            "params": params,
        });
        tracing::debug!(endpoint = %endpoint, method, "Monero RPC request");
        let response = check_status(self.http.post(&endpoint).json(&body).send()?)?;
        Ok(response.bytes()?.to_vec())
    }
}

impl ChainClient for MoneroClient {
    fn block_time(&self, block_hash: &str) -> Result<i64, NetError> {
        let hash = block_hash.trim();
        decode_block_hash(hash).map_err(|e| NetError::InvalidHash(e.to_string()))?;
        let body = self.call("get_block_header_by_hash", json!({ "hash": hash }))?;
        parse_block_time(&body)
    }

    fn latest_block_hash(&self) -> Result<String, NetError> {
        let body = self.call("get_info", json!({}))?;
        parse_top_block_hash(&body)
    }
}

fn rpc_result<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, NetError> {
    let response: RpcResponse<T> = serde_json::from_slice(body)?;
    if let Some(err) = response.error {
        return Err(NetError::Rpc(format!("{} (code {})", err.message, err.code)));
    }
    response
        .result
        .ok_or_else(|| NetError::Payload("rpc response has neither result nor error".into()))
}

/// Timestamp from a `get_block_header_by_hash` response.
pub fn parse_block_time(body: &[u8]) -> Result<i64, NetError> {
    let result: BlockHeaderResult = rpc_result(body)?;
    Ok(result.block_header.timestamp)
}

/// Tip hash from a `get_info` response.
pub fn parse_top_block_hash(body: &[u8]) -> Result<String, NetError> {
    let result: InfoResult = rpc_result(body)?;
    decode_block_hash(&result.top_block_hash).map_err(|e| NetError::InvalidHash(e.to_string()))?;
    Ok(result.top_block_hash.to_ascii_lowercase())
}

/// Clearnet node URLs from a monero.fail `nodes.json` document.
pub fn parse_node_list(body: &[u8]) -> Result<Vec<String>, NetError> {
    let list: NodeList = serde_json::from_slice(body)?;
    Ok(list.monero.clear)
}

pub fn choose_node<R: rand::Rng + ?Sized>(nodes: &[String], rng: &mut R) -> Result<String, NetError> {
    nodes.choose(rng).cloned().ok_or(NetError::NoNodes)
}
