//! Canary retrieval from an `http(s)` URL or a local path.

use std::io::Read;

use canarytail_protocol::{Canary, CanaryError, ValidatorConfig};

use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::{check_status, http_client, NetError};

/// Largest canary document accepted from a remote host.
pub const MAX_CANARY_BYTES: u64 = 1 << 20; // 1 MiB

/// Raw bytes behind `uri`. `file://` prefixes and bare paths read from disk.
pub fn read(uri: &str) -> Result<Vec<u8>, NetError> {
    if is_http(uri) {
        tracing::debug!(uri, "Fetching canary");
        let client = http_client(DEFAULT_TIMEOUT_SECS)?;
        let response = check_status(client.get(uri).send()?)?;
        if let Some(len) = response.content_length().filter(|len| *len > MAX_CANARY_BYTES) {
            return Err(too_large(len));
        }
        return read_capped(response, MAX_CANARY_BYTES);
    }
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    Ok(std::fs::read(path)?)
}

/// Fetch and decode a canary. Transport failures are reported as decode errors.
pub fn load(uri: &str) -> Result<Canary, CanaryError> {
    let bytes = read(uri).map_err(|e| CanaryError::Decode(format!("{uri}: {e}")))?;
    Canary::from_json(&bytes)
}

/// Host part of an `http(s)` URL, without port or credentials.
pub fn host(uri: &str) -> Option<String> {
    let rest = uri
        .strip_prefix("https://")
        .or_else(|| uri.strip_prefix("http://"))?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    let host = match host.strip_prefix('[') {
        Some(v6) => v6.split(']').next()?,
        None => host.split(':').next()?,
    };
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// Validator settings for a canary fetched from `uri`: an `http(s)` canary
/// must name the host it was served from.
pub fn validator_config_for(uri: &str) -> ValidatorConfig {
    match host(uri) {
        Some(h) => ValidatorConfig::for_domain(h),
        None => ValidatorConfig::default(),
    }
}

/// Read at most `limit` bytes, failing if the source holds more.
fn read_capped<R: Read>(reader: R, limit: u64) -> Result<Vec<u8>, NetError> {
    let mut body = Vec::new();
    reader.take(limit + 1).read_to_end(&mut body)?;
    if body.len() as u64 > limit {
        return Err(too_large(body.len() as u64));
    }
    Ok(body)
}

fn too_large(len: u64) -> NetError {
    NetError::Payload(format!("canary is {len} bytes or more, limit is {MAX_CANARY_BYTES}"))
}

fn is_http(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host() {
        assert_eq!(host("https://Example.com/canary.json").as_deref(), Some("example.com"));
        assert_eq!(host("http://www.example.com:8080/a?b").as_deref(), Some("www.example.com"));
        assert_eq!(host("https://user:pw@example.org").as_deref(), Some("example.org"));
        assert_eq!(host("http://[::1]:8080/").as_deref(), Some("::1"));
        assert_eq!(host("/tmp/canary.json"), None);
        assert_eq!(host("https:///nohost"), None);
    }

    #[test]
    fn test_validator_config_for() {
        let config = validator_config_for("https://www.example.com/canary.json");
        assert_eq!(config.expected_domain.as_deref(), Some("www.example.com"));
        assert!(validator_config_for("canary.json").expected_domain.is_none());
    }

    #[test]
    fn test_read_capped() {
        let body = vec![b'x'; 16];
        assert_eq!(read_capped(body.as_slice(), 16).unwrap(), body);
        assert!(matches!(read_capped(body.as_slice(), 15), Err(NetError::Payload(_))));
    }

    #[test]
    fn test_read_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canary.json");
        std::fs::write(&path, b"{}").unwrap();
        let path = path.to_str().unwrap();

        assert_eq!(read(path).unwrap(), b"{}");
        assert_eq!(read(&format!("file://{path}")).unwrap(), b"{}");
        assert!(matches!(read("/definitely/not/here.json"), Err(NetError::Io(_))));
        assert!(matches!(load(path), Err(CanaryError::Decode(_))));
    }
}
