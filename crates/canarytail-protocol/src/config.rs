use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::FRESHNESS_TOLERANCE_SECS;
use crate::error::CanaryError;

/// Validator settings.
///
/// ```toml
/// freshness_tolerance_secs = 3600
/// expected_domain = "example.com"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Maximum allowed `release - block_time`.
    pub freshness_tolerance_secs: u64,
    /// When set, the canary's domain must match (case-insensitive, leading `www.` ignored).
    pub expected_domain: Option<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            freshness_tolerance_secs: FRESHNESS_TOLERANCE_SECS,
            expected_domain: None,
        }
    }
}

impl ValidatorConfig {
    pub fn for_domain(domain: impl Into<String>) -> Self {
        Self {
            expected_domain: Some(domain.into()),
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, CanaryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CanaryError::Storage(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, CanaryError> {
        toml::from_str(content).map_err(|e| CanaryError::Decode(format!("config: {e}")))
    }
}

/// Compare domains ignoring case, surrounding whitespace, a trailing dot and a leading `www.`.
pub fn domain_matches(expected: &str, found: &str) -> bool {
    fn normalize(d: &str) -> String {
        let d = d.trim().trim_end_matches('.').to_ascii_lowercase();
        match d.strip_prefix("www.") {
            Some(rest) => rest.to_string(),
            None => d,
        }
    }
    normalize(expected) == normalize(found)
}
