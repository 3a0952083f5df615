//! Trigger code taxonomy.
//!
//! A claim lists the codes that have NOT been triggered ("all clear").
//! A code missing from that list means the event it names has occurred.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CanaryError, PolicyViolation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Code {
    /// Warrants
    War,
    /// Gag orders
    Gag,
    /// Subpoenas
    Subp,
    /// Trap and trace orders
    Trap,
    /// Court order to cease operations
    Cease,
    /// Coercion, blackmail, or otherwise operating under duress
    Duress,
    /// Raids with high confidence nothing containing useful data was seized
    Raid,
    /// Raids with low confidence nothing containing useful data was seized
    Seize,
    /// Compromised credentials
    Xcred,
    /// Compromised operations
    Xopers,
}

const ALL_CODES: [Code; 10] = [
    Code::War,
    Code::Gag,
    Code::Subp,
    Code::Trap,
    Code::Cease,
    Code::Duress,
    Code::Raid,
    Code::Seize,
    Code::Xcred,
    Code::Xopers,
];

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::War => "war",
            Self::Gag => "gag",
            Self::Subp => "subp",
            Self::Trap => "trap",
            Self::Cease => "cease",
            Self::Duress => "duress",
            Self::Raid => "raid",
            Self::Seize => "seize",
            Self::Xcred => "xcred",
            Self::Xopers => "xopers",
        }
    }

    /// Human-readable alert shown when this code has been triggered.
    pub fn alert(&self) -> &'static str {
        match self {
            Self::War => "Warrants received",
            Self::Gag => "Gag orders received",
            Self::Subp => "Subpoenas received",
            Self::Trap => "Trap and trace orders received",
            Self::Cease => "Court order to cease operations received",
            Self::Duress => "Coercion, blackmail, or otherwise operating under duress",
            Self::Raid => "Raids with high confidence nothing containing useful data was seized",
            Self::Seize => "Raids with low confidence nothing containing useful data was seized",
            Self::Xcred => "Compromised credentials",
            Self::Xopers => "Compromised operations",
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Code {
    type Err = CanaryError;

    /// Case-insensitive: `WAR`, `war` and `War` all name the same code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        ALL_CODES
            .iter()
            .copied()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| PolicyViolation::InvalidClaim(format!("unknown code '{s}'")).into())
    }
}

/// Every code defined by the current standard version, in canonical order.
pub fn all_codes() -> &'static [Code] {
    &ALL_CODES
}

/// Parse a list of code strings, failing on the first unknown one.
pub fn parse_codes<S: AsRef<str>>(codes: &[S]) -> Result<Vec<Code>, CanaryError> {
    codes.iter().map(|c| c.as_ref().parse()).collect()
}

/// Codes of the standard that do not appear in `clear`.
///
/// Comparison is case-insensitive and strings that name no known code are
/// ignored. The result follows [`all_codes`] order.
pub fn missing_codes<S: AsRef<str>>(clear: &[S]) -> Vec<Code> {
    let present: HashSet<Code> = clear.iter().filter_map(|c| c.as_ref().parse().ok()).collect();
    ALL_CODES.iter().copied().filter(|c| !present.contains(c)).collect()
}

/// The complement of `flagged` within [`all_codes`].
///
/// Used when issuing a canary: the operator names the events that occurred,
/// and the claim carries every other code.
pub fn inverse_codes(flagged: &[Code]) -> Vec<Code> {
    let flagged: HashSet<Code> = flagged.iter().copied().collect();
    ALL_CODES.iter().copied().filter(|c| !flagged.contains(c)).collect()
}

/// Lowercase string tags for a list of codes, in the given order.
pub fn code_strings(codes: &[Code]) -> Vec<String> {
    codes.iter().map(|c| c.as_str().to_string()).collect()
}
