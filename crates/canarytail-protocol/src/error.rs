//! Error taxonomy for canary signing and validation.
//!
//! Every failure is terminal for a single validation: nothing here is retried,
//! and validation reports the first violation it meets.

use thiserror::Error;

use crate::claim::ClaimField;
use crate::codes::Code;

/// Coarse failure class of a [`CanaryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input could not even be parsed (base64, hex, timestamp, JSON, oracle).
    Decode,
    /// A signature was parsed but does not match.
    CryptoMismatch,
    /// Threshold, required signer, panic key or roster rules broken.
    Policy,
    /// Expired, released in the future, or anchored to a stale block.
    Temporal,
    /// One or more trigger codes are absent from the claim.
    Trigger,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("required signature missing for signer '{signer}'")]
    RequiredSignatureMissing { signer: String },

    #[error("threshold not met: {signed}/{required} signers")]
    ThresholdNotMet { signed: usize, required: u32 },

    #[error("the canary has been signed with the panic key")]
    PanicKeyUsed,

    #[error("signer is not on the canary roster")]
    UnknownSigner,

    #[error("the given key does not match the canary panic key")]
    PanicKeyMismatch,

    #[error("domain mismatch: canary is for '{found}', expected '{expected}'")]
    DomainMismatch { expected: String, found: String },

    #[error("invalid claim: {0}")]
    InvalidClaim(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemporalViolation {
    #[error("the canary expired at {expiry}")]
    Expired { expiry: String },

    #[error("the canary is released with a date in the future: {release}")]
    ReleasedInFuture { release: String },

    #[error("stale freshness anchor: release is {lag_secs}s after the block (tolerance {tolerance_secs}s)")]
    StaleFreshness { lag_secs: i64, tolerance_secs: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanaryError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("signature mismatch for signer '{signer}' on field '{field}'")]
    CryptoMismatch { signer: String, field: ClaimField },

    #[error("signature missing for signer '{signer}'{}", field_suffix(.field))]
    MissingSignature { signer: String, field: Option<ClaimField> },

    #[error("policy violation: {0}")]
    Policy(#[from] PolicyViolation),

    #[error("temporal violation: {0}")]
    Temporal(#[from] TemporalViolation),

    #[error("trigger codes present: {}", format_codes(.missing))]
    Trigger { missing: Vec<Code> },

    #[error("block time lookup failed: {0}")]
    Oracle(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("canary not found")]
    CanaryNotFound,
}

impl CanaryError {
    /// Map this error onto the five-class failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) | Self::Oracle(_) | Self::Storage(_) | Self::CanaryNotFound => ErrorKind::Decode,
            Self::CryptoMismatch { .. } | Self::MissingSignature { .. } => ErrorKind::CryptoMismatch,
            Self::Policy(_) => ErrorKind::Policy,
            Self::Temporal(_) => ErrorKind::Temporal,
            Self::Trigger { .. } => ErrorKind::Trigger,
        }
    }
}

impl From<serde_json::Error> for CanaryError {
    fn from(err: serde_json::Error) -> Self {
        CanaryError::Decode(format!("json: {err}"))
    }
}

impl From<base64::DecodeError> for CanaryError {
    fn from(err: base64::DecodeError) -> Self {
        CanaryError::Decode(format!("base64: {err}"))
    }
}

impl From<hex::FromHexError> for CanaryError {
    fn from(err: hex::FromHexError) -> Self {
        CanaryError::Decode(format!("hex: {err}"))
    }
}

impl From<chrono::ParseError> for CanaryError {
    fn from(err: chrono::ParseError) -> Self {
        CanaryError::Decode(format!("timestamp: {err}"))
    }
}

fn field_suffix(field: &Option<ClaimField>) -> String {
    match field {
        Some(f) => format!(" on field '{f}'"),
        None => String::new(),
    }
}

fn format_codes(codes: &[Code]) -> String {
    codes.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(CanaryError::Decode("x".into()).kind(), ErrorKind::Decode);
        assert_eq!(CanaryError::Oracle("down".into()).kind(), ErrorKind::Decode);
        assert_eq!(
            CanaryError::CryptoMismatch { signer: "a".into(), field: ClaimField::Codes }.kind(),
            ErrorKind::CryptoMismatch
        );
        assert_eq!(CanaryError::from(PolicyViolation::PanicKeyUsed).kind(), ErrorKind::Policy);
        assert_eq!(
            CanaryError::from(TemporalViolation::Expired { expiry: "x".into() }).kind(),
            ErrorKind::Temporal
        );
        assert_eq!(CanaryError::Trigger { missing: vec![Code::War] }.kind(), ErrorKind::Trigger);
    }

    #[test]
    fn test_messages() {
        let err = CanaryError::Trigger { missing: vec![Code::War, Code::Gag] };
        assert_eq!(err.to_string(), "trigger codes present: war, gag");

        let err = CanaryError::MissingSignature { signer: "abc".into(), field: None };
        assert_eq!(err.to_string(), "signature missing for signer 'abc'");

        let err = CanaryError::MissingSignature { signer: "abc".into(), field: Some(ClaimField::Expiry) };
        assert_eq!(err.to_string(), "signature missing for signer 'abc' on field 'expiry'");
    }
}
