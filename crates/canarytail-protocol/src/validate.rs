//! Top-level canary validation.
//!
//! Pure over the canary value plus one oracle lookup. The first failing
//! check is reported: claim structure, panic key, required signers,
//! threshold, signatures, domain, expiry, release, freshness, trigger codes.

use chrono::{DateTime, Utc};

use crate::canary::Canary;
use crate::config::{domain_matches, ValidatorConfig};
use crate::error::{CanaryError, PolicyViolation};
use crate::temporal::{validate_temporal, BlockTimeOracle};
use crate::threshold::validate_threshold;

/// Validates canaries against a fixed oracle and configuration.
pub struct Validator<O> {
    oracle: O,
    config: ValidatorConfig,
}

impl<O: BlockTimeOracle> Validator<O> {
    pub fn new(oracle: O) -> Self {
        Self::with_config(oracle, ValidatorConfig::default())
    }

    pub fn with_config(oracle: O, config: ValidatorConfig) -> Self {
        Self { oracle, config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn validate(&self, canary: &Canary) -> Result<(), CanaryError> {
        self.validate_at(canary, Utc::now())
    }

    pub fn validate_at(&self, canary: &Canary, now: DateTime<Utc>) -> Result<(), CanaryError> {
        logged(canary, run_checks(canary, &self.oracle, &self.config, now))
    }
}

/// Validate with the default configuration at the current time.
pub fn validate<O: BlockTimeOracle + ?Sized>(canary: &Canary, oracle: &O) -> Result<(), CanaryError> {
    validate_at(canary, oracle, Utc::now())
}

pub fn validate_at<O: BlockTimeOracle + ?Sized>(
    canary: &Canary,
    oracle: &O,
    now: DateTime<Utc>,
) -> Result<(), CanaryError> {
    logged(canary, run_checks(canary, oracle, &ValidatorConfig::default(), now))
}

fn run_checks<O: BlockTimeOracle + ?Sized>(
    canary: &Canary,
    oracle: &O,
    config: &ValidatorConfig,
    now: DateTime<Utc>,
) -> Result<(), CanaryError> {
    let claim = &canary.claim;
    claim.check_structure()?;
    validate_threshold(canary)?;

    if let Some(expected) = &config.expected_domain {
        if !domain_matches(expected, &claim.domain) {
            return Err(PolicyViolation::DomainMismatch {
                expected: expected.clone(),
                found: claim.domain.clone(),
            }
            .into());
        }
    }

    validate_temporal(claim, now, oracle, config.freshness_tolerance_secs)
}

fn logged(canary: &Canary, result: Result<(), CanaryError>) -> Result<(), CanaryError> {
    match &result {
        Ok(()) => tracing::info!(
            domain = %canary.claim.domain,
            release = %canary.claim.release,
            "Canary valid"
        ),
        Err(err) => tracing::warn!(
            domain = %canary.claim.domain,
            kind = ?err.kind(),
            reason = %err,
            "Canary validation failed"
        ),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{parse_timestamp, ClaimBuilder, ClaimUpdate};
    use crate::crypto::generate_keypair;
    use crate::error::ErrorKind;

    const HASH: &str = "0000000000000bae09a7a393a8acded75aa67e46cb81f7acaa5ad94f9eacd103";

    fn issued() -> (Canary, ed25519_dalek::SigningKey, DateTime<Utc>) {
        let author = generate_keypair();
        let panic_key = generate_keypair();
        let release = parse_timestamp("2024-06-01T10:00:00Z").unwrap();
        let claim = ClaimBuilder::new("example.com", &author.verifying_key())
            .panic_key(&panic_key.verifying_key())
            .released_at(release)
            .freshness(HASH)
            .build()
            .unwrap();
        (Canary::new(claim, &author).unwrap(), panic_key, release)
    }

    fn anchor(t: DateTime<Utc>) -> impl Fn(&str) -> Result<i64, CanaryError> {
        let ts = t.timestamp() - 300;
        move |_| Ok(ts)
    }

    #[test]
    fn test_valid_canary() {
        let (canary, _, release) = issued();
        let now = release + chrono::Duration::hours(2);
        assert!(validate_at(&canary, &anchor(release), now).is_ok());
        assert!(Validator::new(anchor(release)).validate_at(&canary, now).is_ok());
    }

    #[test]
    fn test_domain_mismatch() {
        let (canary, _, release) = issued();
        let now = release + chrono::Duration::hours(2);
        let validator = Validator::with_config(anchor(release), ValidatorConfig::for_domain("www.example.com"));
        assert!(validator.validate_at(&canary, now).is_ok());

        let validator = Validator::with_config(anchor(release), ValidatorConfig::for_domain("evil.example"));
        let err = validator.validate_at(&canary, now).unwrap_err();
        assert!(matches!(err, CanaryError::Policy(PolicyViolation::DomainMismatch { .. })));
    }

    #[test]
    fn test_panic_reported_even_when_expired() {
        let (mut canary, panic_key, release) = issued();
        let mut update = ClaimUpdate::new(HASH);
        update.released_at = Some(release);
        canary.panic(&panic_key, &update).unwrap();

        let long_after = release + chrono::Duration::days(365);
        let err = validate_at(&canary, &anchor(release), long_after).unwrap_err();
        assert_eq!(err, CanaryError::from(PolicyViolation::PanicKeyUsed));
        assert_eq!(err.kind(), ErrorKind::Policy);
    }

    #[test]
    fn test_structural_failure_first() {
        let (mut canary, _, release) = issued();
        canary.claim.min_signers = 0;
        let err = validate_at(&canary, &anchor(release), release).unwrap_err();
        assert!(matches!(err, CanaryError::Policy(PolicyViolation::InvalidClaim(_))));
    }

    #[test]
    fn test_custom_tolerance() {
        let (canary, _, release) = issued();
        let now = release + chrono::Duration::hours(1);
        let config = ValidatorConfig { freshness_tolerance_secs: 60, expected_domain: None };
        let err = Validator::with_config(anchor(release), config).validate_at(&canary, now).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Temporal);
    }
}
