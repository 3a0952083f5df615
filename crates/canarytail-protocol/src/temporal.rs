//! Validity window, freshness anchor and trigger code checks.

use chrono::{DateTime, Utc};

use crate::claim::CanaryClaim;
use crate::codes::missing_codes;
use crate::crypto::decode_block_hash;
use crate::error::{CanaryError, TemporalViolation};

/// Source of block timestamps for freshness anchors.
///
/// Failures are terminal for the validation that asked. Retrying, caching
/// and timeouts are the implementor's business.
pub trait BlockTimeOracle {
    /// Unix seconds at which the block with this hex hash was produced.
    fn block_time(&self, block_hash: &str) -> Result<i64, CanaryError>;
}

impl<F> BlockTimeOracle for F
where
    F: Fn(&str) -> Result<i64, CanaryError>,
{
    fn block_time(&self, block_hash: &str) -> Result<i64, CanaryError> {
        self(block_hash)
    }
}

/// Expiry, release-in-future, freshness lag, then trigger codes.
pub fn validate_temporal<O: BlockTimeOracle + ?Sized>(
    claim: &CanaryClaim,
    now: DateTime<Utc>,
    oracle: &O,
    tolerance_secs: u64,
) -> Result<(), CanaryError> {
    let expiry = claim.expiry_time()?;
    if now > expiry {
        return Err(TemporalViolation::Expired { expiry: claim.expiry.clone() }.into());
    }

    let release = claim.release_time()?;
    if now < release {
        return Err(TemporalViolation::ReleasedInFuture { release: claim.release.clone() }.into());
    }

    check_freshness(claim, release, oracle, tolerance_secs)?;
    check_codes(claim)
}

fn check_freshness<O: BlockTimeOracle + ?Sized>(
    claim: &CanaryClaim,
    release: DateTime<Utc>,
    oracle: &O,
    tolerance_secs: u64,
) -> Result<(), CanaryError> {
    decode_block_hash(&claim.freshness)?;
    tracing::debug!(block = %claim.freshness, "Looking up freshness anchor");
    let block_time = oracle.block_time(&claim.freshness)?;

    // A release before the block is clock drift, not staleness.
    let lag_secs = release.timestamp().checked_sub(block_time).ok_or_else(|| {
        CanaryError::Oracle(format!("block time {block_time} for {} is out of range", claim.freshness))
    })?;
    if lag_secs > i64::try_from(tolerance_secs).unwrap_or(i64::MAX) {
        return Err(TemporalViolation::StaleFreshness { lag_secs, tolerance_secs }.into());
    }
    Ok(())
}

/// Fails with `Trigger` when any code of the standard is absent from the claim.
pub fn check_codes(claim: &CanaryClaim) -> Result<(), CanaryError> {
    let missing = missing_codes(&claim.codes);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CanaryError::Trigger { missing })
    }
}
