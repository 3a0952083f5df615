//! Roster policy: panic key trapdoor, required signers, M-of-N threshold.

use crate::canary::Canary;
use crate::crypto::parse_public_key;
use crate::error::{CanaryError, PolicyViolation};

/// Check the signature map against the roster.
///
/// Order: panic key, required signers, threshold, then every present
/// roster signer's set. The first failure is returned.
pub fn validate_threshold(canary: &Canary) -> Result<(), CanaryError> {
    check_panic_key(canary)?;

    let roster = &canary.claim.public_keys;
    if let Some(missing) = roster.iter().find(|s| s.required && !canary.is_signed_by(&s.key)) {
        return Err(PolicyViolation::RequiredSignatureMissing { signer: missing.name.clone() }.into());
    }

    let signed: Vec<_> = roster.iter().filter(|s| canary.is_signed_by(&s.key)).collect();
    if signed.len() < canary.claim.min_signers as usize {
        return Err(PolicyViolation::ThresholdNotMet {
            signed: signed.len(),
            required: canary.claim.min_signers,
        }
        .into());
    }

    for signer in signed {
        let key = parse_public_key(&signer.key)?;
        canary.validate_signatures(&key)?;
    }
    Ok(())
}

/// Fails with `PanicKeyUsed` when a set produced by the panic key verifies
/// against the current claim. An empty panic key disables the check.
pub fn check_panic_key(canary: &Canary) -> Result<(), CanaryError> {
    if canary.claim.panic_key.is_empty() {
        return Ok(());
    }
    let panic_key = parse_public_key(&canary.claim.panic_key)?;
    if canary.validate_signatures(&panic_key).is_ok() {
        return Err(PolicyViolation::PanicKeyUsed.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{ClaimBuilder, Signer};
    use crate::crypto::generate_keypair;
    use ed25519_dalek::SigningKey;

    const HASH: &str = "00000000000000000002a7c4c1e48d76c5a37902165a270156b7a8d72728a054";

    fn setup(min: u32) -> (Canary, SigningKey, SigningKey, SigningKey) {
        let author = generate_keypair();
        let bob = generate_keypair();
        let carol = generate_keypair();
        let claim = ClaimBuilder::new("example.com", &author.verifying_key())
            .signer(Signer::cosigner("bob", &bob.verifying_key(), false))
            .signer(Signer::cosigner("carol", &carol.verifying_key(), false))
            .min_signers(min)
            .freshness(HASH)
            .build()
            .unwrap();
        let canary = Canary::new(claim, &author).unwrap();
        (canary, author, bob, carol)
    }

    #[test]
    fn test_threshold_not_met() {
        let (mut canary, _, bob, _) = setup(3);
        canary.cosign(&bob).unwrap();
        let err = validate_threshold(&canary).unwrap_err();
        assert_eq!(err, CanaryError::from(PolicyViolation::ThresholdNotMet { signed: 2, required: 3 }));
    }

    #[test]
    fn test_threshold_met() {
        let (mut canary, _, bob, carol) = setup(3);
        canary.cosign(&bob).unwrap();
        canary.cosign(&carol).unwrap();
        assert!(validate_threshold(&canary).is_ok());
    }

    #[test]
    fn test_signers_off_roster_do_not_count() {
        let (mut canary, _, _, _) = setup(2);
        canary.sign(&generate_keypair());
        assert!(matches!(
            validate_threshold(&canary),
            Err(CanaryError::Policy(PolicyViolation::ThresholdNotMet { signed: 1, .. }))
        ));
    }

    #[test]
    fn test_stale_cosignature_is_terminal() {
        let (mut canary, author, bob, _) = setup(2);
        canary.cosign(&bob).unwrap();
        canary.claim.mirrors.push("https://mirror.example.org".into());
        canary.sign(&author);
        assert!(matches!(validate_threshold(&canary), Err(CanaryError::CryptoMismatch { .. })));
    }

    #[test]
    fn test_malformed_panic_key_is_decode_error() {
        let (mut canary, _, _, _) = setup(1);
        canary.claim.panic_key = "@@".into();
        assert!(matches!(check_panic_key(&canary), Err(CanaryError::Decode(_))));
    }
}
