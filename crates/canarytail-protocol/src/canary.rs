//! The canary document: a claim plus one signature set per signer.

use std::collections::BTreeMap;

use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::claim::{CanaryClaim, ClaimField, ClaimUpdate, Role};
use crate::crypto::{
    format_public_key, format_signature, key_fingerprint, parse_signature, sign_message, verify_signature,
};
use crate::error::{CanaryError, PolicyViolation};

/// Field tag -> base64 signature over that field's canonical value.
pub type SignatureSet = BTreeMap<ClaimField, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canary {
    #[serde(rename = "canary")]
    pub claim: CanaryClaim,
    /// Keyed by base64 signer public key.
    #[serde(default)]
    pub signatures: BTreeMap<String, SignatureSet>,
}

/// Where a canary stands in its signing round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningProgress {
    /// Required signers present and the threshold reached, counting presence only.
    pub criteria_met: bool,
    /// First roster member, in roster order, without a signature set.
    pub next_signer: Option<String>,
    pub signed: usize,
}

impl SigningProgress {
    pub fn is_complete(&self) -> bool {
        self.criteria_met && self.next_signer.is_none()
    }
}

impl Canary {
    /// Issue a new canary signed by its author.
    ///
    /// `author` must hold the key of the claim's first roster entry.
    pub fn new(claim: CanaryClaim, author: &SigningKey) -> Result<Self, CanaryError> {
        claim.check_issuable()?;
        let author_key = format_public_key(&author.verifying_key());
        if claim.author().map(|a| a.key.as_str()) != Some(author_key.as_str()) {
            return Err(PolicyViolation::UnknownSigner.into());
        }

        let mut canary = Self { claim, signatures: BTreeMap::new() };
        canary.sign(author);
        tracing::info!(
            domain = %canary.claim.domain,
            signers = canary.claim.public_keys.len(),
            min_signers = canary.claim.min_signers,
            "Canary created"
        );
        Ok(canary)
    }

    pub fn version(&self) -> &str {
        &self.claim.version
    }

    /// Sign every claim field with `key`, replacing any set this key already has.
    /// Other signers' sets are left alone.
    pub fn sign(&mut self, key: &SigningKey) {
        let verifying_key = key.verifying_key();
        let fingerprint = key_fingerprint(&verifying_key);
        let mut set = SignatureSet::new();
        for field in ClaimField::ALL {
            let value = self.claim.canonical_field(field);
            let signature = sign_message(key, value.as_bytes());
            tracing::debug!(signer = %fingerprint, field = %field, "Signed claim field");
            set.insert(field, format_signature(&signature));
        }
        self.signatures.insert(format_public_key(&verifying_key), set);
        tracing::info!(domain = %self.claim.domain, signer = %fingerprint, "Canary signed");
    }

    /// Sign as a roster member. Fails with `UnknownSigner` for keys not on the roster.
    pub fn cosign(&mut self, key: &SigningKey) -> Result<(), CanaryError> {
        let encoded = format_public_key(&key.verifying_key());
        if self.claim.signer(&encoded).is_none() {
            return Err(PolicyViolation::UnknownSigner.into());
        }
        self.sign(key);
        Ok(())
    }

    pub fn is_signed_by(&self, key: &str) -> bool {
        self.signatures.contains_key(key)
    }

    /// Check `key`'s signature set against the current claim content.
    pub fn validate_signatures(&self, key: &VerifyingKey) -> Result<(), CanaryError> {
        let fingerprint = key_fingerprint(key);
        let set = self
            .signatures
            .get(&format_public_key(key))
            .ok_or_else(|| CanaryError::MissingSignature { signer: fingerprint.clone(), field: None })?;

        for field in ClaimField::ALL {
            let encoded = set
                .get(&field)
                .ok_or_else(|| CanaryError::MissingSignature { signer: fingerprint.clone(), field: Some(field) })?;
            let signature = parse_signature(encoded)?;
            let value = self.claim.canonical_field(field);
            if !verify_signature(key, value.as_bytes(), &signature) {
                return Err(CanaryError::CryptoMismatch { signer: fingerprint, field });
            }
        }
        Ok(())
    }

    /// Re-issue: apply `update`, drop every signature, and sign again as author.
    pub fn update(&mut self, author: &SigningKey, update: &ClaimUpdate) -> Result<(), CanaryError> {
        let encoded = format_public_key(&author.verifying_key());
        match self.claim.author() {
            Some(a) if a.role == Role::Author && a.key == encoded => {}
            _ => return Err(PolicyViolation::UnknownSigner.into()),
        }

        update.apply(&mut self.claim)?;
        self.signatures.clear();
        self.sign(author);
        tracing::info!(
            domain = %self.claim.domain,
            release = %self.claim.release,
            freshness = %self.claim.freshness,
            "Canary updated"
        );
        Ok(())
    }

    /// Re-issue signed with the panic key only. Validation of the result fails.
    pub fn panic(&mut self, panic_key: &SigningKey, update: &ClaimUpdate) -> Result<(), CanaryError> {
        if format_public_key(&panic_key.verifying_key()) != self.claim.panic_key {
            return Err(PolicyViolation::PanicKeyMismatch.into());
        }

        update.apply(&mut self.claim)?;
        self.signatures.clear();
        self.sign(panic_key);
        tracing::info!(domain = %self.claim.domain, "Canary panicked");
        Ok(())
    }

    pub fn signing_progress(&self) -> SigningProgress {
        let signed = self.claim.public_keys.iter().filter(|s| self.is_signed_by(&s.key)).count();
        let mut criteria_met = signed >= self.claim.min_signers as usize;
        let mut next_signer = None;
        for signer in &self.claim.public_keys {
            let present = self.is_signed_by(&signer.key);
            if signer.required && !present {
                criteria_met = false;
            }
            if next_signer.is_none() && !present {
                next_signer = Some(signer.name.clone());
            }
        }
        SigningProgress { criteria_met, next_signer, signed }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, CanaryError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<String, CanaryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{ClaimBuilder, Signer};
    use crate::crypto::generate_keypair;

    const HASH: &str = "0000000000000bae09a7a393a8acded75aa67e46cb81f7acaa5ad94f9eacd103";

    fn claim_for(author: &SigningKey, cosigners: &[(&str, &SigningKey, bool)], min: u32) -> CanaryClaim {
        let mut builder = ClaimBuilder::new("example.com", &author.verifying_key())
            .panic_key(&generate_keypair().verifying_key())
            .min_signers(min)
            .freshness(HASH);
        for (name, key, required) in cosigners {
            builder = builder.signer(Signer::cosigner(*name, &key.verifying_key(), *required));
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_new_signs_as_author() {
        let author = generate_keypair();
        let canary = Canary::new(claim_for(&author, &[], 1), &author).unwrap();
        assert!(canary.validate_signatures(&author.verifying_key()).is_ok());
        assert_eq!(canary.signatures.len(), 1);
        assert_eq!(canary.version(), crate::STANDARD_VERSION);
    }

    #[test]
    fn test_new_rejects_wrong_author() {
        let author = generate_keypair();
        let err = Canary::new(claim_for(&author, &[], 1), &generate_keypair()).unwrap_err();
        assert_eq!(err, CanaryError::from(PolicyViolation::UnknownSigner));
    }

    #[test]
    fn test_missing_set_and_partial_set() {
        let author = generate_keypair();
        let bob = generate_keypair();
        let mut canary = Canary::new(claim_for(&author, &[("bob", &bob, false)], 1), &author).unwrap();

        let err = canary.validate_signatures(&bob.verifying_key()).unwrap_err();
        assert!(matches!(err, CanaryError::MissingSignature { field: None, .. }));

        canary.cosign(&bob).unwrap();
        let bob_key = format_public_key(&bob.verifying_key());
        canary.signatures.get_mut(&bob_key).unwrap().remove(&ClaimField::Mirrors);
        let err = canary.validate_signatures(&bob.verifying_key()).unwrap_err();
        assert!(matches!(err, CanaryError::MissingSignature { field: Some(ClaimField::Mirrors), .. }));
    }

    #[test]
    fn test_corrupt_signature_is_decode_error() {
        let author = generate_keypair();
        let mut canary = Canary::new(claim_for(&author, &[], 1), &author).unwrap();
        let key = format_public_key(&author.verifying_key());
        canary.signatures.get_mut(&key).unwrap().insert(ClaimField::Domain, "%%%".into());
        assert!(matches!(canary.validate_signatures(&author.verifying_key()), Err(CanaryError::Decode(_))));
    }

    #[test]
    fn test_cosign_rejects_outsider() {
        let author = generate_keypair();
        let mut canary = Canary::new(claim_for(&author, &[], 1), &author).unwrap();
        let err = canary.cosign(&generate_keypair()).unwrap_err();
        assert_eq!(err, CanaryError::from(PolicyViolation::UnknownSigner));
    }

    #[test]
    fn test_resign_overwrites_own_set_only() {
        let author = generate_keypair();
        let bob = generate_keypair();
        let mut canary = Canary::new(claim_for(&author, &[("bob", &bob, false)], 1), &author).unwrap();
        canary.cosign(&bob).unwrap();
        let author_set = canary.signatures[&format_public_key(&author.verifying_key())].clone();

        canary.cosign(&bob).unwrap();
        assert_eq!(canary.signatures.len(), 2);
        assert_eq!(canary.signatures[&format_public_key(&author.verifying_key())], author_set);
    }

    #[test]
    fn test_mutation_invalidates_every_signer() {
        let author = generate_keypair();
        let bob = generate_keypair();
        let mut canary = Canary::new(claim_for(&author, &[("bob", &bob, false)], 1), &author).unwrap();
        canary.cosign(&bob).unwrap();

        canary.claim.codes.retain(|c| c != "war");
        for key in [&author, &bob] {
            let err = canary.validate_signatures(&key.verifying_key()).unwrap_err();
            assert!(matches!(err, CanaryError::CryptoMismatch { field: ClaimField::Codes, .. }));
        }
    }

    #[test]
    fn test_update_clears_cosignatures() {
        let author = generate_keypair();
        let bob = generate_keypair();
        let mut canary = Canary::new(claim_for(&author, &[("bob", &bob, false)], 1), &author).unwrap();
        canary.cosign(&bob).unwrap();

        canary.update(&author, &ClaimUpdate::new("00aa")).unwrap();
        assert_eq!(canary.signatures.len(), 1);
        assert_eq!(canary.claim.freshness, "00aa");
        assert!(canary.validate_signatures(&author.verifying_key()).is_ok());
        assert!(canary.update(&bob, &ClaimUpdate::new("00aa")).is_err());
    }

    #[test]
    fn test_panic_requires_matching_key() {
        let author = generate_keypair();
        let panic_key = generate_keypair();
        let claim = ClaimBuilder::new("example.com", &author.verifying_key())
            .panic_key(&panic_key.verifying_key())
            .freshness(HASH)
            .build()
            .unwrap();
        let mut canary = Canary::new(claim, &author).unwrap();

        let err = canary.panic(&author, &ClaimUpdate::new(HASH)).unwrap_err();
        assert_eq!(err, CanaryError::from(PolicyViolation::PanicKeyMismatch));

        canary.panic(&panic_key, &ClaimUpdate::new(HASH)).unwrap();
        assert_eq!(canary.signatures.len(), 1);
        assert!(canary.validate_signatures(&panic_key.verifying_key()).is_ok());
        assert!(canary.validate_signatures(&author.verifying_key()).is_err());
    }

    #[test]
    fn test_signing_progress() {
        let author = generate_keypair();
        let bob = generate_keypair();
        let carol = generate_keypair();
        let mut canary = Canary::new(
            claim_for(&author, &[("bob", &bob, true), ("carol", &carol, false)], 2),
            &author,
        )
        .unwrap();

        let progress = canary.signing_progress();
        assert!(!progress.criteria_met);
        assert_eq!(progress.next_signer.as_deref(), Some("bob"));
        assert_eq!(progress.signed, 1);

        canary.cosign(&bob).unwrap();
        let progress = canary.signing_progress();
        assert!(progress.criteria_met);
        assert_eq!(progress.next_signer.as_deref(), Some("carol"));
        assert!(!progress.is_complete());

        canary.cosign(&carol).unwrap();
        assert!(canary.signing_progress().is_complete());
    }

    #[test]
    fn test_json_shape() {
        let author = generate_keypair();
        let canary = Canary::new(claim_for(&author, &[], 1), &author).unwrap();
        let json = canary.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let claim = &value["canary"];
        for tag in ["domain", "min_signers", "pubkeys", "panickey", "version", "release", "expiry", "freshness", "codes", "mirrors"] {
            assert!(claim.get(tag).is_some(), "missing claim member {tag}");
        }
        let set = &value["signatures"][format_public_key(&author.verifying_key())];
        assert_eq!(set.as_object().unwrap().len(), ClaimField::ALL.len());

        let back = Canary::from_json(json.as_bytes()).unwrap();
        assert_eq!(back, canary);
        assert!(matches!(Canary::from_json(b"{not json"), Err(CanaryError::Decode(_))));
    }
}
