use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::CanaryError;

/// Generate a new Ed25519 keypair.
pub fn generate_keypair() -> SigningKey {
    let mut rng = rand::thread_rng();
    SigningKey::generate(&mut rng)
}

/// Sign a message with the signing key. Ed25519 signatures are deterministic.
pub fn sign_message(signing_key: &SigningKey, message: &[u8]) -> Signature {
    signing_key.sign(message)
}

/// Verify a signature against the verifying key.
///
/// Returns `false` on a cryptographic mismatch. Malformed inputs fail earlier
/// in the `parse_*` helpers.
pub fn verify_signature(verifying_key: &VerifyingKey, message: &[u8], signature: &Signature) -> bool {
    verifying_key.verify(message, signature).is_ok()
}

/// Encode a public key in its at-rest form (standard base64 of 32 bytes).
pub fn format_public_key(key: &VerifyingKey) -> String {
    STANDARD.encode(key.as_bytes())
}

/// Encode a private key in its at-rest form (standard base64 of seed || public key).
pub fn format_private_key(key: &SigningKey) -> Zeroizing<String> {
    let bytes = Zeroizing::new(key.to_keypair_bytes());
    Zeroizing::new(STANDARD.encode(bytes.as_slice()))
}

/// Decode a base64 public key.
pub fn parse_public_key(encoded: &str) -> Result<VerifyingKey, CanaryError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| CanaryError::Decode(format!("public key is {} bytes, expected 32", b.len())))?;
    VerifyingKey::from_bytes(&arr).map_err(|e| CanaryError::Decode(format!("invalid public key: {e}")))
}

/// Decode a base64 private key, either 64 bytes (seed || public key) or a bare 32-byte seed.
pub fn parse_private_key(encoded: &str) -> Result<SigningKey, CanaryError> {
    let bytes = Zeroizing::new(STANDARD.decode(encoded.trim())?);
    match bytes.len() {
        64 => {
            let mut arr = Zeroizing::new([0u8; 64]);
            arr.copy_from_slice(&bytes);
            SigningKey::from_keypair_bytes(&arr)
                .map_err(|e| CanaryError::Decode(format!("invalid private key: {e}")))
        }
        32 => {
            let mut seed = Zeroizing::new([0u8; 32]);
            seed.copy_from_slice(&bytes);
            Ok(SigningKey::from_bytes(&seed))
        }
        n => Err(CanaryError::Decode(format!("private key is {n} bytes, expected 64 or 32"))),
    }
}

/// Encode a signature for storage in a signature set.
pub fn format_signature(signature: &Signature) -> String {
    STANDARD.encode(signature.to_bytes())
}

/// Decode a base64 signature.
pub fn parse_signature(encoded: &str) -> Result<Signature, CanaryError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    let arr: [u8; 64] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| CanaryError::Decode(format!("signature is {} bytes, expected 64", b.len())))?;
    Ok(Signature::from_bytes(&arr))
}

/// Decode a hex block hash.
pub fn decode_block_hash(hash: &str) -> Result<Vec<u8>, CanaryError> {
    let bytes = hex::decode(hash.trim())?;
    if bytes.is_empty() {
        return Err(CanaryError::Decode("empty block hash".into()));
    }
    Ok(bytes)
}

/// Encode a block hash in the standard lowercase hex form.
pub fn format_block_hash(hash: &[u8]) -> String {
    hex::encode(hash)
}

/// Short, log-safe identifier for a public key: first 16 hex chars of SHA-256(key).
pub fn key_fingerprint(key: &VerifyingKey) -> String {
    let hash = Sha256::digest(key.as_bytes());
    hex::encode(&hash[..8])
}

/// Same as [`key_fingerprint`] for an encoded key; falls back to the raw string
/// when it does not decode.
pub fn encoded_key_fingerprint(encoded: &str) -> String {
    match parse_public_key(encoded) {
        Ok(key) => key_fingerprint(&key),
        Err(_) => encoded.to_string(),
    }
}
