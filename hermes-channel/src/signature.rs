//! Signer recovery for channel authorizations.
//!
//! Every channel authorization (settlement promises, exit requests, destination
//! cheques) is a 65-byte secp256k1 signature in `r ‖ s ‖ v` layout over a
//! 32-byte digest. [`recover`] turns such a signature back into the address of
//! its signer, rejecting anything that is malformed or malleable.

use alloy_primitives::{Address, B256, Signature, U256, eip191_hash_message, uint};
use serde::{Deserialize, Serialize};

/// Length of a compact `r ‖ s ‖ v` signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Upper bound (inclusive) for the `s` scalar: half the secp256k1 group order.
///
/// Signatures with a high `s` are rejected so that a third party cannot derive
/// a second valid signature from an observed one.
pub const SECP256K1N_HALF: U256 =
    uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// Errors from parsing a signature or recovering its signer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The signature is not exactly [`SIGNATURE_LENGTH`] bytes long.
    #[error("signature must be {SIGNATURE_LENGTH} bytes, got {0}")]
    InvalidLength(usize),
    /// The `s` scalar lies in the upper half of the curve order.
    #[error("signature 's' value is malleable")]
    MalleableSignature,
    /// The recovery byte is neither 27 nor 28.
    #[error("signature 'v' value must be 27 or 28, got {0}")]
    InvalidRecoveryId(u8),
    /// The curve point could not be recovered from the signature.
    #[error("signer recovery failed: {0}")]
    Recovery(String),
    /// Recovery produced the zero address.
    #[error("signature recovers to the zero address")]
    ZeroSigner,
}

/// How a message hash is turned into the digest that gets signed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    /// The keccak256 message hash is signed as-is.
    #[default]
    Raw,
    /// The message hash is wrapped with the `personal_sign` prefix first.
    PersonalSign,
}

impl MessageFormat {
    /// Returns the digest a signer commits to for the given message hash.
    #[must_use]
    pub fn digest(self, message_hash: B256) -> B256 {
        match self {
            Self::Raw => message_hash,
            Self::PersonalSign => hash_for_signing(message_hash),
        }
    }
}

/// Hashes `raw` under the `personal_sign` convention.
///
/// The payload is prefixed with `"\x19Ethereum Signed Message:\n" + len(raw)`
/// before hashing, so a signature over this digest can never double as a
/// signature over a raw transaction hash.
#[must_use]
pub fn hash_for_signing(raw: impl AsRef<[u8]>) -> B256 {
    eip191_hash_message(raw)
}

/// Recovers the address that produced `signature` over `digest`.
///
/// # Errors
///
/// Returns [`SignatureError`] if the signature has the wrong length, a high
/// `s` value, a recovery byte outside `{27, 28}`, cannot be recovered, or
/// recovers to the zero address.
pub fn recover(digest: &B256, signature: &[u8]) -> Result<Address, SignatureError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(SignatureError::InvalidLength(signature.len()));
    }
    let r = U256::from_be_slice(&signature[..32]);
    let s = U256::from_be_slice(&signature[32..64]);
    if s > SECP256K1N_HALF {
        return Err(SignatureError::MalleableSignature);
    }
    let y_parity = match signature[64] {
        27 => false,
        28 => true,
        other => return Err(SignatureError::InvalidRecoveryId(other)),
    };
    let signer = Signature::new(r, s, y_parity)
        .recover_address_from_prehash(digest)
        .map_err(|e| SignatureError::Recovery(e.to_string()))?;
    if signer == Address::ZERO {
        return Err(SignatureError::ZeroSigner);
    }
    Ok(signer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{b256, keccak256};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;

    const SECP256K1N: U256 =
        uint!(0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141_U256);

    fn signer() -> PrivateKeySigner {
        PrivateKeySigner::from_bytes(&b256!(
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
        ))
        .unwrap()
    }

    fn sign(digest: &B256) -> [u8; 65] {
        signer().sign_hash_sync(digest).unwrap().as_bytes()
    }

    #[test]
    fn test_recover_roundtrip() {
        let digest = keccak256(b"promise");
        let recovered = recover(&digest, &sign(&digest)).unwrap();
        assert_eq!(recovered, signer().address());
    }

    #[test]
    fn test_recover_other_digest_yields_other_signer() {
        let digest = keccak256(b"promise");
        let signature = sign(&digest);
        let recovered = recover(&keccak256(b"tampered"), &signature).unwrap();
        assert_ne!(recovered, signer().address());
    }

    #[test]
    fn test_rejects_wrong_length() {
        let digest = keccak256(b"promise");
        let signature = sign(&digest);
        assert_eq!(
            recover(&digest, &signature[..64]),
            Err(SignatureError::InvalidLength(64))
        );
        assert_eq!(recover(&digest, &[]), Err(SignatureError::InvalidLength(0)));
    }

    #[test]
    fn test_rejects_high_s() {
        let digest = keccak256(b"promise");
        let mut signature = sign(&digest);
        let s = U256::from_be_slice(&signature[32..64]);
        let flipped = SECP256K1N - s;
        signature[32..64].copy_from_slice(&flipped.to_be_bytes::<32>());
        signature[64] = if signature[64] == 27 { 28 } else { 27 };
        assert_eq!(
            recover(&digest, &signature),
            Err(SignatureError::MalleableSignature)
        );
    }

    #[test]
    fn test_rejects_bad_recovery_id() {
        let digest = keccak256(b"promise");
        let mut signature = sign(&digest);
        signature[64] = 1;
        assert_eq!(
            recover(&digest, &signature),
            Err(SignatureError::InvalidRecoveryId(1))
        );
    }

    #[test]
    fn test_personal_sign_digest_differs_from_raw() {
        let hash = keccak256(b"exit");
        assert_eq!(MessageFormat::Raw.digest(hash), hash);
        assert_eq!(MessageFormat::PersonalSign.digest(hash), hash_for_signing(hash));
        assert_ne!(MessageFormat::PersonalSign.digest(hash), hash);
    }

    #[test]
    fn test_hash_for_signing_matches_signer_convention() {
        let message = b"hello hermes";
        let signature = signer().sign_message_sync(message).unwrap().as_bytes();
        let recovered = recover(&hash_for_signing(message), &signature).unwrap();
        assert_eq!(recovered, signer().address());
    }
}
