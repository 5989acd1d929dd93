//! # Signing Service
//!
//! Signs protocol payloads with a secp256k1 private key and verifies a
//! payload/signature/public-key triple by address recovery.
//!
//! The digest is the Ethereum "personal message" construction: Keccak-256
//! over the literal prefix `"\x19Ethereum Signed Message:\n"`, the decimal
//! byte length of the payload, and the payload itself. Verification does
//! not trust the V byte: all four candidate recovery ids are tried and
//! the signature is valid iff any recovered key maps to the same account
//! address as the claimed public key. Some counterparty clients encode V
//! in ways that do not disambiguate the recovery id, so the bounded
//! brute-force stays.

use crate::error::{Result, VaspError};
use crate::crypto::signature::SignatureData;
use crate::model::VaspMessage;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use tracing::{instrument, trace};
use zeroize::Zeroize;

/// Prefix of the Ethereum "personal message" digest construction.
const MESSAGE_PREFIX: &str = "\u{19}Ethereum Signed Message:\n";

/// Width of an uncompressed public key body (x ‖ y) in hex characters.
const UNCOMPRESSED_KEY_LENGTH: usize = 128;

/// Chain offset added to a raw recovery id to form the classic V byte.
const V_OFFSET: u8 = 27;

/// Keccak-256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn prefixed_digest(payload: &[u8]) -> [u8; 32] {
    let mut data = Vec::with_capacity(MESSAGE_PREFIX.len() + 20 + payload.len());
    data.extend_from_slice(MESSAGE_PREFIX.as_bytes());
    data.extend_from_slice(payload.len().to_string().as_bytes());
    data.extend_from_slice(payload);
    keccak256(&data)
}

fn clean_hex_prefix(value: &str) -> &str {
    value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")).unwrap_or(value)
}

fn address_of_verifying_key(key: &VerifyingKey) -> [u8; 20] {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 SEC1 tag, hash x ‖ y, keep the trailing 20 bytes.
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// Account address derived from a hex-encoded uncompressed public key.
///
/// Keys longer than 128 hex characters keep only their trailing 128
/// characters; some counterparty clients prepend a format byte and the
/// discarded prefix carries no meaning here.
///
/// # Errors
/// Returns a format error when the retained part is not 64 bytes of hex.
pub fn signer_address(public_key: &str) -> Result<[u8; 20]> {
    let cleaned = clean_hex_prefix(public_key);
    let body = if cleaned.len() > UNCOMPRESSED_KEY_LENGTH {
        &cleaned[cleaned.len() - UNCOMPRESSED_KEY_LENGTH..]
    } else {
        cleaned
    };
    let bytes = hex::decode(body)
        .map_err(|e| VaspError::Format(format!("public key is not valid hex: {e}")))?;
    if bytes.len() != UNCOMPRESSED_KEY_LENGTH / 2 {
        return Err(VaspError::Format(format!(
            "uncompressed public key must be {} hex characters, got {}",
            UNCOMPRESSED_KEY_LENGTH,
            body.len()
        )));
    }
    let hash = keccak256(&bytes);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Ok(address)
}

/// Stateless signing/verification service. Safe to share and call from
/// any number of sessions concurrently.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignService;

impl SignService {
    pub fn new() -> Self {
        Self
    }

    /// Sign a payload with a hex-encoded 32-byte private key.
    ///
    /// Returns the fixed-width hex signature: R and S zero-padded to 64
    /// hex characters each, followed by the V byte (`recovery id + 27`).
    ///
    /// # Errors
    /// Returns a format error on malformed key material.
    #[instrument(skip(self, payload, private_key))]
    pub fn sign(&self, payload: &[u8], private_key: &str) -> Result<String> {
        let mut key_bytes = decode_private_key(private_key)?;
        let signing_key = SigningKey::from_bytes((&key_bytes).into())
            .map_err(|e| VaspError::Format(format!("invalid private key: {e}")));
        key_bytes.zeroize();
        let signing_key = signing_key?;

        let digest = prefixed_digest(payload);
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| VaspError::Crypto(format!("signing failed: {e}")))?;

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);

        Ok(SignatureData {
            r,
            s,
            v: recovery_id.to_byte() + V_OFFSET,
        }
        .encode())
    }

    /// Verify a payload/signature pair against a claimed public key.
    ///
    /// Recovers candidate public keys for every possible recovery id and
    /// compares their account addresses with the claimed key's address.
    /// A well-formed signature that matches no candidate yields
    /// `Ok(false)`; callers must be able to tell a wrong signer apart
    /// from garbage input.
    ///
    /// # Errors
    /// Returns a format error on wrong-length or non-hex signature or
    /// public key. Never errors on a mere verification mismatch.
    #[instrument(skip(self, payload, signature, public_key))]
    pub fn verify(&self, payload: &[u8], signature: &str, public_key: &str) -> Result<bool> {
        let decoded = SignatureData::decode(signature)?;
        let expected = signer_address(public_key)?;

        // Kept for wire compatibility checks; recovery below does not
        // depend on it.
        let v = if decoded.v < V_OFFSET {
            decoded.v + V_OFFSET
        } else {
            decoded.v
        };
        trace!(v, "verifying signature");

        let mut sig_bytes = [0u8; 64];
        sig_bytes[..32].copy_from_slice(&decoded.r);
        sig_bytes[32..].copy_from_slice(&decoded.s);
        let sig = match Signature::from_slice(&sig_bytes) {
            Ok(sig) => sig,
            // Hex-valid but cryptographically impossible scalars: this
            // is a failed verification, not a framing problem.
            Err(_) => return Ok(false),
        };

        let digest = prefixed_digest(payload);
        for candidate in 0..4u8 {
            let Some(recovery_id) = RecoveryId::from_byte(candidate) else {
                continue;
            };
            if let Ok(recovered) = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id) {
                if address_of_verifying_key(&recovered) == expected {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Serialize a message to its JSON body and append the signature
    /// over that body. This is the payload handed to the transport.
    pub fn make_signed_payload(&self, message: &VaspMessage, private_key: &str) -> Result<String> {
        let json = serde_json::to_string(message)
            .map_err(|e| VaspError::Serialization(e.to_string()))?;
        let signature = self.sign(json.as_bytes(), private_key)?;
        Ok(json + &signature)
    }

    /// Split a signed payload into `(json body, signature)`.
    ///
    /// # Errors
    /// Returns a format error when the payload is too short to carry a
    /// signature.
    pub fn split_signed_payload(payload: &str) -> Result<(&str, &str)> {
        if payload.len() <= crate::crypto::SIGNATURE_LENGTH {
            return Err(VaspError::Format(format!(
                "signed payload too short: {} characters",
                payload.len()
            )));
        }
        Ok(payload.split_at(payload.len() - crate::crypto::SIGNATURE_LENGTH))
    }
}

fn decode_private_key(private_key: &str) -> Result<[u8; 32]> {
    let cleaned = clean_hex_prefix(private_key);
    let mut bytes = hex::decode(cleaned)
        .map_err(|e| VaspError::Format(format!("private key is not valid hex: {e}")))?;
    if bytes.len() != 32 {
        bytes.zeroize();
        return Err(VaspError::Format(
            "private key must be 32 bytes".to_string(),
        ));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    bytes.zeroize();
    Ok(out)
}
