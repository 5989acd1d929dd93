//! # Payload Envelopes
//!
//! Confidentiality for payloads in flight on the local bus.
//!
//! Symmetric envelopes seal with XChaCha20-Poly1305 under the shared
//! key. Asymmetric envelopes derive a one-off sealing key from an
//! ephemeral x25519 exchange against the recipient's handshake key,
//! then seal the same way; the ephemeral public key rides along in the
//! envelope. Opening with the wrong key fails the AEAD tag check, which
//! is how the bus decides a payload is not for a given subscriber.

use crate::error::{Result, VaspError};
use crate::model::EncryptionType;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::Zeroize;

/// XChaCha20-Poly1305 nonce width in bytes.
const NONCE_LENGTH: usize = 24;

#[derive(Serialize, Deserialize)]
struct Envelope {
    /// Present only on asymmetric envelopes.
    ephemeral_key: Option<[u8; 32]>,
    nonce: [u8; NONCE_LENGTH],
    ciphertext: Vec<u8>,
}

fn decode_key(key: &str, what: &str) -> Result<[u8; 32]> {
    let cleaned = key.strip_prefix("0x").unwrap_or(key);
    let mut bytes = hex::decode(cleaned)
        .map_err(|e| VaspError::Format(format!("{what} is not valid hex: {e}")))?;
    if bytes.len() != 32 {
        bytes.zeroize();
        return Err(VaspError::Format(format!("{what} must be 32 bytes")));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    bytes.zeroize();
    Ok(out)
}

fn generate_nonce() -> [u8; NONCE_LENGTH] {
    let mut nonce = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Derive the sealing key for an asymmetric envelope. Both public keys
/// enter the hash for domain separation.
fn derive_sealing_key(shared_secret: &[u8; 32], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"vasp-envelope-v1");
    hasher.update(shared_secret);
    hasher.update(b"ephemeral");
    hasher.update(ephemeral);
    hasher.update(b"recipient");
    hasher.update(recipient);
    hasher.finalize().into()
}

fn encrypt(mut key: [u8; 32], nonce: &[u8; NONCE_LENGTH], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new((&key).into());
    key.zeroize();
    cipher
        .encrypt(XNonce::from_slice(nonce), plaintext)
        .map_err(|_| VaspError::Crypto("encryption failed".into()))
}

fn decrypt(mut key: [u8; 32], nonce: &[u8; NONCE_LENGTH], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new((&key).into());
    key.zeroize();
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaspError::Crypto("decryption failed".into()))
}

/// Seal a payload. For [`EncryptionType::Symmetric`], `key` is the
/// shared hex key; for [`EncryptionType::Asymmetric`], the recipient's
/// handshake public key.
pub fn seal(encryption: EncryptionType, key: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let nonce = generate_nonce();
    let envelope = match encryption {
        EncryptionType::Symmetric => {
            let shared = decode_key(key, "symmetric key")?;
            Envelope {
                ephemeral_key: None,
                nonce,
                ciphertext: encrypt(shared, &nonce, plaintext)?,
            }
        }
        EncryptionType::Asymmetric => {
            let recipient_bytes = decode_key(key, "handshake public key")?;
            let recipient = PublicKey::from(recipient_bytes);
            let ephemeral = EphemeralSecret::random_from_rng(OsRng);
            let ephemeral_public = PublicKey::from(&ephemeral).to_bytes();
            let shared = ephemeral.diffie_hellman(&recipient);
            let sealing_key =
                derive_sealing_key(shared.as_bytes(), &ephemeral_public, &recipient_bytes);
            Envelope {
                ephemeral_key: Some(ephemeral_public),
                nonce,
                ciphertext: encrypt(sealing_key, &nonce, plaintext)?,
            }
        }
    };
    bincode::serialize(&envelope).map_err(|e| VaspError::Serialization(e.to_string()))
}

/// Open a sealed payload. For [`EncryptionType::Symmetric`], `key` is
/// the shared hex key; for [`EncryptionType::Asymmetric`], the
/// recipient's handshake *private* key.
///
/// # Errors
/// A crypto error when the envelope was sealed for a different key or
/// mode; a format error on undecodable framing or key material.
pub fn open(encryption: EncryptionType, key: &str, sealed: &[u8]) -> Result<Vec<u8>> {
    let envelope: Envelope = bincode::deserialize(sealed)
        .map_err(|e| VaspError::Format(format!("malformed envelope: {e}")))?;

    match (encryption, envelope.ephemeral_key) {
        (EncryptionType::Symmetric, None) => {
            let shared = decode_key(key, "symmetric key")?;
            decrypt(shared, &envelope.nonce, &envelope.ciphertext)
        }
        (EncryptionType::Asymmetric, Some(ephemeral_public)) => {
            let secret_bytes = decode_key(key, "handshake private key")?;
            let secret = StaticSecret::from(secret_bytes);
            let own_public = PublicKey::from(&secret).to_bytes();
            let shared = secret.diffie_hellman(&PublicKey::from(ephemeral_public));
            let sealing_key = derive_sealing_key(shared.as_bytes(), &ephemeral_public, &own_public);
            decrypt(sealing_key, &envelope.nonce, &envelope.ciphertext)
        }
        _ => Err(VaspError::Crypto(
            "envelope encryption mode mismatch".into(),
        )),
    }
}

/// Generate a fresh symmetric envelope key, hex-encoded.
pub fn generate_sym_key() -> String {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    let encoded = hex::encode(key);
    key.zeroize();
    encoded
}

/// Derive a symmetric envelope key from a shared password.
pub fn sym_key_from_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"vasp-sym-key-v1");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate an x25519 handshake key pair as `(private hex, public hex)`.
pub fn generate_handshake_keypair() -> (String, String) {
    let mut secret_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut secret_bytes);
    let secret = StaticSecret::from(secret_bytes);
    let public = PublicKey::from(&secret);
    let pair = (hex::encode(secret.to_bytes()), hex::encode(public.to_bytes()));
    secret_bytes.zeroize();
    pair
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_round_trip() {
        let key = generate_sym_key();
        let sealed = seal(EncryptionType::Symmetric, &key, b"travel rule data").unwrap();
        let opened = open(EncryptionType::Symmetric, &key, &sealed).unwrap();
        assert_eq!(opened, b"travel rule data");
    }

    #[test]
    fn symmetric_wrong_key_fails() {
        let sealed = seal(EncryptionType::Symmetric, &generate_sym_key(), b"data").unwrap();
        let err = open(EncryptionType::Symmetric, &generate_sym_key(), &sealed).unwrap_err();
        assert!(matches!(err, VaspError::Crypto(_)));
    }

    #[test]
    fn asymmetric_round_trip() {
        let (private_key, public_key) = generate_handshake_keypair();
        let sealed = seal(EncryptionType::Asymmetric, &public_key, b"for your eyes").unwrap();
        let opened = open(EncryptionType::Asymmetric, &private_key, &sealed).unwrap();
        assert_eq!(opened, b"for your eyes");
    }

    #[test]
    fn asymmetric_wrong_recipient_fails() {
        let (_, public_key) = generate_handshake_keypair();
        let (other_private, _) = generate_handshake_keypair();
        let sealed = seal(EncryptionType::Asymmetric, &public_key, b"data").unwrap();
        assert!(open(EncryptionType::Asymmetric, &other_private, &sealed).is_err());
    }

    #[test]
    fn mode_mismatch_is_rejected() {
        let key = generate_sym_key();
        let sealed = seal(EncryptionType::Symmetric, &key, b"data").unwrap();
        let (private_key, _) = generate_handshake_keypair();
        assert!(open(EncryptionType::Asymmetric, &private_key, &sealed).is_err());
    }

    #[test]
    fn password_keys_are_deterministic() {
        assert_eq!(
            sym_key_from_password("Hello,World!"),
            sym_key_from_password("Hello,World!")
        );
        assert_ne!(
            sym_key_from_password("Hello,World!"),
            sym_key_from_password("hello,world!")
        );
    }

    #[test]
    fn malformed_envelope_is_a_format_error() {
        let key = generate_sym_key();
        let err = open(EncryptionType::Symmetric, &key, b"\xff\xff").unwrap_err();
        assert!(matches!(err, VaspError::Format(_)));
    }
}
