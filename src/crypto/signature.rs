//! # Signature Codec
//!
//! Encodes and decodes the fixed-width signature blob exchanged on the
//! wire: `hex(R) ‖ hex(S) ‖ hex(V)` with R and S zero-padded to 32 bytes
//! each and a single recovery byte V, no separators, no `0x` prefix.
//!
//! A blob of any other length, or one that does not decode as hex, is a
//! format error. "Wrong signer" is not this module's concern: the codec
//! only guarantees structure.

use crate::error::{Result, VaspError};

/// Total signature length in hex characters: R (64) + S (64) + V (2).
pub const SIGNATURE_LENGTH: usize = 130;

/// Decoded form of a wire signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureData {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl SignatureData {
    /// Encode to the fixed-width hex wire form.
    ///
    /// R and S are emitted zero-padded to 64 hex characters regardless
    /// of magnitude; V is two hex characters.
    pub fn encode(&self) -> String {
        format!(
            "{}{}{:02x}",
            hex::encode(self.r),
            hex::encode(self.s),
            self.v
        )
    }

    /// Decode from the hex wire form.
    ///
    /// # Errors
    /// Returns a format error on wrong length or undecodable hex.
    pub fn decode(signature: &str) -> Result<Self> {
        if signature.len() != SIGNATURE_LENGTH {
            return Err(VaspError::Format(format!(
                "signature must be {SIGNATURE_LENGTH} hex characters, got {}",
                signature.len()
            )));
        }
        let bytes = hex::decode(signature)
            .map_err(|e| VaspError::Format(format!("signature is not valid hex: {e}")))?;

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, v: bytes[64] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let sig = SignatureData {
            r: [0x11; 32],
            s: [0x22; 32],
            v: 27,
        };
        let encoded = sig.encode();
        assert_eq!(encoded.len(), SIGNATURE_LENGTH);
        assert_eq!(SignatureData::decode(&encoded).unwrap(), sig);
    }

    #[test]
    fn small_components_are_zero_padded() {
        let mut r = [0u8; 32];
        r[31] = 0x05;
        let sig = SignatureData { r, s: [0u8; 32], v: 0 };
        let encoded = sig.encode();
        assert!(encoded.starts_with(&"0".repeat(63)));
        assert_eq!(encoded.len(), SIGNATURE_LENGTH);
    }

    #[test]
    fn wrong_length_is_format_error() {
        assert!(SignatureData::decode("abcd").is_err());
        assert!(SignatureData::decode(&"0".repeat(SIGNATURE_LENGTH - 2)).is_err());
        assert!(SignatureData::decode(&"0".repeat(SIGNATURE_LENGTH + 2)).is_err());
    }

    #[test]
    fn non_hex_is_format_error() {
        assert!(SignatureData::decode(&"zz".repeat(SIGNATURE_LENGTH / 2)).is_err());
    }
}
