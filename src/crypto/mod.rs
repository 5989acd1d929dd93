//! # Signing & Verification
//!
//! Ethereum-style message authentication for protocol payloads.
//!
//! ## Components
//! - **SignatureData**: the fixed-width R‖S‖V hex codec
//! - **SignService**: prefixed-digest signing and recovery-based
//!   verification against a claimed public key
//!
//! ## Security
//! - secp256k1 recoverable ECDSA (RFC 6979 deterministic nonces via k256)
//! - Keccak-256 digests with the `"\x19Ethereum Signed Message:\n"` prefix
//! - Private key material is zeroized after use

pub mod signature;
pub mod signer;

pub use signature::{SignatureData, SIGNATURE_LENGTH};
pub use signer::{keccak256, signer_address, SignService};
