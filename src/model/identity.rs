//! # Identity Types
//!
//! Counterparty identity and transfer bookkeeping records shared by the
//! message hierarchy and the session state machine.

use crate::error::{Result, VaspError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of a VASP code in hex characters.
pub const VASP_CODE_LENGTH: usize = 8;

/// Length of a VAAN in hex characters.
pub const VAAN_LENGTH: usize = 24;

fn require_hex(value: &str, len: usize, what: &str) -> Result<()> {
    if value.len() != len {
        return Err(VaspError::Format(format!(
            "{what} must be {len} hex characters, got {}",
            value.len()
        )));
    }
    if !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(VaspError::Format(format!("{what} is not valid hex")));
    }
    Ok(())
}

/// Registered identifier of a VASP, 8 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaspCode(String);

impl VaspCode {
    pub fn new(code: impl Into<String>) -> Result<Self> {
        let code = code.into();
        require_hex(&code, VASP_CODE_LENGTH, "VASP code")?;
        Ok(Self(code.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VaspCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// VASP-scoped account number identifying a transfer originator or
/// beneficiary, 24 hex characters (the first 8 are the owning VASP's
/// code; the trailing check byte is kept opaque here).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vaan(String);

impl Vaan {
    pub fn new(vaan: impl Into<String>) -> Result<Self> {
        let vaan = vaan.into();
        require_hex(&vaan, VAAN_LENGTH, "VAAN")?;
        Ok(Self(vaan.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The code of the VASP that issued this account number.
    pub fn vasp_code(&self) -> VaspCode {
        VaspCode(self.0[..VASP_CODE_LENGTH].to_string())
    }
}

impl std::fmt::Display for Vaan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public identity of a VASP as advertised through the contract registry.
///
/// `handshake_key` protects messages in flight (asymmetric envelopes);
/// `signing_key` authenticates authorship. The two concerns are
/// orthogonal and use separate key pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaspInfo {
    pub name: String,
    pub vasp_code: VaspCode,
    /// On-chain registry address of the VASP contract, hex.
    pub contract_address: String,
    /// Public key for transport-level asymmetric encryption, hex.
    pub handshake_key: String,
    /// Uncompressed secp256k1 public key for signature verification, hex.
    pub signing_key: String,
}

/// Originator or beneficiary of a regulated transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelRuleParty {
    pub name: String,
    pub vaan: Vaan,
}

/// Virtual asset being transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetType {
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "BTC")]
    Btc,
}

/// Asset and amount of one transfer. Amounts are integral minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSpec {
    pub asset: AssetType,
    pub amount: u128,
}

/// Settlement transaction record carried on a dispatch message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub id: String,
    pub date_time: DateTime<Utc>,
    pub sending_address: String,
}

/// Transfer context accumulated over the lifetime of one session.
///
/// Fields fill in as the handshake progresses: parties and amount from
/// the transfer request, the settlement address from the reply, the
/// transaction record from the dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInfo {
    pub originator: Option<TravelRuleParty>,
    pub beneficiary: Option<TravelRuleParty>,
    pub transfer: Option<TransferSpec>,
    pub destination_address: Option<String>,
    pub tx: Option<TxRecord>,
}
