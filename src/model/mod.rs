//! # Message Model
//!
//! The typed hierarchy of travel-rule protocol messages and the identity
//! types they carry.
//!
//! ## Components
//! - **Identity**: VASP codes, VAAN account identifiers, counterparty
//!   records, transfer and transaction records
//! - **Message**: the seven-variant [`VaspMessage`] hierarchy with its
//!   shared [`Header`], wire-tagged message types and response codes
//!
//! Everything here is plain data: no I/O, no crypto. Serialization is
//! serde-derived; the JSON body encoding is owned by the transport edge.

pub mod identity;
pub mod message;

pub use identity::{
    AssetType, TransferInfo, TransferSpec, TravelRuleParty, TxRecord, Vaan, VaspCode, VaspInfo,
};
pub use message::{
    EncryptionType, Header, MessageId, MessageType, SessionId, SessionReply, SessionRequest,
    Termination, TransferConfirmation, TransferDispatch, TransferReply, TransferRequest,
    VaspMessage, VaspResponseCode, MSG_ID_LENGTH,
};
