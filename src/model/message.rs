//! # Protocol Messages
//!
//! The seven-variant [`VaspMessage`] hierarchy exchanged between two
//! VASPs over one session: a session handshake, four transfer steps and
//! a termination notice.
//!
//! Every message carries a [`Header`] with a fixed-width message id
//! (logical ordering), the session correlation id, the wire message-type
//! tag and an optional response code. The header's type tag must always
//! match the enum variant; [`VaspMessage::validate`] enforces this plus
//! the id-width invariants on anything that arrived off the wire.

use crate::error::{Result, VaspError};
use crate::model::identity::{TravelRuleParty, TransferSpec, TxRecord, VaspInfo};
use serde::{Deserialize, Serialize};

/// Width of message and session identifiers in hex characters (128 bits).
pub const MSG_ID_LENGTH: usize = 32;

fn require_id(value: &str, what: &str) -> Result<()> {
    if value.len() != MSG_ID_LENGTH {
        return Err(VaspError::Format(format!(
            "{what} must be {MSG_ID_LENGTH} hex characters, got {}",
            value.len()
        )));
    }
    if !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(VaspError::Format(format!("{what} is not valid hex")));
    }
    Ok(())
}

fn random_id() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; MSG_ID_LENGTH / 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Fixed-width hex message identifier, unique within a session.
///
/// Ids are zero-padded so lexicographic order equals numeric order;
/// they carry the logical ordering the transport does not guarantee.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        require_id(&id, "message id")?;
        Ok(Self(id.to_lowercase()))
    }

    /// Zero-padded id for a numeric index, handy for fixtures.
    pub fn from_index(index: u128) -> Self {
        Self(format!("{index:032x}"))
    }

    pub fn random() -> Self {
        Self(random_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Fixed-width hex session correlation identifier, assigned by the
/// initiating VASP on the session request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        require_id(&id, "session id")?;
        Ok(Self(id.to_lowercase()))
    }

    pub fn random() -> Self {
        Self(random_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wire tags of the protocol message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum MessageType {
    SessionRequest,
    SessionReply,
    TransferRequest,
    TransferReply,
    TransferDispatch,
    TransferConfirmation,
    Termination,
}

impl MessageType {
    /// Numeric tag used on the wire.
    pub fn wire_code(self) -> u32 {
        match self {
            MessageType::SessionRequest => 110,
            MessageType::SessionReply => 150,
            MessageType::TransferRequest => 210,
            MessageType::TransferReply => 250,
            MessageType::TransferDispatch => 310,
            MessageType::TransferConfirmation => 350,
            MessageType::Termination => 910,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageType::SessionRequest => "SessionRequest",
            MessageType::SessionReply => "SessionReply",
            MessageType::TransferRequest => "TransferRequest",
            MessageType::TransferReply => "TransferReply",
            MessageType::TransferDispatch => "TransferDispatch",
            MessageType::TransferConfirmation => "TransferConfirmation",
            MessageType::Termination => "Termination",
        }
    }

    /// The message type a counterparty answers this one with, if any.
    pub fn successor(self) -> Option<MessageType> {
        match self {
            MessageType::SessionRequest => Some(MessageType::SessionReply),
            MessageType::SessionReply => Some(MessageType::TransferRequest),
            MessageType::TransferRequest => Some(MessageType::TransferReply),
            MessageType::TransferReply => Some(MessageType::TransferDispatch),
            MessageType::TransferDispatch => Some(MessageType::TransferConfirmation),
            MessageType::TransferConfirmation => Some(MessageType::Termination),
            MessageType::Termination => None,
        }
    }
}

impl From<MessageType> for u32 {
    fn from(value: MessageType) -> Self {
        value.wire_code()
    }
}

impl TryFrom<u32> for MessageType {
    type Error = VaspError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            110 => Ok(MessageType::SessionRequest),
            150 => Ok(MessageType::SessionReply),
            210 => Ok(MessageType::TransferRequest),
            250 => Ok(MessageType::TransferReply),
            310 => Ok(MessageType::TransferDispatch),
            350 => Ok(MessageType::TransferConfirmation),
            910 => Ok(MessageType::Termination),
            other => Err(VaspError::Format(format!("unknown message type {other}"))),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome code attached to reply-class messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum VaspResponseCode {
    Ok,
    TransferDeclined,
    TcAssetsNotReceived,
}

impl From<VaspResponseCode> for u32 {
    fn from(value: VaspResponseCode) -> Self {
        match value {
            VaspResponseCode::Ok => 1,
            VaspResponseCode::TransferDeclined => 2,
            VaspResponseCode::TcAssetsNotReceived => 3,
        }
    }
}

impl TryFrom<u32> for VaspResponseCode {
    type Error = VaspError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(VaspResponseCode::Ok),
            2 => Ok(VaspResponseCode::TransferDeclined),
            3 => Ok(VaspResponseCode::TcAssetsNotReceived),
            other => Err(VaspError::Format(format!("unknown response code {other}"))),
        }
    }
}

/// How the transport protects a message in flight. Orthogonal to
/// signing: signing proves authorship, encryption protects
/// confidentiality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionType {
    Symmetric,
    Asymmetric,
}

/// Shared header of every protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub message_id: MessageId,
    pub session_id: SessionId,
    pub message_type: MessageType,
    /// Absent until a handler sets it; only reply-class messages carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<VaspResponseCode>,
}

impl Header {
    pub fn new(message_id: MessageId, session_id: SessionId, message_type: MessageType) -> Self {
        Self {
            message_id,
            session_id,
            message_type,
            response_code: None,
        }
    }
}

/// Opens a session: the initiator introduces itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub header: Header,
    #[serde(default)]
    pub comment: String,
    pub sender: VaspInfo,
}

/// Accepts (or declines, via response code) a session request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReply {
    pub header: Header,
    #[serde(default)]
    pub comment: String,
    pub sender: VaspInfo,
}

/// Announces a transfer: originator, beneficiary and amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub header: Header,
    #[serde(default)]
    pub comment: String,
    pub originator: TravelRuleParty,
    pub beneficiary: TravelRuleParty,
    pub transfer: TransferSpec,
}

/// Answers a transfer request with the settlement address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReply {
    pub header: Header,
    #[serde(default)]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_address: Option<String>,
}

/// Reports the executed settlement transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDispatch {
    pub header: Header,
    #[serde(default)]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<TxRecord>,
}

/// Confirms (or disputes, via response code) receipt of the assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfirmation {
    pub header: Header,
    #[serde(default)]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<TxRecord>,
}

/// Closes the session from either side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Termination {
    pub header: Header,
    #[serde(default)]
    pub comment: String,
}

/// One protocol message. Each value belongs to exactly one session via
/// `header.session_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaspMessage {
    SessionRequest(SessionRequest),
    SessionReply(SessionReply),
    TransferRequest(TransferRequest),
    TransferReply(TransferReply),
    TransferDispatch(TransferDispatch),
    TransferConfirmation(TransferConfirmation),
    Termination(Termination),
}

impl VaspMessage {
    pub fn header(&self) -> &Header {
        match self {
            VaspMessage::SessionRequest(m) => &m.header,
            VaspMessage::SessionReply(m) => &m.header,
            VaspMessage::TransferRequest(m) => &m.header,
            VaspMessage::TransferReply(m) => &m.header,
            VaspMessage::TransferDispatch(m) => &m.header,
            VaspMessage::TransferConfirmation(m) => &m.header,
            VaspMessage::Termination(m) => &m.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut Header {
        match self {
            VaspMessage::SessionRequest(m) => &mut m.header,
            VaspMessage::SessionReply(m) => &mut m.header,
            VaspMessage::TransferRequest(m) => &mut m.header,
            VaspMessage::TransferReply(m) => &mut m.header,
            VaspMessage::TransferDispatch(m) => &mut m.header,
            VaspMessage::TransferConfirmation(m) => &mut m.header,
            VaspMessage::Termination(m) => &mut m.header,
        }
    }

    pub fn comment(&self) -> &str {
        match self {
            VaspMessage::SessionRequest(m) => &m.comment,
            VaspMessage::SessionReply(m) => &m.comment,
            VaspMessage::TransferRequest(m) => &m.comment,
            VaspMessage::TransferReply(m) => &m.comment,
            VaspMessage::TransferDispatch(m) => &m.comment,
            VaspMessage::TransferConfirmation(m) => &m.comment,
            VaspMessage::Termination(m) => &m.comment,
        }
    }

    /// Message type implied by the concrete variant.
    pub fn message_type(&self) -> MessageType {
        match self {
            VaspMessage::SessionRequest(_) => MessageType::SessionRequest,
            VaspMessage::SessionReply(_) => MessageType::SessionReply,
            VaspMessage::TransferRequest(_) => MessageType::TransferRequest,
            VaspMessage::TransferReply(_) => MessageType::TransferReply,
            VaspMessage::TransferDispatch(_) => MessageType::TransferDispatch,
            VaspMessage::TransferConfirmation(_) => MessageType::TransferConfirmation,
            VaspMessage::Termination(_) => MessageType::Termination,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.header().session_id
    }

    /// Check the wire invariants: header tag matches the variant, ids
    /// have the fixed width. Call on anything that was deserialized.
    pub fn validate(&self) -> Result<()> {
        let header = self.header();
        if header.message_type != self.message_type() {
            return Err(VaspError::Format(format!(
                "header type {} does not match message body {}",
                header.message_type,
                self.message_type()
            )));
        }
        require_id(header.message_id.as_str(), "message id")?;
        require_id(header.session_id.as_str(), "session id")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::identity::VaspCode;

    fn test_vasp_info() -> VaspInfo {
        VaspInfo {
            name: "Test VASP".into(),
            vasp_code: VaspCode::new("7dface61").unwrap(),
            contract_address: "08c3b8b4".into(),
            handshake_key: "aa".repeat(32),
            signing_key: "bb".repeat(64),
        }
    }

    #[test]
    fn message_id_ordering_is_numeric() {
        let a = MessageId::from_index(9);
        let b = MessageId::from_index(10);
        let c = MessageId::from_index(255);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn message_id_rejects_wrong_width() {
        assert!(MessageId::new("abc").is_err());
        assert!(MessageId::new("g".repeat(MSG_ID_LENGTH)).is_err());
        assert!(MessageId::new("0".repeat(MSG_ID_LENGTH)).is_ok());
    }

    #[test]
    fn wire_codes_round_trip() {
        for mt in [
            MessageType::SessionRequest,
            MessageType::SessionReply,
            MessageType::TransferRequest,
            MessageType::TransferReply,
            MessageType::TransferDispatch,
            MessageType::TransferConfirmation,
            MessageType::Termination,
        ] {
            assert_eq!(MessageType::try_from(mt.wire_code()).unwrap(), mt);
        }
        assert!(MessageType::try_from(111).is_err());
    }

    #[test]
    fn successor_chain_ends_at_termination() {
        let mut ty = MessageType::SessionRequest;
        let mut hops = 0;
        while let Some(next) = ty.successor() {
            ty = next;
            hops += 1;
        }
        assert_eq!(ty, MessageType::Termination);
        assert_eq!(hops, 6);
    }

    #[test]
    fn validate_catches_header_mismatch() {
        let mut msg = VaspMessage::SessionRequest(SessionRequest {
            header: Header::new(
                MessageId::from_index(0),
                SessionId::random(),
                MessageType::SessionRequest,
            ),
            comment: String::new(),
            sender: test_vasp_info(),
        });
        assert!(msg.validate().is_ok());

        msg.header_mut().message_type = MessageType::Termination;
        assert!(msg.validate().is_err());
    }

    #[test]
    fn json_round_trip_preserves_message() {
        let msg = VaspMessage::TransferReply(TransferReply {
            header: Header {
                message_id: MessageId::from_index(3),
                session_id: SessionId::random(),
                message_type: MessageType::TransferReply,
                response_code: Some(VaspResponseCode::Ok),
            },
            comment: "reply".into(),
            destination_address: Some("0xdeadbeef".into()),
        });
        let json = serde_json::to_string(&msg).unwrap();
        let back: VaspMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
