//! # Sessions
//!
//! Session-scoped protocol state: one [`Session`] binds a handshake to
//! its evolving transfer context and enforces the legal message order;
//! the [`SessionRegistry`](registry::SessionRegistry) keys live sessions
//! by correlation id and keeps lookups race-free.

pub mod registry;
pub mod state;

pub use registry::{RegistryStats, SessionRegistry};
pub use state::SessionState;

use crate::model::{SessionId, TransferInfo, VaspInfo, VaspMessage};
use std::time::Instant;
use tracing::debug;

/// One live protocol session between two counterparties.
///
/// Owned by the registry that created it and mutated only by dispatch
/// callbacks running under the session's lock. The transfer context
/// fills in as messages are accepted; the peer identity is captured
/// from the handshake messages.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    state: SessionState,
    own_info: VaspInfo,
    peer_info: Option<VaspInfo>,
    transfer_info: TransferInfo,
    #[allow(dead_code)]
    created_at: Instant,
    last_activity: Instant,
}

impl Session {
    /// Create a fresh session awaiting its opening request.
    pub fn new(id: SessionId, own_info: VaspInfo) -> Self {
        let now = Instant::now();
        Self {
            id,
            state: SessionState::AwaitingSessionRequest,
            own_info,
            peer_info: None,
            transfer_info: TransferInfo::default(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// This VASP's identity as advertised to the counterparty.
    pub fn own_info(&self) -> &VaspInfo {
        &self.own_info
    }

    /// The counterparty's identity, once a handshake message carried it.
    pub fn peer_info(&self) -> Option<&VaspInfo> {
        self.peer_info.as_ref()
    }

    pub fn transfer_info(&self) -> &TransferInfo {
        &self.transfer_info
    }

    pub fn transfer_info_mut(&mut self) -> &mut TransferInfo {
        &mut self.transfer_info
    }

    pub(crate) fn idle_for(&self) -> std::time::Duration {
        self.last_activity.elapsed()
    }

    /// Commit an accepted inbound message: absorb its fields into the
    /// session context and advance to the already-validated successor
    /// state. Dispatch calls this only after the handler callback
    /// succeeded.
    pub(crate) fn commit_inbound(&mut self, message: &VaspMessage, next: SessionState) {
        self.absorb(message, true);
        debug!(session = %self.id, from = %self.state, to = %next, "session advanced");
        self.state = next;
        self.last_activity = Instant::now();
    }

    /// Commit a message this side sent. Sends walk the same state
    /// machine as receipts, but an outbound handshake message carries
    /// our own identity and must not overwrite the peer's.
    pub(crate) fn commit_outbound(&mut self, message: &VaspMessage, next: SessionState) {
        self.absorb(message, false);
        debug!(session = %self.id, from = %self.state, to = %next, "session advanced (outbound)");
        self.state = next;
        self.last_activity = Instant::now();
    }

    fn absorb(&mut self, message: &VaspMessage, inbound: bool) {
        match message {
            VaspMessage::SessionRequest(m) if inbound => {
                self.peer_info = Some(m.sender.clone());
            }
            VaspMessage::SessionReply(m) if inbound => {
                self.peer_info = Some(m.sender.clone());
            }
            VaspMessage::SessionRequest(_) | VaspMessage::SessionReply(_) => {}
            VaspMessage::TransferRequest(m) => {
                self.transfer_info.originator = Some(m.originator.clone());
                self.transfer_info.beneficiary = Some(m.beneficiary.clone());
                self.transfer_info.transfer = Some(m.transfer);
            }
            VaspMessage::TransferReply(m) => {
                self.transfer_info.destination_address = m.destination_address.clone();
            }
            VaspMessage::TransferDispatch(m) => {
                self.transfer_info.tx = m.tx.clone();
            }
            VaspMessage::TransferConfirmation(_) | VaspMessage::Termination(_) => {}
        }
    }
}

#[cfg(test)]
pub(crate) mod tests_fixtures {
    use crate::model::{
        AssetType, Header, MessageId, MessageType, SessionId, SessionRequest, TransferRequest,
        TransferSpec, TravelRuleParty, Vaan, VaspCode, VaspInfo, VaspMessage,
    };

    pub fn vasp_info(code: &str) -> VaspInfo {
        VaspInfo {
            name: format!("VASP {code}"),
            vasp_code: VaspCode::new(code).unwrap(),
            contract_address: format!("0x{}", code.repeat(5)),
            handshake_key: "aa".repeat(32),
            signing_key: "bb".repeat(64),
        }
    }

    pub fn session_request_fixture() -> VaspMessage {
        VaspMessage::SessionRequest(SessionRequest {
            header: Header::new(
                MessageId::from_index(0),
                SessionId::new("0".repeat(32)).unwrap(),
                MessageType::SessionRequest,
            ),
            comment: "session request".into(),
            sender: vasp_info("7dface61"),
        })
    }

    pub fn transfer_request_fixture(session_id: SessionId) -> VaspMessage {
        VaspMessage::TransferRequest(TransferRequest {
            header: Header::new(MessageId::from_index(2), session_id, MessageType::TransferRequest),
            comment: String::new(),
            originator: TravelRuleParty {
                name: "Alice".into(),
                vaan: Vaan::new("7dface610123456789abcdef").unwrap(),
            },
            beneficiary: TravelRuleParty {
                name: "Bob".into(),
                vaan: Vaan::new("08c3b8b4fedcba9876543210").unwrap(),
            },
            transfer: TransferSpec {
                asset: AssetType::Eth,
                amount: 1_000,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::tests_fixtures::*;
    use super::*;
    use crate::model::MessageType;

    #[test]
    fn commit_absorbs_handshake_and_transfer_context() {
        let request = session_request_fixture();
        let session_id = request.session_id().clone();
        let mut session = Session::new(session_id.clone(), vasp_info("08c3b8b4"));

        assert!(session.peer_info().is_none());
        let next = session.state().accept(MessageType::SessionRequest).unwrap();
        session.commit_inbound(&request, next);

        let peer = session.peer_info().expect("peer captured");
        assert_eq!(peer.vasp_code.as_str(), "7dface61");
        assert_eq!(session.state(), SessionState::AwaitingSessionReply);

        // Jump the state to where a transfer request is legal.
        let reply_state = session.state();
        assert_eq!(reply_state.expected(), Some(MessageType::SessionReply));

        let transfer = transfer_request_fixture(session_id);
        let mut session = {
            let mut s = session.clone();
            // walk forward through the reply state
            let via = VaspMessage::SessionReply(crate::model::SessionReply {
                header: crate::model::Header::new(
                    crate::model::MessageId::from_index(1),
                    s.id().clone(),
                    MessageType::SessionReply,
                ),
                comment: String::new(),
                sender: vasp_info("08c3b8b4"),
            });
            let next = s.state().accept(MessageType::SessionReply).unwrap();
            s.commit_inbound(&via, next);
            s
        };

        let next = session.state().accept(MessageType::TransferRequest).unwrap();
        session.commit_inbound(&transfer, next);

        let info = session.transfer_info();
        assert_eq!(info.originator.as_ref().unwrap().name, "Alice");
        assert_eq!(info.beneficiary.as_ref().unwrap().name, "Bob");
        assert_eq!(info.transfer.unwrap().amount, 1_000);
        assert_eq!(session.state(), SessionState::AwaitingTransferReply);
    }
}
