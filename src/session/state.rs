//! # Session States
//!
//! The strict message ordering of one travel-rule session: a fixed
//! handshake-then-transfer sequence with a termination that is legal
//! from any non-terminal state.

use crate::error::{Result, VaspError};
use crate::model::MessageType;

/// Lifecycle state of a session. Each non-terminal state accepts exactly
/// one message type plus [`MessageType::Termination`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    AwaitingSessionRequest,
    AwaitingSessionReply,
    AwaitingTransferRequest,
    AwaitingTransferReply,
    AwaitingTransferDispatch,
    AwaitingTransferConfirmation,
    Terminated,
}

impl SessionState {
    /// The single message type this state is waiting for, `None` once
    /// terminated.
    pub fn expected(self) -> Option<MessageType> {
        match self {
            SessionState::AwaitingSessionRequest => Some(MessageType::SessionRequest),
            SessionState::AwaitingSessionReply => Some(MessageType::SessionReply),
            SessionState::AwaitingTransferRequest => Some(MessageType::TransferRequest),
            SessionState::AwaitingTransferReply => Some(MessageType::TransferReply),
            SessionState::AwaitingTransferDispatch => Some(MessageType::TransferDispatch),
            SessionState::AwaitingTransferConfirmation => Some(MessageType::TransferConfirmation),
            SessionState::Terminated => None,
        }
    }

    fn advanced(self) -> SessionState {
        match self {
            SessionState::AwaitingSessionRequest => SessionState::AwaitingSessionReply,
            SessionState::AwaitingSessionReply => SessionState::AwaitingTransferRequest,
            SessionState::AwaitingTransferRequest => SessionState::AwaitingTransferReply,
            SessionState::AwaitingTransferReply => SessionState::AwaitingTransferDispatch,
            SessionState::AwaitingTransferDispatch => SessionState::AwaitingTransferConfirmation,
            SessionState::AwaitingTransferConfirmation | SessionState::Terminated => {
                SessionState::Terminated
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Terminated
    }

    /// Validate an incoming message type and compute the successor
    /// state. The receiver is unchanged: callers commit the returned
    /// state only after the message is fully processed, so a failed
    /// handler leaves the session where a retry can still succeed.
    ///
    /// A termination notice is accepted from any state and forces
    /// `Terminated`; accepting it on an already-terminated session is a
    /// no-op rather than a violation, since the transport only promises
    /// at-least-once delivery.
    ///
    /// # Errors
    /// Returns a protocol violation when the type does not match the
    /// expected successor.
    pub fn accept(self, incoming: MessageType) -> Result<SessionState> {
        if incoming == MessageType::Termination {
            return Ok(SessionState::Terminated);
        }
        match self.expected() {
            Some(expected) if expected == incoming => Ok(self.advanced()),
            Some(expected) => Err(VaspError::UnexpectedMessage {
                expected: expected.name(),
                received: incoming.name(),
            }),
            None => Err(VaspError::UnexpectedMessage {
                expected: "no further messages (session terminated)",
                received: incoming.name(),
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SessionState::AwaitingSessionRequest => "AwaitingSessionRequest",
            SessionState::AwaitingSessionReply => "AwaitingSessionReply",
            SessionState::AwaitingTransferRequest => "AwaitingTransferRequest",
            SessionState::AwaitingTransferReply => "AwaitingTransferReply",
            SessionState::AwaitingTransferDispatch => "AwaitingTransferDispatch",
            SessionState::AwaitingTransferConfirmation => "AwaitingTransferConfirmation",
            SessionState::Terminated => "Terminated",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
