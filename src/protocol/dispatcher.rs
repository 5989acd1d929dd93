//! # Message Dispatcher
//!
//! Routes each processed message through its session's state machine
//! and the registered [`TransferHandler`].
//!
//! Inbound flow: look up or create the session by correlation id,
//! validate that the message type is the legal successor of the current
//! state, build the pre-populated response stub, invoke the matching
//! callback, and only then commit the state transition. A failing
//! callback leaves the session untouched so a retry can still succeed.
//!
//! Sends walk the same state machine via
//! [`record_outbound`](MessageDispatcher::record_outbound): the session
//! advances once per message regardless of direction, which is what
//! makes both halves of a two-party exchange traverse the full state
//! sequence.

use crate::error::{Result, VaspError};
use crate::model::{
    Header, MessageId, MessageType, SessionReply, Termination, TransferConfirmation,
    TransferDispatch, TransferReply, TransferRequest, VaspInfo, VaspMessage,
};
use crate::protocol::handler::TransferHandler;
use crate::session::registry::SessionHandle;
use crate::session::{Session, SessionRegistry};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Result of dispatching one inbound message.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// The canonical response, ready for signing and publishing.
    /// `None` for a termination notice (nothing answers it) and for a
    /// session reply on a side with no seeded transfer intent.
    pub response: Option<VaspMessage>,
    /// Counterparty identity known to the session, for reply routing.
    pub peer: Option<VaspInfo>,
    /// Whether this message closed the session.
    pub terminated: bool,
}

/// Session-aware dispatch of protocol messages to handler callbacks.
pub struct MessageDispatcher {
    registry: SessionRegistry,
    handler: Arc<dyn TransferHandler>,
    own_info: VaspInfo,
}

impl MessageDispatcher {
    pub fn new(
        own_info: VaspInfo,
        handler: Arc<dyn TransferHandler>,
        registry: SessionRegistry,
    ) -> Self {
        Self {
            registry,
            handler,
            own_info,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn own_info(&self) -> &VaspInfo {
        &self.own_info
    }

    /// Process one inbound message.
    ///
    /// # Errors
    /// - format error when the message violates wire invariants
    /// - [`VaspError::SessionNotFound`] for a non-handshake message
    ///   without a session
    /// - [`VaspError::UnexpectedMessage`] when the type is illegal for
    ///   the session's current state (the session is left untouched)
    /// - any error the handler callback returns
    #[instrument(skip(self, message), fields(session = %message.session_id(), ty = %message.message_type()))]
    pub async fn dispatch(&self, message: &VaspMessage) -> Result<DispatchOutcome> {
        message.validate()?;
        let handle = self.session_for(message).await?;
        let mut session = handle.lock().await;

        let next = session.state().accept(message.message_type())?;
        let mut response = self.make_stub(message, &session);
        self.invoke(message, response.as_mut(), &mut session).await?;
        session.commit_inbound(message, next);

        let terminated = matches!(message, VaspMessage::Termination(_));
        let peer = session.peer_info().cloned();
        drop(session);

        if terminated {
            self.registry.remove(message.session_id()).await;
            debug!(session = %message.session_id(), "session terminated");
        }

        Ok(DispatchOutcome {
            response,
            peer,
            terminated,
        })
    }

    /// Record a message this side is about to send, advancing the
    /// session exactly as a receipt would. An outbound session request
    /// creates the session.
    ///
    /// # Errors
    /// Same protocol errors as [`dispatch`](Self::dispatch); a send that
    /// would violate the message order is refused before it reaches the
    /// transport.
    #[instrument(skip(self, message), fields(session = %message.session_id(), ty = %message.message_type()))]
    pub async fn record_outbound(&self, message: &VaspMessage) -> Result<()> {
        message.validate()?;
        let handle = self.session_for(message).await?;
        let mut session = handle.lock().await;

        let next = session.state().accept(message.message_type())?;
        session.commit_outbound(message, next);
        drop(session);

        if matches!(message, VaspMessage::Termination(_)) {
            self.registry.remove(message.session_id()).await;
        }
        Ok(())
    }

    async fn session_for(&self, message: &VaspMessage) -> Result<SessionHandle> {
        match message {
            VaspMessage::SessionRequest(_) => Ok(self
                .registry
                .get_or_create(message.session_id(), &self.own_info)
                .await),
            _ => self.registry.require(message.session_id()).await,
        }
    }

    /// Build the canonical successor stub for an accepted message:
    /// fresh message id, same session, response code left for the
    /// handler to settle.
    fn make_stub(&self, message: &VaspMessage, session: &Session) -> Option<VaspMessage> {
        let session_id = message.session_id().clone();
        let header = |ty| Header::new(MessageId::random(), session_id.clone(), ty);

        match message {
            VaspMessage::SessionRequest(_) => Some(VaspMessage::SessionReply(SessionReply {
                header: header(MessageType::SessionReply),
                comment: String::new(),
                sender: self.own_info.clone(),
            })),
            VaspMessage::SessionReply(_) => {
                let info = session.transfer_info();
                match (&info.originator, &info.beneficiary, info.transfer) {
                    (Some(originator), Some(beneficiary), Some(transfer)) => {
                        Some(VaspMessage::TransferRequest(TransferRequest {
                            header: header(MessageType::TransferRequest),
                            comment: String::new(),
                            originator: originator.clone(),
                            beneficiary: beneficiary.clone(),
                            transfer,
                        }))
                    }
                    _ => {
                        debug!(session = %session.id(), "no seeded transfer intent, nothing to announce");
                        None
                    }
                }
            }
            VaspMessage::TransferRequest(_) => Some(VaspMessage::TransferReply(TransferReply {
                header: header(MessageType::TransferReply),
                comment: String::new(),
                destination_address: None,
            })),
            VaspMessage::TransferReply(_) => {
                Some(VaspMessage::TransferDispatch(TransferDispatch {
                    header: header(MessageType::TransferDispatch),
                    comment: String::new(),
                    tx: None,
                }))
            }
            VaspMessage::TransferDispatch(m) => {
                Some(VaspMessage::TransferConfirmation(TransferConfirmation {
                    header: header(MessageType::TransferConfirmation),
                    comment: String::new(),
                    tx: m.tx.clone(),
                }))
            }
            VaspMessage::TransferConfirmation(_) => Some(VaspMessage::Termination(Termination {
                header: header(MessageType::Termination),
                comment: String::new(),
            })),
            VaspMessage::Termination(_) => None,
        }
    }

    async fn invoke(
        &self,
        message: &VaspMessage,
        response: Option<&mut VaspMessage>,
        session: &mut Session,
    ) -> Result<()> {
        match (message, response) {
            (VaspMessage::SessionRequest(req), Some(VaspMessage::SessionReply(stub))) => {
                self.handler.on_session_request(req, stub, session).await
            }
            (VaspMessage::SessionReply(reply), Some(VaspMessage::TransferRequest(stub))) => {
                self.handler
                    .on_session_reply(reply, Some(stub), session)
                    .await
            }
            (VaspMessage::SessionReply(reply), None) => {
                self.handler.on_session_reply(reply, None, session).await
            }
            (VaspMessage::TransferRequest(req), Some(VaspMessage::TransferReply(stub))) => {
                self.handler.on_transfer_request(req, stub, session).await
            }
            (VaspMessage::TransferReply(reply), Some(VaspMessage::TransferDispatch(stub))) => {
                self.handler.on_transfer_reply(reply, stub, session).await
            }
            (
                VaspMessage::TransferDispatch(dispatch),
                Some(VaspMessage::TransferConfirmation(stub)),
            ) => {
                self.handler
                    .on_transfer_dispatch(dispatch, stub, session)
                    .await
            }
            (VaspMessage::TransferConfirmation(conf), Some(VaspMessage::Termination(stub))) => {
                self.handler
                    .on_transfer_confirmation(conf, stub, session)
                    .await
            }
            (VaspMessage::Termination(term), None) => {
                self.handler.on_termination(term, session).await
            }
            (message, _) => {
                // make_stub and invoke always agree on the stub type.
                warn!(ty = %message.message_type(), "dispatch stub mismatch");
                Err(VaspError::Format(format!(
                    "no handler route for {}",
                    message.message_type()
                )))
            }
        }
    }
}
