//! # Transfer Handlers
//!
//! The polymorphic callback contract invoked on every processed message.
//!
//! Every hook has a provided default body performing the canonical
//! request→reply transformation (populate the outcome code, pass the
//! stub through). Concrete handlers override only what their business
//! logic needs — typically the three hooks that touch a ledger:
//! [`on_transfer_request`](TransferHandler::on_transfer_request),
//! [`on_transfer_reply`](TransferHandler::on_transfer_reply) and
//! [`on_transfer_dispatch`](TransferHandler::on_transfer_dispatch).
//!
//! Hooks run under the session's lock and synchronously with respect to
//! the transport's delivery task; keep them bounded in latency or hand
//! heavy work to a worker pool.

use crate::error::Result;
use crate::model::{
    SessionReply, SessionRequest, Termination, TransferConfirmation, TransferDispatch,
    TransferReply, TransferRequest, VaspResponseCode,
};
use crate::session::Session;
use async_trait::async_trait;

/// Per-message-type callbacks with pass-through defaults.
#[async_trait]
pub trait TransferHandler: Send + Sync {
    /// A counterparty opened a session. The stub already carries this
    /// VASP's identity; override to vet the requester.
    async fn on_session_request(
        &self,
        _request: &SessionRequest,
        response: &mut SessionReply,
        _session: &mut Session,
    ) -> Result<()> {
        if response.header.response_code.is_none() {
            response.header.response_code = Some(VaspResponseCode::Ok);
        }
        Ok(())
    }

    /// The counterparty accepted our session. `response` is the
    /// transfer request built from the session's seeded transfer
    /// intent, or `None` when this side has nothing to announce.
    async fn on_session_reply(
        &self,
        _reply: &SessionReply,
        _response: Option<&mut TransferRequest>,
        _session: &mut Session,
    ) -> Result<()> {
        Ok(())
    }

    /// Business hook: resolve the beneficiary's settlement address and
    /// populate it on the reply.
    async fn on_transfer_request(
        &self,
        _request: &TransferRequest,
        response: &mut TransferReply,
        _session: &mut Session,
    ) -> Result<()> {
        if response.header.response_code.is_none() {
            response.header.response_code = Some(VaspResponseCode::Ok);
        }
        Ok(())
    }

    /// Business hook: settle the transfer (debit originator, credit the
    /// destination) and record the transaction on the dispatch.
    async fn on_transfer_reply(
        &self,
        _reply: &TransferReply,
        _response: &mut TransferDispatch,
        _session: &mut Session,
    ) -> Result<()> {
        Ok(())
    }

    /// Business hook: confirm the referenced transaction moved the
    /// expected amount; report the outcome via the response code.
    async fn on_transfer_dispatch(
        &self,
        _dispatch: &TransferDispatch,
        response: &mut TransferConfirmation,
        _session: &mut Session,
    ) -> Result<()> {
        if response.header.response_code.is_none() {
            response.header.response_code = Some(VaspResponseCode::Ok);
        }
        Ok(())
    }

    /// The transfer was confirmed; the stub closes the session.
    async fn on_transfer_confirmation(
        &self,
        _confirmation: &TransferConfirmation,
        _response: &mut Termination,
        _session: &mut Session,
    ) -> Result<()> {
        Ok(())
    }

    /// The counterparty closed the session. No response is produced.
    async fn on_termination(
        &self,
        _termination: &Termination,
        _session: &mut Session,
    ) -> Result<()> {
        Ok(())
    }
}

/// Handler consisting entirely of the canonical defaults. Useful for
/// driving a protocol flow without any business back-end attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTransferHandler;

#[async_trait]
impl TransferHandler for SimpleTransferHandler {}
