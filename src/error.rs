//! # Error Types
//!
//! Error handling for the VASP messaging core.
//!
//! All fallible operations return [`Result`] with a single [`VaspError`]
//! enum. Callers discriminate by error kind rather than by a hierarchy of
//! error types:
//!
//! - **Format errors**: malformed hex, wrong-length signatures or message
//!   ids. These fail fast and are never coerced into a softer outcome.
//! - **Protocol violations**: a message whose type does not match the
//!   session's expected next state, or a non-handshake message for an
//!   unknown session. The session is left untouched so a well-formed
//!   retry can still succeed.
//! - **Infrastructure**: transport, configuration, serialization, I/O.
//!
//! A signature that is well-formed but does not verify is *not* an error:
//! [`SignService::verify`](crate::crypto::SignService::verify) reports it
//! as `Ok(false)` and the caller decides whether to drop or escalate the
//! message. Business-rule failures travel inside outgoing messages as
//! response codes and never surface here.

use std::io;
use thiserror::Error;

/// Stable tag identifying the broad class of a [`VaspError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Structurally malformed input (hex, lengths, framing).
    Format,
    /// Message type illegal for the session's current state.
    Protocol,
    /// Transport-level failure (publish, subscribe, envelope).
    Transport,
    /// Configuration loading or validation failure.
    Config,
    /// Everything else: I/O, serialization, internal faults.
    Other,
}

/// The error type for all protocol operations.
#[derive(Error, Debug)]
pub enum VaspError {
    #[error("malformed input: {0}")]
    Format(String),

    #[error("protocol violation: expected {expected}, received {received}")]
    UnexpectedMessage {
        expected: &'static str,
        received: &'static str,
    },

    #[error("no session for id {0}")]
    SessionNotFound(String),

    #[error("cryptographic failure: {0}")]
    Crypto(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("operation timed out")]
    Timeout,

    #[error("shutdown in progress")]
    ShuttingDown,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Custom(String),
}

impl VaspError {
    /// Classify this error into one of the stable [`ErrorKind`] tags.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaspError::Format(_) => ErrorKind::Format,
            VaspError::UnexpectedMessage { .. } | VaspError::SessionNotFound(_) => {
                ErrorKind::Protocol
            }
            VaspError::Transport(_) | VaspError::Timeout => ErrorKind::Transport,
            VaspError::Config(_) => ErrorKind::Config,
            VaspError::Crypto(_)
            | VaspError::Serialization(_)
            | VaspError::ShuttingDown
            | VaspError::Io(_)
            | VaspError::Custom(_) => ErrorKind::Other,
        }
    }

    /// Shorthand for a [`VaspError::Format`] with a formatted message.
    pub fn format(msg: impl Into<String>) -> Self {
        VaspError::Format(msg.into())
    }
}

/// Type alias for Results using VaspError
pub type Result<T> = std::result::Result<T, VaspError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(VaspError::format("x").kind(), ErrorKind::Format);
        assert_eq!(
            VaspError::UnexpectedMessage {
                expected: "SessionReply",
                received: "TransferRequest",
            }
            .kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            VaspError::SessionNotFound("00".into()).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(VaspError::Timeout.kind(), ErrorKind::Transport);
        assert_eq!(VaspError::Config("bad".into()).kind(), ErrorKind::Config);
    }
}
