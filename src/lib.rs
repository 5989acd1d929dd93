//! # vasp-protocol
//!
//! Message-level travel-rule protocol core for Virtual Asset Service
//! Providers: authenticated, session-scoped transfer exchanges over an
//! encrypted pub/sub transport.
//!
//! ## Architecture
//! - [`model`]: the seven-variant message hierarchy and identity types
//! - [`crypto`]: Ethereum-style secp256k1 signing with public-key
//!   recovery verification
//! - [`session`]: the strict handshake-then-transfer state machine and
//!   the shared session registry
//! - [`protocol`]: per-message-type handler dispatch with pass-through
//!   defaults and three overridable business hooks
//! - [`transport`]: the pub/sub contract the core requires, plus an
//!   in-process bus with symmetric/asymmetric payload envelopes
//! - [`service`]: instance wiring and the ledger collaborator
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use vasp_protocol::config::VaspConfig;
//! use vasp_protocol::protocol::SimpleTransferHandler;
//! use vasp_protocol::service::VaspInstance;
//! use vasp_protocol::transport::{LocalTransport, StaticDirectory};
//!
//! # fn main() -> vasp_protocol::error::Result<()> {
//! let config = VaspConfig::generate("Demo VASP", "7dface61")?;
//! let instance = VaspInstance::new(
//!     config,
//!     Arc::new(LocalTransport::new()),
//!     Arc::new(StaticDirectory::new()),
//!     Arc::new(SimpleTransferHandler),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod model;
pub mod protocol;
pub mod service;
pub mod session;
pub mod transport;
pub mod utils;

pub use config::VaspConfig;
pub use crypto::{SignService, SignatureData, SIGNATURE_LENGTH};
pub use error::{ErrorKind, Result, VaspError};
pub use model::{
    EncryptionType, Header, MessageId, MessageType, SessionId, VaspMessage, VaspResponseCode,
};
pub use protocol::{MessageDispatcher, SimpleTransferHandler, TransferHandler};
pub use session::{Session, SessionRegistry, SessionState};
pub use service::VaspInstance;
pub use transport::{LocalTransport, MessageTransport, Topic, VaspDirectory};
