//! # Protocol Dispatch
//!
//! Per-message-type callback dispatch on top of the session state
//! machine.
//!
//! ## Components
//! - **TransferHandler**: capability trait with a provided default
//!   implementation per message type; concrete handlers override only
//!   the business-relevant hooks
//! - **MessageDispatcher**: looks up or creates the session, validates
//!   the state transition, populates the canonical response stub,
//!   invokes the handler, and commits the session state only after the
//!   callback succeeds

pub mod dispatcher;
pub mod handler;


pub use dispatcher::{DispatchOutcome, MessageDispatcher};
pub use handler::{SimpleTransferHandler, TransferHandler};
