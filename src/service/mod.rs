//! # Services
//!
//! Wiring of the core components into a running VASP endpoint.
//!
//! ## Components
//! - **VaspInstance**: owns the transport subscriptions, authenticates
//!   inbound messages, drives dispatch and signs outgoing responses
//! - **AccountService / AccountTransferHandler**: the ledger
//!   collaborator behind the three transfer business hooks, with an
//!   in-memory implementation for tests and demos

pub mod account;
pub mod instance;

pub use account::{AccountService, AccountTransferHandler, InMemoryAccountService};
pub use instance::VaspInstance;
