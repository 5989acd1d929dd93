//! # Transport Contract
//!
//! What the protocol core requires from the pub/sub transport, and an
//! in-process adapter implementing it for tests and demos.
//!
//! The core never frames, encrypts or routes wire traffic itself. It
//! needs three things: counterparty identity resolution
//! ([`VaspDirectory`]), topic publication with a chosen encryption mode
//! ([`MessageTransport::publish`]), and a subscription that delivers
//! decrypted payloads ([`MessageTransport::subscribe`]). Delivery is
//! at-least-once with no inter-message ordering; message ids carry the
//! logical order.

pub mod envelope;
pub mod local;

pub use local::LocalTransport;

use crate::error::{Result, VaspError};
use crate::model::{EncryptionType, VaspCode, VaspInfo};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Pub/sub channel address. Derivation from a VASP code is an adapter
/// concern; the core treats topics as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(String);

impl Topic {
    pub fn new(topic: impl Into<String>) -> Self {
        Self(topic.into())
    }

    /// The adapter-level convention used by the local bus: one inbound
    /// topic per VASP, named after its code.
    pub fn for_vasp(code: &VaspCode) -> Self {
        Self(format!("0x{code}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One decrypted delivery from a subscription.
#[derive(Debug, Clone)]
pub struct TopicEvent {
    pub topic: Topic,
    /// Decrypted payload: the signed JSON body of a protocol message.
    pub payload: Bytes,
}

/// The pub/sub transport the core publishes through and listens on.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Seal a payload for the topic under the given encryption mode and
    /// key (shared key for symmetric, the recipient's handshake public
    /// key for asymmetric) and deliver it to every matching subscriber.
    async fn publish(
        &self,
        topic: &Topic,
        encryption: EncryptionType,
        key: &str,
        payload: Bytes,
    ) -> Result<()>;

    /// Register a subscription on a topic. The returned channel yields
    /// only payloads that open under the given key (own handshake
    /// private key for asymmetric, the shared key for symmetric).
    async fn subscribe(
        &self,
        topic: &Topic,
        encryption: EncryptionType,
        key: &str,
    ) -> Result<mpsc::Receiver<TopicEvent>>;
}

/// Counterparty identity lookup, normally backed by the on-chain
/// contract registry.
#[async_trait]
pub trait VaspDirectory: Send + Sync {
    async fn resolve(&self, vasp_code: &VaspCode) -> Result<VaspInfo>;
}

/// Fixed in-memory directory for tests and local wiring.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: HashMap<VaspCode, VaspInfo>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, info: VaspInfo) -> Self {
        self.entries.insert(info.vasp_code.clone(), info);
        self
    }
}

#[async_trait]
impl VaspDirectory for StaticDirectory {
    async fn resolve(&self, vasp_code: &VaspCode) -> Result<VaspInfo> {
        self.entries
            .get(vasp_code)
            .cloned()
            .ok_or_else(|| VaspError::Transport(format!("unknown VASP code {vasp_code}")))
    }
}
