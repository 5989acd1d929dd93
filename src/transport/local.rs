//! # Local Transport
//!
//! In-process pub/sub bus implementing the [`MessageTransport`]
//! contract for tests, demos and single-process wiring.
//!
//! Every publish seals the payload once and offers it to each
//! subscription on the topic; a subscription receives the payload only
//! if its key opens the envelope, mirroring how a shared-medium network
//! delivers to whoever holds the right key. Closed subscriptions are
//! pruned on the next publish.

use crate::error::Result;
use crate::model::EncryptionType;
use crate::transport::{envelope, MessageTransport, Topic, TopicEvent};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, instrument, trace};

/// Queue depth per subscription before publishers start dropping.
const SUBSCRIPTION_BUFFER: usize = 64;

struct Subscription {
    encryption: EncryptionType,
    key: String,
    tx: mpsc::Sender<TopicEvent>,
}

#[derive(Default)]
struct BusInner {
    subscriptions: HashMap<String, Vec<Subscription>>,
}

/// In-process topic bus.
#[derive(Clone, Default)]
pub struct LocalTransport {
    inner: Arc<Mutex<BusInner>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageTransport for LocalTransport {
    #[instrument(skip(self, key, payload), fields(topic = %topic, bytes = payload.len()))]
    async fn publish(
        &self,
        topic: &Topic,
        encryption: EncryptionType,
        key: &str,
        payload: Bytes,
    ) -> Result<()> {
        let sealed = envelope::seal(encryption, key, &payload)?;

        // Work out the deliveries under the lock, send after releasing
        // it: a full subscriber queue must not stall the whole bus.
        let mut deliveries = Vec::new();
        {
            let mut inner = self.inner.lock().await;
            let Some(subs) = inner.subscriptions.get_mut(topic.as_str()) else {
                trace!("no subscribers");
                return Ok(());
            };
            subs.retain(|sub| {
                if sub.tx.is_closed() {
                    debug!(topic = %topic, "pruning closed subscription");
                    return false;
                }
                if sub.encryption == encryption {
                    // Delivery is keyed by decryptability, like a shared
                    // medium: wrong key, no event.
                    if let Ok(plaintext) = envelope::open(sub.encryption, &sub.key, &sealed) {
                        deliveries.push((
                            sub.tx.clone(),
                            TopicEvent {
                                topic: topic.clone(),
                                payload: Bytes::from(plaintext),
                            },
                        ));
                    }
                }
                true
            });
        }

        futures::future::join_all(
            deliveries
                .into_iter()
                .map(|(tx, event)| async move { tx.send(event).await }),
        )
        .await;
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &Topic,
        encryption: EncryptionType,
        key: &str,
    ) -> Result<mpsc::Receiver<TopicEvent>> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let mut inner = self.inner.lock().await;
        inner
            .subscriptions
            .entry(topic.as_str().to_string())
            .or_default()
            .push(Subscription {
                encryption,
                key: key.to_string(),
                tx,
            });
        debug!(topic = %topic, "subscription registered");
        Ok(rx)
    }
}
