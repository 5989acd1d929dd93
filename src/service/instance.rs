//! # VASP Instance
//!
//! One running VASP endpoint: transport subscriptions in, signed
//! responses out.
//!
//! Inbound flow per delivery: decrypt (done by the transport
//! subscription) → split the signed payload → verify authorship against
//! the claimed sender key (asymmetric mode; symmetric trust is
//! established by shared-key possession) → dispatch through the session
//! state machine → sign and publish the canonical response on the
//! counterparty's topic.
//!
//! Shutdown drains: the flag stops listeners from taking new work but
//! never aborts an in-flight callback. Callers wait with a bounded
//! timeout and escalate once to a longer one before declaring the
//! instance stopped.

use crate::config::VaspConfig;
use crate::crypto::SignService;
use crate::error::{Result, VaspError};
use crate::model::{
    EncryptionType, Header, MessageId, MessageType, SessionId, SessionRequest, TransferSpec,
    TravelRuleParty, VaspCode, VaspInfo, VaspMessage,
};
use crate::protocol::{MessageDispatcher, TransferHandler};
use crate::session::SessionRegistry;
use crate::transport::{MessageTransport, Topic, TopicEvent, VaspDirectory};
use crate::utils::timeout::with_timeout;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// Queue depth for raw topic listeners.
const LISTENER_BUFFER: usize = 64;

/// A wired VASP endpoint.
pub struct VaspInstance {
    config: VaspConfig,
    own_info: VaspInfo,
    signer: SignService,
    transport: Arc<dyn MessageTransport>,
    directory: Arc<dyn VaspDirectory>,
    dispatcher: Arc<MessageDispatcher>,
    shutdown_tx: watch::Sender<bool>,
    active_listeners: Arc<AtomicUsize>,
}

impl VaspInstance {
    /// Wire an instance from its configuration and collaborators.
    ///
    /// # Errors
    /// Returns a config error when the configuration does not validate.
    pub fn new(
        config: VaspConfig,
        transport: Arc<dyn MessageTransport>,
        directory: Arc<dyn VaspDirectory>,
        handler: Arc<dyn TransferHandler>,
    ) -> Result<Arc<Self>> {
        config.validate_strict()?;
        let own_info = config.own_info()?;
        let registry = SessionRegistry::new(config.session.session_ttl);
        let dispatcher = Arc::new(MessageDispatcher::new(own_info.clone(), handler, registry));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Arc::new(Self {
            config,
            own_info,
            signer: SignService::new(),
            transport,
            directory,
            dispatcher,
            shutdown_tx,
            active_listeners: Arc::new(AtomicUsize::new(0)),
        }))
    }

    pub fn own_info(&self) -> &VaspInfo {
        &self.own_info
    }

    /// This instance's inbound topic.
    pub fn topic(&self) -> Topic {
        Topic::for_vasp(&self.own_info.vasp_code)
    }

    pub fn registry(&self) -> &SessionRegistry {
        self.dispatcher.registry()
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Open a session towards a counterparty: create the local session,
    /// seed the transfer intent, and publish the opening request to the
    /// peer's topic under its handshake key.
    #[instrument(skip(self, originator, beneficiary, transfer), fields(peer = %peer_code))]
    pub async fn open_session(
        &self,
        peer_code: &VaspCode,
        originator: TravelRuleParty,
        beneficiary: TravelRuleParty,
        transfer: TransferSpec,
    ) -> Result<SessionId> {
        if self.is_shutting_down() {
            return Err(VaspError::ShuttingDown);
        }
        let peer = self.directory.resolve(peer_code).await?;
        let session_id = SessionId::random();

        let handle = self
            .dispatcher
            .registry()
            .get_or_create(&session_id, &self.own_info)
            .await;
        {
            let mut session = handle.lock().await;
            let intent = session.transfer_info_mut();
            intent.originator = Some(originator);
            intent.beneficiary = Some(beneficiary);
            intent.transfer = Some(transfer);
        }

        let request = VaspMessage::SessionRequest(SessionRequest {
            header: Header::new(
                MessageId::random(),
                session_id.clone(),
                MessageType::SessionRequest,
            ),
            comment: String::new(),
            sender: self.own_info.clone(),
        });
        self.dispatcher.record_outbound(&request).await?;
        self.send(
            &Topic::for_vasp(peer_code),
            EncryptionType::Asymmetric,
            &peer.handshake_key,
            &request,
        )
        .await?;

        info!(session = %session_id, "session opened");
        Ok(session_id)
    }

    /// Start a dispatching listener: every delivery on the subscription
    /// is authenticated, dispatched, and answered on the counterparty's
    /// topic. Returns once the subscription is registered.
    pub async fn listen(
        self: &Arc<Self>,
        topic: &Topic,
        encryption: EncryptionType,
        key: &str,
    ) -> Result<()> {
        if self.is_shutting_down() {
            return Err(VaspError::ShuttingDown);
        }
        let mut events = self.transport.subscribe(topic, encryption, key).await?;
        let instance = Arc::clone(self);
        let reply_key = key.to_string();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.active_listeners.fetch_add(1, Ordering::AcqRel);

        tokio::spawn(async move {
            if !*shutdown_rx.borrow() {
                loop {
                    tokio::select! {
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                break;
                            }
                        }
                        event = events.recv() => match event {
                            Some(event) => {
                                if let Err(e) =
                                    instance.process_event(event, encryption, &reply_key).await
                                {
                                    warn!(error = %e, kind = ?e.kind(), "inbound message rejected");
                                }
                            }
                            None => break,
                        },
                    }
                }
            }
            instance.listener_stopped();
        });
        Ok(())
    }

    /// Register a raw topic listener: deliveries are decrypted, split
    /// from their signature and parsed, but not dispatched. Useful for
    /// monitoring and tests; authentication stays with the protocol
    /// listener.
    pub async fn add_topic_listener(
        self: &Arc<Self>,
        topic: &Topic,
        encryption: EncryptionType,
        key: &str,
    ) -> Result<mpsc::Receiver<VaspMessage>> {
        if self.is_shutting_down() {
            return Err(VaspError::ShuttingDown);
        }
        let mut events = self.transport.subscribe(topic, encryption, key).await?;
        let (tx, rx) = mpsc::channel(LISTENER_BUFFER);
        let instance = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.active_listeners.fetch_add(1, Ordering::AcqRel);

        tokio::spawn(async move {
            if !*shutdown_rx.borrow() {
                loop {
                    tokio::select! {
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                break;
                            }
                        }
                        event = events.recv() => match event {
                            Some(event) => match decode_event(&event) {
                                Ok(message) => {
                                    if tx.send(message).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    warn!(error = %e, "undecodable payload dropped");
                                }
                            },
                            None => break,
                        },
                    }
                }
            }
            instance.listener_stopped();
        });
        Ok(rx)
    }

    /// Sign a message with this instance's key and publish it. Raw
    /// sends bypass the session state machine; protocol-driven traffic
    /// goes through [`open_session`](Self::open_session) and the
    /// dispatching listener.
    #[instrument(skip(self, key, message), fields(topic = %topic, ty = %message.message_type()))]
    pub async fn send(
        &self,
        topic: &Topic,
        encryption: EncryptionType,
        key: &str,
        message: &VaspMessage,
    ) -> Result<()> {
        let payload = self
            .signer
            .make_signed_payload(message, &self.config.keys.signing_private_key)?;
        self.transport
            .publish(topic, encryption, key, Bytes::from(payload))
            .await
    }

    /// Periodically collect sessions idle past their TTL.
    pub fn spawn_session_sweeper(self: &Arc<Self>) {
        let instance = Arc::clone(self);
        let interval = self.config.session.sweep_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let purged = instance.dispatcher.registry().purge_idle().await;
                        if purged > 0 {
                            info!(purged, "idle sessions purged");
                        }
                    }
                }
            }
        });
    }

    /// Stop accepting new work. In-flight callbacks finish; use
    /// [`wait_for_termination`](Self::wait_for_termination) to observe
    /// the drain.
    pub fn shutdown(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!("shutdown requested");
        }
    }

    /// Wait until every listener has stopped, bounded by `timeout`.
    /// Returns whether the drain completed in time.
    pub async fn wait_for_termination(&self, timeout: Duration) -> bool {
        with_timeout(
            async {
                while self.active_listeners.load(Ordering::Acquire) != 0 {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            },
            timeout,
        )
        .await
        .is_ok()
    }

    /// Drain with the configured two-stage timeout: a first polite wait
    /// for listeners to finish on their own, then a forced shutdown and
    /// one longer wait. Returns whether the drain completed.
    pub async fn shutdown_and_wait(&self) -> bool {
        if self
            .wait_for_termination(self.config.shutdown.wait_timeout)
            .await
        {
            return true;
        }
        self.shutdown();
        self.wait_for_termination(self.config.shutdown.escalation_timeout)
            .await
    }

    fn listener_stopped(&self) {
        self.active_listeners.fetch_sub(1, Ordering::AcqRel);
        debug!("listener stopped");
    }

    async fn process_event(
        &self,
        event: TopicEvent,
        encryption: EncryptionType,
        reply_key: &str,
    ) -> Result<()> {
        let text = std::str::from_utf8(&event.payload)
            .map_err(|e| VaspError::Format(format!("payload is not UTF-8: {e}")))?;
        let (json, signature) = SignService::split_signed_payload(text)?;
        let message: VaspMessage = serde_json::from_str(json)
            .map_err(|e| VaspError::Serialization(e.to_string()))?;
        message.validate()?;

        if encryption == EncryptionType::Asymmetric {
            let claimed = self.claimed_signing_key(&message).await?;
            if !self.signer.verify(json.as_bytes(), signature, &claimed)? {
                // A wrong signer is a negative outcome, not a fault; the
                // message is dropped and the session stays untouched.
                warn!(
                    session = %message.session_id(),
                    ty = %message.message_type(),
                    "signature does not match the claimed sender, dropping message"
                );
                return Ok(());
            }
        }

        let outcome = self.dispatcher.dispatch(&message).await?;
        if let Some(response) = outcome.response {
            let peer = outcome.peer.ok_or_else(|| {
                VaspError::Custom("no counterparty identity to route the response".into())
            })?;
            self.dispatcher.record_outbound(&response).await?;
            let peer_topic = Topic::for_vasp(&peer.vasp_code);
            let key = match encryption {
                EncryptionType::Asymmetric => peer.handshake_key.as_str(),
                EncryptionType::Symmetric => reply_key,
            };
            self.send(&peer_topic, encryption, key, &response).await?;
        }
        Ok(())
    }

    /// The public key the sender claims to have signed with: the
    /// session's known counterparty, or — for handshake messages that
    /// precede one — the registry entry for the embedded VASP code.
    async fn claimed_signing_key(&self, message: &VaspMessage) -> Result<String> {
        if let Some(handle) = self.dispatcher.registry().get(message.session_id()).await {
            let session = handle.lock().await;
            if let Some(peer) = session.peer_info() {
                return Ok(peer.signing_key.clone());
            }
        }
        match message {
            VaspMessage::SessionRequest(m) => {
                Ok(self.directory.resolve(&m.sender.vasp_code).await?.signing_key)
            }
            VaspMessage::SessionReply(m) => {
                Ok(self.directory.resolve(&m.sender.vasp_code).await?.signing_key)
            }
            _ => Err(VaspError::SessionNotFound(message.session_id().to_string())),
        }
    }
}

fn decode_event(event: &TopicEvent) -> Result<VaspMessage> {
    let text = std::str::from_utf8(&event.payload)
        .map_err(|e| VaspError::Format(format!("payload is not UTF-8: {e}")))?;
    let (json, _signature) = SignService::split_signed_payload(text)?;
    let message: VaspMessage =
        serde_json::from_str(json).map_err(|e| VaspError::Serialization(e.to_string()))?;
    message.validate()?;
    Ok(message)
}
