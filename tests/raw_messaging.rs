//! Raw send-and-receive over the local bus: seven fixture messages with
//! ids 0..6 are published out of numeric order under both encryption
//! modes; the receiving instance must deliver them all, and sorting by
//! message id must restore the fixture sequence exactly.

use std::sync::Arc;
use std::time::Duration;

use vasp_protocol::config::VaspConfig;
use vasp_protocol::model::{
    AssetType, EncryptionType, Header, MessageId, MessageType, SessionId, SessionReply,
    SessionRequest, Termination, TransferConfirmation, TransferDispatch, TransferReply,
    TransferRequest, TransferSpec, TravelRuleParty, TxRecord, Vaan, VaspInfo, VaspMessage,
};
use vasp_protocol::protocol::SimpleTransferHandler;
use vasp_protocol::service::VaspInstance;
use vasp_protocol::transport::envelope::sym_key_from_password;
use vasp_protocol::transport::{LocalTransport, StaticDirectory, VaspDirectory};

const VASP_CODE_1: &str = "7dface61";
const VASP_CODE_2: &str = "08c3b8b4";

/// Deterministic out-of-numeric-order delivery schedule.
const SEND_ORDER: [usize; 7] = [3, 0, 6, 2, 5, 1, 4];

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    instance1: Arc<VaspInstance>,
    instance2: Arc<VaspInstance>,
    directory: StaticDirectory,
    /// Handshake private key of instance 1, for asymmetric listening.
    handshake_private_1: String,
}

fn harness() -> Harness {
    let config1 = VaspConfig::generate("Test VASP 1", VASP_CODE_1).unwrap();
    let config2 = VaspConfig::generate("Test VASP 2", VASP_CODE_2).unwrap();
    let handshake_private_1 = config1.keys.handshake_private_key.clone();
    let directory = StaticDirectory::new()
        .with_entry(config1.own_info().unwrap())
        .with_entry(config2.own_info().unwrap());
    let bus = Arc::new(LocalTransport::new());

    let instance1 = VaspInstance::new(
        config1,
        bus.clone(),
        Arc::new(directory.clone()),
        Arc::new(SimpleTransferHandler),
    )
    .unwrap();
    let instance2 = VaspInstance::new(
        config2,
        bus,
        Arc::new(directory.clone()),
        Arc::new(SimpleTransferHandler),
    )
    .unwrap();

    Harness {
        instance1,
        instance2,
        directory,
        handshake_private_1,
    }
}

fn fixture_messages(session_id: &SessionId, sender: &VaspInfo) -> Vec<VaspMessage> {
    let header = |index: u128, ty| Header::new(MessageId::from_index(index), session_id.clone(), ty);
    vec![
        VaspMessage::SessionRequest(SessionRequest {
            header: header(0, MessageType::SessionRequest),
            comment: "message 1".into(),
            sender: sender.clone(),
        }),
        VaspMessage::SessionReply(SessionReply {
            header: header(1, MessageType::SessionReply),
            comment: "message 2".into(),
            sender: sender.clone(),
        }),
        VaspMessage::TransferRequest(TransferRequest {
            header: header(2, MessageType::TransferRequest),
            comment: "message 3".into(),
            originator: TravelRuleParty {
                name: "Alice".into(),
                vaan: Vaan::new("7dface610123456789abcdef").unwrap(),
            },
            beneficiary: TravelRuleParty {
                name: "Bob".into(),
                vaan: Vaan::new("08c3b8b4fedcba9876543210").unwrap(),
            },
            transfer: TransferSpec {
                asset: AssetType::Eth,
                amount: 4_200,
            },
        }),
        VaspMessage::TransferReply(TransferReply {
            header: header(3, MessageType::TransferReply),
            comment: "message 4".into(),
            destination_address: Some("0xdest".into()),
        }),
        VaspMessage::TransferDispatch(TransferDispatch {
            header: header(4, MessageType::TransferDispatch),
            comment: "message 5".into(),
            tx: Some(TxRecord {
                id: "tx-00000001".into(),
                date_time: chrono::Utc::now(),
                sending_address: "0xdest".into(),
            }),
        }),
        VaspMessage::TransferConfirmation(TransferConfirmation {
            header: header(5, MessageType::TransferConfirmation),
            comment: "message 6".into(),
            tx: None,
        }),
        VaspMessage::Termination(Termination {
            header: header(6, MessageType::Termination),
            comment: "message 7".into(),
        }),
    ]
}

async fn collect_and_check(
    mut received: tokio::sync::mpsc::Receiver<VaspMessage>,
    expected: Vec<VaspMessage>,
    listener: &Arc<VaspInstance>,
) {
    let mut messages = Vec::with_capacity(expected.len());
    while messages.len() < expected.len() {
        let message = tokio::time::timeout(WAIT_TIMEOUT, received.recv())
            .await
            .expect("delivery timed out")
            .expect("listener closed early");
        messages.push(message);
    }

    listener.shutdown();
    assert!(listener.shutdown_and_wait().await, "listeners failed to drain");

    // Delivery order is not guaranteed; logical order lives in the ids.
    messages.sort_by(|a, b| a.header().message_id.cmp(&b.header().message_id));
    assert_eq!(messages, expected);
}

#[tokio::test]
async fn symmetric_send_and_receive() {
    let h = harness();
    let session_id = SessionId::random();
    let messages = fixture_messages(&session_id, h.instance2.own_info());

    let sym_key = sym_key_from_password("Hello,World!");
    let received = h
        .instance1
        .add_topic_listener(&h.instance1.topic(), EncryptionType::Symmetric, &sym_key)
        .await
        .unwrap();

    for &i in &SEND_ORDER {
        h.instance2
            .send(
                &h.instance1.topic(),
                EncryptionType::Symmetric,
                &sym_key,
                &messages[i],
            )
            .await
            .unwrap();
    }

    collect_and_check(received, messages, &h.instance1).await;
}

#[tokio::test]
async fn asymmetric_send_and_receive() {
    let h = harness();
    let session_id = SessionId::random();
    let messages = fixture_messages(&session_id, h.instance2.own_info());

    let received = h
        .instance1
        .add_topic_listener(
            &h.instance1.topic(),
            EncryptionType::Asymmetric,
            &h.handshake_private_1,
        )
        .await
        .unwrap();

    // Senders resolve the recipient's handshake key from the registry.
    let contact = h
        .directory
        .resolve(&h.instance1.own_info().vasp_code)
        .await
        .unwrap();
    for &i in &SEND_ORDER {
        h.instance2
            .send(
                &h.instance1.topic(),
                EncryptionType::Asymmetric,
                &contact.handshake_key,
                &messages[i],
            )
            .await
            .unwrap();
    }

    collect_and_check(received, messages, &h.instance1).await;
}

#[tokio::test]
async fn wrong_symmetric_key_receives_nothing() {
    let h = harness();
    let session_id = SessionId::random();
    let messages = fixture_messages(&session_id, h.instance2.own_info());

    let mut received = h
        .instance1
        .add_topic_listener(
            &h.instance1.topic(),
            EncryptionType::Symmetric,
            &sym_key_from_password("right key"),
        )
        .await
        .unwrap();

    h.instance2
        .send(
            &h.instance1.topic(),
            EncryptionType::Symmetric,
            &sym_key_from_password("wrong key"),
            &messages[0],
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(received.try_recv().is_err(), "payload leaked across keys");
}
