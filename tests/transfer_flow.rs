//! End-to-end account transfer between two wired instances: session
//! handshake, transfer negotiation, ledger settlement, confirmation and
//! termination, driven entirely by the dispatching listeners.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vasp_protocol::config::VaspConfig;
use vasp_protocol::error::Result;
use vasp_protocol::model::{
    AssetType, EncryptionType, SessionId, TransferSpec, TravelRuleParty, Vaan, VaspCode,
    VaspMessage, VaspResponseCode,
};
use vasp_protocol::service::{
    AccountService, AccountTransferHandler, InMemoryAccountService, VaspInstance,
};
use vasp_protocol::transport::{LocalTransport, StaticDirectory};

const ORIGINATOR_CODE: &str = "7dface61";
const BENEFICIARY_CODE: &str = "08c3b8b4";

const ALICE_VAAN: &str = "7dface610123456789abcdef";
const BOB_VAAN: &str = "08c3b8b4fedcba9876543210";

const FLOW_TIMEOUT: Duration = Duration::from_secs(5);

/// Ledger wrapper whose transaction check always fails, simulating
/// assets that never arrived on-chain.
struct AssetsNeverArrive(InMemoryAccountService);

#[async_trait]
impl AccountService for AssetsNeverArrive {
    async fn account_for(&self, vaan: &Vaan) -> Result<String> {
        self.0.account_for(vaan).await
    }
    async fn debit(&self, account: &str, amount: u128) -> Result<()> {
        self.0.debit(account, amount).await
    }
    async fn credit(&self, account: &str, amount: u128) -> Result<String> {
        self.0.credit(account, amount).await
    }
    async fn check_transaction(&self, _tx_id: &str, _amount: u128) -> Result<bool> {
        Ok(false)
    }
}

struct Flow {
    originator: Arc<VaspInstance>,
    beneficiary: Arc<VaspInstance>,
    /// Shared settlement ledger consulted by both sides.
    ledger: InMemoryAccountService,
    /// Raw view of everything delivered to the originator's topic.
    originator_taps: tokio::sync::mpsc::Receiver<VaspMessage>,
}

async fn wire_flow(dispute_transactions: bool) -> Flow {
    let config_a = VaspConfig::generate("Originator VASP", ORIGINATOR_CODE).unwrap();
    let config_b = VaspConfig::generate("Beneficiary VASP", BENEFICIARY_CODE).unwrap();
    let handshake_private_a = config_a.keys.handshake_private_key.clone();
    let handshake_private_b = config_b.keys.handshake_private_key.clone();

    let directory = StaticDirectory::new()
        .with_entry(config_a.own_info().unwrap())
        .with_entry(config_b.own_info().unwrap());
    let bus = Arc::new(LocalTransport::new());

    let ledger = InMemoryAccountService::new();
    ledger
        .register(Vaan::new(ALICE_VAAN).unwrap(), "acc-alice", 10_000)
        .await;
    ledger
        .register(Vaan::new(BOB_VAAN).unwrap(), "acc-bob", 0)
        .await;

    let beneficiary_ledger: Arc<dyn AccountService> = if dispute_transactions {
        Arc::new(AssetsNeverArrive(ledger.clone()))
    } else {
        Arc::new(ledger.clone())
    };

    let originator = VaspInstance::new(
        config_a,
        bus.clone(),
        Arc::new(directory.clone()),
        Arc::new(AccountTransferHandler::new(Arc::new(ledger.clone()))),
    )
    .unwrap();
    let beneficiary = VaspInstance::new(
        config_b,
        bus,
        Arc::new(directory),
        Arc::new(AccountTransferHandler::new(beneficiary_ledger)),
    )
    .unwrap();

    originator
        .listen(
            &originator.topic(),
            EncryptionType::Asymmetric,
            &handshake_private_a,
        )
        .await
        .unwrap();
    beneficiary
        .listen(
            &beneficiary.topic(),
            EncryptionType::Asymmetric,
            &handshake_private_b,
        )
        .await
        .unwrap();

    let originator_taps = originator
        .add_topic_listener(
            &originator.topic(),
            EncryptionType::Asymmetric,
            &handshake_private_a,
        )
        .await
        .unwrap();

    Flow {
        originator,
        beneficiary,
        ledger,
        originator_taps,
    }
}

fn transfer_parties() -> (TravelRuleParty, TravelRuleParty) {
    (
        TravelRuleParty {
            name: "Alice".into(),
            vaan: Vaan::new(ALICE_VAAN).unwrap(),
        },
        TravelRuleParty {
            name: "Bob".into(),
            vaan: Vaan::new(BOB_VAAN).unwrap(),
        },
    )
}

async fn open_transfer(flow: &Flow, amount: u128) -> SessionId {
    let (alice, bob) = transfer_parties();
    flow.originator
        .open_session(
            &VaspCode::new(BENEFICIARY_CODE).unwrap(),
            alice,
            bob,
            TransferSpec {
                asset: AssetType::Eth,
                amount,
            },
        )
        .await
        .unwrap()
}

/// Wait until both registries have dropped the session.
async fn wait_for_session_close(flow: &Flow, session_id: &SessionId) {
    let deadline = tokio::time::Instant::now() + FLOW_TIMEOUT;
    loop {
        let gone_a = flow.originator.registry().get(session_id).await.is_none();
        let gone_b = flow.beneficiary.registry().get(session_id).await.is_none();
        if gone_a && gone_b {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "transfer flow did not complete in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn last_confirmation_code(
    taps: &mut tokio::sync::mpsc::Receiver<VaspMessage>,
) -> Option<VaspResponseCode> {
    let mut code = None;
    while let Ok(message) = taps.try_recv() {
        if let VaspMessage::TransferConfirmation(c) = message {
            code = c.header.response_code;
        }
    }
    code
}

async fn drain(flow: Flow) {
    flow.originator.shutdown();
    flow.beneficiary.shutdown();
    assert!(flow.originator.shutdown_and_wait().await);
    assert!(flow.beneficiary.shutdown_and_wait().await);
}

#[tokio::test]
async fn full_transfer_settles_and_terminates() {
    let mut flow = wire_flow(false).await;

    let session_id = open_transfer(&flow, 2_500).await;
    wait_for_session_close(&flow, &session_id).await;

    assert_eq!(flow.ledger.balance("acc-alice").await, Some(7_500));
    assert_eq!(flow.ledger.balance("acc-bob").await, Some(2_500));

    assert_eq!(
        last_confirmation_code(&mut flow.originator_taps),
        Some(VaspResponseCode::Ok)
    );

    drain(flow).await;
}

#[tokio::test]
async fn transfers_settle_exactly_once() {
    let mut flow = wire_flow(false).await;

    let first = open_transfer(&flow, 1_000).await;
    wait_for_session_close(&flow, &first).await;
    let second = open_transfer(&flow, 2_000).await;
    wait_for_session_close(&flow, &second).await;

    // Two transfers, two settlements, no replays.
    assert_eq!(flow.ledger.balance("acc-alice").await, Some(7_000));
    assert_eq!(flow.ledger.balance("acc-bob").await, Some(3_000));

    assert_eq!(
        last_confirmation_code(&mut flow.originator_taps),
        Some(VaspResponseCode::Ok)
    );

    drain(flow).await;
}

#[tokio::test]
async fn failed_confirmation_reports_assets_not_received() {
    // The beneficiary disputes every transaction; the flow must still
    // run to termination with the negative outcome recorded on the
    // confirmation rather than raised as an error.
    let mut flow = wire_flow(true).await;

    let session_id = open_transfer(&flow, 1_000).await;
    wait_for_session_close(&flow, &session_id).await;

    assert_eq!(
        last_confirmation_code(&mut flow.originator_taps),
        Some(VaspResponseCode::TcAssetsNotReceived)
    );

    drain(flow).await;
}
