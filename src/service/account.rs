//! # Account Collaborator
//!
//! The ledger back-end behind the three transfer business hooks, and
//! the handler that wires it into the protocol.
//!
//! The protocol core does not keep balances; it asks an
//! [`AccountService`] to resolve accounts, move value and confirm
//! transactions. [`InMemoryAccountService`] is the reference ledger for
//! tests and local wiring; real deployments substitute their own
//! implementation without touching the state machine.

use crate::error::{Result, VaspError};
use crate::model::{
    TransferConfirmation, TransferDispatch, TransferReply, TransferRequest, TxRecord, Vaan,
    VaspResponseCode,
};
use crate::protocol::TransferHandler;
use crate::session::Session;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// External ledger operations the transfer hooks depend on.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Settlement account for a VAAN.
    async fn account_for(&self, vaan: &Vaan) -> Result<String>;

    /// Remove `amount` from an account.
    async fn debit(&self, account: &str, amount: u128) -> Result<()>;

    /// Add `amount` to an account; returns the transaction id.
    async fn credit(&self, account: &str, amount: u128) -> Result<String>;

    /// Whether the referenced transaction moved exactly `amount`.
    async fn check_transaction(&self, tx_id: &str, amount: u128) -> Result<bool>;
}

#[derive(Default)]
struct LedgerInner {
    /// account address -> balance (minor units)
    balances: HashMap<String, u128>,
    /// VAAN -> account address
    accounts: HashMap<Vaan, String>,
    /// transaction id -> credited amount
    transactions: HashMap<String, u128>,
    next_tx: u64,
}

/// Process-local ledger used by tests and demos.
#[derive(Clone, Default)]
pub struct InMemoryAccountService {
    inner: Arc<Mutex<LedgerInner>>,
}

impl InMemoryAccountService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account for a VAAN with an opening balance.
    pub async fn register(&self, vaan: Vaan, account: impl Into<String>, balance: u128) {
        let account = account.into();
        let mut inner = self.inner.lock().await;
        inner.balances.insert(account.clone(), balance);
        inner.accounts.insert(vaan, account);
    }

    pub async fn balance(&self, account: &str) -> Option<u128> {
        self.inner.lock().await.balances.get(account).copied()
    }
}

#[async_trait]
impl AccountService for InMemoryAccountService {
    async fn account_for(&self, vaan: &Vaan) -> Result<String> {
        self.inner
            .lock()
            .await
            .accounts
            .get(vaan)
            .cloned()
            .ok_or_else(|| VaspError::Custom(format!("no account for VAAN {vaan}")))
    }

    async fn debit(&self, account: &str, amount: u128) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let balance = inner
            .balances
            .get_mut(account)
            .ok_or_else(|| VaspError::Custom(format!("unknown account {account}")))?;
        *balance = balance
            .checked_sub(amount)
            .ok_or_else(|| VaspError::Custom(format!("insufficient funds on {account}")))?;
        debug!(account, amount, "account debited");
        Ok(())
    }

    async fn credit(&self, account: &str, amount: u128) -> Result<String> {
        let mut inner = self.inner.lock().await;
        let balance = inner
            .balances
            .get_mut(account)
            .ok_or_else(|| VaspError::Custom(format!("unknown account {account}")))?;
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| VaspError::Custom(format!("balance overflow on {account}")))?;
        inner.next_tx += 1;
        let tx_id = format!("tx-{:08}", inner.next_tx);
        inner.transactions.insert(tx_id.clone(), amount);
        debug!(account, amount, tx = %tx_id, "account credited");
        Ok(tx_id)
    }

    async fn check_transaction(&self, tx_id: &str, amount: u128) -> Result<bool> {
        Ok(self.inner.lock().await.transactions.get(tx_id) == Some(&amount))
    }
}

/// Transfer handler backed by an [`AccountService`]: resolves the
/// settlement address, settles value on dispatch, confirms receipt.
pub struct AccountTransferHandler {
    accounts: Arc<dyn AccountService>,
}

impl AccountTransferHandler {
    pub fn new(accounts: Arc<dyn AccountService>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl TransferHandler for AccountTransferHandler {
    #[instrument(skip_all, fields(session = %session.id()))]
    async fn on_transfer_request(
        &self,
        request: &TransferRequest,
        response: &mut TransferReply,
        session: &mut Session,
    ) -> Result<()> {
        let beneficiary_account = self.accounts.account_for(&request.beneficiary.vaan).await?;
        response.destination_address = Some(beneficiary_account);
        if response.header.response_code.is_none() {
            response.header.response_code = Some(VaspResponseCode::Ok);
        }
        Ok(())
    }

    #[instrument(skip_all, fields(session = %session.id()))]
    async fn on_transfer_reply(
        &self,
        reply: &TransferReply,
        response: &mut TransferDispatch,
        session: &mut Session,
    ) -> Result<()> {
        let info = session.transfer_info();
        let originator = info
            .originator
            .as_ref()
            .ok_or_else(|| VaspError::Custom("transfer has no originator".into()))?;
        let amount = info
            .transfer
            .ok_or_else(|| VaspError::Custom("transfer has no amount".into()))?
            .amount;
        let destination = reply
            .destination_address
            .clone()
            .ok_or_else(|| VaspError::Custom("reply carries no destination address".into()))?;

        let originator_account = self.accounts.account_for(&originator.vaan).await?;
        self.accounts.debit(&originator_account, amount).await?;
        let tx_id = self.accounts.credit(&destination, amount).await?;

        response.tx = Some(TxRecord {
            id: tx_id,
            date_time: Utc::now(),
            sending_address: destination,
        });
        Ok(())
    }

    #[instrument(skip_all, fields(session = %session.id()))]
    async fn on_transfer_dispatch(
        &self,
        dispatch: &TransferDispatch,
        response: &mut TransferConfirmation,
        session: &mut Session,
    ) -> Result<()> {
        let amount = session
            .transfer_info()
            .transfer
            .ok_or_else(|| VaspError::Custom("transfer has no amount".into()))?
            .amount;
        let tx = dispatch
            .tx
            .as_ref()
            .ok_or_else(|| VaspError::Custom("dispatch carries no transaction".into()))?;

        let confirmed = self.accounts.check_transaction(&tx.id, amount).await?;
        response.header.response_code = Some(if confirmed {
            VaspResponseCode::Ok
        } else {
            VaspResponseCode::TcAssetsNotReceived
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vaan(prefix: &str) -> Vaan {
        Vaan::new(format!("{prefix}{}", "0".repeat(24 - prefix.len()))).unwrap()
    }

    #[tokio::test]
    async fn ledger_moves_value_once() {
        let ledger = InMemoryAccountService::new();
        ledger.register(vaan("7dface61"), "acc-alice", 10_000).await;
        ledger.register(vaan("08c3b8b4"), "acc-bob", 0).await;

        let alice = ledger.account_for(&vaan("7dface61")).await.unwrap();
        ledger.debit(&alice, 2_500).await.unwrap();
        let tx = ledger.credit("acc-bob", 2_500).await.unwrap();

        assert_eq!(ledger.balance("acc-alice").await, Some(7_500));
        assert_eq!(ledger.balance("acc-bob").await, Some(2_500));
        assert!(ledger.check_transaction(&tx, 2_500).await.unwrap());
        assert!(!ledger.check_transaction(&tx, 2_400).await.unwrap());
        assert!(!ledger.check_transaction("tx-bogus", 2_500).await.unwrap());
    }

    #[tokio::test]
    async fn overdraft_is_refused() {
        let ledger = InMemoryAccountService::new();
        ledger.register(vaan("7dface61"), "acc-alice", 100).await;
        assert!(ledger.debit("acc-alice", 200).await.is_err());
        assert_eq!(ledger.balance("acc-alice").await, Some(100));
    }

    #[tokio::test]
    async fn unknown_vaan_is_reported() {
        let ledger = InMemoryAccountService::new();
        assert!(ledger.account_for(&vaan("deadbeef")).await.is_err());
    }
}
