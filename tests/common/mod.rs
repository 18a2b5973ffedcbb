//! Shared scripted mocks for session integration tests.

#![allow(dead_code)]

use alloy::consensus::TxEnvelope;
use alloy::primitives::{keccak256, Address, Bytes, Signature, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

use devnet_session::config::{EtherAmount, SessionConfig};
use devnet_session::ledger::{
    ConfirmationStatus, LedgerClient, LedgerError, LedgerResult, TransferParams,
    TRANSFER_GAS_LIMIT,
};
use devnet_session::session::{SessionOrchestrator, SessionSnapshot};
use devnet_session::provider::{
    ConnectOptions, DisplayEncoding, ProviderError, ProviderEvent, ProviderResult,
    WalletProvider,
};

pub const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

pub fn ether(n: u64) -> U256 {
    U256::from(n as u128 * ONE_ETHER)
}

/// Wait (bounded) until the session snapshot satisfies `pred`.
pub async fn wait_for(
    session: &SessionOrchestrator,
    pred: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut rx = session.subscribe();
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if pred(&snapshot) {
                return snapshot;
            }
            rx.changed().await.unwrap();
        }
    })
    .await;
    result.expect("session never reached the expected state")
}

/// Config with a 2 ETH grant, 1 ETH transfers and no follow-up rounds.
pub fn test_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.funding.grant_amount = EtherAmount::from_ether(2);
    config.funding.follow_up_rounds = 0;
    config.transfer.amount = EtherAmount::from_ether(1);
    config.wallet.connect_timeout_secs = 5;
    config
}

/// How the mock faucet answers grant requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantMode {
    Accept,
    Reject,
    /// Accept the request but report the grant as failed on-chain.
    FailConfirmation,
}

/// In-memory ledger with scripted behaviour.
pub struct MockLedger {
    balances: Mutex<HashMap<Address, U256>>,
    pending_grants: Mutex<HashMap<TxHash, (Address, U256)>>,
    failed_grants: Mutex<HashSet<TxHash>>,
    grant_mode: Mutex<GrantMode>,
    confirm_transfers: AtomicBool,
    grant_counter: AtomicU64,
    pub balance_queries: AtomicUsize,
    pub grant_requests: AtomicUsize,
    pub submissions: AtomicUsize,
    pub submitted: Mutex<Vec<TxHash>>,
    /// When set, grant requests wait here until notified.
    funding_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            pending_grants: Mutex::new(HashMap::new()),
            failed_grants: Mutex::new(HashSet::new()),
            grant_mode: Mutex::new(GrantMode::Accept),
            confirm_transfers: AtomicBool::new(true),
            grant_counter: AtomicU64::new(0),
            balance_queries: AtomicUsize::new(0),
            grant_requests: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
            funding_gate: Mutex::new(None),
        }
    }

    pub fn with_grant_mode(self, mode: GrantMode) -> Self {
        *self.grant_mode.lock().unwrap() = mode;
        self
    }

    pub fn set_grant_mode(&self, mode: GrantMode) {
        *self.grant_mode.lock().unwrap() = mode;
    }

    pub fn reject_transfers(&self) {
        self.confirm_transfers.store(false, Ordering::SeqCst);
    }

    /// Hold every grant request until the returned handle is notified.
    pub fn gate_funding(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.funding_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn balance(&self, address: Address) -> U256 {
        self.balances
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn grant_count(&self) -> usize {
        self.grant_requests.load(Ordering::SeqCst)
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn balance_query_count(&self) -> usize {
        self.balance_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_balance(&self, address: Address) -> LedgerResult<U256> {
        self.balance_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.balance(address))
    }

    async fn request_funding(&self, address: Address, amount: U256) -> LedgerResult<TxHash> {
        self.grant_requests.fetch_add(1, Ordering::SeqCst);

        let gate = self.funding_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mode = *self.grant_mode.lock().unwrap();
        if mode == GrantMode::Reject {
            return Err(LedgerError::FundingRejected("rate limited".to_string()));
        }

        let n = self.grant_counter.fetch_add(1, Ordering::SeqCst);
        let hash = keccak256(n.to_be_bytes());
        if mode == GrantMode::FailConfirmation {
            self.failed_grants.lock().unwrap().insert(hash);
        } else {
            self.pending_grants.lock().unwrap().insert(hash, (address, amount));
        }
        Ok(hash)
    }

    async fn transfer_params(&self, _from: Address) -> LedgerResult<TransferParams> {
        Ok(TransferParams {
            chain_id: 31337,
            nonce: 0,
            gas_price: 1_000_000_000,
            gas_limit: TRANSFER_GAS_LIMIT,
        })
    }

    async fn submit_transaction(&self, raw: Bytes) -> LedgerResult<TxHash> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let hash = keccak256(&raw);
        self.submitted.lock().unwrap().push(hash);
        Ok(hash)
    }

    async fn await_confirmation(&self, tx_hash: TxHash) -> LedgerResult<ConfirmationStatus> {
        if self.failed_grants.lock().unwrap().remove(&tx_hash) {
            return Ok(ConfirmationStatus::Failed("grant reverted".to_string()));
        }

        let grant = self.pending_grants.lock().unwrap().remove(&tx_hash);
        if let Some((address, amount)) = grant {
            *self.balances.lock().unwrap().entry(address).or_insert(U256::ZERO) += amount;
            return Ok(ConfirmationStatus::Confirmed { block_number: 1 });
        }

        if self.confirm_transfers.load(Ordering::SeqCst) {
            Ok(ConfirmationStatus::Confirmed { block_number: 2 })
        } else {
            Ok(ConfirmationStatus::Failed("transaction reverted".to_string()))
        }
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

/// Scripted wallet provider. Echoes `Connect` and `Disconnect` to
/// subscribers the way a real wallet does.
pub struct MockProvider {
    address: Address,
    accept: AtomicBool,
    pub connect_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    events: broadcast::Sender<ProviderEvent>,
    connect_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockProvider {
    pub fn accepting() -> Self {
        Self::new(true)
    }

    pub fn declining() -> Self {
        Self::new(false)
    }

    fn new(accept: bool) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            address: Address::repeat_byte(0xab),
            accept: AtomicBool::new(accept),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            events,
            connect_gate: Mutex::new(None),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Hold connect requests until the returned handle is notified.
    pub fn gate_connect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.connect_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Push an unsolicited event to subscribers.
    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    pub fn connect_count(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self, _opts: ConnectOptions) -> ProviderResult<Address> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.connect_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.accept.load(Ordering::SeqCst) {
            self.emit(ProviderEvent::Connect(self.address));
            Ok(self.address)
        } else {
            Err(ProviderError::Rejected("user declined".to_string()))
        }
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.emit(ProviderEvent::Disconnect);
        Ok(())
    }

    async fn sign_transaction(&self, _request: TransactionRequest) -> ProviderResult<TxEnvelope> {
        Err(ProviderError::Signing("mock provider does not sign".to_string()))
    }

    async fn sign_message(
        &self,
        _message: &[u8],
        _encoding: DisplayEncoding,
    ) -> ProviderResult<Signature> {
        Err(ProviderError::Signing("mock provider does not sign".to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
