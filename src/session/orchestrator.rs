//! Session orchestrator: the single entry point for user intents.
//!
//! # Responsibilities
//! - Track the wallet session (presence, connection, connected address)
//! - Gate intents on their preconditions before any ledger interaction
//! - Drive the transfer from the ephemeral account to the connected wallet
//! - Follow unsolicited provider events (lock, account switch)
//! - Publish every change through the session store
//!
//! # Data Flow
//! ```text
//! intent (connect / disconnect / create_and_fund_account / transfer)
//!     → precondition check against the current snapshot
//!     → WalletProvider / AccountManager / LedgerClient (each suspension raced
//!       against the session's cancellation token)
//!     → SessionStore (state + notice) → watch subscribers
//! ```
//!
//! # Design Decisions
//! - Errors are returned AND mirrored into `notice`, so a consumer can render
//!   from snapshots alone
//! - At most one transfer in flight, enforced with a try-lock gate
//! - No automatic retries; a failed attempt is terminal for that attempt
//! - Provider events are followed per connection: each successful connect
//!   gets a fresh subscription and a connection number, and events are only
//!   applied while that number is current. Echoes of our own earlier
//!   disconnect can therefore never drop a newer connection.

use alloy::primitives::U256;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::account::manager::AccountManager;
use crate::config::SessionConfig;
use crate::ledger::client::LedgerClient;
use crate::ledger::types::{ConfirmationStatus, LedgerResult};
use crate::lifecycle::cancellable;
use crate::observability::metrics;
use crate::provider::capability::WalletProvider;
use crate::provider::types::{ConnectOptions, ProviderEvent};
use crate::session::error::{Precondition, SessionError, SessionResult};
use crate::session::state::{
    AccountView, SessionSnapshot, TransferRecord, TransferStatus, WalletSession,
};
use crate::session::store::SessionStore;

/// Cloneable handle to one session.
#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    store: SessionStore,
    ledger: Arc<dyn LedgerClient>,
    provider: Option<Arc<dyn WalletProvider>>,
    accounts: AccountManager,
    transfer_gate: Mutex<()>,
    transfer_amount: U256,
    connect_timeout: Duration,
    cancel: CancellationToken,
    /// Bumped on every connect and disconnect commit.
    connection: Arc<AtomicU64>,
    /// Stops the event listener of the current connection.
    listener: std::sync::Mutex<Option<CancellationToken>>,
}

impl SessionOrchestrator {
    /// Start a session. Never fails.
    ///
    /// `shutdown` is the parent token; the session derives its own child so
    /// that [`shutdown`](Self::shutdown) does not affect siblings.
    pub fn initialize(
        config: &SessionConfig,
        ledger: Arc<dyn LedgerClient>,
        provider: Option<Arc<dyn WalletProvider>>,
        shutdown: CancellationToken,
    ) -> Self {
        let cancel = shutdown.child_token();
        let session_id = uuid::Uuid::new_v4();

        let wallet = match &provider {
            Some(_) => WalletSession::Disconnected,
            None => WalletSession::Absent,
        };
        let store = SessionStore::new(SessionSnapshot::new(session_id, wallet));

        let accounts = AccountManager::new(
            ledger.clone(),
            store.clone(),
            config.funding.clone(),
            cancel.clone(),
        );

        tracing::info!(
            session_id = %session_id,
            provider = provider.as_ref().map(|p| p.name()).unwrap_or("none"),
            "Session initialized"
        );

        Self {
            inner: Arc::new(Inner {
                store,
                ledger,
                provider,
                accounts,
                transfer_gate: Mutex::new(()),
                transfer_amount: config.transfer.amount.wei(),
                connect_timeout: Duration::from_secs(config.wallet.connect_timeout_secs),
                cancel,
                connection: Arc::new(AtomicU64::new(0)),
                listener: std::sync::Mutex::new(None),
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.store.subscribe()
    }

    /// Cached balance of the ephemeral account in wei, if one exists.
    ///
    /// Reads session state only; the ledger is not queried.
    pub fn balance_of(&self) -> Option<U256> {
        self.inner.accounts.balance_of()
    }

    /// Ask the provider for access to the user's account.
    ///
    /// No-op when already connecting or connected. Without a provider the
    /// session is left untouched.
    pub async fn connect(&self) -> SessionResult<WalletSession> {
        let result = self.inner.connect().await;
        self.inner.report("connect", &result);
        result
    }

    /// Drop the wallet connection. Always honoured locally.
    pub async fn disconnect(&self) -> SessionResult<WalletSession> {
        let result = self.inner.disconnect().await;
        self.inner.report("disconnect", &result);
        result
    }

    /// Replace the ephemeral account with a fresh one and fund it.
    pub async fn create_and_fund_account(&self) -> SessionResult<AccountView> {
        let result = self.inner.accounts.create_and_fund().await;
        self.inner.report("create_and_fund_account", &result);
        result
    }

    /// Move the policy amount from the ephemeral account to the connected wallet.
    pub async fn transfer(&self) -> SessionResult<TransferRecord> {
        let result = self.inner.transfer().await;
        self.inner.report("transfer", &result);
        result
    }

    /// Cancel everything in flight and drop the ephemeral account.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.cancel.cancel();
        inner.accounts.clear();

        let was_connected = inner.store.modify_if(|s| match s.wallet {
            WalletSession::Connecting | WalletSession::Connected(_) => {
                s.wallet = WalletSession::Disconnected;
                inner.connection.fetch_add(1, Ordering::SeqCst);
                true
            }
            _ => false,
        });
        inner.stop_listener();
        if was_connected {
            inner.notify_provider_disconnect().await;
        }

        tracing::info!(session_id = %inner.store.snapshot().session_id, "Session shut down");
    }

    /// Whether the ledger answers right now.
    pub async fn ledger_healthy(&self) -> bool {
        self.inner.ledger.is_healthy().await
    }
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("store", &self.inner.store)
            .field("accounts", &self.inner.accounts)
            .finish_non_exhaustive()
    }
}

impl Inner {
    async fn connect(&self) -> SessionResult<WalletSession> {
        let Some(provider) = self.provider.clone() else {
            return Err(SessionError::ProviderAbsent);
        };

        let mut current = WalletSession::Connecting;
        let started = self.store.modify_if(|s| match s.wallet {
            WalletSession::Disconnected => {
                s.wallet = WalletSession::Connecting;
                true
            }
            other => {
                current = other;
                false
            }
        });
        if !started {
            tracing::debug!(state = ?current, "Connect ignored");
            return Ok(current);
        }

        tracing::info!(provider = provider.name(), "Connecting wallet");
        // Subscribed before the request so nothing emitted afterwards is missed
        let events = provider.subscribe();
        let outcome = cancellable(
            &self.cancel,
            tokio::time::timeout(self.connect_timeout, provider.connect(ConnectOptions::default())),
        )
        .await;

        let error = match outcome {
            Some(Ok(Ok(address))) => {
                let mut connection = 0;
                let committed = self.store.modify_if(|s| {
                    if s.wallet == WalletSession::Connecting {
                        s.wallet = WalletSession::Connected(address);
                        connection = self.connection.fetch_add(1, Ordering::SeqCst) + 1;
                        true
                    } else {
                        false
                    }
                });
                if committed {
                    self.follow_provider(events, connection);
                    tracing::info!(address = %address, connection, "Wallet connected");
                    return Ok(WalletSession::Connected(address));
                }
                SessionError::Cancelled
            }
            Some(Ok(Err(e))) => SessionError::ConnectionDeclined(e.to_string()),
            Some(Err(_)) => SessionError::ConnectionDeclined(format!(
                "no answer within {}s",
                self.connect_timeout.as_secs()
            )),
            None => SessionError::Cancelled,
        };

        self.store.modify_if(|s| {
            if s.wallet == WalletSession::Connecting {
                s.wallet = WalletSession::Disconnected;
                true
            } else {
                false
            }
        });
        tracing::warn!(error = %error, "Wallet connection failed");
        Err(error)
    }

    async fn disconnect(&self) -> SessionResult<WalletSession> {
        let mut current = WalletSession::Disconnected;
        let was_connected = self.store.modify_if(|s| match s.wallet {
            WalletSession::Connected(_) => {
                s.wallet = WalletSession::Disconnected;
                self.connection.fetch_add(1, Ordering::SeqCst);
                true
            }
            other => {
                current = other;
                false
            }
        });
        if !was_connected {
            return Ok(current);
        }

        self.stop_listener();
        tracing::info!("Wallet disconnected");
        self.notify_provider_disconnect().await;
        Ok(WalletSession::Disconnected)
    }

    /// Replace the event listener with one bound to `connection`.
    fn follow_provider(&self, events: broadcast::Receiver<ProviderEvent>, connection: u64) {
        let token = self.cancel.child_token();
        let previous = self
            .listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        spawn_event_listener(
            self.store.clone(),
            events,
            token,
            self.connection.clone(),
            connection,
        );
    }

    fn stop_listener(&self) {
        let current = self
            .listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(token) = current {
            token.cancel();
        }
    }

    async fn notify_provider_disconnect(&self) {
        if let Some(provider) = &self.provider {
            if let Err(e) = provider.disconnect().await {
                tracing::warn!(error = %e, "Provider disconnect failed");
            }
        }
    }

    async fn transfer(&self) -> SessionResult<TransferRecord> {
        let _gate = self
            .transfer_gate
            .try_lock()
            .map_err(|_| SessionError::PreconditionNotMet(Precondition::TransferInFlight))?;

        let snapshot = self.store.snapshot();
        let to = snapshot
            .wallet
            .connected_address()
            .ok_or(SessionError::PreconditionNotMet(Precondition::WalletNotConnected))?;
        let account = match (&snapshot.account, self.accounts.current()) {
            (Some(view), Some(account)) if view.is_funded() && view.address == account.address() => {
                account
            }
            _ => return Err(SessionError::PreconditionNotMet(Precondition::AccountNotFunded)),
        };
        if snapshot.transfer.as_ref().is_some_and(|t| !t.status.is_terminal()) {
            return Err(SessionError::PreconditionNotMet(Precondition::TransferInFlight));
        }

        let from = account.address();
        let amount = self.transfer_amount;
        let record = TransferRecord::new(from, to, amount);
        let id = record.id;
        self.store.update(|s| s.begin_transfer(record));
        tracing::info!(transfer_id = %id, from = %from, to = %to, amount = %amount, "Transfer started");

        let result = cancellable(&self.cancel, async {
            let params = self.ledger.transfer_params(from).await?;
            let signed = account.sign_transfer(&params, to, amount).await?;
            let hash = self.ledger.submit_transaction(signed.raw).await?;
            self.set_transfer_status(id, TransferStatus::Submitted(hash));
            tracing::info!(transfer_id = %id, tx_hash = %hash, "Transfer submitted");

            let status = self.ledger.await_confirmation(hash).await?;
            LedgerResult::Ok((hash, status))
        })
        .await;

        let (status, outcome) = match result {
            Some(Ok((hash, ConfirmationStatus::Confirmed { block_number }))) => {
                tracing::info!(transfer_id = %id, tx_hash = %hash, block_number, "Transfer confirmed");
                (TransferStatus::Confirmed(hash), Ok(()))
            }
            Some(Ok((_, ConfirmationStatus::Failed(reason)))) => (
                TransferStatus::Failed(reason.clone()),
                Err(SessionError::TransferFailed(reason)),
            ),
            Some(Err(e)) => (
                TransferStatus::Failed(e.to_string()),
                Err(SessionError::TransferFailed(e.to_string())),
            ),
            None => (
                TransferStatus::Failed("cancelled".to_string()),
                Err(SessionError::Cancelled),
            ),
        };
        self.set_transfer_status(id, status);

        metrics::record_transfer(match &outcome {
            Ok(()) => "confirmed",
            Err(SessionError::Cancelled) => "cancelled",
            Err(_) => "failed",
        });

        outcome?;

        match cancellable(&self.cancel, self.accounts.refresh_balance(from)).await {
            Some(Err(e)) => tracing::warn!(error = %e, "Balance refresh after transfer failed"),
            Some(Ok(_)) | None => {}
        }

        self.store
            .snapshot()
            .transfer
            .filter(|t| t.id == id)
            .ok_or(SessionError::Cancelled)
    }

    fn set_transfer_status(&self, id: uuid::Uuid, status: TransferStatus) {
        self.store.modify_if(|s| match s.transfer.as_mut() {
            Some(record) if record.id == id => {
                record.status = status;
                true
            }
            _ => false,
        });
    }

    /// Record the intent outcome and mirror it into the snapshot notice.
    fn report<T>(&self, intent: &'static str, result: &SessionResult<T>) {
        match result {
            Ok(_) => {
                metrics::record_intent(intent, "ok");
                self.store.modify_if(|s| s.notice.take().is_some());
            }
            // Nothing to show without a provider; state stays untouched
            Err(SessionError::ProviderAbsent) => {
                metrics::record_intent(intent, "provider_absent");
            }
            Err(e) => {
                metrics::record_intent(intent, "error");
                tracing::debug!(intent, error = %e, "Intent failed");
                let notice = e.clone();
                self.store.update(|s| s.notice = Some(notice));
            }
        }
    }
}

/// Follow provider-initiated changes for one connection.
fn spawn_event_listener(
    store: SessionStore,
    mut events: broadcast::Receiver<ProviderEvent>,
    cancel: CancellationToken,
    current: Arc<AtomicU64>,
    connection: u64,
) {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };

            match event {
                Ok(event) => apply_provider_event(&store, &current, connection, event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Provider events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Apply `event` if it belongs to the current connection.
fn apply_provider_event(
    store: &SessionStore,
    current: &AtomicU64,
    connection: u64,
    event: ProviderEvent,
) {
    let changed = store.modify_if(|s| match (event, s.wallet) {
        _ if current.load(Ordering::SeqCst) != connection => false,
        (ProviderEvent::Disconnect | ProviderEvent::AccountChanged(None), WalletSession::Connected(_)) => {
            s.wallet = WalletSession::Disconnected;
            current.fetch_add(1, Ordering::SeqCst);
            true
        }
        (ProviderEvent::AccountChanged(Some(next)), WalletSession::Connected(address))
            if next != address =>
        {
            s.wallet = WalletSession::Connected(next);
            true
        }
        _ => false,
    });

    if changed {
        tracing::info!(event = ?event, "Wallet session changed by provider");
    }
}
