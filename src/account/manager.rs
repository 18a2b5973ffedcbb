//! Ephemeral account lifecycle and funding.
//!
//! # Responsibilities
//! - Hold the single live ephemeral account (and its key)
//! - Run the funding policy: one immediate grant, then delayed follow-ups
//! - Publish balance and funding state into the session store
//!
//! # Design Decisions
//! - Follow-up grants run in the background, bound to the account they were
//!   scheduled for; replacing the account or shutting down cancels them
//! - A failed round ends funding for that account; partial balance is kept
//! - State writes name the target address, so a stale task can never touch
//!   a newer account

use alloy::primitives::{Address, U256};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::account::ephemeral::EphemeralAccount;
use crate::config::FundingPolicy;
use crate::ledger::client::LedgerClient;
use crate::ledger::types::LedgerResult;
use crate::lifecycle::cancellable;
use crate::observability::metrics;
use crate::session::error::{SessionError, SessionResult};
use crate::session::state::{AccountView, FundingState};
use crate::session::store::SessionStore;

struct Slot {
    account: Arc<EphemeralAccount>,
    follow_ups: CancellationToken,
}

/// Owner of the ephemeral account.
#[derive(Clone)]
pub struct AccountManager {
    ledger: Arc<dyn LedgerClient>,
    store: SessionStore,
    policy: FundingPolicy,
    slot: Arc<Mutex<Option<Slot>>>,
    cancel: CancellationToken,
}

impl AccountManager {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        store: SessionStore,
        policy: FundingPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ledger,
            store,
            policy,
            slot: Arc::new(Mutex::new(None)),
            cancel,
        }
    }

    /// Produce a fresh keypair. Always succeeds.
    fn generate() -> EphemeralAccount {
        EphemeralAccount::generate()
    }

    /// Replace the current account with a new one and fund it.
    ///
    /// While the current account is still `Funding` this is a no-op that
    /// returns the in-flight account.
    pub async fn create_and_fund(&self) -> SessionResult<AccountView> {
        let mut created = None;
        let mut in_flight = None;
        // Slot and snapshot change together under the store lock
        self.store.modify_if(|s| {
            if self.cancel.is_cancelled() {
                return false;
            }

            let funding = s
                .account
                .as_ref()
                .filter(|view| view.funding_state == FundingState::Funding)
                .cloned();
            if funding.is_some() {
                in_flight = funding;
                return false;
            }

            let account = Arc::new(Self::generate());
            let mut view = AccountView::new(account.address());
            view.funding_state = FundingState::Funding;
            s.account = Some(view);
            created = Some((account.clone(), self.install(account)));
            true
        });

        let (account, follow_ups) = match (created, in_flight) {
            (Some(created), _) => created,
            (None, Some(view)) => {
                tracing::debug!(address = %view.address, "Funding already in flight, ignoring create");
                return Ok(view);
            }
            (None, None) => return Err(SessionError::Cancelled),
        };

        tracing::info!(address = %account.address(), "Ephemeral account created");
        self.fund(account, follow_ups).await
    }

    fn install(&self, account: Arc<EphemeralAccount>) -> CancellationToken {
        let follow_ups = self.cancel.child_token();
        let previous = self.lock_slot().replace(Slot {
            account,
            follow_ups: follow_ups.clone(),
        });
        if let Some(previous) = previous {
            previous.follow_ups.cancel();
            tracing::debug!(address = %previous.account.address(), "Previous ephemeral account discarded");
        }
        follow_ups
    }

    /// Run the first grant now and schedule the follow-ups.
    ///
    /// Returns once the first grant is confirmed (or failed).
    async fn fund(
        &self,
        account: Arc<EphemeralAccount>,
        follow_ups: CancellationToken,
    ) -> SessionResult<AccountView> {
        let address = account.address();

        // Starting balance is informational only
        if let Some(Ok(balance)) = cancellable(&follow_ups, self.ledger.get_balance(address)).await {
            self.apply(address, |view| view.balance = balance);
        }

        match self.grant_round(address, &follow_ups).await {
            Ok(()) => {
                self.apply(address, |view| view.funding_state = FundingState::Funded);
            }
            Err(e) => {
                self.mark_failed(address, &e);
                return Err(e);
            }
        }

        if self.policy.follow_up_rounds > 0 {
            let manager = self.clone();
            tokio::spawn(async move { manager.run_follow_ups(address, follow_ups).await });
        }

        self.view_of(address).ok_or(SessionError::Cancelled)
    }

    async fn run_follow_ups(&self, address: Address, token: CancellationToken) {
        let delay = Duration::from_millis(self.policy.follow_up_delay_ms);

        for round in 1..=self.policy.follow_up_rounds {
            if cancellable(&token, tokio::time::sleep(delay)).await.is_none() {
                tracing::debug!(address = %address, round, "Follow-up funding cancelled");
                return;
            }

            match self.grant_round(address, &token).await {
                Ok(()) => tracing::info!(address = %address, round, "Follow-up funding confirmed"),
                Err(SessionError::Cancelled) => return,
                Err(e) => {
                    self.mark_failed(address, &e);
                    return;
                }
            }
        }
    }

    /// One grant: request, await confirmation, refresh balance.
    async fn grant_round(&self, address: Address, token: &CancellationToken) -> SessionResult<()> {
        let amount = self.policy.grant_amount.wei();
        let result = cancellable(token, async {
            let tx_hash = self.ledger.request_funding(address, amount).await?;
            tracing::debug!(address = %address, tx_hash = %tx_hash, "Funding grant submitted");

            let status = self.ledger.await_confirmation(tx_hash).await?;
            let balance = self.ledger.get_balance(address).await?;
            LedgerResult::Ok((status, balance))
        })
        .await;

        let outcome = match result {
            None => Err(SessionError::Cancelled),
            Some(Err(e)) => Err(SessionError::FundingFailed(e.to_string())),
            Some(Ok((status, balance))) => {
                self.apply(address, |view| view.balance = balance);
                if status.is_confirmed() {
                    Ok(())
                } else {
                    Err(SessionError::FundingFailed(format!("grant not confirmed: {:?}", status)))
                }
            }
        };

        metrics::record_funding_round(match &outcome {
            Ok(()) => "confirmed",
            Err(SessionError::Cancelled) => "cancelled",
            Err(_) => "failed",
        });
        outcome
    }

    fn mark_failed(&self, address: Address, error: &SessionError) {
        tracing::warn!(address = %address, error = %error, "Funding failed");
        let notice = error.clone();
        self.store.modify_if(|s| match s.account.as_mut() {
            Some(view) if view.address == address && *error != SessionError::Cancelled => {
                view.funding_state = FundingState::FundingFailed;
                s.notice = Some(notice);
                true
            }
            _ => false,
        });
    }

    /// Apply `f` to the account view if `address` is still the live account.
    fn apply(&self, address: Address, f: impl FnOnce(&mut AccountView)) -> bool {
        self.store.modify_if(|s| match s.account.as_mut() {
            Some(view) if view.address == address => {
                f(view);
                true
            }
            _ => false,
        })
    }

    fn view_of(&self, address: Address) -> Option<AccountView> {
        self.store
            .snapshot()
            .account
            .filter(|view| view.address == address)
    }

    /// Cached balance of the live account in wei. No network access.
    pub fn balance_of(&self) -> Option<U256> {
        self.store.snapshot().account.map(|view| view.balance)
    }

    /// Live account, for signing.
    pub(crate) fn current(&self) -> Option<Arc<EphemeralAccount>> {
        self.lock_slot().as_ref().map(|slot| slot.account.clone())
    }

    /// Re-read the balance of `address` from the ledger, if it is still live.
    pub async fn refresh_balance(&self, address: Address) -> LedgerResult<U256> {
        let balance = self.ledger.get_balance(address).await?;
        self.apply(address, |view| view.balance = balance);
        Ok(balance)
    }

    /// Drop the live account and stop its follow-up funding.
    pub fn clear(&self) {
        self.store.modify_if(|s| {
            if let Some(slot) = self.lock_slot().take() {
                slot.follow_ups.cancel();
            }
            s.account.take().is_some()
        });
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<Slot>> {
        // A poisoned slot still holds a consistent Option
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for AccountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountManager")
            .field("policy", &self.policy)
            .field("account", &self.current().map(|a| a.address()))
            .finish()
    }
}
