//! Session entities and the read-only snapshot handed to consumers.
//!
//! Nothing in here carries key material; snapshots are safe to serialize.

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, TxHash, U256};
use serde::Serialize;
use uuid::Uuid;

use crate::session::error::SessionError;

/// Number of earlier transfers a snapshot keeps.
pub const TRANSFER_HISTORY_LIMIT: usize = 32;

/// Whether a wallet provider was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPresence {
    Absent,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Relationship to the wallet provider.
///
/// The connected address lives inside `Connected`, so it exists exactly when
/// the session is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "address", rename_all = "snake_case")]
pub enum WalletSession {
    Absent,
    Disconnected,
    Connecting,
    Connected(Address),
}

impl WalletSession {
    pub fn provider_presence(&self) -> ProviderPresence {
        match self {
            WalletSession::Absent => ProviderPresence::Absent,
            _ => ProviderPresence::Present,
        }
    }

    /// Connection state; an absent provider reads as disconnected.
    pub fn connection_state(&self) -> ConnectionState {
        match self {
            WalletSession::Absent | WalletSession::Disconnected => ConnectionState::Disconnected,
            WalletSession::Connecting => ConnectionState::Connecting,
            WalletSession::Connected(_) => ConnectionState::Connected,
        }
    }

    pub fn connected_address(&self) -> Option<Address> {
        match self {
            WalletSession::Connected(address) => Some(*address),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FundingState {
    Unfunded,
    Funding,
    Funded,
    FundingFailed,
}

/// Public view of the ephemeral account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub address: Address,
    /// Balance in wei.
    pub balance: U256,
    pub funding_state: FundingState,
}

impl AccountView {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            balance: U256::ZERO,
            funding_state: FundingState::Unfunded,
        }
    }

    /// Balance in ether.
    pub fn display_balance(&self) -> String {
        format_ether(self.balance)
    }

    pub fn is_funded(&self) -> bool {
        self.funding_state == FundingState::Funded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TransferStatus {
    NotStarted,
    Submitted(TxHash),
    Confirmed(TxHash),
    Failed(String),
}

impl TransferStatus {
    /// The transaction hash, present only once submitted.
    pub fn signature(&self) -> Option<TxHash> {
        match self {
            TransferStatus::Submitted(hash) | TransferStatus::Confirmed(hash) => Some(*hash),
            TransferStatus::NotStarted | TransferStatus::Failed(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Confirmed(_) | TransferStatus::Failed(_))
    }
}

/// A single attempt to move funds from the ephemeral account to the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    pub id: Uuid,
    pub from: Address,
    pub to: Address,
    /// Amount in wei.
    pub amount: U256,
    pub status: TransferStatus,
}

impl TransferRecord {
    pub fn new(from: Address, to: Address, amount: U256) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            amount,
            status: TransferStatus::NotStarted,
        }
    }

    pub fn signature(&self) -> Option<TxHash> {
        self.status.signature()
    }
}

/// Everything a consumer may render about a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub wallet: WalletSession,
    pub account: Option<AccountView>,
    /// The current (most recent) transfer.
    pub transfer: Option<TransferRecord>,
    /// Earlier transfers, oldest first, at most [`TRANSFER_HISTORY_LIMIT`].
    /// Never mutated once moved here.
    pub transfer_history: Vec<TransferRecord>,
    /// Last condition reported by an intent.
    pub notice: Option<SessionError>,
}

impl SessionSnapshot {
    pub fn new(session_id: Uuid, wallet: WalletSession) -> Self {
        Self {
            session_id,
            wallet,
            account: None,
            transfer: None,
            transfer_history: Vec::new(),
            notice: None,
        }
    }

    pub fn funding_state(&self) -> Option<FundingState> {
        self.account.as_ref().map(|a| a.funding_state)
    }

    /// Make `record` the current transfer, moving the previous one to history.
    pub fn begin_transfer(&mut self, record: TransferRecord) {
        if let Some(previous) = self.transfer.replace(record) {
            self.transfer_history.push(previous);
            if self.transfer_history.len() > TRANSFER_HISTORY_LIMIT {
                let excess = self.transfer_history.len() - TRANSFER_HISTORY_LIMIT;
                self.transfer_history.drain(..excess);
            }
        }
    }
}
