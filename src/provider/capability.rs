//! The wallet provider capability consumed by the session.

use alloy::consensus::TxEnvelope;
use alloy::primitives::{Address, Signature};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::provider::types::{ConnectOptions, DisplayEncoding, ProviderEvent, ProviderResult};

/// An installed wallet, reachable only through this interface.
///
/// The session only uses `connect`, `disconnect` and `subscribe`; the signing
/// calls are exposed for wallet-initiated flows.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Human readable provider name for logs.
    fn name(&self) -> &str;

    /// Request access to the user's account. May be declined.
    async fn connect(&self, opts: ConnectOptions) -> ProviderResult<Address>;

    async fn disconnect(&self) -> ProviderResult<()>;

    async fn sign_transaction(&self, request: TransactionRequest) -> ProviderResult<TxEnvelope>;

    async fn sign_all_transactions(
        &self,
        requests: Vec<TransactionRequest>,
    ) -> ProviderResult<Vec<TxEnvelope>> {
        let mut signed = Vec::with_capacity(requests.len());
        for request in requests {
            signed.push(self.sign_transaction(request).await?);
        }
        Ok(signed)
    }

    async fn sign_message(
        &self,
        message: &[u8],
        encoding: DisplayEncoding,
    ) -> ProviderResult<Signature>;

    /// Subscribe to unsolicited connect/disconnect/account-change events.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}
