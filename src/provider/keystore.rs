//! Key-backed wallet provider standing in for an installed wallet extension.
//!
//! # Security
//! - The wallet key is read ONLY from the environment variable named in config
//! - Keys are never logged or serialized

use alloy::consensus::TxEnvelope;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Signature};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::WalletConfig;
use crate::provider::capability::WalletProvider;
use crate::provider::types::{
    ConnectOptions, DisplayEncoding, ProviderError, ProviderEvent, ProviderResult,
};

const EVENT_CAPACITY: usize = 16;

/// Probe for an installed wallet.
///
/// Returns `None` when no key is present in the configured environment
/// variable, which the session treats as "no provider installed".
pub fn detect(config: &WalletConfig) -> Option<Arc<dyn WalletProvider>> {
    let raw = match std::env::var(&config.private_key_env) {
        Ok(raw) => raw,
        Err(_) => {
            tracing::info!(env = %config.private_key_env, "No wallet provider detected");
            return None;
        }
    };

    match KeystoreProvider::from_private_key(&raw, config) {
        Ok(provider) => {
            tracing::info!(provider = provider.name(), "Wallet provider detected");
            Some(Arc::new(provider))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Wallet key present but unusable, treating provider as absent");
            None
        }
    }
}

/// A wallet provider that signs with a locally held key.
pub struct KeystoreProvider {
    signer: PrivateKeySigner,
    wallet: EthereumWallet,
    auto_approve: bool,
    trusted: AtomicBool,
    connected: AtomicBool,
    events: broadcast::Sender<ProviderEvent>,
}

impl KeystoreProvider {
    pub fn new(signer: PrivateKeySigner, config: &WalletConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            wallet: EthereumWallet::from(signer.clone()),
            signer,
            auto_approve: config.auto_approve,
            trusted: AtomicBool::new(config.trusted),
            connected: AtomicBool::new(false),
            events,
        }
    }

    /// Build from a hex-encoded private key (with or without 0x prefix).
    pub fn from_private_key(private_key_hex: &str, config: &WalletConfig) -> ProviderResult<Self> {
        let key_hex = private_key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);
        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| ProviderError::Unavailable(format!("Invalid private key format: {}", e)))?;
        Ok(Self::new(signer, config))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Simulate the user locking the wallet from the extension UI.
    pub fn lock(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::info!(address = %self.address(), "Wallet locked");
            let _ = self.events.send(ProviderEvent::Disconnect);
        }
    }

    fn ensure_connected(&self) -> ProviderResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ProviderError::NotConnected)
        }
    }
}

#[async_trait]
impl WalletProvider for KeystoreProvider {
    fn name(&self) -> &str {
        "keystore"
    }

    async fn connect(&self, opts: ConnectOptions) -> ProviderResult<Address> {
        let trusted = self.trusted.load(Ordering::SeqCst);
        if opts.only_if_trusted && !trusted {
            return Err(ProviderError::NotTrusted);
        }
        if !trusted && !self.auto_approve {
            return Err(ProviderError::Rejected(
                "user declined the connection request".to_string(),
            ));
        }

        // Approving once makes the application trusted for later silent connects
        self.trusted.store(true, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);

        let address = self.address();
        let _ = self.events.send(ProviderEvent::Connect(address));
        Ok(address)
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(ProviderEvent::Disconnect);
        }
        Ok(())
    }

    async fn sign_transaction(&self, request: TransactionRequest) -> ProviderResult<TxEnvelope> {
        self.ensure_connected()?;
        request
            .with_from(self.address())
            .build(&self.wallet)
            .await
            .map_err(|e| ProviderError::Signing(e.to_string()))
    }

    async fn sign_message(
        &self,
        message: &[u8],
        encoding: DisplayEncoding,
    ) -> ProviderResult<Signature> {
        self.ensure_connected()?;
        tracing::debug!(len = message.len(), ?encoding, "Signing message");
        self.signer
            .sign_message(message)
            .await
            .map_err(|e| ProviderError::Signing(e.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for KeystoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystoreProvider")
            .field("address", &self.address())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(auto_approve: bool, trusted: bool) -> WalletConfig {
        WalletConfig {
            auto_approve,
            trusted,
            ..WalletConfig::default()
        }
    }

    #[tokio::test]
    async fn test_connect_emits_event() {
        let provider = KeystoreProvider::new(PrivateKeySigner::random(), &config(true, false));
        let mut events = provider.subscribe();

        let address = provider.connect(ConnectOptions::default()).await.unwrap();
        assert_eq!(address, provider.address());
        assert!(provider.is_connected());
        assert_eq!(events.recv().await.unwrap(), ProviderEvent::Connect(address));
    }

    #[tokio::test]
    async fn test_connect_declined() {
        let provider = KeystoreProvider::new(PrivateKeySigner::random(), &config(false, false));
        let result = provider.connect(ConnectOptions::default()).await;
        assert!(matches!(result, Err(ProviderError::Rejected(_))));
        assert!(!provider.is_connected());
    }

    #[tokio::test]
    async fn test_only_if_trusted() {
        let provider = KeystoreProvider::new(PrivateKeySigner::random(), &config(true, false));
        let silent = ConnectOptions {
            only_if_trusted: true,
        };
        assert_eq!(provider.connect(silent).await, Err(ProviderError::NotTrusted));

        // After one approved connect the app is trusted
        provider.connect(ConnectOptions::default()).await.unwrap();
        provider.disconnect().await.unwrap();
        assert!(provider.connect(silent).await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_emits_disconnect_once() {
        let provider = KeystoreProvider::new(PrivateKeySigner::random(), &config(true, true));
        provider.connect(ConnectOptions::default()).await.unwrap();
        let mut events = provider.subscribe();

        provider.lock();
        provider.lock();
        assert_eq!(events.recv().await.unwrap(), ProviderEvent::Disconnect);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sign_message_requires_connection() {
        let provider = KeystoreProvider::new(PrivateKeySigner::random(), &config(true, true));
        let result = provider.sign_message(b"hello", DisplayEncoding::Utf8).await;
        assert_eq!(result, Err(ProviderError::NotConnected));

        provider.connect(ConnectOptions::default()).await.unwrap();
        let signature = provider.sign_message(b"hello", DisplayEncoding::Utf8).await.unwrap();
        assert_eq!(signature.as_bytes().len(), 65);
    }

    #[test]
    fn test_detect_without_key() {
        let config = WalletConfig {
            private_key_env: "DEVNET_SESSION_TEST_UNSET_WALLET".to_string(),
            ..WalletConfig::default()
        };
        assert!(detect(&config).is_none());
    }
}
