//! Ledger RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Define the narrow [`LedgerClient`] capability the session consumes
//! - Connect to JSON-RPC endpoints with failover
//! - Query chain state (balances, nonces, receipts)
//! - Serve funding grants from a configured faucet
//! - Submit signed transactions and poll for confirmation

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionReceipt;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout};

use crate::ledger::faucet::Faucet;
use crate::ledger::transaction::{build_transfer, sign_request};
use crate::ledger::types::{
    ConfirmationStatus, LedgerConfig, LedgerError, LedgerResult, TransferParams,
    TRANSFER_GAS_LIMIT,
};
use crate::observability::metrics;

/// Capability the session needs from the ledger.
///
/// Every call may fail with a transient condition; callers decide whether a
/// failure is terminal.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Balance of `address` in wei.
    async fn get_balance(&self, address: Address) -> LedgerResult<U256>;

    /// Ask for `amount` wei to be granted to `address`. Returns the grant transaction hash.
    async fn request_funding(&self, address: Address, amount: U256) -> LedgerResult<TxHash>;

    /// Chain parameters needed to sign a transfer from `from`.
    async fn transfer_params(&self, from: Address) -> LedgerResult<TransferParams>;

    /// Submit a signed, encoded transaction.
    async fn submit_transaction(&self, raw: Bytes) -> LedgerResult<TxHash>;

    /// Wait until `tx_hash` is confirmed or has terminally failed.
    async fn await_confirmation(&self, tx_hash: TxHash) -> LedgerResult<ConfirmationStatus>;

    /// Check if the ledger is reachable.
    async fn is_healthy(&self) -> bool;
}

/// JSON-RPC ledger client with failover support.
#[derive(Clone)]
pub struct RpcLedgerClient {
    /// List of providers (primary + failovers).
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    config: LedgerConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
    /// Source of funding grants, when one is configured.
    faucet: Option<Faucet>,
}

impl RpcLedgerClient {
    /// Create a new ledger client.
    ///
    /// Loads the faucet key from `config.faucet_key_env`; a missing key is not
    /// fatal, grants are simply rejected.
    pub async fn new(config: LedgerConfig) -> LedgerResult<Self> {
        let faucet = match Faucet::from_env(&config.faucet_key_env, config.max_grant.wei()) {
            Ok(faucet) => Some(faucet),
            Err(e) => {
                tracing::warn!(error = %e, "No faucet configured, funding grants will be rejected");
                None
            }
        };
        Self::with_faucet(config, faucet).await
    }

    /// Create a ledger client with an explicit faucet.
    pub async fn with_faucet(config: LedgerConfig, faucet: Option<Faucet>) -> LedgerResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            LedgerError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(
            Arc::new(ProviderBuilder::new().connect_http(primary_url))
                as Arc<dyn Provider + Send + Sync>,
        );

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(
                    Arc::new(ProviderBuilder::new().connect_http(url))
                        as Arc<dyn Provider + Send + Sync>,
                );
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            timeout_duration,
            faucet,
        };

        // Don't fail initialization - allow graceful degradation
        match client.verify_chain_id().await {
            Ok(()) => tracing::info!(
                rpc_url = %config.rpc_url,
                chain_id = config.chain_id,
                "Ledger client initialized"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                "Ledger client initialized but chain verification failed"
            ),
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> LedgerResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id != self.config.chain_id {
            return Err(LedgerError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id,
            });
        }
        Ok(())
    }

    pub async fn get_chain_id(&self) -> LedgerResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_chain_id()).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider")
                }
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout, trying next provider"),
            }
        }
        Err(LedgerError::Rpc("All RPC providers failed".to_string()))
    }

    pub async fn get_block_number(&self) -> LedgerResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_block_number()).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(LedgerError::Rpc("All providers failed to get block number".to_string()))
    }

    /// Get the transaction count (nonce) for an address.
    pub async fn get_transaction_count(&self, address: Address) -> LedgerResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = provider.get_transaction_count(address);
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(LedgerError::Rpc("All providers failed to get transaction count".to_string()))
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> LedgerResult<Option<TransactionReceipt>> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_transaction_receipt(tx_hash)).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(LedgerError::Rpc("All providers failed to get receipt".to_string()))
    }

    /// Current gas price in wei.
    pub async fn get_gas_price(&self) -> LedgerResult<u128> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_gas_price()).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(LedgerError::Rpc("All providers failed to get gas price".to_string()))
    }

    /// Gas price with the configured multiplier, capped by `max_gas_price_gwei`.
    async fn priced_gas(&self) -> LedgerResult<u128> {
        let gas_price = self.get_gas_price().await?;
        let gas_price_gwei = gas_price / 1_000_000_000;

        if gas_price_gwei > self.config.max_gas_price_gwei as u128 {
            return Err(LedgerError::GasPriceTooHigh {
                current_gwei: gas_price_gwei as u64,
                max_gwei: self.config.max_gas_price_gwei,
            });
        }

        Ok((gas_price as f64 * self.config.gas_price_multiplier) as u128)
    }

    pub fn faucet(&self) -> Option<&Faucet> {
        self.faucet.as_ref()
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn get_balance(&self, address: Address) -> LedgerResult<U256> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_balance(address)).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(LedgerError::Rpc("All providers failed to get balance".to_string()))
    }

    async fn request_funding(&self, address: Address, amount: U256) -> LedgerResult<TxHash> {
        let faucet = self
            .faucet
            .as_ref()
            .ok_or_else(|| LedgerError::FundingRejected("no faucet configured".to_string()))?;
        faucet.check_grant(amount)?;

        // Sync the faucet nonce from chain before every grant
        let chain_nonce = self.get_transaction_count(faucet.address()).await?;
        faucet.set_nonce(chain_nonce);

        let params = TransferParams {
            chain_id: self.config.chain_id,
            nonce: faucet.get_and_increment_nonce(),
            gas_price: self.priced_gas().await?,
            gas_limit: TRANSFER_GAS_LIMIT,
        };
        let request = build_transfer(&params, faucet.address(), address, amount);
        let signed = sign_request(faucet.wallet(), request).await?;

        tracing::info!(
            to = %address,
            amount_wei = %amount,
            tx_hash = %signed.hash,
            "Submitting funding grant"
        );
        self.submit_transaction(signed.raw).await
    }

    async fn transfer_params(&self, from: Address) -> LedgerResult<TransferParams> {
        Ok(TransferParams {
            chain_id: self.config.chain_id,
            nonce: self.get_transaction_count(from).await?,
            gas_price: self.priced_gas().await?,
            gas_limit: TRANSFER_GAS_LIMIT,
        })
    }

    async fn submit_transaction(&self, raw: Bytes) -> LedgerResult<TxHash> {
        let mut last_error = String::from("no providers");
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.send_raw_transaction(&raw)).await {
                Ok(Ok(pending)) => return Ok(*pending.tx_hash()),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, "Raw transaction rejected");
                    last_error = e.to_string();
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "RPC timeout");
                    last_error = format!("timeout after {}s", self.config.rpc_timeout_secs);
                }
            }
        }
        Err(LedgerError::Rpc(format!("Transaction submission failed: {}", last_error)))
    }

    async fn await_confirmation(&self, tx_hash: TxHash) -> LedgerResult<ConfirmationStatus> {
        let required_confirmations = self.config.confirmation_blocks;
        let timeout_duration = Duration::from_secs(self.config.confirmation_timeout_secs);
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        let result = timeout(timeout_duration, async {
            let mut ticker = interval(poll_interval);

            loop {
                ticker.tick().await;

                let receipt = match self.get_transaction_receipt(tx_hash).await? {
                    Some(r) => r,
                    None => {
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                        continue;
                    }
                };

                if !receipt.status() {
                    return Ok(ConfirmationStatus::Failed("Transaction reverted".to_string()));
                }

                let current_block = self.get_block_number().await?;
                let tx_block = receipt.block_number.unwrap_or(current_block);
                // The inclusion block counts as the first confirmation
                let confirmations = current_block.saturating_sub(tx_block) as u32 + 1;

                if confirmations >= required_confirmations {
                    return Ok(ConfirmationStatus::Confirmed {
                        block_number: tx_block,
                    });
                }

                tracing::debug!(
                    tx_hash = %tx_hash,
                    confirmations = confirmations,
                    required = required_confirmations,
                    "Waiting for confirmations"
                );
            }
        })
        .await;

        match result {
            Ok(status) => status,
            Err(_) => Err(LedgerError::ConfirmationTimeout(
                self.config.confirmation_timeout_secs,
            )),
        }
    }

    async fn is_healthy(&self) -> bool {
        let healthy = self.get_block_number().await.is_ok();
        metrics::record_ledger_health(healthy);
        healthy
    }
}

impl std::fmt::Debug for RpcLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedgerClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .field("faucet", &self.faucet)
            .finish()
    }
}
