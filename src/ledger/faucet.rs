//! Faucet key management for funding grants.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ledger::types::{LedgerError, LedgerResult};

/// A prefunded account that hands out grants to ephemeral accounts.
#[derive(Clone)]
pub struct Faucet {
    wallet: EthereumWallet,
    address: Address,
    /// Next nonce for sequential grants.
    nonce: Arc<AtomicU64>,
    /// Largest grant this faucet will send in one go.
    max_grant: U256,
}

impl Faucet {
    /// Create a faucet from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    /// * `max_grant` - Upper bound on a single grant, in wei
    pub fn from_private_key(private_key_hex: &str, max_grant: U256) -> LedgerResult<Self> {
        let key_hex = private_key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| LedgerError::Signing(format!("Invalid private key format: {}", e)))?;
        let address = signer.address();

        tracing::info!(address = %address, "Faucet initialized");

        Ok(Self {
            wallet: EthereumWallet::from(signer),
            address,
            nonce: Arc::new(AtomicU64::new(0)),
            max_grant,
        })
    }

    /// Load the faucet key from the named environment variable.
    pub fn from_env(var: &str, max_grant: U256) -> LedgerResult<Self> {
        let private_key = std::env::var(var).map_err(|_| {
            LedgerError::FundingRejected(format!("Environment variable {} not set", var))
        })?;

        Self::from_private_key(&private_key, max_grant)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn wallet(&self) -> &EthereumWallet {
        &self.wallet
    }

    /// Reject grants above the faucet limit.
    pub fn check_grant(&self, amount: U256) -> LedgerResult<()> {
        if amount.is_zero() {
            return Err(LedgerError::FundingRejected("grant amount is zero".to_string()));
        }
        if amount > self.max_grant {
            return Err(LedgerError::FundingRejected(format!(
                "requested {} wei exceeds faucet limit of {} wei",
                amount, self.max_grant
            )));
        }
        Ok(())
    }

    /// Get and increment the nonce atomically.
    pub fn get_and_increment_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }

    /// Set the nonce to a specific value (e.g., after querying from chain).
    pub fn set_nonce(&self, nonce: u64) {
        self.nonce.store(nonce, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Faucet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Faucet")
            .field("address", &self.address)
            .field("max_grant", &self.max_grant)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known test private key (Anvil's first account)
    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_faucet_from_private_key() {
        let faucet = Faucet::from_private_key(TEST_PRIVATE_KEY, U256::from(10)).unwrap();
        assert_eq!(
            faucet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_faucet_with_0x_prefix() {
        let faucet =
            Faucet::from_private_key(&format!("0x{}", TEST_PRIVATE_KEY), U256::from(10)).unwrap();
        assert_eq!(
            faucet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_invalid_private_key() {
        let result = Faucet::from_private_key("invalid_key", U256::from(10));
        assert!(result.unwrap_err().to_string().contains("Invalid private key"));
    }

    #[test]
    fn test_missing_env_var() {
        let result = Faucet::from_env("DEVNET_SESSION_TEST_UNSET_FAUCET", U256::from(10));
        assert!(matches!(result, Err(LedgerError::FundingRejected(_))));
    }

    #[test]
    fn test_grant_limit() {
        let faucet = Faucet::from_private_key(TEST_PRIVATE_KEY, U256::from(10)).unwrap();
        assert!(faucet.check_grant(U256::from(10)).is_ok());
        assert!(faucet.check_grant(U256::from(11)).is_err());
        assert!(faucet.check_grant(U256::ZERO).is_err());
    }

    #[test]
    fn test_nonce_management() {
        let faucet = Faucet::from_private_key(TEST_PRIVATE_KEY, U256::from(10)).unwrap();

        assert_eq!(faucet.get_and_increment_nonce(), 0);
        assert_eq!(faucet.get_and_increment_nonce(), 1);
        faucet.set_nonce(100);
        assert_eq!(faucet.get_and_increment_nonce(), 100);
    }

    #[test]
    fn test_debug_hides_key() {
        let faucet = Faucet::from_private_key(TEST_PRIVATE_KEY, U256::from(10)).unwrap();
        let debug = format!("{:?}", faucet);
        assert!(!debug.contains(TEST_PRIVATE_KEY));
    }
}
