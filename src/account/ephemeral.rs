//! Throwaway keypair owned by the application.
//!
//! # Security
//! - The secret key is generated in memory and never leaves this type
//! - `Debug` shows the address only

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;

use crate::ledger::transaction::{build_transfer, sign_request};
use crate::ledger::types::{LedgerResult, SignedTransaction, TransferParams};

pub struct EphemeralAccount {
    address: Address,
    wallet: EthereumWallet,
}

impl EphemeralAccount {
    /// Generate a fresh random keypair. No network interaction.
    pub fn generate() -> Self {
        let signer = PrivateKeySigner::random();
        let address = signer.address();
        tracing::debug!(address = %address, "Generated ephemeral keypair");
        Self {
            address,
            wallet: EthereumWallet::from(signer),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a transfer of `amount` wei to `to` with this account's own key.
    pub async fn sign_transfer(
        &self,
        params: &TransferParams,
        to: Address,
        amount: U256,
    ) -> LedgerResult<SignedTransaction> {
        let request = build_transfer(params, self.address, to, amount);
        sign_request(&self.wallet, request).await
    }
}

impl std::fmt::Debug for EphemeralAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralAccount")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::TRANSFER_GAS_LIMIT;
    use alloy::primitives::keccak256;

    #[test]
    fn test_generate_is_unique() {
        let a = EphemeralAccount::generate();
        let b = EphemeralAccount::generate();
        assert_ne!(a.address(), b.address());
    }

    #[tokio::test]
    async fn test_sign_transfer() {
        let account = EphemeralAccount::generate();
        let params = TransferParams {
            chain_id: 31337,
            nonce: 0,
            gas_price: 1_000_000_000,
            gas_limit: TRANSFER_GAS_LIMIT,
        };

        let signed = account
            .sign_transfer(&params, Address::repeat_byte(0x42), U256::from(1_000))
            .await
            .unwrap();
        assert_eq!(signed.hash, keccak256(&signed.raw));
    }
}
