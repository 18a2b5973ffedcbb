//! Transfer building and offline signing.
//!
//! # Responsibilities
//! - Build plain value transfers from chain parameters
//! - Sign them locally and encode for raw submission
//!
//! Both the faucet and ephemeral accounts sign through here, so neither ever
//! hands key material to the RPC endpoint.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, U256};
use alloy::rpc::types::TransactionRequest;

use crate::ledger::types::{LedgerError, LedgerResult, SignedTransaction, TransferParams};

/// Build a legacy-priced value transfer.
pub fn build_transfer(
    params: &TransferParams,
    from: Address,
    to: Address,
    value: U256,
) -> TransactionRequest {
    TransactionRequest::default()
        .with_from(from)
        .with_to(to)
        .with_value(value)
        .with_nonce(params.nonce)
        .with_gas_price(params.gas_price)
        .with_chain_id(params.chain_id)
        .with_gas_limit(params.gas_limit)
}

/// Sign a fully populated request and encode it for `eth_sendRawTransaction`.
pub async fn sign_request(
    wallet: &EthereumWallet,
    request: TransactionRequest,
) -> LedgerResult<SignedTransaction> {
    let envelope = request
        .build(wallet)
        .await
        .map_err(|e| LedgerError::Signing(format!("Transaction signing failed: {}", e)))?;

    Ok(SignedTransaction {
        hash: *envelope.tx_hash(),
        raw: envelope.encoded_2718().into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::TRANSFER_GAS_LIMIT;
    use alloy::primitives::keccak256;
    use alloy::signers::local::PrivateKeySigner;

    fn params() -> TransferParams {
        TransferParams {
            chain_id: 31337,
            nonce: 3,
            gas_price: 1_000_000_000,
            gas_limit: TRANSFER_GAS_LIMIT,
        }
    }

    #[test]
    fn test_build_transfer_fields() {
        let from = Address::repeat_byte(0x11);
        let to = Address::repeat_byte(0x22);
        let request = build_transfer(&params(), from, to, U256::from(5));

        assert_eq!(request.from, Some(from));
        assert_eq!(request.value, Some(U256::from(5)));
        assert_eq!(request.nonce, Some(3));
        assert_eq!(request.gas, Some(TRANSFER_GAS_LIMIT));
        assert_eq!(request.chain_id, Some(31337));
    }

    #[tokio::test]
    async fn test_sign_request_hash_matches_payload() {
        let signer = PrivateKeySigner::random();
        let from = signer.address();
        let wallet = EthereumWallet::from(signer);

        let request = build_transfer(&params(), from, Address::repeat_byte(0x22), U256::from(1));
        let signed = sign_request(&wallet, request).await.unwrap();

        assert!(!signed.raw.is_empty());
        assert_eq!(signed.hash, keccak256(&signed.raw));
    }

    #[tokio::test]
    async fn test_sign_request_wrong_sender() {
        let wallet = EthereumWallet::from(PrivateKeySigner::random());
        let stranger = Address::repeat_byte(0x33);

        let request = build_transfer(&params(), stranger, Address::repeat_byte(0x22), U256::from(1));
        let result = sign_request(&wallet, request).await;
        assert!(matches!(result, Err(LedgerError::Signing(_))));
    }
}
