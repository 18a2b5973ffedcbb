//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a session.
//! All types derive Serde traits for deserialization from config files.

use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Root configuration for a devnet session.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Ledger RPC and faucet settings.
    pub ledger: LedgerConfig,

    /// Funding policy for ephemeral accounts.
    pub funding: FundingPolicy,

    /// Transfer policy.
    pub transfer: TransferPolicy,

    /// Wallet provider detection and connection settings.
    pub wallet: WalletConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// An amount of native currency written in ether (e.g. `"2"` or `"0.5"`).
///
/// Held internally in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct EtherAmount(pub U256);

impl EtherAmount {
    /// Build from a whole number of ether.
    pub fn from_ether(ether: u64) -> Self {
        Self(U256::from(ether) * U256::from(1_000_000_000_000_000_000u128))
    }

    /// Amount in wei.
    pub fn wei(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for EtherAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ETH", format_ether(self.0))
    }
}

impl Serialize for EtherAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_ether(self.0))
    }
}

impl<'de> Deserialize<'de> for EtherAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_ether(raw.trim())
            .map(Self)
            .map_err(|e| serde::de::Error::custom(format!("invalid ether amount '{}': {}", raw, e)))
    }
}

/// Ledger (JSON-RPC) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (31337 for a local Anvil devnet).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required before a transaction counts as confirmed.
    pub confirmation_blocks: u32,

    /// Maximum time to wait for a confirmation, in seconds.
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Gas price multiplier (1.0 = estimated, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,

    /// Environment variable holding the faucet private key.
    pub faucet_key_env: String,

    /// Largest single grant the faucet will hand out.
    pub max_grant: EtherAmount,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337,
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            confirmation_timeout_secs: 60,
            poll_interval_ms: 1000,
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
            faucet_key_env: "SESSION_FAUCET_PRIVATE_KEY".to_string(),
            max_grant: EtherAmount::from_ether(5),
        }
    }
}

/// Funding policy for ephemeral accounts.
///
/// One grant is issued immediately, then `follow_up_rounds` more grants are
/// issued `follow_up_delay_ms` apart in the background.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FundingPolicy {
    /// Amount requested per grant.
    pub grant_amount: EtherAmount,

    /// Number of delayed grants after the first one.
    pub follow_up_rounds: u32,

    /// Delay before each follow-up grant, in milliseconds.
    pub follow_up_delay_ms: u64,
}

impl Default for FundingPolicy {
    fn default() -> Self {
        Self {
            grant_amount: EtherAmount::from_ether(2),
            follow_up_rounds: 1,
            follow_up_delay_ms: 10_000,
        }
    }
}

/// Transfer policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferPolicy {
    /// Fixed amount moved from the ephemeral account per transfer.
    pub amount: EtherAmount,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            amount: EtherAmount::from_ether(1),
        }
    }
}

/// Wallet provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Environment variable holding the wallet key. Unset means no provider installed.
    pub private_key_env: String,

    /// Approve connection requests without asking.
    pub auto_approve: bool,

    /// Whether this application is already trusted by the wallet.
    pub trusted: bool,

    /// Connect round-trip timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: "SESSION_WALLET_PRIVATE_KEY".to_string(),
            auto_approve: true,
            trusted: false,
            connect_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub log_json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
