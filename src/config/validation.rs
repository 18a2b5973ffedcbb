//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, amounts > 0)
//! - Check policy consistency (grants within faucet limits)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SessionConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::SessionConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &SessionConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let ledger = &config.ledger;

    if let Err(e) = ledger.rpc_url.parse::<url::Url>() {
        errors.push(ValidationError::new(
            "ledger.rpc_url",
            format!("invalid URL '{}': {}", ledger.rpc_url, e),
        ));
    }
    for failover in &ledger.failover_urls {
        if failover.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                "ledger.failover_urls",
                format!("invalid URL '{}'", failover),
            ));
        }
    }
    if ledger.chain_id == 0 {
        errors.push(ValidationError::new("ledger.chain_id", "must be non-zero"));
    }
    if ledger.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("ledger.rpc_timeout_secs", "must be > 0"));
    }
    if ledger.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "ledger.confirmation_timeout_secs",
            "must be > 0",
        ));
    }
    if ledger.poll_interval_ms == 0 {
        errors.push(ValidationError::new("ledger.poll_interval_ms", "must be > 0"));
    }
    if !(ledger.gas_price_multiplier.is_finite() && ledger.gas_price_multiplier >= 1.0) {
        errors.push(ValidationError::new(
            "ledger.gas_price_multiplier",
            "must be a finite value >= 1.0",
        ));
    }

    if config.funding.grant_amount.is_zero() {
        errors.push(ValidationError::new("funding.grant_amount", "must be > 0"));
    } else if config.funding.grant_amount > ledger.max_grant {
        errors.push(ValidationError::new(
            "funding.grant_amount",
            format!(
                "{} exceeds the faucet limit of {}",
                config.funding.grant_amount, ledger.max_grant
            ),
        ));
    }
    if config.funding.follow_up_rounds > 0 && config.funding.follow_up_delay_ms == 0 {
        errors.push(ValidationError::new(
            "funding.follow_up_delay_ms",
            "must be > 0 when follow-up rounds are enabled",
        ));
    }

    if config.transfer.amount.is_zero() {
        errors.push(ValidationError::new("transfer.amount", "must be > 0"));
    }

    if config.wallet.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("wallet.connect_timeout_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::EtherAmount;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&SessionConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = SessionConfig::default();
        config.ledger.rpc_url = "not a url".to_string();
        config.ledger.rpc_timeout_secs = 0;
        config.transfer.amount = EtherAmount::default();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["ledger.rpc_url", "ledger.rpc_timeout_secs", "transfer.amount"]
        );
    }

    #[test]
    fn test_grant_above_faucet_limit() {
        let mut config = SessionConfig::default();
        config.funding.grant_amount = EtherAmount::from_ether(10);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("exceeds the faucet limit"));
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::new("wallet.connect_timeout_secs", "must be greater than 0");
        assert_eq!(err.to_string(), "wallet.connect_timeout_secs: must be greater than 0");

        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn test_follow_up_without_delay() {
        let mut config = SessionConfig::default();
        config.funding.follow_up_delay_ms = 0;
        assert!(validate_config(&config).is_err());

        config.funding.follow_up_rounds = 0;
        assert!(validate_config(&config).is_ok());
    }
}
