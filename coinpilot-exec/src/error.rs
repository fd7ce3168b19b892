//! Execution layer error types.
//!
//! `ExecError` wraps the errors of the lower layers without flattening
//! them, so `kind()` always reports where a failure originated.

use rust_decimal::Decimal;
use thiserror::Error;

use coinpilot_connectors::{ApiErrorClass, KrakenRestError};
use coinpilot_domain::{CredentialError, DomainError, ErrorKind, ResolutionError};

/// Errors that can occur during execution operations.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Exchange communication or exchange-reported error
    #[error("Exchange error: {0}")]
    Exchange(#[from] KrakenRestError),

    /// Currency codes could not be mapped to a pair
    #[error("Resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// Domain rule violated (sizing, state transition)
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// No usable credential
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Exchange is reachable but not accepting orders
    #[error("Exchange unavailable: status {0}")]
    Unavailable(String),

    /// Order notional above the configured ceiling
    #[error("Order of {amount} USD exceeds the limit of {limit} USD")]
    NotionalLimit { amount: Decimal, limit: Decimal },
}

impl ExecError {
    /// Classify the failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::Exchange(e) => match e {
                KrakenRestError::Signing(_) => ErrorKind::Signing,
                KrakenRestError::Transport { .. }
                | KrakenRestError::RequestFailed(_)
                | KrakenRestError::Timeout => ErrorKind::Transport,
                KrakenRestError::Api(_) => match e.api_class() {
                    Some(ApiErrorClass::RateLimited) => ErrorKind::RateLimited,
                    Some(ApiErrorClass::Unavailable) => ErrorKind::Transport,
                    Some(ApiErrorClass::Authentication | ApiErrorClass::Permission) => {
                        ErrorKind::Credential
                    },
                    _ => ErrorKind::ExchangeLogic,
                },
                KrakenRestError::ResponseShape(_) => ErrorKind::ResponseShape,
                KrakenRestError::InvalidParameter(_) => ErrorKind::Validation,
            },
            ExecError::Resolution(_) => ErrorKind::Resolution,
            ExecError::Domain(e) => match e {
                DomainError::NonPositivePrice(_) | DomainError::InvalidQuantity(_) => {
                    ErrorKind::Arithmetic
                },
                _ => ErrorKind::Validation,
            },
            ExecError::Credential(_) => ErrorKind::Credential,
            ExecError::Unavailable(_) => ErrorKind::Transport,
            ExecError::NotionalLimit { .. } => ErrorKind::Validation,
        }
    }

    /// Whether the same call may succeed if repeated unchanged.
    pub fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;

#[cfg(test)]
mod tests {
    use super::*;
    use coinpilot_connectors::SignerError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transport_kinds() {
        let errors = [
            ExecError::from(KrakenRestError::Timeout),
            ExecError::from(KrakenRestError::RequestFailed("connection reset".into())),
            ExecError::from(KrakenRestError::Transport { status: 502, body: String::new() }),
        ];
        for err in errors {
            assert_eq!(err.kind(), ErrorKind::Transport);
            assert!(err.is_retriable());
        }
    }

    #[test]
    fn test_exchange_logic_is_not_retriable() {
        let err = ExecError::from(KrakenRestError::Api(vec!["EOrder:Insufficient funds".into()]));
        assert_eq!(err.kind(), ErrorKind::ExchangeLogic);
        assert!(!err.is_retriable());
        assert!(err.to_string().contains("EOrder:Insufficient funds"));
    }

    #[test]
    fn test_api_errors_split_by_class() {
        let api = |msg: &str| ExecError::from(KrakenRestError::Api(vec![msg.to_string()]));

        let limited = api("EAPI:Rate limit exceeded");
        assert_eq!(limited.kind(), ErrorKind::RateLimited);
        assert!(limited.is_retriable());

        assert_eq!(api("EService:Unavailable").kind(), ErrorKind::Transport);
        assert_eq!(api("EAPI:Invalid key").kind(), ErrorKind::Credential);
        assert_eq!(api("EGeneral:Permission denied").kind(), ErrorKind::Credential);

        let invalid = api("EGeneral:Invalid arguments");
        assert_eq!(invalid.kind(), ErrorKind::ExchangeLogic);
        assert!(!invalid.is_retriable());
    }

    #[test]
    fn test_signing_kind_survives_wrapping() {
        let err = ExecError::from(KrakenRestError::from(SignerError::MissingNonce));
        assert_eq!(err.kind(), ErrorKind::Signing);
    }

    #[test]
    fn test_domain_kinds() {
        assert_eq!(
            ExecError::from(DomainError::NonPositivePrice(dec!(0))).kind(),
            ErrorKind::Arithmetic
        );
        assert_eq!(
            ExecError::from(DomainError::InvalidStateTransition("idle -> quoted".into())).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_resolution_and_credential_kinds() {
        assert_eq!(
            ExecError::from(ResolutionError::UnknownAsset("ZZZ".into())).kind(),
            ErrorKind::Resolution
        );
        assert_eq!(
            ExecError::from(CredentialError::Unavailable("KRAKEN_SEC".into())).kind(),
            ErrorKind::Credential
        );
    }

    #[test]
    fn test_notional_limit_message() {
        let err = ExecError::NotionalLimit { amount: dec!(5000), limit: dec!(1000) };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "Order of 5000 USD exceeds the limit of 1000 USD");
    }
}
