//! Trade run state machine.
//!
//! One run per executor invocation:
//!
//! ```text
//! Idle → DirectoryFetched → PairResolved → Quoted → OrderSubmitted
//!   └──────────┴──────────────┴─────────────┴────→ Failed(kind)
//! ```
//!
//! `OrderSubmitted` and `Failed` are terminal. A caller that wants to retry
//! starts a new run from `Idle`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::value_objects::{DomainError, PairSymbol};

/// Coarse classification of a failure, carried by `TradeState::Failed` so a
/// caller can tell transient transport trouble from permanent input errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network or non-2xx HTTP status; possibly transient
    Transport,
    /// Exchange rate limit hit; retriable after backing off
    RateLimited,
    /// Exchange reported an error inside a successful response
    ExchangeLogic,
    /// Response did not have the expected structure
    ResponseShape,
    /// Unknown, ambiguous or unlisted currency code
    Resolution,
    /// Secret or request body could not be signed
    Signing,
    /// Order sizing arithmetic failed
    Arithmetic,
    /// No usable credential
    Credential,
    /// Input rejected before reaching the exchange
    Validation,
}

impl ErrorKind {
    /// Transport failures and rate limits are worth retrying unchanged.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::RateLimited)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ExchangeLogic => "exchange_logic",
            ErrorKind::ResponseShape => "response_shape",
            ErrorKind::Resolution => "resolution",
            ErrorKind::Signing => "signing",
            ErrorKind::Arithmetic => "arithmetic",
            ErrorKind::Credential => "credential",
            ErrorKind::Validation => "validation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a single trade run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TradeState {
    Idle,
    DirectoryFetched,
    PairResolved {
        pair_symbol: PairSymbol,
    },
    /// Ask fetched; sizing happens from here
    Quoted {
        pair_symbol: PairSymbol,
        ask_price: Decimal,
    },
    OrderSubmitted {
        pair_symbol: PairSymbol,
        transaction_ids: Vec<String>,
    },
    Failed {
        kind: ErrorKind,
    },
}

impl TradeState {
    /// Get the name of the state for display
    pub fn name(&self) -> &'static str {
        match self {
            TradeState::Idle => "idle",
            TradeState::DirectoryFetched => "directory_fetched",
            TradeState::PairResolved { .. } => "pair_resolved",
            TradeState::Quoted { .. } => "quoted",
            TradeState::OrderSubmitted { .. } => "order_submitted",
            TradeState::Failed { .. } => "failed",
        }
    }

    /// True for `OrderSubmitted` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeState::OrderSubmitted { .. } | TradeState::Failed { .. })
    }

    fn can_advance_to(&self, next: &TradeState) -> bool {
        use TradeState::*;
        match (self, next) {
            (from, Failed { .. }) => !from.is_terminal(),
            (Idle, DirectoryFetched) => true,
            (DirectoryFetched, PairResolved { .. }) => true,
            (PairResolved { .. }, Quoted { .. }) => true,
            (Quoted { .. }, OrderSubmitted { .. }) => true,
            _ => false,
        }
    }
}

/// A single executor invocation and the states it passed through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRun {
    /// Correlation id for logs
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    state: TradeState,
    history: Vec<TradeState>,
}

impl TradeRun {
    /// Start a new run in `Idle`.
    pub fn start() -> Self {
        Self {
            id: Uuid::now_v7(),
            started_at: Utc::now(),
            state: TradeState::Idle,
            history: vec![TradeState::Idle],
        }
    }

    /// Current state.
    pub fn state(&self) -> &TradeState {
        &self.state
    }

    /// Every state entered so far, oldest first.
    pub fn history(&self) -> &[TradeState] {
        &self.history
    }

    /// Move to `next`.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidStateTransition` when `next` does not
    /// follow the current state.
    pub fn advance(&mut self, next: TradeState) -> Result<(), DomainError> {
        if !self.state.can_advance_to(&next) {
            return Err(DomainError::InvalidStateTransition(format!(
                "{} -> {}",
                self.state.name(),
                next.name()
            )));
        }
        self.state = next.clone();
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed { kind }`. A run that already ended stays as it is.
    pub fn fail(&mut self, kind: ErrorKind) {
        if !self.state.is_terminal() {
            let failed = TradeState::Failed { kind };
            self.state = failed.clone();
            self.history.push(failed);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pair() -> PairSymbol {
        PairSymbol::new("XXBTZUSD").unwrap()
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut run = TradeRun::start();

        run.advance(TradeState::DirectoryFetched).unwrap();
        run.advance(TradeState::PairResolved { pair_symbol: pair() }).unwrap();
        run.advance(TradeState::Quoted {
            pair_symbol: pair(),
            ask_price: dec!(50000),
        })
        .unwrap();
        run.advance(TradeState::OrderSubmitted {
            pair_symbol: pair(),
            transaction_ids: vec!["TX".to_string()],
        })
        .unwrap();

        let names: Vec<_> = run.history().iter().map(TradeState::name).collect();
        assert_eq!(
            names,
            vec!["idle", "directory_fetched", "pair_resolved", "quoted", "order_submitted"]
        );
        assert!(run.state().is_terminal());
    }

    #[test]
    fn test_cannot_skip_quote() {
        let mut run = TradeRun::start();
        run.advance(TradeState::DirectoryFetched).unwrap();
        run.advance(TradeState::PairResolved { pair_symbol: pair() }).unwrap();

        let err = run
            .advance(TradeState::OrderSubmitted {
                pair_symbol: pair(),
                transaction_ids: vec![],
            })
            .unwrap_err();

        assert!(matches!(err, DomainError::InvalidStateTransition(ref msg) if msg == "pair_resolved -> order_submitted"));
        assert_eq!(run.state().name(), "pair_resolved");
    }

    #[test]
    fn test_fail_from_any_live_state() {
        let mut run = TradeRun::start();
        run.advance(TradeState::DirectoryFetched).unwrap();
        run.fail(ErrorKind::Resolution);

        assert_eq!(run.state(), &TradeState::Failed { kind: ErrorKind::Resolution });
        assert!(run.advance(TradeState::PairResolved { pair_symbol: pair() }).is_err());
    }

    #[test]
    fn test_fail_is_ignored_after_terminal() {
        let mut run = TradeRun::start();
        run.fail(ErrorKind::Transport);
        run.fail(ErrorKind::Signing);

        assert_eq!(run.state(), &TradeState::Failed { kind: ErrorKind::Transport });
        assert_eq!(run.history().len(), 2);
    }

    #[test]
    fn test_only_transient_kinds_are_retriable() {
        assert!(ErrorKind::Transport.is_retriable());
        assert!(ErrorKind::RateLimited.is_retriable());
        assert!(!ErrorKind::Credential.is_retriable());
        assert!(!ErrorKind::ExchangeLogic.is_retriable());
        assert!(!ErrorKind::Resolution.is_retriable());
        assert!(!ErrorKind::Arithmetic.is_retriable());
    }
}
