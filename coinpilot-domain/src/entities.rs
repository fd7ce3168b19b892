//! Domain Entities for Coinpilot
//!
//! Orders, confirmations, quotes and balances, plus the order-sizing rule.

use crate::value_objects::{
    AssetCode, DomainError, OrderKind, OrderSide, PairSymbol, Price, Quantity,
};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use uuid::Uuid;

/// Volume precision used when the directory does not report one.
pub const DEFAULT_VOLUME_DECIMALS: u32 = 8;

/// Budget legs are cut to whole cents.
pub const ALLOCATION_DECIMALS: u32 = 2;

// =============================================================================
// Quote
// =============================================================================

/// Top-of-book snapshot for a pair, valid only at `fetched_at`.
///
/// Prices are kept as reported; order sizing validates the ask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub pair_symbol: PairSymbol,
    /// Best ask (lowest sell offer), the execution price for a buy
    pub ask_price: Decimal,
    /// Best bid
    pub bid_price: Decimal,
    /// Price of the last trade
    pub last_trade_price: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl Quote {
    /// Bid/ask spread.
    pub fn spread(&self) -> Decimal {
        self.ask_price - self.bid_price
    }
}

// =============================================================================
// Order
// =============================================================================

/// Order represents an instruction to buy/sell on the exchange.
///
/// The executor only builds one after a quote was fetched for the same
/// resolved pair; the pair symbol never comes from raw user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub pair_symbol: PairSymbol,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub volume: Quantity,
    /// Client-side order id (UUID v7), sent as `cl_ord_id`
    pub client_order_id: Uuid,
    /// Ask the exchange to validate without placing
    pub validate_only: bool,
}

impl OrderRequest {
    /// Create a new market order
    pub fn new_market(pair_symbol: PairSymbol, side: OrderSide, volume: Quantity) -> Self {
        Self {
            pair_symbol,
            side,
            kind: OrderKind::Market,
            volume,
            client_order_id: Uuid::now_v7(),
            validate_only: false,
        }
    }

    /// Create a new limit order
    pub fn new_limit(
        pair_symbol: PairSymbol,
        side: OrderSide,
        volume: Quantity,
        limit_price: Price,
    ) -> Self {
        Self {
            kind: OrderKind::Limit { price: limit_price },
            ..Self::new_market(pair_symbol, side, volume)
        }
    }

    /// Mark as validate-only (dry run on the exchange side).
    pub fn validate_only(mut self) -> Self {
        self.validate_only = true;
        self
    }
}

/// What the exchange reports after accepting an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    /// Exchange transaction ids; empty only for validate-only orders
    pub transaction_ids: Vec<String>,
    /// Exchange's human-readable order description
    pub description: String,
}

impl OrderConfirmation {
    /// First transaction id, if any.
    pub fn primary_txid(&self) -> Option<&str> {
        self.transaction_ids.first().map(String::as_str)
    }
}

// =============================================================================
// Balance
// =============================================================================

/// Account balances by exchange asset id.
pub type Balance = BTreeMap<String, Decimal>;

// =============================================================================
// Order Sizing
// =============================================================================

/// Calculate the base-asset volume bought with `notional` quote units.
///
/// ```text
/// Volume = Notional / Ask Price   (truncated toward zero to `decimals`)
/// ```
///
/// # Example
///
/// ```
/// # use coinpilot_domain::entities::calculate_order_volume;
/// # use rust_decimal_macros::dec;
/// let volume = calculate_order_volume(dec!(1000), dec!(50000), 8).unwrap();
/// assert_eq!(volume.as_decimal(), dec!(0.02));
/// ```
///
/// # Errors
///
/// - `DomainError::NonPositivePrice` if `ask_price <= 0`
/// - `DomainError::InvalidQuantity` if `notional <= 0` or the truncated
///   volume is zero
pub fn calculate_order_volume(
    notional: Decimal,
    ask_price: Decimal,
    decimals: u32,
) -> Result<Quantity, DomainError> {
    if ask_price <= Decimal::ZERO {
        return Err(DomainError::NonPositivePrice(ask_price));
    }

    if notional <= Decimal::ZERO {
        return Err(DomainError::InvalidQuantity(format!(
            "Order amount must be positive, got {}",
            notional
        )));
    }

    let raw = notional
        .checked_div(ask_price)
        .ok_or_else(|| DomainError::InvalidQuantity("Order volume overflowed".to_string()))?;

    let volume = raw.round_dp_with_strategy(decimals, RoundingStrategy::ToZero).normalize();

    Quantity::new(volume).map_err(|_| {
        DomainError::InvalidQuantity(format!(
            "{} at {} is below the minimum volume step of {} decimals",
            notional, ask_price, decimals
        ))
    })
}

// =============================================================================
// Budget Allocation
// =============================================================================

/// One pick of a budget allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLeg {
    /// Currency code to buy (e.g., "XBT")
    pub code: String,
    /// Share of the budget, in (0, 1]
    pub weight: Decimal,
}

impl AllocationLeg {
    /// Create a leg without validation; `split_budget` checks the set.
    pub fn new(code: impl Into<String>, weight: Decimal) -> Self {
        Self {
            code: code.into(),
            weight,
        }
    }
}

/// Parses `CODE=WEIGHT`, e.g. `xbt=0.6`.
impl FromStr for AllocationLeg {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, weight) = s.split_once('=').ok_or_else(|| {
            DomainError::InvalidAllocation(format!("expected CODE=WEIGHT, got {:?}", s))
        })?;
        let weight = Decimal::from_str(weight.trim()).map_err(|e| {
            DomainError::InvalidAllocation(format!("bad weight in {:?}: {}", s, e))
        })?;
        Ok(Self::new(code.trim(), weight))
    }
}

/// Dollar amount of each leg, in leg order.
///
/// ```text
/// Amount_i = Budget × Weight_i   (truncated toward zero to cents)
/// ```
///
/// Weights need not sum to 1; the remainder of the budget stays unspent.
///
/// # Example
///
/// ```
/// # use coinpilot_domain::entities::{split_budget, AllocationLeg};
/// # use rust_decimal_macros::dec;
/// let legs = [AllocationLeg::new("XBT", dec!(0.6)), AllocationLeg::new("ETH", dec!(0.4))];
/// let amounts = split_budget(dec!(1000), &legs).unwrap();
/// assert_eq!(amounts, vec![dec!(600), dec!(400)]);
/// ```
///
/// # Errors
///
/// `DomainError::InvalidAllocation` if the budget is not positive, there are
/// no legs, a code is repeated, a weight is not positive, the weights sum
/// above 1, or a leg rounds to zero dollars. `DomainError::InvalidSymbol`
/// for a malformed code.
pub fn split_budget(budget: Decimal, legs: &[AllocationLeg]) -> Result<Vec<Decimal>, DomainError> {
    if budget <= Decimal::ZERO {
        return Err(DomainError::InvalidAllocation(format!(
            "Budget must be positive, got {}",
            budget
        )));
    }
    if legs.is_empty() {
        return Err(DomainError::InvalidAllocation("No legs to allocate".to_string()));
    }

    let mut seen = HashSet::new();
    let mut total = Decimal::ZERO;
    for leg in legs {
        let code = AssetCode::new(&leg.code)?;
        if !seen.insert(code.clone()) {
            return Err(DomainError::InvalidAllocation(format!("{} appears more than once", code)));
        }
        if leg.weight <= Decimal::ZERO {
            return Err(DomainError::InvalidAllocation(format!(
                "Weight of {} must be positive, got {}",
                code, leg.weight
            )));
        }
        total += leg.weight;
    }
    if total > Decimal::ONE {
        return Err(DomainError::InvalidAllocation(format!("Weights sum to {}, above 1", total)));
    }

    legs.iter()
        .map(|leg| {
            let amount = (budget * leg.weight)
                .round_dp_with_strategy(ALLOCATION_DECIMALS, RoundingStrategy::ToZero)
                .normalize();
            if amount.is_zero() {
                return Err(DomainError::InvalidAllocation(format!(
                    "{} of {} rounds to zero dollars",
                    leg.weight, budget
                )));
            }
            Ok(amount)
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
