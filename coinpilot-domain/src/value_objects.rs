//! Value Objects for the Coinpilot Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Price must be positive
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Quantity must be positive
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Asset code or pair symbol is malformed
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Division by a price that is zero or negative (order sizing)
    #[error("Cannot size order against non-positive price {0}")]
    NonPositivePrice(Decimal),

    /// Invalid state transition
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Budget allocation weights or legs are unusable
    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),
}

// =============================================================================
// Price
// =============================================================================

/// Price represents a positive decimal price
///
/// # Invariants
/// - Must be > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    /// Create a new Price with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPrice` if value <= 0
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidPrice(format!("Price must be positive, got {}", value)));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Quantity
// =============================================================================

/// Quantity represents a positive order volume in base-asset units
///
/// # Invariants
/// - Must be > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Create a new Quantity with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidQuantity` if value <= 0
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidQuantity(format!(
                "Quantity must be positive, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// AssetCode
// =============================================================================

/// Human-readable currency code as typed by a user (e.g., "xbt", "USD").
///
/// # Invariants
/// - Stored uppercase
/// - Non-empty, no whitespace or control characters (dotted altnames
///   such as `ETH2.S` are valid)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetCode(String);

impl AssetCode {
    /// Normalize and validate a currency code.
    ///
    /// # Examples
    /// ```
    /// # use coinpilot_domain::value_objects::AssetCode;
    /// let code = AssetCode::new(" xbt ").unwrap();
    /// assert_eq!(code.as_str(), "XBT");
    /// ```
    ///
    /// # Errors
    /// Returns `DomainError::InvalidSymbol` for empty input or input with
    /// embedded whitespace or control characters
    pub fn new(raw: &str) -> Result<Self, DomainError> {
        let code = raw.trim().to_uppercase();
        if code.is_empty() {
            return Err(DomainError::InvalidSymbol("Asset code must be non-empty".to_string()));
        }
        if code.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(DomainError::InvalidSymbol(format!("Asset code contains whitespace: {:?}", raw)));
        }
        Ok(Self(code))
    }

    /// Get the normalized code
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// PairSymbol
// =============================================================================

/// Exchange-canonical trading pair identifier (e.g., "XXBTZUSD").
///
/// Only produced by pair resolution; never built from raw user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairSymbol(String);

impl PairSymbol {
    /// Wrap an exchange pair identifier.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidSymbol` if the identifier is empty
    pub fn new(symbol: impl Into<String>) -> Result<Self, DomainError> {
        let symbol = symbol.into();
        if symbol.is_empty() {
            return Err(DomainError::InvalidSymbol("Pair symbol must be non-empty".to_string()));
        }
        Ok(Self(symbol))
    }

    /// Get the identifier as sent on the wire
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// OrderSide
// =============================================================================

/// OrderSide represents the order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl OrderSide {
    /// Wire value for the `type` field of an order.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

// =============================================================================
// OrderKind
// =============================================================================

/// Order execution style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Execute immediately at the best available price
    Market,
    /// Rest on the book at the given price
    Limit {
        /// Limit price
        price: Price,
    },
}

impl OrderKind {
    /// Wire value for the `ordertype` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "market",
            OrderKind::Limit { .. } => "limit",
        }
    }

    /// Limit price, if any.
    pub fn limit_price(&self) -> Option<Price> {
        match self {
            OrderKind::Market => None,
            OrderKind::Limit { price } => Some(*price),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
