//! Market Data Types
//!
//! Recent trades and OHLC candles for a resolved pair.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::{OrderSide, PairSymbol};

// =============================================================================
// Trade
// =============================================================================

/// Whether a public trade came from a market or limit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
    Market,
    Limit,
}

/// Single public trade on a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub price: Decimal,
    pub volume: Decimal,
    /// Exchange time of the trade
    pub time: DateTime<Utc>,
    /// Aggressor side
    pub side: OrderSide,
    pub kind: TradeKind,
    /// Miscellaneous exchange flags
    pub misc: String,
    /// Exchange trade id (absent on older records)
    pub trade_id: Option<u64>,
}

/// A page of recent trades plus the cursor for the next page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeHistory {
    pub pair_symbol: PairSymbol,
    pub trades: Vec<Trade>,
    /// Opaque cursor to pass as `since` for the next page
    pub last: String,
}

impl TradeHistory {
    /// Keep only trades with `time <= until`, ordered oldest first.
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.trades.retain(|t| t.time <= until);
        self.trades.sort_by_key(|t| t.time);
        self
    }

    /// Volume-weighted average price, `None` when there are no trades.
    pub fn vwap(&self) -> Option<Decimal> {
        let volume: Decimal = self.trades.iter().map(|t| t.volume).sum();
        if volume.is_zero() {
            return None;
        }
        let notional: Decimal = self.trades.iter().map(|t| t.price * t.volume).sum();
        Some(notional / volume)
    }
}

// =============================================================================
// Candle
// =============================================================================

/// OHLCV candlestick data.
///
/// Represents aggregated trade data over one interval starting at `time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Interval start
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Volume-weighted average price over the interval
    pub vwap: Decimal,
    pub volume: Decimal,
    /// Number of trades in the interval
    pub count: u64,
}

impl Candle {
    /// Check if this is a bullish candle (close > open).
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Get the candle range (high - low).
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }
}
