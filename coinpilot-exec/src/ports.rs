//! Execution layer port definitions.
//!
//! Ports define the interface to the exchange. Adapters implement them for
//! a concrete venue (`KrakenExchange`) or for tests (`StubExchange`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use coinpilot_domain::{
    AssetDirectory, Balance, Candle, Credential, OrderConfirmation, OrderRequest, PairListing,
    PairSymbol, Quote, TradeHistory,
};

use crate::error::ExecError;

// =============================================================================
// Exchange Port
// =============================================================================

/// Port for exchange operations.
///
/// Implementations:
/// - `KrakenExchange` - Kraken REST API
/// - `StubExchange` - For testing (canned responses, injectable failures)
#[async_trait]
pub trait ExchangePort: Send + Sync {
    /// Every asset the exchange lists, keyed by asset id.
    async fn fetch_asset_directory(&self) -> Result<AssetDirectory, ExecError>;

    /// Every tradable pair, keyed by pair id.
    async fn fetch_tradable_pairs(&self) -> Result<PairListing, ExecError>;

    /// Current quote for a pair.
    ///
    /// # Arguments
    ///
    /// * `pair` - Exchange pair symbol (e.g., XXBTZUSD)
    async fn fetch_ticker(&self, pair: &PairSymbol) -> Result<Quote, ExecError>;

    /// Account balances by asset id.
    async fn fetch_balance(&self, credential: &Credential) -> Result<Balance, ExecError>;

    /// Check that the exchange accepts `credential` with an authenticated call.
    async fn verify_credentials(&self, credential: &Credential) -> Result<(), ExecError>;

    /// Submit an order.
    ///
    /// # Returns
    ///
    /// `OrderConfirmation` with the exchange transaction ids.
    async fn place_order(
        &self,
        order: &OrderRequest,
        credential: &Credential,
    ) -> Result<OrderConfirmation, ExecError>;

    /// Recent public trades for a pair, optionally from `since`.
    async fn fetch_recent_trades(
        &self,
        pair: &PairSymbol,
        since: Option<DateTime<Utc>>,
    ) -> Result<TradeHistory, ExecError>;

    /// Candles of `interval_minutes` width for a pair.
    async fn fetch_ohlc(
        &self,
        pair: &PairSymbol,
        interval_minutes: u32,
    ) -> Result<Vec<Candle>, ExecError>;

    /// Check if exchange is reachable and accepting orders.
    async fn health_check(&self) -> Result<(), ExecError>;
}
