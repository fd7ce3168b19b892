//! Stub exchange for testing.
//!
//! Serves canned data without making real API calls, records every call,
//! and fails a chosen call on demand.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use coinpilot_connectors::KrakenRestError;
use coinpilot_domain::{
    AssetDirectory, Balance, Candle, Credential, OrderConfirmation, OrderRequest, PairListing,
    PairSymbol, Quote, TradeHistory,
};

use crate::error::ExecError;
use crate::ports::ExchangePort;

/// Port operation, for call recording and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubCall {
    AssetDirectory,
    TradablePairs,
    Ticker,
    Balance,
    VerifyCredentials,
    PlaceOrder,
    RecentTrades,
    Ohlc,
    HealthCheck,
}

/// Stub exchange for testing.
///
/// Quotes use a per-pair ask (or the default ask); bid and last trade are
/// set to the ask. Orders get sequential `STUB-n` transaction ids.
pub struct StubExchange {
    directory: RwLock<AssetDirectory>,
    pairs: RwLock<PairListing>,
    asks: RwLock<HashMap<String, Decimal>>,
    default_ask: Decimal,
    balance: RwLock<Balance>,
    trades: RwLock<HashMap<String, TradeHistory>>,
    candles: RwLock<HashMap<String, Vec<Candle>>>,
    calls: RwLock<Vec<StubCall>>,
    orders: RwLock<Vec<OrderRequest>>,
    failures: RwLock<HashMap<StubCall, KrakenRestError>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl StubExchange {
    /// Empty exchange with a default ask of 50000.
    pub fn new() -> Self {
        Self {
            directory: RwLock::new(AssetDirectory::default()),
            pairs: RwLock::new(PairListing::default()),
            asks: RwLock::new(HashMap::new()),
            default_ask: Decimal::new(50_000, 0),
            balance: RwLock::new(Balance::new()),
            trades: RwLock::new(HashMap::new()),
            candles: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
            orders: RwLock::new(Vec::new()),
            failures: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_directory(self, directory: AssetDirectory) -> Self {
        self.set_directory(directory);
        self
    }

    pub fn with_pairs(self, pairs: PairListing) -> Self {
        *write(&self.pairs) = pairs;
        self
    }

    pub fn with_balance(self, balance: Balance) -> Self {
        *write(&self.balance) = balance;
        self
    }

    /// Replace the directory served from now on.
    pub fn set_directory(&self, directory: AssetDirectory) {
        *write(&self.directory) = directory;
    }

    /// Set the ask for a pair.
    pub fn set_ask(&self, pair: &str, ask: Decimal) {
        write(&self.asks).insert(pair.to_string(), ask);
    }

    pub fn set_trades(&self, history: TradeHistory) {
        write(&self.trades).insert(history.pair_symbol.as_str().to_string(), history);
    }

    pub fn set_candles(&self, pair: &str, candles: Vec<Candle>) {
        write(&self.candles).insert(pair.to_string(), candles);
    }

    /// Make the next `call` fail with `error`.
    pub fn fail_next(&self, call: StubCall, error: KrakenRestError) {
        write(&self.failures).insert(call, error);
    }

    /// Every call made, in order.
    pub fn calls(&self) -> Vec<StubCall> {
        read(&self.calls).clone()
    }

    pub fn call_count(&self, call: StubCall) -> usize {
        read(&self.calls).iter().filter(|c| **c == call).count()
    }

    /// Orders received by `place_order`, in order.
    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        read(&self.orders).clone()
    }

    /// Record the call and take an injected failure, if any.
    fn enter(&self, call: StubCall) -> Result<(), ExecError> {
        write(&self.calls).push(call);
        match write(&self.failures).remove(&call) {
            Some(error) => Err(ExecError::Exchange(error)),
            None => Ok(()),
        }
    }

    fn ask_for(&self, pair: &PairSymbol) -> Decimal {
        read(&self.asks).get(pair.as_str()).copied().unwrap_or(self.default_ask)
    }
}

impl Default for StubExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangePort for StubExchange {
    async fn fetch_asset_directory(&self) -> Result<AssetDirectory, ExecError> {
        self.enter(StubCall::AssetDirectory)?;
        Ok(read(&self.directory).clone())
    }

    async fn fetch_tradable_pairs(&self) -> Result<PairListing, ExecError> {
        self.enter(StubCall::TradablePairs)?;
        Ok(read(&self.pairs).clone())
    }

    async fn fetch_ticker(&self, pair: &PairSymbol) -> Result<Quote, ExecError> {
        self.enter(StubCall::Ticker)?;
        let ask = self.ask_for(pair);
        Ok(Quote {
            pair_symbol: pair.clone(),
            ask_price: ask,
            bid_price: ask,
            last_trade_price: ask,
            fetched_at: Utc::now(),
        })
    }

    async fn fetch_balance(&self, _credential: &Credential) -> Result<Balance, ExecError> {
        self.enter(StubCall::Balance)?;
        Ok(read(&self.balance).clone())
    }

    async fn verify_credentials(&self, _credential: &Credential) -> Result<(), ExecError> {
        self.enter(StubCall::VerifyCredentials)
    }

    async fn place_order(
        &self,
        order: &OrderRequest,
        _credential: &Credential,
    ) -> Result<OrderConfirmation, ExecError> {
        self.enter(StubCall::PlaceOrder)?;

        let mut orders = write(&self.orders);
        orders.push(order.clone());

        let transaction_ids = if order.validate_only {
            Vec::new()
        } else {
            vec![format!("STUB-{}", orders.len())]
        };

        Ok(OrderConfirmation {
            transaction_ids,
            description: format!(
                "{} {} {} @ {}",
                order.side,
                order.volume,
                order.pair_symbol,
                order.kind.as_str()
            ),
        })
    }

    async fn fetch_recent_trades(
        &self,
        pair: &PairSymbol,
        _since: Option<DateTime<Utc>>,
    ) -> Result<TradeHistory, ExecError> {
        self.enter(StubCall::RecentTrades)?;
        Ok(read(&self.trades).get(pair.as_str()).cloned().unwrap_or_else(|| TradeHistory {
            pair_symbol: pair.clone(),
            trades: Vec::new(),
            last: String::new(),
        }))
    }

    async fn fetch_ohlc(
        &self,
        pair: &PairSymbol,
        _interval_minutes: u32,
    ) -> Result<Vec<Candle>, ExecError> {
        self.enter(StubCall::Ohlc)?;
        Ok(read(&self.candles).get(pair.as_str()).cloned().unwrap_or_default())
    }

    async fn health_check(&self) -> Result<(), ExecError> {
        self.enter(StubCall::HealthCheck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinpilot_domain::{OrderSide, Quantity};
    use rust_decimal_macros::dec;

    fn pair() -> PairSymbol {
        PairSymbol::new("XXBTZUSD").unwrap()
    }

    #[tokio::test]
    async fn test_records_calls_and_orders() {
        let exchange = StubExchange::new();
        let cred = Credential::new("key", "c2VjcmV0");

        exchange.fetch_ticker(&pair()).await.unwrap();
        let order = OrderRequest::new_market(pair(), OrderSide::Buy, Quantity::new(dec!(0.5)).unwrap());
        let confirmation = exchange.place_order(&order, &cred).await.unwrap();

        assert_eq!(exchange.calls(), vec![StubCall::Ticker, StubCall::PlaceOrder]);
        assert_eq!(confirmation.primary_txid(), Some("STUB-1"));
        assert_eq!(exchange.placed_orders(), vec![order]);
    }

    #[tokio::test]
    async fn test_failure_applies_once() {
        let exchange = StubExchange::new();
        exchange.fail_next(StubCall::Ticker, KrakenRestError::Timeout);

        assert!(exchange.fetch_ticker(&pair()).await.is_err());
        assert!(exchange.fetch_ticker(&pair()).await.is_ok());
    }

    #[tokio::test]
    async fn test_per_pair_ask() {
        let exchange = StubExchange::new();
        exchange.set_ask("XXBTZUSD", dec!(61000));

        let quote = exchange.fetch_ticker(&pair()).await.unwrap();
        assert_eq!(quote.ask_price, dec!(61000));

        let other = exchange.fetch_ticker(&PairSymbol::new("XETHZUSD").unwrap()).await.unwrap();
        assert_eq!(other.ask_price, dec!(50000));
    }
}
