//! Trade executor: currency codes and a dollar amount in, one market buy out.
//!
//! # Flow
//!
//! ```text
//! Asset Directory → Resolve Pair → Ticker (ask) → Size Order → AddOrder
//! ```
//!
//! Every step awaits the previous one; the first failure aborts the run and
//! is returned unchanged. Each run walks a `TradeRun` state machine whose
//! transitions are logged with the run id.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use coinpilot_domain::{
    asset_id_for, calculate_order_volume, resolve, resolve_tradable, split_budget, AllocationLeg,
    AssetDirectory, Credential, OrderConfirmation, OrderRequest, OrderSide, PairSymbol, Quantity, Quote, ResolutionError,
    TradeRun, TradeState, DEFAULT_VOLUME_DECIMALS,
};

use crate::cache::{DirectoryCache, DirectorySource};
use crate::error::{ExecError, ExecResult};
use crate::ports::ExchangePort;

// =============================================================================
// Trade Report
// =============================================================================

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct TradeReport {
    /// Run correlation id
    pub run_id: Uuid,
    pub pair_symbol: PairSymbol,
    /// Quote the volume was sized from
    pub quote: Quote,
    pub volume: Quantity,
    /// Dollar amount requested
    pub notional: Decimal,
    pub validate_only: bool,
    pub confirmation: OrderConfirmation,
}

/// Pair plus the base asset's volume precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPair {
    pub pair_symbol: PairSymbol,
    pub base_asset_id: String,
    pub volume_decimals: u32,
}

/// Leg of an allocation that did not complete.
#[derive(Debug)]
pub struct FailedLeg {
    pub leg: AllocationLeg,
    /// Dollar amount the leg was to spend
    pub amount: Decimal,
    pub error: ExecError,
}

/// Outcome of a budget allocation. Legs run in order and the first failure
/// stops the rest, so `submitted`, `failed` and `skipped` partition the legs.
#[derive(Debug)]
pub struct AllocationReport {
    pub budget: Decimal,
    pub quote_code: String,
    /// Completed legs, in order
    pub submitted: Vec<TradeReport>,
    pub failed: Option<FailedLeg>,
    /// Legs never attempted because an earlier leg failed
    pub skipped: Vec<AllocationLeg>,
}

impl AllocationReport {
    /// True when every leg was submitted.
    pub fn is_complete(&self) -> bool {
        self.failed.is_none()
    }

    /// Total dollars sent to the exchange.
    pub fn spent(&self) -> Decimal {
        self.submitted.iter().map(|r| r.notional).sum()
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Executes "buy `dollar_amount` worth of `code_a` priced in `code_b`".
pub struct TradeExecutor<E: ExchangePort> {
    /// Exchange port for market data and orders
    exchange: Arc<E>,
    /// Directory cache; every run fetches when absent
    cache: Option<DirectoryCache>,
    /// Refuse orders above this many dollars
    max_notional: Option<Decimal>,
}

impl<E: ExchangePort> TradeExecutor<E> {
    /// Create an executor without a directory cache or notional limit.
    pub fn new(exchange: Arc<E>) -> Self {
        Self {
            exchange,
            cache: None,
            max_notional: None,
        }
    }

    /// Cache the asset directory for `ttl`.
    pub fn with_directory_cache(mut self, ttl: Duration) -> Self {
        self.cache = Some(DirectoryCache::new(ttl));
        self
    }

    /// Reject runs whose dollar amount exceeds `limit`.
    pub fn with_max_notional(mut self, limit: Decimal) -> Self {
        self.max_notional = Some(limit);
        self
    }

    /// Exchange port.
    pub fn exchange(&self) -> &Arc<E> {
        &self.exchange
    }

    /// Buy `dollar_amount` of `code_a` priced in `code_b` at market.
    ///
    /// # Errors
    ///
    /// The first failing step's error, with its kind preserved.
    pub async fn execute(
        &self,
        code_a: &str,
        code_b: &str,
        dollar_amount: Decimal,
        credential: &Credential,
    ) -> ExecResult<TradeReport> {
        let mut run = TradeRun::start();
        self.execute_run(&mut run, code_a, code_b, dollar_amount, credential, false)
            .await
    }

    /// Same as [`execute`](Self::execute) but the exchange only validates the order.
    pub async fn validate(
        &self,
        code_a: &str,
        code_b: &str,
        dollar_amount: Decimal,
        credential: &Credential,
    ) -> ExecResult<TradeReport> {
        let mut run = TradeRun::start();
        self.execute_run(&mut run, code_a, code_b, dollar_amount, credential, true)
            .await
    }

    /// Split `budget` across `legs` by weight and buy each leg's code priced
    /// in `quote_code`, one leg after another.
    ///
    /// Every leg amount is checked (weights, notional limit) before the first
    /// exchange call. A leg failure stops the allocation; the report lists the
    /// legs already submitted, the failed leg and the skipped ones.
    ///
    /// # Errors
    ///
    /// `Domain(InvalidAllocation)` or `NotionalLimit` when the allocation is
    /// rejected up front. Exchange failures during a leg are reported in
    /// `AllocationReport::failed`, not as an error.
    pub async fn execute_allocation(
        &self,
        budget: Decimal,
        legs: &[AllocationLeg],
        quote_code: &str,
        credential: &Credential,
        validate_only: bool,
    ) -> ExecResult<AllocationReport> {
        let amounts = split_budget(budget, legs)?;
        if let Some(limit) = self.max_notional {
            if let Some(amount) = amounts.iter().copied().find(|a| *a > limit) {
                return Err(ExecError::NotionalLimit { amount, limit });
            }
        }

        info!(budget = %budget, quote = quote_code, legs = legs.len(), validate_only, "Allocation started");

        let mut report = AllocationReport {
            budget,
            quote_code: quote_code.to_string(),
            submitted: Vec::with_capacity(legs.len()),
            failed: None,
            skipped: Vec::new(),
        };

        let mut pending = legs.iter().zip(amounts);
        for (leg, amount) in pending.by_ref() {
            let mut run = TradeRun::start();
            match self
                .execute_run(&mut run, &leg.code, quote_code, amount, credential, validate_only)
                .await
            {
                Ok(trade) => report.submitted.push(trade),
                Err(error) => {
                    warn!(code = %leg.code, amount = %amount, kind = %error.kind(), "Allocation leg failed, stopping");
                    report.failed = Some(FailedLeg { leg: leg.clone(), amount, error });
                    break;
                },
            }
        }
        report.skipped = pending.map(|(leg, _)| leg.clone()).collect();

        info!(
            submitted = report.submitted.len(),
            skipped = report.skipped.len(),
            spent = %report.spent(),
            complete = report.is_complete(),
            "Allocation finished"
        );

        Ok(report)
    }

    /// Drive `run` through the full sequence. On failure `run` ends in
    /// `Failed { kind }` with the kind of the returned error.
    pub async fn execute_run(
        &self,
        run: &mut TradeRun,
        code_a: &str,
        code_b: &str,
        dollar_amount: Decimal,
        credential: &Credential,
        validate_only: bool,
    ) -> ExecResult<TradeReport> {
        info!(
            run_id = %run.id,
            base = code_a,
            quote = code_b,
            amount = %dollar_amount,
            validate_only,
            "Trade run started"
        );

        let result = self
            .drive(run, code_a, code_b, dollar_amount, credential, validate_only)
            .await;

        if let Err(e) = &result {
            run.fail(e.kind());
            error!(run_id = %run.id, kind = %e.kind(), error = %e, "Trade run failed");
        }

        result
    }

    async fn drive(
        &self,
        run: &mut TradeRun,
        code_a: &str,
        code_b: &str,
        dollar_amount: Decimal,
        credential: &Credential,
        validate_only: bool,
    ) -> ExecResult<TradeReport> {
        if let Some(limit) = self.max_notional {
            if dollar_amount > limit {
                return Err(ExecError::NotionalLimit { amount: dollar_amount, limit });
            }
        }

        // 1. Asset directory
        let (directory, source) = self.directory().await?;
        advance(run, TradeState::DirectoryFetched)?;

        // 2. Pair symbol
        let resolved = self.resolve_against(code_a, code_b, directory, source).await?;
        advance(
            run,
            TradeState::PairResolved {
                pair_symbol: resolved.pair_symbol.clone(),
            },
        )?;

        // 3. Quote; the ask is the execution price
        let quote = self.exchange.fetch_ticker(&resolved.pair_symbol).await?;
        advance(
            run,
            TradeState::Quoted {
                pair_symbol: resolved.pair_symbol.clone(),
                ask_price: quote.ask_price,
            },
        )?;

        // 4. Volume
        let volume =
            calculate_order_volume(dollar_amount, quote.ask_price, resolved.volume_decimals)?;

        // 5. Market buy
        let mut order = OrderRequest::new_market(resolved.pair_symbol.clone(), OrderSide::Buy, volume);
        if validate_only {
            order = order.validate_only();
        }

        info!(
            run_id = %run.id,
            pair = %order.pair_symbol,
            volume = %volume,
            ask = %quote.ask_price,
            client_order_id = %order.client_order_id,
            "Submitting market buy"
        );

        let confirmation = self.exchange.place_order(&order, credential).await?;
        advance(
            run,
            TradeState::OrderSubmitted {
                pair_symbol: resolved.pair_symbol.clone(),
                transaction_ids: confirmation.transaction_ids.clone(),
            },
        )?;

        Ok(TradeReport {
            run_id: run.id,
            pair_symbol: resolved.pair_symbol,
            quote,
            volume,
            notional: dollar_amount,
            validate_only,
            confirmation,
        })
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Fetch the asset directory (through the cache when configured).
    pub async fn directory(&self) -> ExecResult<(Arc<AssetDirectory>, DirectorySource)> {
        match &self.cache {
            Some(cache) => cache.get_or_fetch(self.exchange.as_ref()).await,
            None => {
                let directory = self.exchange.fetch_asset_directory().await?;
                Ok((Arc::new(directory), DirectorySource::Exchange))
            },
        }
    }

    /// Resolve two currency codes to the exchange pair symbol.
    pub async fn resolve_pair(&self, code_a: &str, code_b: &str) -> ExecResult<ResolvedPair> {
        let (directory, source) = self.directory().await?;
        self.resolve_against(code_a, code_b, directory, source).await
    }

    /// Resolve against the tradable pair listing (either orientation).
    pub async fn resolve_tradable_pair(&self, code_a: &str, code_b: &str) -> ExecResult<PairSymbol> {
        let listing = self.exchange.fetch_tradable_pairs().await?;
        Ok(resolve_tradable(code_a, code_b, &listing)?)
    }

    /// Resolve with `directory`; a failure against a cached copy invalidates
    /// the cache and retries once with a fresh fetch.
    async fn resolve_against(
        &self,
        code_a: &str,
        code_b: &str,
        directory: Arc<AssetDirectory>,
        source: DirectorySource,
    ) -> ExecResult<ResolvedPair> {
        match resolve_in(code_a, code_b, &directory) {
            Ok(resolved) => Ok(resolved),
            Err(e) => match (&self.cache, source) {
                (Some(cache), DirectorySource::Cache) => {
                    warn!(error = %e, "Resolution failed against cached directory, refetching");
                    cache.invalidate();
                    let (fresh, _) = cache.get_or_fetch(self.exchange.as_ref()).await?;
                    Ok(resolve_in(code_a, code_b, &fresh)?)
                },
                _ => Err(e.into()),
            },
        }
    }
}

fn resolve_in(
    code_a: &str,
    code_b: &str,
    directory: &AssetDirectory,
) -> Result<ResolvedPair, ResolutionError> {
    let pair_symbol = resolve(code_a, code_b, directory)?;
    let base_asset_id = asset_id_for(code_a, directory)?.to_string();
    let volume_decimals = directory
        .get(&base_asset_id)
        .and_then(|info| info.decimals)
        .unwrap_or(DEFAULT_VOLUME_DECIMALS);

    Ok(ResolvedPair {
        pair_symbol,
        base_asset_id,
        volume_decimals,
    })
}

fn advance(run: &mut TradeRun, next: TradeState) -> ExecResult<()> {
    let from = run.state().name();
    run.advance(next)?;
    info!(run_id = %run.id, from, to = run.state().name(), "Trade state transition");
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{StubCall, StubExchange};
    use coinpilot_connectors::KrakenRestError;
    use coinpilot_domain::{AssetInfo, ErrorKind};
    use rust_decimal_macros::dec;

    fn asset(altname: &str, decimals: u32) -> AssetInfo {
        AssetInfo {
            decimals: Some(decimals),
            ..AssetInfo::with_altname(altname)
        }
    }

    fn directory() -> AssetDirectory {
        [
            ("XXBT".to_string(), asset("XBT", 10)),
            ("ZUSD".to_string(), asset("USD", 4)),
            ("XETH".to_string(), asset("ETH", 10)),
        ]
        .into_iter()
        .collect()
    }

    fn credential() -> Credential {
        Credential::new("key", "c2VjcmV0")
    }

    fn executor() -> TradeExecutor<StubExchange> {
        let exchange = StubExchange::new().with_directory(directory());
        exchange.set_ask("XXBTZUSD", dec!(50000));
        TradeExecutor::new(Arc::new(exchange))
    }

    #[tokio::test]
    async fn test_execute_sizes_and_places_one_order() {
        let executor = executor();

        let report = executor.execute("XBT", "USD", dec!(1000), &credential()).await.unwrap();

        assert_eq!(report.pair_symbol.as_str(), "XXBTZUSD");
        assert_eq!(report.volume.as_decimal(), dec!(0.02));
        assert_eq!(report.confirmation.primary_txid(), Some("STUB-1"));

        let orders = executor.exchange().placed_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert!(!orders[0].validate_only);
        assert_eq!(
            executor.exchange().calls(),
            vec![StubCall::AssetDirectory, StubCall::Ticker, StubCall::PlaceOrder]
        );
    }

    #[tokio::test]
    async fn test_volume_truncated_to_base_decimals() {
        let exchange = StubExchange::new().with_directory(
            [
                ("XXBT".to_string(), asset("XBT", 4)),
                ("ZUSD".to_string(), asset("USD", 4)),
            ]
            .into_iter()
            .collect(),
        );
        exchange.set_ask("XXBTZUSD", dec!(30000));
        let executor = TradeExecutor::new(Arc::new(exchange));

        let report = executor.execute("xbt", "usd", dec!(100), &credential()).await.unwrap();

        // 100 / 30000 = 0.003333..., four decimals, toward zero
        assert_eq!(report.volume.as_decimal(), dec!(0.0033));
    }

    #[tokio::test]
    async fn test_transport_failure_on_ticker_places_no_order() {
        let executor = executor();
        executor
            .exchange()
            .fail_next(StubCall::Ticker, KrakenRestError::Transport { status: 502, body: String::new() });

        let mut run = TradeRun::start();
        let err = executor
            .execute_run(&mut run, "XBT", "USD", dec!(1000), &credential(), false)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(run.state(), &TradeState::Failed { kind: ErrorKind::Transport });
        assert_eq!(executor.exchange().call_count(StubCall::PlaceOrder), 0);
    }

    #[tokio::test]
    async fn test_unknown_asset_fails_before_quote() {
        let executor = executor();

        let mut run = TradeRun::start();
        let err = executor
            .execute_run(&mut run, "XBT", "ZZZ", dec!(1000), &credential(), false)
            .await
            .unwrap_err();

        assert!(matches!(err, ExecError::Resolution(ResolutionError::UnknownAsset(ref code)) if code == "ZZZ"));
        assert_eq!(run.state(), &TradeState::Failed { kind: ErrorKind::Resolution });
        assert_eq!(executor.exchange().call_count(StubCall::Ticker), 0);
    }

    #[tokio::test]
    async fn test_zero_ask_is_arithmetic_error() {
        let executor = executor();
        executor.exchange().set_ask("XXBTZUSD", Decimal::ZERO);

        let mut run = TradeRun::start();
        let err = executor
            .execute_run(&mut run, "XBT", "USD", dec!(1000), &credential(), false)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Arithmetic);
        assert_eq!(executor.exchange().call_count(StubCall::PlaceOrder), 0);

        // sizing fails out of Quoted, after the quote was recorded
        let names: Vec<_> = run.history().iter().map(TradeState::name).collect();
        assert_eq!(names, vec!["idle", "directory_fetched", "pair_resolved", "quoted", "failed"]);
        assert!(matches!(
            &run.history()[3],
            TradeState::Quoted { ask_price, .. } if ask_price.is_zero()
        ));
    }

    #[tokio::test]
    async fn test_amount_too_small_for_precision() {
        let executor = executor();

        // 0.0000001 / 50000 rounds to zero at 10 decimals
        let err = executor.execute("XBT", "USD", dec!(0.0000001), &credential()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Arithmetic);
    }

    #[tokio::test]
    async fn test_exchange_rejection_keeps_kind() {
        let executor = executor();
        executor.exchange().fail_next(
            StubCall::PlaceOrder,
            KrakenRestError::Api(vec!["EOrder:Insufficient funds".to_string()]),
        );

        let mut run = TradeRun::start();
        let err = executor
            .execute_run(&mut run, "XBT", "USD", dec!(1000), &credential(), false)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExchangeLogic);
        let names: Vec<_> = run.history().iter().map(TradeState::name).collect();
        assert_eq!(names, vec!["idle", "directory_fetched", "pair_resolved", "quoted", "failed"]);
    }

    #[tokio::test]
    async fn test_validate_only_order() {
        let executor = executor();

        let report = executor.validate("XBT", "USD", dec!(1000), &credential()).await.unwrap();

        assert!(report.validate_only);
        assert!(report.confirmation.transaction_ids.is_empty());
        assert!(executor.exchange().placed_orders()[0].validate_only);
    }

    #[tokio::test]
    async fn test_notional_limit_checked_before_any_call() {
        let executor = executor().with_max_notional(dec!(500));

        let err = executor.execute("XBT", "USD", dec!(1000), &credential()).await.unwrap_err();

        assert!(matches!(err, ExecError::NotionalLimit { .. }));
        assert!(executor.exchange().calls().is_empty());
    }

    #[tokio::test]
    async fn test_cache_is_refreshed_on_resolution_failure() {
        let exchange = StubExchange::new().with_directory(directory());
        let executor = TradeExecutor::new(Arc::new(exchange)).with_directory_cache(Duration::from_secs(300));

        // Warm the cache, then list a new asset
        executor.resolve_pair("XBT", "USD").await.unwrap();
        let updated: AssetDirectory = directory()
            .iter()
            .map(|(id, info)| (id.to_string(), info.clone()))
            .chain([("XSOL".to_string(), asset("SOL", 8))])
            .collect();
        executor.exchange().set_directory(updated);

        let resolved = executor.resolve_pair("SOL", "USD").await.unwrap();

        assert_eq!(resolved.pair_symbol.as_str(), "XSOLZUSD");
        assert_eq!(resolved.volume_decimals, 8);
        assert_eq!(executor.exchange().call_count(StubCall::AssetDirectory), 2);
    }

    #[tokio::test]
    async fn test_cached_directory_reused_across_runs() {
        let exchange = StubExchange::new().with_directory(directory());
        let executor = TradeExecutor::new(Arc::new(exchange)).with_directory_cache(Duration::from_secs(300));

        executor.execute("XBT", "USD", dec!(1000), &credential()).await.unwrap();
        executor.execute("ETH", "USD", dec!(1000), &credential()).await.unwrap();

        assert_eq!(executor.exchange().call_count(StubCall::AssetDirectory), 1);
        assert_eq!(executor.exchange().call_count(StubCall::PlaceOrder), 2);
    }

    #[tokio::test]
    async fn test_uncached_resolution_failure_does_not_refetch() {
        let executor = executor();

        assert!(executor.resolve_pair("SOL", "USD").await.is_err());
        assert_eq!(executor.exchange().call_count(StubCall::AssetDirectory), 1);
    }

    fn legs(spec: &[(&str, Decimal)]) -> Vec<AllocationLeg> {
        spec.iter().map(|(code, weight)| AllocationLeg::new(*code, *weight)).collect()
    }

    #[tokio::test]
    async fn test_allocation_buys_each_leg_in_order() {
        let executor = executor();
        executor.exchange().set_ask("XETHZUSD", dec!(2500));

        let report = executor
            .execute_allocation(
                dec!(1000),
                &legs(&[("xbt", dec!(0.5)), ("eth", dec!(0.25))]),
                "usd",
                &credential(),
                false,
            )
            .await
            .unwrap();

        assert!(report.is_complete());
        assert!(report.skipped.is_empty());
        assert_eq!(report.spent(), dec!(750));

        let orders = executor.exchange().placed_orders();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].pair_symbol.as_str(), "XXBTZUSD");
        assert_eq!(orders[0].volume.as_decimal(), dec!(0.01));
        assert_eq!(orders[1].pair_symbol.as_str(), "XETHZUSD");
        assert_eq!(orders[1].volume.as_decimal(), dec!(0.1));
    }

    #[tokio::test]
    async fn test_allocation_stops_at_first_failed_leg() {
        let executor = executor();
        executor.exchange().set_ask("XETHZUSD", Decimal::ZERO);

        let report = executor
            .execute_allocation(
                dec!(1000),
                &legs(&[("xbt", dec!(0.4)), ("eth", dec!(0.3)), ("usd", dec!(0.3))]),
                "usd",
                &credential(),
                false,
            )
            .await
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.submitted.len(), 1);
        let failed = report.failed.as_ref().unwrap();
        assert_eq!(failed.leg.code, "eth");
        assert_eq!(failed.amount, dec!(300));
        assert_eq!(failed.error.kind(), ErrorKind::Arithmetic);
        assert_eq!(report.skipped, legs(&[("usd", dec!(0.3))]));
        assert_eq!(executor.exchange().call_count(StubCall::PlaceOrder), 1);
    }

    #[tokio::test]
    async fn test_allocation_rejected_before_any_call() {
        let executor = executor();

        let err = executor
            .execute_allocation(
                dec!(1000),
                &legs(&[("xbt", dec!(0.8)), ("eth", dec!(0.3))]),
                "usd",
                &credential(),
                false,
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(executor.exchange().calls().is_empty());
    }

    #[tokio::test]
    async fn test_allocation_checks_every_leg_against_limit() {
        let executor = executor().with_max_notional(dec!(500));

        let err = executor
            .execute_allocation(
                dec!(1000),
                &legs(&[("xbt", dec!(0.4)), ("eth", dec!(0.6))]),
                "usd",
                &credential(),
                false,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ExecError::NotionalLimit { amount, .. } if amount == dec!(600)));
        assert!(executor.exchange().calls().is_empty());
    }
}
