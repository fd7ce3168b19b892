//! Command-line surface and command dispatch.

use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use coinpilot_connectors::{KrakenEndpoints, KrakenRestClient, MonotonicNonce};
use coinpilot_domain::{
    AllocationLeg, AssetInfo, Credential, CredentialProvider, EnvCredentialProvider, FileCredentialProvider,
    PairInfo,
};
use coinpilot_exec::{ExchangePort, KrakenExchange, StubExchange, TradeExecutor};

use crate::config::{Config, Environment};
use crate::error::{CliError, CliResult};
use crate::output;

#[derive(Parser, Debug)]
#[command(name = "coinpilot", version, about = "Kraken pair resolution and market orders")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Check that the exchange is online
    Status,

    /// List every asset in the exchange directory
    Assets,

    /// List every tradable pair
    Pairs,

    /// Resolve two currency codes to the exchange pair symbol
    Resolve {
        /// Base currency code (e.g. XBT)
        base: String,
        /// Quote currency code (e.g. USD)
        quote: String,
        /// Match against the tradable pair listing instead of the asset directory
        #[arg(long)]
        tradable: bool,
    },

    /// Show the current ask, bid and last trade for a pair
    Ticker { base: String, quote: String },

    /// Show account balances
    Balance,

    /// Check that the exchange accepts the configured credential
    Verify,

    /// Buy a dollar amount of BASE priced in QUOTE at market
    Buy {
        base: String,
        quote: String,
        /// Amount to spend, in dollars
        amount: Decimal,
        /// Ask the exchange to validate the order without placing it
        #[arg(long)]
        validate: bool,
    },

    /// Split a dollar budget across several codes by weight and buy each at market
    BuyBasket {
        /// Quote currency code every leg is priced in (e.g. USD)
        quote: String,
        /// Total budget, in dollars
        budget: Decimal,
        /// Legs as CODE=WEIGHT (e.g. xbt=0.6 eth=0.4); weights sum to at most 1
        #[arg(required = true)]
        legs: Vec<AllocationLeg>,
        /// Ask the exchange to validate the orders without placing them
        #[arg(long)]
        validate: bool,
    },

    /// Recent public trades for a pair
    Trades {
        base: String,
        quote: String,
        /// Only trades from the last N minutes
        #[arg(long, default_value_t = 60)]
        minutes: i64,
    },

    /// OHLC candles for a pair
    Ohlc {
        base: String,
        quote: String,
        /// Candle width in minutes
        #[arg(long, default_value_t = 60)]
        interval: u32,
    },
}

impl Command {
    /// Whether the command needs a credential.
    pub fn is_private(&self) -> bool {
        matches!(
            self,
            Command::Balance | Command::Verify | Command::Buy { .. } | Command::BuyBasket { .. }
        )
    }
}

// =============================================================================
// Wiring
// =============================================================================

/// Credential provider selected by configuration: file first, then env vars.
pub fn credential_provider(config: &Config) -> Box<dyn CredentialProvider> {
    match &config.credentials.file {
        Some(path) => Box::new(FileCredentialProvider::new(path.clone())),
        None => Box::new(EnvCredentialProvider::new(
            config.credentials.key_var.clone(),
            config.credentials.secret_var.clone(),
        )),
    }
}

/// Executor over the live Kraken API.
pub fn kraken_executor(config: &Config) -> TradeExecutor<KrakenExchange> {
    let client = KrakenRestClient::with_endpoints(
        KrakenEndpoints::with_base_url(config.exchange.api_url.clone()),
        Arc::new(MonotonicNonce::with_system_clock()),
    )
    .with_timeout(config.exchange.request_timeout);

    configure(TradeExecutor::new(Arc::new(KrakenExchange::new(client))), config)
}

/// Executor over an in-memory exchange with a few major assets.
pub fn stub_executor(config: &Config) -> TradeExecutor<StubExchange> {
    let asset = |altname: &str, decimals: u32| AssetInfo {
        aclass: Some("currency".to_string()),
        decimals: Some(decimals),
        display_decimals: Some(5),
        status: Some("enabled".to_string()),
        ..AssetInfo::with_altname(altname)
    };
    let pair = |altname: &str, base: &str, quote: &str| PairInfo {
        base: Some(base.to_string()),
        quote: Some(quote.to_string()),
        lot_decimals: Some(8),
        ..PairInfo::with_altname(altname)
    };

    let exchange = StubExchange::new()
        .with_directory(
            [
                ("XXBT".to_string(), asset("XBT", 10)),
                ("XETH".to_string(), asset("ETH", 10)),
                ("ZUSD".to_string(), asset("USD", 4)),
                ("ZEUR".to_string(), asset("EUR", 4)),
            ]
            .into_iter()
            .collect(),
        )
        .with_pairs(
            [
                ("XXBTZUSD".to_string(), pair("XBTUSD", "XXBT", "ZUSD")),
                ("XETHZUSD".to_string(), pair("ETHUSD", "XETH", "ZUSD")),
                ("XXBTZEUR".to_string(), pair("XBTEUR", "XXBT", "ZEUR")),
            ]
            .into_iter()
            .collect(),
        )
        .with_balance(
            [
                ("ZUSD".to_string(), Decimal::new(10_000, 0)),
                ("XXBT".to_string(), Decimal::ZERO),
            ]
            .into_iter()
            .collect(),
        );
    exchange.set_ask("XETHZUSD", Decimal::new(2_500, 0));

    configure(TradeExecutor::new(Arc::new(exchange)), config)
}

fn configure<E: ExchangePort>(executor: TradeExecutor<E>, config: &Config) -> TradeExecutor<E> {
    let executor = executor.with_max_notional(config.trading.max_order_usd);
    match config.exchange.directory_cache_ttl {
        Some(ttl) => executor.with_directory_cache(ttl),
        None => executor,
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Run `command` against the exchange selected by `config.environment`.
pub async fn run(command: Command, config: &Config) -> CliResult<String> {
    let provider = credential_provider(config);
    match config.environment {
        Environment::Test => execute(command, &stub_executor(config), provider.as_ref()).await,
        Environment::Development | Environment::Production => {
            execute(command, &kraken_executor(config), provider.as_ref()).await
        },
    }
}

fn load_credential(provider: &dyn CredentialProvider) -> CliResult<Credential> {
    let credential = provider.get_credential()?;
    info!(api_key = %credential.masked_key(), "Credential loaded");
    Ok(credential)
}

/// Run `command` with `executor` and render the result.
pub async fn execute<E: ExchangePort>(
    command: Command,
    executor: &TradeExecutor<E>,
    provider: &dyn CredentialProvider,
) -> CliResult<String> {
    let exchange = executor.exchange();

    let rendered = match command {
        Command::Status => {
            exchange.health_check().await?;
            "exchange online\n".to_string()
        },
        Command::Assets => {
            let (directory, _) = executor.directory().await?;
            output::assets(&directory)
        },
        Command::Pairs => output::pairs(&exchange.fetch_tradable_pairs().await?),
        Command::Resolve { base, quote, tradable: false } => {
            output::resolved(&executor.resolve_pair(&base, &quote).await?)
        },
        Command::Resolve { base, quote, tradable: true } => {
            format!("{}\n", executor.resolve_tradable_pair(&base, &quote).await?)
        },
        Command::Ticker { base, quote } => {
            let resolved = executor.resolve_pair(&base, &quote).await?;
            output::quote(&exchange.fetch_ticker(&resolved.pair_symbol).await?)
        },
        Command::Balance => {
            let credential = load_credential(provider)?;
            output::balance(&exchange.fetch_balance(&credential).await?)
        },
        Command::Verify => {
            let credential = load_credential(provider)?;
            exchange.verify_credentials(&credential).await?;
            format!("credential {} accepted\n", credential.masked_key())
        },
        Command::Buy { base, quote, amount, validate } => {
            let credential = load_credential(provider)?;
            let report = if validate {
                executor.validate(&base, &quote, amount, &credential).await?
            } else {
                executor.execute(&base, &quote, amount, &credential).await?
            };
            output::report(&report)
        },
        Command::BuyBasket { quote, budget, legs, validate } => {
            let credential = load_credential(provider)?;
            let mut report = executor
                .execute_allocation(budget, &legs, &quote, &credential, validate)
                .await?;
            match report.failed.take() {
                None => output::allocation(&report),
                Some(failed) => return Err(CliError::partial_allocation(&report, failed)),
            }
        },
        Command::Trades { base, quote, minutes } => {
            let resolved = executor.resolve_pair(&base, &quote).await?;
            let now = Utc::now();
            let since = now - ChronoDuration::minutes(minutes.max(0));
            let history = exchange
                .fetch_recent_trades(&resolved.pair_symbol, Some(since))
                .await?
                .until(now);
            output::trades(&history)
        },
        Command::Ohlc { base, quote, interval } => {
            let resolved = executor.resolve_pair(&base, &quote).await?;
            output::candles(&exchange.fetch_ohlc(&resolved.pair_symbol, interval).await?)
        },
    };

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_buy() {
        let cli = Cli::try_parse_from(["coinpilot", "buy", "xbt", "usd", "250.5", "--validate"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Buy {
                base: "xbt".to_string(),
                quote: "usd".to_string(),
                amount: Decimal::new(2505, 1),
                validate: true,
            }
        );
        assert!(cli.command.is_private());
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["coinpilot", "ohlc", "eth", "usd"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Ohlc { base: "eth".to_string(), quote: "usd".to_string(), interval: 60 }
        );
        assert!(!cli.command.is_private());

        let cli = Cli::try_parse_from(["coinpilot", "resolve", "xbt", "usd", "--tradable"]).unwrap();
        assert!(matches!(cli.command, Command::Resolve { tradable: true, .. }));
    }

    #[test]
    fn test_parse_buy_basket() {
        let cli = Cli::try_parse_from(["coinpilot", "buy-basket", "usd", "1000", "xbt=0.6", "eth=0.4"])
            .unwrap();
        match cli.command {
            Command::BuyBasket { quote, budget, legs, validate } => {
                assert_eq!(quote, "usd");
                assert_eq!(budget, Decimal::new(1000, 0));
                assert_eq!(
                    legs,
                    vec![
                        AllocationLeg::new("xbt", Decimal::new(6, 1)),
                        AllocationLeg::new("eth", Decimal::new(4, 1)),
                    ]
                );
                assert!(!validate);
            },
            other => panic!("Expected BuyBasket, got {:?}", other),
        }

        assert!(Cli::try_parse_from(["coinpilot", "buy-basket", "usd", "1000"]).is_err());
        assert!(Cli::try_parse_from(["coinpilot", "buy-basket", "usd", "1000", "xbt"]).is_err());
    }

    #[test]
    fn test_rejects_non_decimal_amount() {
        assert!(Cli::try_parse_from(["coinpilot", "buy", "xbt", "usd", "lots"]).is_err());
    }

    #[test]
    fn test_file_provider_wins() {
        let mut config = Config::test();
        config.credentials.file = Some("/nonexistent/kraken.json".into());

        let err = credential_provider(&config).get_credential().unwrap_err();
        assert!(err.to_string().contains("kraken.json"));
    }
}
