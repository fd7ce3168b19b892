//! Commands run end to end against the in-memory exchange.

use coinpilot::commands::{execute, stub_executor};
use coinpilot::{CliError, Command, Config};
use coinpilot_domain::{AllocationLeg, Credential, CredentialError, CredentialProvider, ErrorKind, StaticCredentialProvider};
use coinpilot_connectors::KrakenRestError;
use coinpilot_exec::StubCall;
use rust_decimal_macros::dec;

fn provider() -> StaticCredentialProvider {
    StaticCredentialProvider::new(Credential::new("ABCD1234", "c2VjcmV0"))
}

struct NoCredential;

impl CredentialProvider for NoCredential {
    fn get_credential(&self) -> Result<Credential, CredentialError> {
        Err(CredentialError::Unavailable("KRAKEN_SEC is not set".to_string()))
    }
}

fn xbt_usd() -> (String, String) {
    ("xbt".to_string(), "usd".to_string())
}

#[tokio::test]
async fn resolve_prints_pair_symbol() -> anyhow::Result<()> {
    let executor = stub_executor(&Config::test());
    let (base, quote) = xbt_usd();

    let out = execute(Command::Resolve { base, quote, tradable: false }, &executor, &provider()).await?;

    assert!(out.contains("XXBTZUSD"));
    assert!(out.contains("XXBT"));
    Ok(())
}

#[tokio::test]
async fn resolve_tradable_accepts_reversed_codes() -> anyhow::Result<()> {
    let executor = stub_executor(&Config::test());

    let out = execute(
        Command::Resolve { base: "usd".into(), quote: "eth".into(), tradable: true },
        &executor,
        &provider(),
    )
    .await?;

    assert_eq!(out, "XETHZUSD\n");
    Ok(())
}

#[tokio::test]
async fn buy_places_exactly_one_order() -> anyhow::Result<()> {
    let executor = stub_executor(&Config::test());

    let out = execute(
        Command::Buy { base: "eth".into(), quote: "usd".into(), amount: dec!(250), validate: false },
        &executor,
        &provider(),
    )
    .await?;

    // 250 / 2500
    assert!(out.contains("0.1"));
    assert!(out.contains("STUB-1"));
    assert_eq!(executor.exchange().call_count(StubCall::PlaceOrder), 1);
    Ok(())
}

#[tokio::test]
async fn buy_above_limit_is_refused() {
    let mut config = Config::test();
    config.trading.max_order_usd = dec!(100);
    let executor = stub_executor(&config);

    let err = execute(
        Command::Buy { base: "xbt".into(), quote: "usd".into(), amount: dec!(101), validate: false },
        &executor,
        &provider(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Validation));
    assert!(executor.exchange().placed_orders().is_empty());
}

#[tokio::test]
async fn private_command_without_credential_fails() {
    let executor = stub_executor(&Config::test());

    let err = execute(Command::Balance, &executor, &NoCredential).await.unwrap_err();

    assert!(matches!(err, CliError::Credential(_)));
    assert_eq!(err.kind(), Some(ErrorKind::Credential));
    assert!(executor.exchange().calls().is_empty());
}

#[tokio::test]
async fn verify_reports_masked_key_only() -> anyhow::Result<()> {
    let executor = stub_executor(&Config::test());

    let out = execute(Command::Verify, &executor, &provider()).await?;

    assert_eq!(out, "credential ABCD**** accepted\n");
    assert!(!out.contains("c2VjcmV0"));
    assert_eq!(executor.exchange().calls(), vec![StubCall::VerifyCredentials]);
    Ok(())
}

#[tokio::test]
async fn verify_surfaces_rejected_key() {
    let executor = stub_executor(&Config::test());
    executor.exchange().fail_next(
        StubCall::VerifyCredentials,
        KrakenRestError::Api(vec!["EAPI:Invalid key".to_string()]),
    );

    let err = execute(Command::Verify, &executor, &provider()).await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Credential));
}

#[tokio::test]
async fn unknown_asset_surfaces_resolution_kind() {
    let executor = stub_executor(&Config::test());

    let err = execute(
        Command::Ticker { base: "xbt".into(), quote: "zzz".into() },
        &executor,
        &provider(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Resolution));
    assert!(err.to_string().contains("ZZZ"));
}

#[tokio::test]
async fn status_reports_online_exchange() -> anyhow::Result<()> {
    let executor = stub_executor(&Config::test());

    let out = execute(Command::Status, &executor, &NoCredential).await?;

    assert_eq!(out, "exchange online\n");
    assert_eq!(executor.exchange().calls(), vec![StubCall::HealthCheck]);
    Ok(())
}

#[tokio::test]
async fn balance_lists_assets() -> anyhow::Result<()> {
    let executor = stub_executor(&Config::test());

    let out = execute(Command::Balance, &executor, &provider()).await?;

    assert!(out.contains("ZUSD"));
    assert!(out.contains("10000"));
    Ok(())
}

fn basket(legs: &[(&str, rust_decimal::Decimal)]) -> Vec<AllocationLeg> {
    legs.iter().map(|(code, weight)| AllocationLeg::new(*code, *weight)).collect()
}

#[tokio::test]
async fn buy_basket_places_one_order_per_leg() -> anyhow::Result<()> {
    let executor = stub_executor(&Config::test());

    let out = execute(
        Command::BuyBasket {
            quote: "usd".into(),
            budget: dec!(1000),
            legs: basket(&[("xbt", dec!(0.5)), ("eth", dec!(0.5))]),
            validate: false,
        },
        &executor,
        &provider(),
    )
    .await?;

    assert!(out.contains("XXBTZUSD"));
    assert!(out.contains("XETHZUSD"));
    assert!(out.contains("1000 of 1000 USD allocated in 2 leg(s)"));
    assert_eq!(executor.exchange().call_count(StubCall::PlaceOrder), 2);
    Ok(())
}

#[tokio::test]
async fn buy_basket_reports_submitted_legs_when_one_fails() {
    let executor = stub_executor(&Config::test());
    executor.exchange().set_ask("XETHZUSD", dec!(0));

    let err = execute(
        Command::BuyBasket {
            quote: "usd".into(),
            budget: dec!(1000),
            legs: basket(&[("xbt", dec!(0.5)), ("eth", dec!(0.3)), ("xbt.m", dec!(0.2))]),
            validate: false,
        },
        &executor,
        &provider(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CliError::PartialAllocation { ref code, skipped: 1, .. } if code == "eth"));
    assert_eq!(err.kind(), Some(ErrorKind::Arithmetic));
    assert!(err.to_string().contains("XXBTZUSD:STUB-1"));
    assert_eq!(executor.exchange().placed_orders().len(), 1);
}

#[tokio::test]
async fn buy_basket_with_overweight_legs_calls_nothing() {
    let executor = stub_executor(&Config::test());

    let err = execute(
        Command::BuyBasket {
            quote: "usd".into(),
            budget: dec!(100),
            legs: basket(&[("xbt", dec!(0.6)), ("eth", dec!(0.6))]),
            validate: false,
        },
        &executor,
        &provider(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Validation));
    assert!(executor.exchange().calls().is_empty());
}
