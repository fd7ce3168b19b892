//! Kraken response envelope and typed result decoding.
//!
//! Every response is `{"error": [...], "result": {...}}`. The envelope is
//! checked first; the result is then decoded into domain types, failing
//! with `ResponseShape` on any missing or malformed field instead of
//! letting a lookup fail deep in caller code.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use coinpilot_domain::{
    Balance, Candle, OrderConfirmation, OrderSide, PairSymbol, Quote, Trade, TradeHistory,
    TradeKind,
};

use crate::kraken_rest::KrakenRestError;

// =============================================================================
// Envelope
// =============================================================================

/// Check HTTP status and the `error` field, and return the `result` payload.
///
/// - non-2xx status → `Transport { status }`
/// - body is not JSON → `ResponseShape`
/// - non-empty `error` (list or string) → `Api`, even with status 200
/// - missing `result` → `ResponseShape`
pub fn decode_envelope(status: u16, body: &str) -> Result<Value, KrakenRestError> {
    if !(200..300).contains(&status) {
        return Err(KrakenRestError::Transport {
            status,
            body: truncate(body, 256),
        });
    }

    let mut doc: Value = serde_json::from_str(body).map_err(|e| {
        KrakenRestError::ResponseShape(format!("response is not JSON ({}): {}", e, truncate(body, 128)))
    })?;

    let errors = match doc.get("error") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) if s.is_empty() => Vec::new(),
        Some(Value::String(s)) => vec![s.clone()],
        Some(other) => {
            return Err(KrakenRestError::ResponseShape(format!(
                "unexpected 'error' field: {}",
                other
            )))
        },
    };

    if !errors.is_empty() {
        return Err(KrakenRestError::Api(errors));
    }

    match doc.get_mut("result").map(Value::take) {
        Some(Value::Null) | None => {
            Err(KrakenRestError::ResponseShape("response has no 'result' field".to_string()))
        },
        Some(result) => Ok(result),
    }
}

/// What a Kraken `error` string means for the caller.
///
/// Kraken errors read `<severity><category>:<message>`, e.g.
/// `EAPI:Rate limit exceeded` or `EOrder:Insufficient funds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    /// Call or order rate exceeded; back off and retry
    RateLimited,
    /// Exchange is down, busy or in a restricted mode
    Unavailable,
    /// Key, signature or nonce rejected
    Authentication,
    /// Key lacks the permission for this call
    Permission,
    /// Malformed or unknown request arguments
    InvalidInput,
    /// Request understood and refused (funds, minimums, market state)
    Rejected,
}

impl ApiErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorClass::RateLimited => "rate_limited",
            ApiErrorClass::Unavailable => "unavailable",
            ApiErrorClass::Authentication => "authentication",
            ApiErrorClass::Permission => "permission",
            ApiErrorClass::InvalidInput => "invalid_input",
            ApiErrorClass::Rejected => "rejected",
        }
    }
}

/// Classify one Kraken error string.
pub fn classify_api_error(error: &str) -> ApiErrorClass {
    let (category, message) = error.split_once(':').unwrap_or(("", error));
    let message = message.to_ascii_lowercase();

    if message.contains("rate limit") || message.contains("too many requests") || message.contains("lockout") {
        return ApiErrorClass::RateLimited;
    }

    match category {
        "EService" => ApiErrorClass::Unavailable,
        "EAPI" if message.starts_with("invalid key")
            || message.starts_with("invalid signature")
            || message.starts_with("invalid nonce") =>
        {
            ApiErrorClass::Authentication
        },
        "EAPI" if message.starts_with("feature disabled") => ApiErrorClass::Permission,
        "EGeneral" if message.starts_with("permission denied") => ApiErrorClass::Permission,
        "EGeneral" | "EQuery" | "EAPI" => ApiErrorClass::InvalidInput,
        _ => ApiErrorClass::Rejected,
    }
}

/// Decode a result payload into `T`, mapping schema mismatches to `ResponseShape`.
pub fn decode_result<T: DeserializeOwned>(result: Value, what: &str) -> Result<T, KrakenRestError> {
    serde_json::from_value(result)
        .map_err(|e| KrakenRestError::ResponseShape(format!("{}: {}", what, e)))
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

// =============================================================================
// Ticker
// =============================================================================

/// Ticker entry; each array is `[price, whole lot volume, lot volume]`
/// (`c` is `[price, lot volume]`).
#[derive(Debug, Deserialize)]
struct RawTicker {
    a: Vec<String>,
    b: Vec<String>,
    c: Vec<String>,
}

/// Decode the `Ticker` result for `pair`.
pub fn decode_ticker(result: Value, pair: &PairSymbol) -> Result<Quote, KrakenRestError> {
    let mut tickers: HashMap<String, RawTicker> = decode_result(result, "ticker")?;

    let raw = tickers.remove(pair.as_str()).ok_or_else(|| {
        KrakenRestError::ResponseShape(format!("ticker result has no entry for {}", pair))
    })?;

    Ok(Quote {
        pair_symbol: pair.clone(),
        ask_price: first_decimal(&raw.a, "ask (a)")?,
        bid_price: first_decimal(&raw.b, "bid (b)")?,
        last_trade_price: first_decimal(&raw.c, "last trade (c)")?,
        fetched_at: Utc::now(),
    })
}

fn first_decimal(values: &[String], what: &str) -> Result<Decimal, KrakenRestError> {
    let raw = values
        .first()
        .ok_or_else(|| KrakenRestError::ResponseShape(format!("ticker {} is empty", what)))?;
    parse_decimal(raw, what)
}

fn parse_decimal(raw: &str, what: &str) -> Result<Decimal, KrakenRestError> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| KrakenRestError::ResponseShape(format!("{} is not a decimal: {:?}", what, raw)))
}

// =============================================================================
// Balance
// =============================================================================

/// Decode the `Balance` result (`asset_id -> "amount"`).
pub fn decode_balance(result: Value) -> Result<Balance, KrakenRestError> {
    let raw: BTreeMap<String, String> = decode_result(result, "balance")?;
    raw.into_iter()
        .map(|(asset, amount)| -> Result<(String, Decimal), KrakenRestError> {
            let value = parse_decimal(&amount, &format!("balance of {}", asset))?;
            Ok((asset, value))
        })
        .collect()
}

// =============================================================================
// AddOrder
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawOrderDescription {
    order: String,
    #[serde(default)]
    close: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAddOrder {
    descr: RawOrderDescription,
    #[serde(default)]
    txid: Vec<String>,
}

/// Decode the `AddOrder` result.
///
/// A placed (non-validate) order must carry at least one transaction id.
pub fn decode_add_order(
    result: Value,
    validate_only: bool,
) -> Result<OrderConfirmation, KrakenRestError> {
    let raw: RawAddOrder = decode_result(result, "add order")?;

    if raw.txid.is_empty() && !validate_only {
        return Err(KrakenRestError::ResponseShape(
            "order accepted without a transaction id".to_string(),
        ));
    }

    let description = match raw.descr.close {
        Some(close) if !close.is_empty() => format!("{}; {}", raw.descr.order, close),
        _ => raw.descr.order,
    };

    Ok(OrderConfirmation {
        transaction_ids: raw.txid,
        description,
    })
}

// =============================================================================
// Trades / OHLC
// =============================================================================

/// Pull the per-pair row array and the `last` cursor out of a
/// `{ "<pair>": [[...], ...], "last": ... }` result.
fn split_rows(result: Value, pair: &PairSymbol, what: &str) -> Result<(Vec<Value>, String), KrakenRestError> {
    let mut object: Map<String, Value> = match result {
        Value::Object(map) => map,
        other => {
            return Err(KrakenRestError::ResponseShape(format!(
                "{} result is not an object: {}",
                what, other
            )))
        },
    };

    let last = match object.remove("last") {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    let rows = match object.remove(pair.as_str()) {
        Some(Value::Array(rows)) => rows,
        Some(_) => {
            return Err(KrakenRestError::ResponseShape(format!(
                "{} rows for {} are not an array",
                what, pair
            )))
        },
        None => {
            return Err(KrakenRestError::ResponseShape(format!(
                "{} result has no entry for {}",
                what, pair
            )))
        },
    };

    Ok((rows, last))
}

fn row_items<'a>(row: &'a Value, min_len: usize, what: &str) -> Result<&'a [Value], KrakenRestError> {
    match row {
        Value::Array(items) if items.len() >= min_len => Ok(items),
        other => Err(KrakenRestError::ResponseShape(format!(
            "{} row has unexpected shape: {}",
            what, other
        ))),
    }
}

fn decimal_field(value: &Value, what: &str) -> Result<Decimal, KrakenRestError> {
    match value {
        Value::String(s) => parse_decimal(s, what),
        Value::Number(n) => parse_decimal(&n.to_string(), what),
        other => Err(KrakenRestError::ResponseShape(format!("{} is not numeric: {}", what, other))),
    }
}

fn time_field(value: &Value, what: &str) -> Result<DateTime<Utc>, KrakenRestError> {
    let secs = value
        .as_f64()
        .ok_or_else(|| KrakenRestError::ResponseShape(format!("{} is not a timestamp: {}", what, value)))?;
    let millis = (secs * 1000.0).round() as i64;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| KrakenRestError::ResponseShape(format!("{} is out of range: {}", what, secs)))
}

/// Decode the `Trades` result.
///
/// Rows are `[price, volume, time, "b"|"s", "m"|"l", misc, trade_id]`.
pub fn decode_trades(result: Value, pair: &PairSymbol) -> Result<TradeHistory, KrakenRestError> {
    let (rows, last) = split_rows(result, pair, "trades")?;

    let trades = rows
        .iter()
        .map(|row| -> Result<Trade, KrakenRestError> {
            let items = row_items(row, 6, "trade")?;

            let side = match items[3].as_str() {
                Some("b") => OrderSide::Buy,
                Some("s") => OrderSide::Sell,
                _ => {
                    return Err(KrakenRestError::ResponseShape(format!(
                        "trade side is not b/s: {}",
                        items[3]
                    )))
                },
            };
            let kind = match items[4].as_str() {
                Some("m") => TradeKind::Market,
                Some("l") => TradeKind::Limit,
                _ => {
                    return Err(KrakenRestError::ResponseShape(format!(
                        "trade kind is not m/l: {}",
                        items[4]
                    )))
                },
            };

            Ok(Trade {
                price: decimal_field(&items[0], "trade price")?,
                volume: decimal_field(&items[1], "trade volume")?,
                time: time_field(&items[2], "trade time")?,
                side,
                kind,
                misc: items[5].as_str().unwrap_or_default().to_string(),
                trade_id: items.get(6).and_then(Value::as_u64),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TradeHistory {
        pair_symbol: pair.clone(),
        trades,
        last,
    })
}

/// Decode the `OHLC` result.
///
/// Rows are `[time, open, high, low, close, vwap, volume, count]`.
pub fn decode_ohlc(result: Value, pair: &PairSymbol) -> Result<Vec<Candle>, KrakenRestError> {
    let (rows, _) = split_rows(result, pair, "ohlc")?;

    rows.iter()
        .map(|row| -> Result<Candle, KrakenRestError> {
            let items = row_items(row, 8, "ohlc")?;
            Ok(Candle {
                time: time_field(&items[0], "candle time")?,
                open: decimal_field(&items[1], "open")?,
                high: decimal_field(&items[2], "high")?,
                low: decimal_field(&items[3], "low")?,
                close: decimal_field(&items[4], "close")?,
                vwap: decimal_field(&items[5], "vwap")?,
                volume: decimal_field(&items[6], "volume")?,
                count: items[7].as_u64().ok_or_else(|| {
                    KrakenRestError::ResponseShape(format!("candle count is not an integer: {}", items[7]))
                })?,
            })
        })
        .collect()
}

// =============================================================================
// System status
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawSystemStatus {
    status: String,
}

/// Decode the `SystemStatus` result into the status string
/// (`online`, `maintenance`, `cancel_only`, `post_only`).
pub fn decode_system_status(result: Value) -> Result<String, KrakenRestError> {
    let raw: RawSystemStatus = decode_result(result, "system status")?;
    Ok(raw.status)
}

// =============================================================================
// Tests
// =============================================================================
