//! Plain-text rendering of command results.

use std::fmt;

use coinpilot_domain::{AssetDirectory, Balance, Candle, PairListing, Quote, TradeHistory};
use coinpilot_exec::{AllocationReport, ResolvedPair, TradeReport};

/// Column-aligned text table.
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(len),
                    None => widths.push(len),
                }
            }
        }
        widths
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(f, "{}", line.trim_end())
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();

        write_row(f, &self.headers, &widths)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        write_row(f, &rule, &widths)?;
        for row in &self.rows {
            write_row(f, row, &widths)?;
        }
        Ok(())
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn assets(directory: &AssetDirectory) -> String {
    let mut table = Table::new(["ASSET", "ALTNAME", "CLASS", "DECIMALS", "STATUS"]);
    for (id, info) in directory.iter() {
        table.push([
            id.to_string(),
            info.altname.clone(),
            opt(info.aclass.as_deref()),
            opt(info.decimals),
            opt(info.status.as_deref()),
        ]);
    }
    table.to_string()
}

pub fn pairs(listing: &PairListing) -> String {
    let mut table = Table::new(["PAIR", "ALTNAME", "WSNAME", "BASE", "QUOTE", "LOT DEC", "MIN"]);
    for (id, info) in listing.iter() {
        table.push([
            id.to_string(),
            info.altname.clone(),
            opt(info.wsname.as_deref()),
            opt(info.base.as_deref()),
            opt(info.quote.as_deref()),
            opt(info.lot_decimals),
            opt(info.ordermin.as_deref()),
        ]);
    }
    table.to_string()
}

pub fn resolved(pair: &ResolvedPair) -> String {
    let mut table = Table::new(["PAIR", "BASE ASSET", "VOLUME DECIMALS"]);
    table.push([
        pair.pair_symbol.to_string(),
        pair.base_asset_id.clone(),
        pair.volume_decimals.to_string(),
    ]);
    table.to_string()
}

pub fn quote(quote: &Quote) -> String {
    let mut table = Table::new(["PAIR", "ASK", "BID", "LAST", "SPREAD", "FETCHED"]);
    table.push([
        quote.pair_symbol.to_string(),
        quote.ask_price.to_string(),
        quote.bid_price.to_string(),
        quote.last_trade_price.to_string(),
        quote.spread().to_string(),
        quote.fetched_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    ]);
    table.to_string()
}

pub fn balance(balance: &Balance) -> String {
    let mut table = Table::new(["ASSET", "BALANCE"]);
    for (asset, amount) in balance {
        table.push([asset.clone(), amount.normalize().to_string()]);
    }
    table.to_string()
}

pub fn report(report: &TradeReport) -> String {
    let fields = [
        ("run", report.run_id.to_string()),
        ("pair", report.pair_symbol.to_string()),
        ("amount_usd", report.notional.to_string()),
        ("ask", report.quote.ask_price.to_string()),
        ("volume", report.volume.to_string()),
        ("validate_only", report.validate_only.to_string()),
        ("txid", report.confirmation.transaction_ids.join(",")),
        ("description", report.confirmation.description.clone()),
    ];

    let mut table = Table::new(["FIELD", "VALUE"]);
    for (field, value) in fields {
        table.push([field.to_string(), value]);
    }
    table.to_string()
}

pub fn allocation(report: &AllocationReport) -> String {
    let mut table = Table::new(["PAIR", "AMOUNT_USD", "ASK", "VOLUME", "TXID"]);
    for leg in &report.submitted {
        table.push([
            leg.pair_symbol.to_string(),
            leg.notional.to_string(),
            leg.quote.ask_price.to_string(),
            leg.volume.to_string(),
            leg.confirmation.transaction_ids.join(","),
        ]);
    }

    let mut out = table.to_string();
    out.push_str(&format!(
        "{} of {} USD allocated in {} leg(s)\n",
        report.spent(),
        report.budget,
        report.submitted.len()
    ));
    out
}

pub fn trades(history: &TradeHistory) -> String {
    let mut table = Table::new(["TIME", "SIDE", "TYPE", "PRICE", "VOLUME"]);
    for trade in &history.trades {
        table.push([
            trade.time.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            trade.side.to_string(),
            format!("{:?}", trade.kind).to_lowercase(),
            trade.price.to_string(),
            trade.volume.to_string(),
        ]);
    }

    let mut out = table.to_string();
    if let Some(vwap) = history.vwap() {
        out.push_str(&format!("{} trades, vwap {}\n", history.trades.len(), vwap.round_dp(8)));
    }
    out
}

pub fn candles(candles: &[Candle]) -> String {
    let mut table = Table::new(["TIME", "OPEN", "HIGH", "LOW", "CLOSE", "VWAP", "VOLUME", "COUNT"]);
    for candle in candles {
        table.push([
            candle.time.format("%Y-%m-%d %H:%M").to_string(),
            candle.open.to_string(),
            candle.high.to_string(),
            candle.low.to_string(),
            candle.close.to_string(),
            candle.vwap.to_string(),
            candle.volume.to_string(),
            candle.count.to_string(),
        ]);
    }
    table.to_string()
}
