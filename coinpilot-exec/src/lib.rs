//! Coinpilot Execution Layer
//!
//! Turns "buy N dollars of A priced in B" into one exchange order.
//!
//! # Architecture
//!
//! ```text
//! TradeExecutor → ExchangePort → KrakenExchange → KrakenRestClient
//!                      ↑
//!                 StubExchange (tests)
//! ```
//!
//! # Components
//!
//! - **Ports**: `ExchangePort`, the interface to the exchange
//! - **Kraken**: port adapter over the REST client
//! - **Cache**: optional TTL cache for the asset directory
//! - **Executor**: resolve → quote → size → order, one state machine per run
//! - **Stub**: in-memory exchange for tests
//!
//! # Example
//!
//! ```rust,ignore
//! use coinpilot_exec::{KrakenExchange, TradeExecutor};
//! use coinpilot_connectors::KrakenRestClient;
//! use std::sync::Arc;
//!
//! let exchange = Arc::new(KrakenExchange::new(KrakenRestClient::new()));
//! let executor = TradeExecutor::new(exchange);
//!
//! let report = executor.execute("XBT", "USD", dec!(1000), &credential).await?;
//! println!("txid: {:?}", report.confirmation.primary_txid());
//! ```

#![warn(clippy::all)]

pub mod cache;
pub mod error;
pub mod executor;
pub mod kraken;
pub mod ports;
pub mod stub;

// Re-exports for convenience
pub use cache::{DirectoryCache, DirectorySource};
pub use error::{ExecError, ExecResult};
pub use executor::{AllocationReport, FailedLeg, ResolvedPair, TradeExecutor, TradeReport};
pub use kraken::KrakenExchange;
pub use ports::ExchangePort;
pub use stub::{StubCall, StubExchange};
