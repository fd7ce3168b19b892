//! Coinpilot CLI Library
//!
//! Wires configuration, credentials and the trade executor behind a small
//! command-line surface.
//!
//! # Architecture
//!
//! ```text
//! CLI → Config → CredentialProvider ─┐
//!              → TradeExecutor → ExchangePort → Kraken REST API
//!                                      ↑
//!                                StubExchange (COINPILOT_ENV=test)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use coinpilot::{commands, Command, Config};
//!
//! let config = Config::from_env()?;
//! let out = commands::run(Command::Resolve { base: "XBT".into(), quote: "USD".into(), tradable: false }, &config).await?;
//! print!("{}", out);
//! ```

#![warn(clippy::all)]

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;

// Re-exports for convenience
pub use commands::{Cli, Command};
pub use config::{Config, CredentialConfig, Environment, ExchangeConfig, LogFormat, TradingConfig};
pub use error::{CliError, CliResult};
