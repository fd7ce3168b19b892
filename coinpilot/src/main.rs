//! Coinpilot CLI
//!
//! Resolve Kraken pairs, read market data and place market buys.
//!
//! # Usage
//!
//! ```bash
//! coinpilot resolve xbt usd
//! coinpilot ticker xbt usd
//! coinpilot buy xbt usd 100 --validate
//!
//! # Offline, against the in-memory exchange
//! COINPILOT_ENV=test coinpilot buy eth usd 250
//! ```
//!
//! # Environment Variables
//!
//! - `COINPILOT_ENV`: Environment (test, development, production)
//! - `KRAKEN_API_URL`: REST base URL (default: https://api.kraken.com)
//! - `COINPILOT_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 10)
//! - `COINPILOT_DIRECTORY_CACHE_TTL_SECS`: Asset directory cache lifetime, 0 disables (default: 0)
//! - `COINPILOT_KEY_VAR` / `COINPILOT_SECRET_VAR`: Env vars holding the credential (default: KRAKEN_PUB / KRAKEN_SEC)
//! - `COINPILOT_CREDENTIALS_FILE`: JSON credential file, used instead of env vars
//! - `COINPILOT_MAX_ORDER_USD`: Largest single buy (default: 1000)
//! - `COINPILOT_LOG_FORMAT`: text or json (default: text)

use clap::Parser;
use coinpilot::{commands, logging, Cli, Config};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;

    logging::init_logging(config.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_url = %config.exchange.api_url,
        "Coinpilot"
    );
    debug!(command = ?cli.command, "Running command");

    match commands::run(cli.command, &config).await {
        Ok(output) => {
            print!("{}", output);
            Ok(())
        },
        Err(e) => {
            match e.kind() {
                Some(kind) => eprintln!("error [{}]: {}", kind, e),
                None => eprintln!("error: {}", e),
            }
            std::process::exit(1);
        },
    }
}
