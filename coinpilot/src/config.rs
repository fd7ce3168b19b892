//! CLI configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{CliError, CliResult};
use coinpilot_connectors::KRAKEN_API_URL;
use coinpilot_domain::credentials::{DEFAULT_KEY_VAR, DEFAULT_SECRET_VAR};
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Exchange connection
    pub exchange: ExchangeConfig,

    /// Where the credential comes from
    pub credentials: CredentialConfig,

    /// Order limits
    pub trading: TradingConfig,

    /// Log output format
    pub log_format: LogFormat,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// Exchange connection configuration.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Base URL of the REST API
    pub api_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Asset directory cache lifetime; `None` disables the cache
    pub directory_cache_ttl: Option<Duration>,
}

/// Credential source configuration.
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// Env var holding the public key
    pub key_var: String,
    /// Env var holding the private key
    pub secret_var: String,
    /// JSON credential file; takes precedence over the env vars
    pub file: Option<PathBuf>,
}

/// Order limits.
#[derive(Debug, Clone)]
pub struct TradingConfig {
    /// Largest dollar amount a single `buy` may spend
    pub max_order_usd: Decimal,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses the stub exchange)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

const DEFAULT_TIMEOUT_SECS: u64 = 10;

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> CliResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> CliResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Self::load_environment(&lookup)?;
        let exchange = Self::load_exchange_config(&lookup)?;
        let credentials = Self::load_credential_config(&lookup);
        let trading = TradingConfig {
            max_order_usd: Self::load_decimal(&lookup, "COINPILOT_MAX_ORDER_USD", Decimal::new(1000, 0))?,
        };
        let log_format = Self::load_log_format(&lookup)?;

        if trading.max_order_usd <= Decimal::ZERO {
            return Err(CliError::Config(format!(
                "COINPILOT_MAX_ORDER_USD must be positive, got {}",
                trading.max_order_usd
            )));
        }

        Ok(Self {
            exchange,
            credentials,
            trading,
            log_format,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            environment: Environment::Test,
            ..Self::default()
        }
    }

    fn load_environment<F: Fn(&str) -> Option<String>>(lookup: &F) -> CliResult<Environment> {
        let env_str = lookup("COINPILOT_ENV").unwrap_or_else(|| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(CliError::Config(format!(
                "Invalid COINPILOT_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_exchange_config<F: Fn(&str) -> Option<String>>(lookup: &F) -> CliResult<ExchangeConfig> {
        let api_url = lookup("KRAKEN_API_URL").unwrap_or_else(|| KRAKEN_API_URL.to_string());
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(CliError::Config(format!("Invalid KRAKEN_API_URL: {}", api_url)));
        }

        let timeout_secs =
            Self::load_u64(lookup, "COINPILOT_REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(CliError::Config(
                "COINPILOT_REQUEST_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        let ttl_secs = Self::load_u64(lookup, "COINPILOT_DIRECTORY_CACHE_TTL_SECS", 0)?;

        Ok(ExchangeConfig {
            api_url,
            request_timeout: Duration::from_secs(timeout_secs),
            directory_cache_ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
        })
    }

    fn load_credential_config<F: Fn(&str) -> Option<String>>(lookup: &F) -> CredentialConfig {
        CredentialConfig {
            key_var: lookup("COINPILOT_KEY_VAR").unwrap_or_else(|| DEFAULT_KEY_VAR.to_string()),
            secret_var: lookup("COINPILOT_SECRET_VAR")
                .unwrap_or_else(|| DEFAULT_SECRET_VAR.to_string()),
            file: lookup("COINPILOT_CREDENTIALS_FILE")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    fn load_log_format<F: Fn(&str) -> Option<String>>(lookup: &F) -> CliResult<LogFormat> {
        match lookup("COINPILOT_LOG_FORMAT").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("text") | Some("pretty") => Ok(LogFormat::Text),
            Some("json") => Ok(LogFormat::Json),
            Some(other) => Err(CliError::Config(format!(
                "Invalid COINPILOT_LOG_FORMAT: {}. Expected: text, json",
                other
            ))),
        }
    }

    fn load_u64<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u64) -> CliResult<u64> {
        match lookup(key) {
            Some(val) => val
                .trim()
                .parse::<u64>()
                .map_err(|_| CliError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }

    fn load_decimal<F: Fn(&str) -> Option<String>>(
        lookup: &F,
        key: &str,
        default: Decimal,
    ) -> CliResult<Decimal> {
        match lookup(key) {
            Some(val) => Decimal::from_str(val.trim())
                .map_err(|_| CliError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig {
                api_url: KRAKEN_API_URL.to_string(),
                request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
                directory_cache_ttl: None,
            },
            credentials: CredentialConfig {
                key_var: DEFAULT_KEY_VAR.to_string(),
                secret_var: DEFAULT_SECRET_VAR.to_string(),
                file: None,
            },
            trading: TradingConfig {
                max_order_usd: Decimal::new(1000, 0),
            },
            log_format: LogFormat::Text,
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
