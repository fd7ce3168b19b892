//! Kraken REST API Client
//!
//! Provides REST API integration for:
//! - Public market data (assets, tradable pairs, ticker, trades, OHLC)
//! - Private account endpoints (balance, order placement)
//! - Authentication via HMAC-SHA512 signatures
//!
//! # Authentication
//!
//! Private calls are POSTs with a form-urlencoded body whose first field is a
//! fresh `nonce`. The request carries:
//! - `API-Key` header (public key)
//! - `API-Sign` header (see [`crate::signer`])
//!
//! Every response goes through [`decode_envelope`]; a call either returns a
//! typed result or a [`KrakenRestError`]. Nothing is retried here.

use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use coinpilot_domain::{
    AssetDirectory, Balance, Candle, Credential, OrderConfirmation, OrderKind, OrderRequest,
    PairListing, PairSymbol, Quote, TradeHistory,
};

use crate::kraken_types::{
    classify_api_error, decode_add_order, decode_balance, decode_envelope, decode_ohlc, decode_result,
    decode_system_status, decode_ticker, decode_trades, ApiErrorClass,
};
use crate::nonce::{MonotonicNonce, NonceSource};
use crate::signer::{encode_body, sign, SignerError, NONCE_FIELD};

// =============================================================================
// Constants
// =============================================================================

/// Kraken REST API base URL
pub const KRAKEN_API_URL: &str = "https://api.kraken.com";

/// Candle widths accepted by the OHLC endpoint, in minutes.
pub const OHLC_INTERVALS: [u32; 9] = [1, 5, 15, 30, 60, 240, 1440, 10080, 21600];

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur in the Kraken REST client.
#[derive(Debug, Clone, Error)]
pub enum KrakenRestError {
    /// Request could not be signed
    #[error("Failed to sign request: {0}")]
    Signing(#[from] SignerError),

    /// Non-2xx HTTP status
    #[error("HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    /// Connection, TLS or body read failure
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Caller-imposed timeout elapsed
    #[error("Request timed out")]
    Timeout,

    /// Exchange reported errors in the envelope
    #[error("Kraken API error: {}", .0.join(", "))]
    Api(Vec<String>),

    /// Result did not have the expected structure
    #[error("Unexpected response shape: {0}")]
    ResponseShape(String),

    /// Argument rejected before any request was made
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl KrakenRestError {
    /// True for failures below the API layer (network, status, timeout).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            KrakenRestError::Transport { .. }
                | KrakenRestError::RequestFailed(_)
                | KrakenRestError::Timeout
        )
    }

    /// Class of an `Api` error. With several errors, a rate limit or outage
    /// wins over the rest, otherwise the first error decides.
    pub fn api_class(&self) -> Option<ApiErrorClass> {
        let errors = match self {
            KrakenRestError::Api(errors) => errors,
            _ => return None,
        };
        let classes: Vec<_> = errors.iter().map(|e| classify_api_error(e)).collect();
        classes
            .iter()
            .copied()
            .find(|c| matches!(c, ApiErrorClass::RateLimited | ApiErrorClass::Unavailable))
            .or_else(|| classes.first().copied())
    }
}

// =============================================================================
// Endpoints
// =============================================================================

/// Base URL and endpoint paths. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KrakenEndpoints {
    pub base_url: String,
    pub system_status: String,
    pub assets: String,
    pub asset_pairs: String,
    pub ticker: String,
    pub trades: String,
    pub ohlc: String,
    pub balance: String,
    pub add_order: String,
}

impl Default for KrakenEndpoints {
    fn default() -> Self {
        Self {
            base_url: KRAKEN_API_URL.to_string(),
            system_status: "/0/public/SystemStatus".to_string(),
            assets: "/0/public/Assets".to_string(),
            asset_pairs: "/0/public/AssetPairs".to_string(),
            ticker: "/0/public/Ticker".to_string(),
            trades: "/0/public/Trades".to_string(),
            ohlc: "/0/public/OHLC".to_string(),
            balance: "/0/private/Balance".to_string(),
            add_order: "/0/private/AddOrder".to_string(),
        }
    }
}

impl KrakenEndpoints {
    /// Default paths against another host (sandbox, proxy).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

// =============================================================================
// Signed request
// =============================================================================

/// A private request ready to send. Built once per call and sent once.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    /// URI path that was signed
    pub path: String,
    /// Form-urlencoded body, exactly the bytes that were signed
    pub body: String,
    /// Nonce embedded in `body`
    pub nonce: u64,
    /// `API-Key` header value
    pub api_key: String,
    /// `API-Sign` header value
    pub signature: String,
}

// =============================================================================
// Kraken REST Client
// =============================================================================

/// Kraken REST API client.
pub struct KrakenRestClient {
    /// HTTP client
    client: Client,
    /// Base URL and paths
    endpoints: KrakenEndpoints,
    /// Shared nonce source; one per API key
    nonce: Arc<dyn NonceSource>,
    /// Per-request timeout (none by default)
    timeout: Option<Duration>,
}

impl KrakenRestClient {
    /// Create a client against the public Kraken API with a system-clock nonce.
    pub fn new() -> Self {
        Self::with_endpoints(KrakenEndpoints::default(), Arc::new(MonotonicNonce::with_system_clock()))
    }

    /// Create a client with explicit endpoints and nonce source.
    pub fn with_endpoints(endpoints: KrakenEndpoints, nonce: Arc<dyn NonceSource>) -> Self {
        Self {
            client: Client::new(),
            endpoints,
            nonce,
            timeout: None,
        }
    }

    /// Bound every request by `limit`.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Configured endpoints.
    pub fn endpoints(&self) -> &KrakenEndpoints {
        &self.endpoints
    }

    /// Draw a nonce, sign and assemble a private request.
    ///
    /// Fails with `Signing` before any I/O if the secret is unusable.
    pub fn build_private_request(
        &self,
        path: &str,
        params: Vec<(&str, String)>,
        credential: &Credential,
    ) -> Result<SignedRequest, KrakenRestError> {
        let nonce = self.nonce.next_nonce();

        let mut body = Vec::with_capacity(params.len() + 1);
        body.push((NONCE_FIELD, nonce.to_string()));
        body.extend(params);

        let signature = sign(path, &body, credential.private_key.as_str())?;

        Ok(SignedRequest {
            path: path.to_string(),
            body: encode_body(&body),
            nonce,
            api_key: credential.public_key.clone(),
            signature,
        })
    }

    /// Send a request and return `(status, body)`, honoring the timeout.
    async fn dispatch(&self, request: RequestBuilder) -> Result<(u16, String), KrakenRestError> {
        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| KrakenRestError::RequestFailed(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| KrakenRestError::RequestFailed(e.to_string()))?;
            Ok((status, body))
        };

        match self.timeout {
            Some(limit) => timeout(limit, exchange).await.map_err(|_| KrakenRestError::Timeout)?,
            None => exchange.await,
        }
    }

    /// Send a GET request to a public endpoint and return the `result` payload.
    pub async fn public_request(
        &self,
        path: &str,
        params: Vec<(&str, String)>,
    ) -> Result<Value, KrakenRestError> {
        debug!(path, params = params.len(), "Kraken public request");

        let request = self.client.get(self.endpoints.url(path)).query(&params);
        let (status, body) = self.dispatch(request).await?;

        decode_envelope(status, &body).map_err(|e| {
            warn!(path, status, class = e.api_class().map(|c| c.as_str()), error = %e, "Kraken public request failed");
            e
        })
    }

    /// Send a signed POST to a private endpoint and return the `result` payload.
    pub async fn private_request(
        &self,
        path: &str,
        params: Vec<(&str, String)>,
        credential: &Credential,
    ) -> Result<Value, KrakenRestError> {
        let signed = self.build_private_request(path, params, credential)?;

        debug!(
            path,
            nonce = signed.nonce,
            api_key = %credential.masked_key(),
            "Kraken private request"
        );

        let request = self
            .client
            .post(self.endpoints.url(&signed.path))
            .header("API-Key", &signed.api_key)
            .header("API-Sign", &signed.signature)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(signed.body);
        let (status, body) = self.dispatch(request).await?;

        decode_envelope(status, &body).map_err(|e| {
            warn!(path, status, class = e.api_class().map(|c| c.as_str()), error = %e, "Kraken private request failed");
            e
        })
    }

    // =========================================================================
    // Public market data
    // =========================================================================

    /// Exchange status string (`online`, `maintenance`, `cancel_only`, `post_only`).
    ///
    /// # Endpoint
    ///
    /// `GET /0/public/SystemStatus`
    pub async fn fetch_system_status(&self) -> Result<String, KrakenRestError> {
        let result = self.public_request(&self.endpoints.system_status, vec![]).await?;
        decode_system_status(result)
    }

    /// Full asset directory.
    ///
    /// # Endpoint
    ///
    /// `GET /0/public/Assets`
    pub async fn fetch_asset_directory(&self) -> Result<AssetDirectory, KrakenRestError> {
        let result = self.public_request(&self.endpoints.assets, vec![]).await?;
        let directory: AssetDirectory = decode_result(result, "asset directory")?;
        debug!(assets = directory.len(), "Fetched asset directory");
        Ok(directory)
    }

    /// Every tradable pair.
    ///
    /// # Endpoint
    ///
    /// `GET /0/public/AssetPairs`
    pub async fn fetch_tradable_pairs(&self) -> Result<PairListing, KrakenRestError> {
        let result = self.public_request(&self.endpoints.asset_pairs, vec![]).await?;
        let listing: PairListing = decode_result(result, "asset pairs")?;
        debug!(pairs = listing.len(), "Fetched tradable pairs");
        Ok(listing)
    }

    /// Current ask, bid and last trade price.
    ///
    /// # Endpoint
    ///
    /// `GET /0/public/Ticker?pair=<pair>`
    pub async fn fetch_ticker(&self, pair: &PairSymbol) -> Result<Quote, KrakenRestError> {
        let params = vec![("pair", pair.as_str().to_string())];
        let result = self.public_request(&self.endpoints.ticker, params).await?;
        decode_ticker(result, pair)
    }

    /// Recent public trades, optionally starting at `since`.
    ///
    /// # Endpoint
    ///
    /// `GET /0/public/Trades?pair=<pair>[&since=<unix seconds>]`
    pub async fn fetch_recent_trades(
        &self,
        pair: &PairSymbol,
        since: Option<DateTime<Utc>>,
    ) -> Result<TradeHistory, KrakenRestError> {
        let mut params = vec![("pair", pair.as_str().to_string())];
        if let Some(since) = since {
            params.push(("since", since.timestamp().to_string()));
        }

        let result = self.public_request(&self.endpoints.trades, params).await?;
        decode_trades(result, pair)
    }

    /// Candles of `interval_minutes` width.
    ///
    /// # Endpoint
    ///
    /// `GET /0/public/OHLC?pair=<pair>&interval=<minutes>`
    pub async fn fetch_ohlc(
        &self,
        pair: &PairSymbol,
        interval_minutes: u32,
    ) -> Result<Vec<Candle>, KrakenRestError> {
        if !OHLC_INTERVALS.contains(&interval_minutes) {
            return Err(KrakenRestError::InvalidParameter(format!(
                "OHLC interval {} not in {:?}",
                interval_minutes, OHLC_INTERVALS
            )));
        }

        let params = vec![
            ("pair", pair.as_str().to_string()),
            ("interval", interval_minutes.to_string()),
        ];
        let result = self.public_request(&self.endpoints.ohlc, params).await?;
        decode_ohlc(result, pair)
    }

    // =========================================================================
    // Private account API
    // =========================================================================

    /// Account balances by asset id.
    ///
    /// # Endpoint
    ///
    /// `POST /0/private/Balance`
    pub async fn fetch_balance(&self, credential: &Credential) -> Result<Balance, KrakenRestError> {
        let result = self.private_request(&self.endpoints.balance, vec![], credential).await?;
        decode_balance(result)
    }

    /// Check that the exchange accepts `credential`.
    pub async fn verify_credentials(&self, credential: &Credential) -> Result<(), KrakenRestError> {
        self.fetch_balance(credential).await.map(|_| ())
    }

    /// Submit an order.
    ///
    /// # Endpoint
    ///
    /// `POST /0/private/AddOrder`
    pub async fn place_order(
        &self,
        order: &OrderRequest,
        credential: &Credential,
    ) -> Result<OrderConfirmation, KrakenRestError> {
        let params = order_params(order);
        let result = self.private_request(&self.endpoints.add_order, params, credential).await?;
        decode_add_order(result, order.validate_only)
    }
}

impl Default for KrakenRestClient {
    fn default() -> Self {
        Self::new()
    }
}

/// AddOrder form fields for `order`, nonce excluded.
pub fn order_params(order: &OrderRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("ordertype", order.kind.as_str().to_string()),
        ("type", order.side.as_str().to_string()),
        ("volume", order.volume.as_decimal().normalize().to_string()),
        ("pair", order.pair_symbol.as_str().to_string()),
    ];

    if let OrderKind::Limit { price } = &order.kind {
        params.push(("price", price.as_decimal().normalize().to_string()));
    }

    params.push(("cl_ord_id", order.client_order_id.to_string()));

    if order.validate_only {
        params.push(("validate", "true".to_string()));
    }

    params
}

// =============================================================================
// Tests
// =============================================================================
