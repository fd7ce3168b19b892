//! Coinpilot Exchange Connectors
//!
//! Kraken REST adapter: request signing, nonce generation, envelope
//! decoding and the HTTP client. Normalizes exchange payloads to domain types.

#![warn(clippy::all)]

// Public modules
pub mod kraken_rest;
pub mod kraken_types;
pub mod nonce;
pub mod signer;

// Re-exports
pub use kraken_rest::{
    order_params, KrakenEndpoints, KrakenRestClient, KrakenRestError, SignedRequest,
    KRAKEN_API_URL, OHLC_INTERVALS,
};
pub use kraken_types::{classify_api_error, decode_envelope, ApiErrorClass};
pub use nonce::{Clock, MonotonicNonce, NonceSource, SystemClock};
pub use signer::{encode_body, sign, SignerError};
