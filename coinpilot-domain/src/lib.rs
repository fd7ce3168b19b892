//! Coinpilot Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains value objects, credentials, the asset directory, pair
//! resolution, order sizing, budget allocation and the trade run state
//! machine.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod assets;
pub mod credentials;
pub mod entities;
pub mod market_data;
pub mod resolver;
pub mod trade;
pub mod value_objects;

// Re-export commonly used types
pub use assets::{AssetDirectory, AssetInfo, PairInfo, PairListing};
pub use credentials::{
    Credential, CredentialError, CredentialProvider, EnvCredentialProvider,
    FileCredentialProvider, StaticCredentialProvider,
};
pub use entities::{
    calculate_order_volume, split_budget, AllocationLeg, Balance, OrderConfirmation, OrderRequest,
    Quote, ALLOCATION_DECIMALS, DEFAULT_VOLUME_DECIMALS,
};
pub use market_data::{Candle, Trade, TradeHistory, TradeKind};
pub use resolver::{asset_id_for, resolve, resolve_tradable, ResolutionError};
pub use trade::{ErrorKind, TradeRun, TradeState};
pub use value_objects::{
    AssetCode, DomainError, OrderKind, OrderSide, PairSymbol, Price, Quantity,
};
