//! `ExchangePort` adapter over the Kraken REST client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use coinpilot_connectors::KrakenRestClient;
use coinpilot_domain::{
    AssetDirectory, Balance, Candle, Credential, OrderConfirmation, OrderRequest, PairListing,
    PairSymbol, Quote, TradeHistory,
};

use crate::error::ExecError;
use crate::ports::ExchangePort;

/// Kraken exchange, backed by [`KrakenRestClient`].
pub struct KrakenExchange {
    client: KrakenRestClient,
}

impl KrakenExchange {
    pub fn new(client: KrakenRestClient) -> Self {
        Self { client }
    }

    /// Underlying REST client.
    pub fn client(&self) -> &KrakenRestClient {
        &self.client
    }
}

#[async_trait]
impl ExchangePort for KrakenExchange {
    async fn fetch_asset_directory(&self) -> Result<AssetDirectory, ExecError> {
        Ok(self.client.fetch_asset_directory().await?)
    }

    async fn fetch_tradable_pairs(&self) -> Result<PairListing, ExecError> {
        Ok(self.client.fetch_tradable_pairs().await?)
    }

    async fn fetch_ticker(&self, pair: &PairSymbol) -> Result<Quote, ExecError> {
        Ok(self.client.fetch_ticker(pair).await?)
    }

    async fn fetch_balance(&self, credential: &Credential) -> Result<Balance, ExecError> {
        Ok(self.client.fetch_balance(credential).await?)
    }

    async fn verify_credentials(&self, credential: &Credential) -> Result<(), ExecError> {
        self.client.verify_credentials(credential).await?;
        info!(api_key = %credential.masked_key(), "Credential accepted");
        Ok(())
    }

    async fn place_order(
        &self,
        order: &OrderRequest,
        credential: &Credential,
    ) -> Result<OrderConfirmation, ExecError> {
        let confirmation = self.client.place_order(order, credential).await?;

        info!(
            pair = %order.pair_symbol,
            side = order.side.as_str(),
            volume = %order.volume.as_decimal(),
            client_order_id = %order.client_order_id,
            txid = confirmation.primary_txid().unwrap_or("-"),
            validate_only = order.validate_only,
            "Kraken order accepted"
        );

        Ok(confirmation)
    }

    async fn fetch_recent_trades(
        &self,
        pair: &PairSymbol,
        since: Option<DateTime<Utc>>,
    ) -> Result<TradeHistory, ExecError> {
        Ok(self.client.fetch_recent_trades(pair, since).await?)
    }

    async fn fetch_ohlc(
        &self,
        pair: &PairSymbol,
        interval_minutes: u32,
    ) -> Result<Vec<Candle>, ExecError> {
        Ok(self.client.fetch_ohlc(pair, interval_minutes).await?)
    }

    async fn health_check(&self) -> Result<(), ExecError> {
        let status = self.client.fetch_system_status().await?;
        if status == "online" {
            Ok(())
        } else {
            Err(ExecError::Unavailable(status))
        }
    }
}
