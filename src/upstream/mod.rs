use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Candle, MetadataRecord, TickerRecord};

pub mod binance;
pub mod coingecko;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("rate limited by upstream")]
    RateLimited,
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) if status.as_u16() == 429 || status.as_u16() == 418 => {
                UpstreamError::RateLimited
            }
            _ if e.is_decode() => UpstreamError::Malformed(e.to_string()),
            _ => UpstreamError::Unavailable(e.to_string()),
        }
    }
}

/// Primary provider: tickers and candle history.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// All instruments' current 24h ticker records.
    async fn fetch_all_tickers(&self) -> Result<Vec<TickerRecord>, UpstreamError>;

    /// `count` candles for one symbol at the given interval,
    /// ordered oldest → newest.
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        count: u32,
    ) -> Result<Vec<Candle>, UpstreamError>;
}

/// Secondary provider: display names, market caps, circulating supply.
///
/// Best-effort by contract: implementations must swallow transport and
/// parse failures and return an empty map, so a metadata outage can
/// never abort a refresh cycle.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_metadata(&self) -> HashMap<String, MetadataRecord>;
}

// Convenience re-exports
pub use binance::BinanceClient;
pub use coingecko::CoinGeckoClient;
