use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::MetadataSource;
use crate::model::MetadataRecord;

const BASE_URL: &str = "https://api.coingecko.com";

/// Client for the secondary metadata provider (CoinGecko markets).
///
/// Strictly best-effort: any failure degrades to an empty map and the
/// instruments of that cycle carry unavailable cap/supply fields.
#[derive(Clone)]
pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for CoinGeckoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct CoinGeckoMarket {
    symbol: String,
    name: String,
    market_cap: Option<f64>,
    circulating_supply: Option<f64>,
}

#[async_trait]
impl MetadataSource for CoinGeckoClient {
    async fn fetch_metadata(&self) -> HashMap<String, MetadataRecord> {
        let response = self
            .http
            .get(format!("{}/api/v3/coins/markets", self.base_url))
            .query(&[
                ("vs_currency", "usd"),
                ("order", "market_cap_desc"),
                ("per_page", "100"),
                ("page", "1"),
                ("sparkline", "false"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let markets: Vec<CoinGeckoMarket> = match response {
            Ok(resp) => match resp.json().await {
                Ok(v) => v,
                Err(e) => {
                    warn!("metadata response decode failed: {e}");
                    return HashMap::new();
                }
            },
            Err(e) => {
                warn!("metadata fetch failed: {e}");
                return HashMap::new();
            }
        };

        let mut out = HashMap::with_capacity(markets.len());
        for market in markets {
            out.insert(
                market.symbol.to_uppercase(),
                MetadataRecord {
                    name: market.name,
                    market_cap: market.market_cap,
                    circulating_supply: market.circulating_supply,
                },
            );
        }

        out
    }
}
