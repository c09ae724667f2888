use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

use super::{MarketDataSource, UpstreamError};
use crate::model::{Candle, TickerRecord};

const BASE_URL: &str = "https://api.binance.com";

/// Client for the primary ticker/candle provider (Binance spot REST).
#[derive(Clone)]
pub struct BinanceClient {
    http: reqwest::Client,
    base_url: String,
}

impl BinanceClient {
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

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker24h {
    symbol: String,
    last_price: String,
    price_change_percent: String,
    quote_volume: String,
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn fetch_all_tickers(&self) -> Result<Vec<TickerRecord>, UpstreamError> {
        let tickers: Vec<BinanceTicker24h> = self
            .http
            .get(format!("{}/api/v3/ticker/24hr", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut out = Vec::new();

        for ticker in tickers {
            let last_price: f64 = match ticker.last_price.parse() {
                Ok(v) => v,
                Err(_) => continue,
            };

            if last_price <= 0.0 {
                continue;
            }

            let change_24h: f64 = ticker.price_change_percent.parse().unwrap_or(0.0);
            let quote_volume_24h: f64 = ticker.quote_volume.parse().unwrap_or(0.0);

            out.push(TickerRecord {
                symbol: ticker.symbol,
                last_price,
                change_24h,
                quote_volume_24h,
            });
        }

        Ok(out)
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        count: u32,
    ) -> Result<Vec<Candle>, UpstreamError> {
        let count = count.to_string();

        // Klines rows are heterogeneous arrays:
        // [open_time, "open", "high", "low", "close", "volume", ...]
        let rows: Vec<Vec<Value>> = self
            .http
            .get(format!("{}/api/v3/klines", self.base_url))
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("limit", count.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut out = Vec::with_capacity(rows.len());

        for row in rows {
            out.push(parse_kline_row(&row)?);
        }

        Ok(out)
    }
}

fn parse_kline_row(row: &[Value]) -> Result<Candle, UpstreamError> {
    if row.len() < 6 {
        return Err(UpstreamError::Malformed(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }

    let open_time_ms = row[0]
        .as_i64()
        .ok_or_else(|| UpstreamError::Malformed("kline open time is not an integer".into()))?;
    let open_time = DateTime::from_timestamp_millis(open_time_ms)
        .ok_or_else(|| UpstreamError::Malformed("kline open time out of range".into()))?;

    let field = |idx: usize, name: &str| -> Result<f64, UpstreamError> {
        row[idx]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| UpstreamError::Malformed(format!("kline {name} is not a numeric string")))
    };

    Ok(Candle {
        open_time,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        volume: field(5, "volume")?,
    })
}
