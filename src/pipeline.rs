use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::metrics::percent_change;
use crate::model::{InstrumentSnapshot, MarketSnapshot, MetadataRecord, TickerRecord};
use crate::upstream::{MarketDataSource, MetadataSource, UpstreamError};

/// Joined-but-unranked working record, local to one build.
struct JoinedInstrument {
    ticker: TickerRecord,
    base_asset: String,
    name: String,
    market_cap: Option<f64>,
    circulating_supply: Option<f64>,
}

/// Orchestrates one refresh cycle: fetch → filter → join → rank →
/// per-instrument enrichment → immutable snapshot.
pub struct AggregationPipeline {
    market: Arc<dyn MarketDataSource>,
    metadata: Arc<dyn MetadataSource>,
    quote_asset: String,
    pace_delay: Duration,
}

impl AggregationPipeline {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        metadata: Arc<dyn MetadataSource>,
        quote_asset: impl Into<String>,
        pace_delay: Duration,
    ) -> Self {
        Self {
            market,
            metadata,
            quote_asset: quote_asset.into(),
            pace_delay,
        }
    }

    /// Builds a complete market snapshot for the top `limit`
    /// instruments by market cap.
    ///
    /// Only the ticker fetch can abort the cycle. A metadata outage
    /// leaves cap/supply fields unavailable; a single instrument's
    /// candle failure zeroes only that instrument's change field.
    pub async fn build_snapshot(&self, limit: usize) -> Result<MarketSnapshot, UpstreamError> {
        let tickers = self.market.fetch_all_tickers().await?;

        let quoted: Vec<TickerRecord> = tickers
            .into_iter()
            .filter(|t| t.symbol.ends_with(&self.quote_asset))
            .collect();

        info!(
            "tickers fetched: {} instruments quoted in {}",
            quoted.len(),
            self.quote_asset
        );

        let metadata = self.metadata.fetch_metadata().await;
        if metadata.is_empty() {
            warn!("no metadata available; cap/supply fields will be unavailable");
        }

        let mut joined: Vec<JoinedInstrument> = quoted
            .into_iter()
            .map(|ticker| self.join_metadata(ticker, &metadata))
            .collect();

        sort_by_market_cap(&mut joined);
        joined.truncate(limit);

        let mut instruments = Vec::with_capacity(joined.len());

        for (i, inst) in joined.into_iter().enumerate() {
            if i > 0 {
                // Pause between instruments to stay inside the
                // upstream rate limit.
                sleep(self.pace_delay).await;
            }

            let change_1h = self.fetch_change(&inst.ticker.symbol, "1h", 2, 1).await;
            sleep(self.pace_delay).await;
            let change_7d = self.fetch_change(&inst.ticker.symbol, "1d", 8, 7).await;

            instruments.push(InstrumentSnapshot {
                position: (i + 1) as u32,
                symbol: inst.ticker.symbol,
                base_asset: inst.base_asset,
                name: inst.name,
                last_price: inst.ticker.last_price,
                change_1h,
                change_24h: inst.ticker.change_24h,
                change_7d,
                quote_volume_24h: inst.ticker.quote_volume_24h,
                market_cap: inst.market_cap,
                circulating_supply: inst.circulating_supply,
            });
        }

        Ok(MarketSnapshot {
            instruments,
            limit,
            generated_at: chrono::Utc::now(),
        })
    }

    fn join_metadata(
        &self,
        ticker: TickerRecord,
        metadata: &std::collections::HashMap<String, MetadataRecord>,
    ) -> JoinedInstrument {
        let base_asset = ticker
            .symbol
            .strip_suffix(&self.quote_asset)
            .unwrap_or(&ticker.symbol)
            .to_string();

        match metadata.get(&base_asset) {
            Some(meta) => JoinedInstrument {
                name: meta.name.clone(),
                market_cap: meta.market_cap,
                circulating_supply: meta.circulating_supply,
                base_asset,
                ticker,
            },
            None => JoinedInstrument {
                name: base_asset.clone(),
                market_cap: None,
                circulating_supply: None,
                base_asset,
                ticker,
            },
        }
    }

    /// Percent change from a fresh candle series. Per-instrument
    /// isolation: a failed fetch degrades to 0.0, same as the short-
    /// series fallback, and never aborts the batch.
    async fn fetch_change(&self, symbol: &str, interval: &str, count: u32, lookback: usize) -> f64 {
        match self.market.fetch_candles(symbol, interval, count).await {
            Ok(candles) => percent_change(&candles, lookback),
            Err(e) => {
                debug!("candle fetch failed for {symbol} ({interval}): {e}");
                0.0
            }
        }
    }
}

/// Market cap descending, unavailable caps after all known values,
/// ties broken by symbol ascending so ordering is deterministic
/// across refreshes.
fn sort_by_market_cap(instruments: &mut [JoinedInstrument]) {
    instruments.sort_by(|a, b| match (a.market_cap, b.market_cap) {
        (Some(x), Some(y)) => y
            .partial_cmp(&x)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.ticker.symbol.cmp(&b.ticker.symbol)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.ticker.symbol.cmp(&b.ticker.symbol),
    });
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::Candle;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    pub(crate) fn ticker(symbol: &str, price: f64) -> TickerRecord {
        TickerRecord {
            symbol: symbol.to_string(),
            last_price: price,
            change_24h: 1.0,
            quote_volume_24h: 1_000_000.0,
        }
    }

    pub(crate) fn candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .map(|&close| Candle {
                open_time: Utc::now(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            })
            .collect()
    }

    /// Stub primary source with canned tickers and candles.
    pub(crate) struct StubMarket {
        pub tickers: Result<Vec<TickerRecord>, UpstreamError>,
        pub hourly: HashMap<String, Vec<Candle>>,
        pub daily: HashMap<String, Vec<Candle>>,
        pub candle_calls: AtomicUsize,
    }

    impl StubMarket {
        pub(crate) fn with_tickers(tickers: Vec<TickerRecord>) -> Self {
            Self {
                tickers: Ok(tickers),
                hourly: HashMap::new(),
                daily: HashMap::new(),
                candle_calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing(err: UpstreamError) -> Self {
            Self {
                tickers: Err(err),
                hourly: HashMap::new(),
                daily: HashMap::new(),
                candle_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MarketDataSource for StubMarket {
        async fn fetch_all_tickers(&self) -> Result<Vec<TickerRecord>, UpstreamError> {
            match &self.tickers {
                Ok(v) => Ok(v.clone()),
                Err(UpstreamError::Unavailable(msg)) => {
                    Err(UpstreamError::Unavailable(msg.clone()))
                }
                Err(UpstreamError::RateLimited) => Err(UpstreamError::RateLimited),
                Err(UpstreamError::Malformed(msg)) => Err(UpstreamError::Malformed(msg.clone())),
            }
        }

        async fn fetch_candles(
            &self,
            symbol: &str,
            interval: &str,
            _count: u32,
        ) -> Result<Vec<Candle>, UpstreamError> {
            self.candle_calls.fetch_add(1, AtomicOrdering::SeqCst);
            let table = if interval == "1h" { &self.hourly } else { &self.daily };
            table
                .get(symbol)
                .cloned()
                .ok_or_else(|| UpstreamError::Unavailable(format!("no candles for {symbol}")))
        }
    }

    pub(crate) struct StubMetadata {
        pub records: HashMap<String, MetadataRecord>,
    }

    impl StubMetadata {
        pub(crate) fn empty() -> Self {
            Self {
                records: HashMap::new(),
            }
        }

        pub(crate) fn with(records: &[(&str, &str, Option<f64>, Option<f64>)]) -> Self {
            let records = records
                .iter()
                .map(|(ticker, name, cap, supply)| {
                    (
                        ticker.to_string(),
                        MetadataRecord {
                            name: name.to_string(),
                            market_cap: *cap,
                            circulating_supply: *supply,
                        },
                    )
                })
                .collect();
            Self { records }
        }
    }

    #[async_trait]
    impl MetadataSource for StubMetadata {
        async fn fetch_metadata(&self) -> HashMap<String, MetadataRecord> {
            self.records.clone()
        }
    }

    pub(crate) fn pipeline(
        market: Arc<dyn MarketDataSource>,
        metadata: Arc<dyn MetadataSource>,
    ) -> AggregationPipeline {
        AggregationPipeline::new(market, metadata, "USDT", Duration::ZERO)
    }

    #[tokio::test]
    async fn filters_to_quote_asset_and_ranks_by_market_cap() {
        let market = Arc::new(StubMarket::with_tickers(vec![
            ticker("ETHUSDT", 2000.0),
            ticker("BTCUSDT", 50000.0),
            ticker("BTCEUR", 46000.0),
            ticker("DOGEUSDT", 0.1),
        ]));
        let metadata = Arc::new(StubMetadata::with(&[
            ("BTC", "Bitcoin", Some(1e12), Some(19e6)),
            ("ETH", "Ethereum", Some(4e11), Some(120e6)),
        ]));

        let snapshot = pipeline(market, metadata).build_snapshot(10).await.unwrap();

        let symbols: Vec<&str> = snapshot
            .instruments
            .iter()
            .map(|i| i.symbol.as_str())
            .collect();
        // EUR pair filtered out; unavailable-cap DOGE sorts last.
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT", "DOGEUSDT"]);
        assert_eq!(snapshot.instruments[0].position, 1);
        assert_eq!(snapshot.instruments[2].position, 3);
        assert_eq!(snapshot.instruments[0].name, "Bitcoin");
    }

    #[tokio::test]
    async fn truncates_to_limit() {
        let market = Arc::new(StubMarket::with_tickers(vec![
            ticker("AUSDT", 1.0),
            ticker("BUSDT", 1.0),
            ticker("CUSDT", 1.0),
        ]));
        let snapshot = pipeline(market, Arc::new(StubMetadata::empty()))
            .build_snapshot(2)
            .await
            .unwrap();

        assert_eq!(snapshot.instruments.len(), 2);
        assert_eq!(snapshot.limit, 2);
    }

    #[tokio::test]
    async fn equal_caps_break_ties_by_symbol() {
        let market = Arc::new(StubMarket::with_tickers(vec![
            ticker("ZZZUSDT", 1.0),
            ticker("AAAUSDT", 1.0),
            ticker("MMMUSDT", 1.0),
        ]));
        let metadata = Arc::new(StubMetadata::with(&[
            ("ZZZ", "Zed", Some(5e9), None),
            ("AAA", "Aye", Some(5e9), None),
            ("MMM", "Em", Some(5e9), None),
        ]));

        let snapshot = pipeline(market, metadata).build_snapshot(10).await.unwrap();
        let symbols: Vec<&str> = snapshot
            .instruments
            .iter()
            .map(|i| i.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["AAAUSDT", "MMMUSDT", "ZZZUSDT"]);
    }

    #[tokio::test]
    async fn missing_metadata_falls_back_to_base_ticker() {
        let market = Arc::new(StubMarket::with_tickers(vec![ticker("XYZUSDT", 3.0)]));
        let snapshot = pipeline(market, Arc::new(StubMetadata::empty()))
            .build_snapshot(5)
            .await
            .unwrap();

        let inst = &snapshot.instruments[0];
        assert_eq!(inst.name, "XYZ");
        assert_eq!(inst.base_asset, "XYZ");
        assert_eq!(inst.market_cap, None);
        assert_eq!(inst.circulating_supply, None);
    }

    #[tokio::test]
    async fn candle_failure_zeroes_only_that_field() {
        let mut market = StubMarket::with_tickers(vec![ticker("BTCUSDT", 50000.0)]);
        // 1h series present, daily series missing.
        market
            .hourly
            .insert("BTCUSDT".to_string(), candles(&[100.0, 110.0]));
        let snapshot = pipeline(Arc::new(market), Arc::new(StubMetadata::empty()))
            .build_snapshot(5)
            .await
            .unwrap();

        let inst = &snapshot.instruments[0];
        assert_eq!(inst.change_1h, 10.0);
        assert_eq!(inst.change_7d, 0.0);
        assert_eq!(inst.change_24h, 1.0); // from the ticker, untouched
    }

    #[tokio::test]
    async fn computes_7d_change_from_daily_series() {
        let mut market = StubMarket::with_tickers(vec![ticker("ETHUSDT", 2000.0)]);
        market
            .hourly
            .insert("ETHUSDT".to_string(), candles(&[200.0, 190.0]));
        market.daily.insert(
            "ETHUSDT".to_string(),
            candles(&[100.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 125.0]),
        );
        let snapshot = pipeline(Arc::new(market), Arc::new(StubMetadata::empty()))
            .build_snapshot(5)
            .await
            .unwrap();

        let inst = &snapshot.instruments[0];
        assert_eq!(inst.change_1h, -5.0);
        assert_eq!(inst.change_7d, 25.0);
    }

    #[tokio::test]
    async fn fetches_two_candle_series_per_instrument() {
        let market = Arc::new(StubMarket::with_tickers(vec![
            ticker("AUSDT", 1.0),
            ticker("BUSDT", 1.0),
        ]));
        pipeline(market.clone(), Arc::new(StubMetadata::empty()))
            .build_snapshot(10)
            .await
            .unwrap();

        assert_eq!(market.candle_calls.load(AtomicOrdering::SeqCst), 4);
    }

    #[tokio::test]
    async fn ticker_failure_aborts_the_cycle() {
        let market = Arc::new(StubMarket::failing(UpstreamError::Unavailable(
            "connection refused".into(),
        )));
        let err = pipeline(market, Arc::new(StubMetadata::empty()))
            .build_snapshot(5)
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Unavailable(_)));
    }
}
