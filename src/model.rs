use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One instrument's current price and 24h statistics, normalized from
/// the primary provider's 24h ticker endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerRecord {
    pub symbol: String,
    pub last_price: f64,
    pub change_24h: f64, // percent
    pub quote_volume_24h: f64,
}

/// One OHLCV time bucket. A series is `Vec<Candle>`, oldest → newest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Secondary-provider record, keyed by upper-case base ticker.
/// `None` means the field is unavailable, which is distinct from zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub name: String,
    pub market_cap: Option<f64>,
    pub circulating_supply: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentSnapshot {
    /// Rank position, 1-based.
    pub position: u32,
    /// Full pair symbol, e.g. "BTCUSDT".
    pub symbol: String,
    /// Symbol with the quote suffix stripped, e.g. "BTC".
    pub base_asset: String,
    pub name: String,
    pub last_price: f64,
    pub change_1h: f64,
    pub change_24h: f64,
    pub change_7d: f64,
    pub quote_volume_24h: f64,
    pub market_cap: Option<f64>,
    pub circulating_supply: Option<f64>,
}

/// Immutable point-in-time view. Replaced wholesale on every refresh,
/// never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub instruments: Vec<InstrumentSnapshot>,
    pub limit: usize,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub state: RefreshState,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
}
