use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::coordinator::RefreshCoordinator;
use crate::format::{format_magnitude, format_magnitude_opt, format_percent, format_price};
use crate::model::InstrumentSnapshot;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RefreshCoordinator>,
    pub config: Config,
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn snapshot_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state
        .coordinator
        .store()
        .latest()
        .await
        .map(|s| (*s).clone());
    Json(snapshot)
}

async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.coordinator.status().await;
    Json(serde_json::json!({
        "refreshing": state.coordinator.store().is_refreshing(),
        "state": status.state,
        "lastError": status.last_error,
        "lastSuccess": status.last_success,
    }))
}

/// One presentation-ready table row with the formatting contracts
/// applied; consumed by renderers that do not format themselves.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TableRow {
    position: u32,
    name: String,
    price: String,
    change_1h: String,
    change_24h: String,
    change_7d: String,
    volume_24h: String,
    market_cap: String,
    circulating_supply: String,
}

impl From<&InstrumentSnapshot> for TableRow {
    fn from(inst: &InstrumentSnapshot) -> Self {
        Self {
            position: inst.position,
            name: format!("{} ({})", inst.name, inst.base_asset),
            price: format_price(inst.last_price),
            change_1h: format_percent(inst.change_1h),
            change_24h: format_percent(inst.change_24h),
            change_7d: format_percent(inst.change_7d),
            volume_24h: format_magnitude(inst.quote_volume_24h),
            market_cap: format_magnitude_opt(inst.market_cap),
            circulating_supply: format_magnitude_opt(inst.circulating_supply),
        }
    }
}

async fn table_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rows: Vec<TableRow> = match state.coordinator.store().latest().await {
        Some(snapshot) => snapshot.instruments.iter().map(TableRow::from).collect(),
        None => Vec::new(),
    };
    Json(rows)
}

#[derive(Debug, Deserialize)]
struct RefreshParams {
    limit: Option<usize>,
}

async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RefreshParams>,
) -> impl IntoResponse {
    let limit = params
        .limit
        .unwrap_or(state.config.default_limit)
        .min(state.config.max_limit);
    let started = state.coordinator.request_refresh(limit).await;
    Json(serde_json::json!({ "started": started, "limit": limit }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/snapshot", get(snapshot_handler))
        .route("/table", get(table_handler))
        .route("/status", get(status_handler))
        .route("/refresh", post(refresh_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, port: u16) -> eyre::Result<()> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(position: u32) -> InstrumentSnapshot {
        InstrumentSnapshot {
            position,
            symbol: "BTCUSDT".to_string(),
            base_asset: "BTC".to_string(),
            name: "Bitcoin".to_string(),
            last_price: 50_000.0,
            change_1h: 0.5,
            change_24h: -2.345,
            change_7d: 10.0,
            quote_volume_24h: 1_500_000_000.0,
            market_cap: Some(985_000_000_000.0),
            circulating_supply: None,
        }
    }

    #[test]
    fn table_row_applies_formatting_contracts() {
        let row = TableRow::from(&inst(1));
        assert_eq!(row.name, "Bitcoin (BTC)");
        assert_eq!(row.price, "$50,000.00");
        assert_eq!(row.change_1h, "+0.50%");
        assert_eq!(row.change_24h, "-2.35%");
        assert_eq!(row.volume_24h, "$1.50B");
        assert_eq!(row.market_cap, "$985.00B");
        assert_eq!(row.circulating_supply, "N/A");
    }
}
