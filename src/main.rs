use std::{sync::Arc, time::Duration};

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use quoteboard::config::Config;
use quoteboard::coordinator::{RefreshCoordinator, SnapshotStore};
use quoteboard::pipeline::AggregationPipeline;
use quoteboard::server::{self, AppState};
use quoteboard::upstream::{BinanceClient, CoinGeckoClient, MarketDataSource, MetadataSource};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv::dotenv().ok();

    // init error reporting
    color_eyre::install()?;

    // init logging
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::from_env();
    info!(
        "starting: limit {} (max {}), refresh every {}s, quote asset {}",
        config.default_limit, config.max_limit, config.refresh_interval_secs, config.quote_asset
    );

    // set up upstream sources
    let market: Arc<dyn MarketDataSource> = Arc::new(BinanceClient::new());
    let metadata: Arc<dyn MetadataSource> = Arc::new(CoinGeckoClient::new());

    let pipeline = AggregationPipeline::new(
        market,
        metadata,
        config.quote_asset.clone(),
        Duration::from_millis(config.pace_delay_ms),
    );

    let store = Arc::new(SnapshotStore::new());
    let coordinator = RefreshCoordinator::new(pipeline, store);

    // initial load, then the recurring timer
    coordinator.request_refresh(config.default_limit).await;
    if config.auto_refresh {
        coordinator
            .start_periodic(
                Duration::from_secs(config.refresh_interval_secs),
                config.default_limit,
            )
            .await;
    }

    let port = config.port;
    let state = Arc::new(AppState {
        coordinator,
        config,
    });

    server::serve(state, port).await?;

    Ok(())
}
