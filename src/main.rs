//! PriceScope HTTP server

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pricescope::api::{create_router, AppState};
use pricescope::config::{AppConfig, LoggingConfig};
use pricescope::sources::{BinanceClient, CoinGeckoClient, HttpTransport, TickerSource};
use pricescope::MarketAggregator;

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("🛑 Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging);
    config.validate().context("Invalid configuration")?;

    tracing::info!(config = %config, "🚀 PriceScope starting");

    let transport = Arc::new(HttpTransport::new(
        config.request_timeout(),
        &config.sources.user_agent,
    )?);
    let gecko = Arc::new(CoinGeckoClient::new(
        transport.clone(),
        config.coingecko_config(),
    ));
    let binance: Arc<dyn TickerSource> =
        Arc::new(BinanceClient::new(transport, config.binance_config()));

    let aggregator = Arc::new(MarketAggregator::new(
        gecko,
        vec![binance],
        config.scan_settings(),
    ));
    let state = AppState::new(aggregator, config.market.default_min_percentage)
        .with_coin_symbols(config.market.coin_symbols.clone());
    let app = create_router(Arc::new(state));

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "🌐 API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}
