//! Configuration management for PriceScope
//!
//! Layered: built-in defaults, optional `config/default` and `config/local`
//! files, then `PRICESCOPE__*` environment variables (via .env too).

use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::aggregator::ScanSettings;
use crate::sources::{BinanceConfig, CoinGeckoConfig, PairFilter};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub market: MarketConfig,
    pub sources: SourcesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live of every adapter cache entry, in seconds
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// CoinGecko ids making up the coin universe
    pub supported_coins: Vec<String>,
    /// Quote asset for spot pairs (USDT)
    pub quote_asset: String,
    /// Tickers kept per coin detail
    pub top_exchanges: usize,
    /// Entries kept from the exchange directory
    pub top_listing: usize,
    /// Optional coin id -> ticker table. When set, spot pairs are matched
    /// exactly against these symbols instead of by id prefix.
    #[serde(default)]
    pub coin_symbols: HashMap<String, String>,
    /// Threshold used by the arbitrage endpoint when none is given
    pub default_min_percentage: f64,
    /// Coins compared at once during an arbitrage scan
    pub scan_concurrency: usize,
    /// Per-coin comparison timeout during a scan
    pub scan_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub coingecko_url: String,
    pub binance_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Filter directive used when RUST_LOG is unset
    pub filter: String,
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Self::defaults()?
            // Plain PORT / CACHE_TTL are honored for container platforms
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .set_override_option("cache.ttl_secs", std::env::var("CACHE_TTL").ok())?
            // Load config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (PRICESCOPE__*)
            .add_source(
                Environment::with_prefix("PRICESCOPE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("market.supported_coins")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Builder preloaded with every default
    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let builder = Config::builder()
            // Server defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 4000)?
            // Cache defaults
            .set_default("cache.ttl_secs", 60)?
            // Market defaults
            .set_default(
                "market.supported_coins",
                vec![
                    "bitcoin",
                    "ethereum",
                    "ripple",
                    "litecoin",
                    "cardano",
                    "polkadot",
                    "chainlink",
                ],
            )?
            .set_default("market.quote_asset", "USDT")?
            .set_default("market.top_exchanges", 10)?
            .set_default("market.top_listing", 20)?
            .set_default(
                "market.default_min_percentage",
                crate::aggregator::DEFAULT_MIN_PERCENTAGE,
            )?
            .set_default("market.scan_concurrency", 4)?
            .set_default("market.scan_timeout_ms", 5000)?
            // Source defaults
            .set_default("sources.coingecko_url", crate::sources::COINGECKO_URL)?
            .set_default("sources.binance_url", crate::sources::BINANCE_URL)?
            .set_default("sources.request_timeout_secs", 10)?
            .set_default(
                "sources.user_agent",
                concat!("pricescope/", env!("CARGO_PKG_VERSION")),
            )?
            // Logging defaults
            .set_default("logging.json", false)?
            .set_default("logging.filter", "pricescope=info,tower_http=info")?;

        Ok(builder)
    }

    /// Reject settings the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.market.supported_coins.is_empty() {
            bail!("market.supported_coins must list at least one coin id");
        }
        if let Some(bad) = self
            .market
            .supported_coins
            .iter()
            .find(|id| crate::sources::validate_coin_id(id).is_err())
        {
            bail!("market.supported_coins contains an invalid coin id: '{}'", bad);
        }
        if self.market.quote_asset.trim().is_empty() {
            bail!("market.quote_asset must not be empty");
        }
        if self.cache.ttl_secs == 0 {
            bail!("cache.ttl_secs must be greater than zero");
        }
        if self.market.top_exchanges == 0 || self.market.top_listing == 0 {
            bail!("market.top_exchanges and market.top_listing must be greater than zero");
        }
        if self.market.scan_concurrency == 0 {
            bail!("market.scan_concurrency must be greater than zero");
        }
        if self.market.scan_timeout_ms == 0 || self.sources.request_timeout_secs == 0 {
            bail!("timeouts must be greater than zero");
        }
        let min = self.market.default_min_percentage;
        if !min.is_finite() || min < 0.0 {
            bail!("market.default_min_percentage must be a non-negative number");
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sources.request_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Spot pair filter: exact symbols if a table is configured, id prefixes otherwise
    pub fn pair_filter(&self) -> PairFilter {
        if self.market.coin_symbols.is_empty() {
            PairFilter::prefix(&self.market.quote_asset, &self.market.supported_coins)
        } else {
            PairFilter::explicit(&self.market.quote_asset, self.market.coin_symbols.values())
        }
    }

    pub fn coingecko_config(&self) -> CoinGeckoConfig {
        CoinGeckoConfig {
            base_url: self.sources.coingecko_url.clone(),
            supported_coins: self.market.supported_coins.clone(),
            top_exchanges: self.market.top_exchanges,
            top_listing: self.market.top_listing,
            cache_ttl: self.cache_ttl(),
        }
    }

    pub fn binance_config(&self) -> BinanceConfig {
        BinanceConfig {
            base_url: self.sources.binance_url.clone(),
            pair_filter: self.pair_filter(),
            cache_ttl: self.cache_ttl(),
        }
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            concurrency: self.market.scan_concurrency,
            per_coin_timeout: Duration::from_millis(self.market.scan_timeout_ms),
        }
    }

    /// Generate a one-line digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "addr={} coins={} quote={} ttl={}s scan={}x{}ms symbols={}",
            self.bind_addr(),
            self.market.supported_coins.len(),
            self.market.quote_asset,
            self.cache.ttl_secs,
            self.market.scan_concurrency,
            self.market.scan_timeout_ms,
            if self.market.coin_symbols.is_empty() {
                "prefix"
            } else {
                "explicit"
            }
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
