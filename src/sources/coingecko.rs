//! CoinGecko REST client
//!
//! Rich metadata source: market listing, per-coin detail with its embedded
//! multi-exchange ticker table, the exchange directory and price history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{validate_coin_id, validate_days, JsonTransport, MarketDataSource, PriceSource};
use crate::cache::{TtlCache, DEFAULT_TTL};
use crate::error::{FetchError, MarketError};
use crate::types::{
    CoinSnapshot, CoinSummary, ExchangeInfo, HistoricalPoint, PricePoint, TrustScore,
};

pub const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";
const SOURCE: &str = "CoinGecko";
const VS_CURRENCY: &str = "usd";
const LISTING_CACHE_KEY: &str = "market_listing";
const PRICES_CACHE_KEY: &str = "all_prices";
const EXCHANGES_CACHE_KEY: &str = "exchanges";

#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    pub base_url: String,
    /// Coin ids making up the listing universe
    pub supported_coins: Vec<String>,
    /// Tickers kept per coin detail
    pub top_exchanges: usize,
    /// Entries kept from the exchange directory
    pub top_listing: usize,
    pub cache_ttl: Duration,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: COINGECKO_URL.to_string(),
            supported_coins: vec!["bitcoin".to_string(), "ethereum".to_string()],
            top_exchanges: 10,
            top_listing: 20,
            cache_ttl: DEFAULT_TTL,
        }
    }
}

// ─── Upstream payloads ──────────────────────────────────────────────────────

type CurrencyMap = HashMap<String, Option<f64>>;

#[derive(Debug, Deserialize)]
struct MarketRow {
    id: String,
    symbol: Option<String>,
    name: String,
    image: Option<String>,
    current_price: Option<f64>,
    market_cap: Option<f64>,
    market_cap_rank: Option<u32>,
    price_change_percentage_24h: Option<f64>,
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoinDetail {
    id: String,
    symbol: String,
    name: String,
    image: Option<ImageSet>,
    market_cap_rank: Option<u32>,
    market_data: MarketData,
    tickers: Vec<RawTicker>,
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageSet {
    large: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    current_price: Option<CurrencyMap>,
    market_cap: Option<CurrencyMap>,
    total_volume: Option<CurrencyMap>,
    high_24h: Option<CurrencyMap>,
    low_24h: Option<CurrencyMap>,
    price_change_percentage_24h: Option<f64>,
    price_change_percentage_7d: Option<f64>,
    price_change_percentage_30d: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawTicker {
    base: String,
    target: String,
    market: TickerMarket,
    last: Option<f64>,
    volume: Option<f64>,
    converted_last: Option<CurrencyMap>,
    trust_score: Option<TrustScore>,
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TickerMarket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeRow {
    id: String,
    name: String,
    url: Option<String>,
    image: Option<String>,
    trust_score: Option<f64>,
    trust_score_rank: Option<u32>,
    trade_volume_24h_btc: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<(f64, f64)>,
}

fn usd(map: &Option<CurrencyMap>) -> Option<f64> {
    map.as_ref()?.get(VS_CURRENCY).copied().flatten()
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, MarketError> {
    serde_json::from_value(value).map_err(|e| MarketError::parse(SOURCE, e))
}

fn query(params: &[(&str, &str)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn coin_error(coin_id: &str, err: FetchError) -> MarketError {
    match err {
        FetchError::Status { status: 404, .. } => {
            MarketError::NotFound(format!("Coin '{}' not found", coin_id))
        }
        other => MarketError::from_fetch(SOURCE, other),
    }
}

impl RawTicker {
    /// USD-converted price when CoinGecko provides one, else the raw last trade
    fn into_price_point(self, symbol: &str, fetched_at: DateTime<Utc>) -> PricePoint {
        let price = usd(&self.converted_last)
            .or(self.last)
            .unwrap_or(0.0);
        PricePoint {
            symbol: symbol.to_string(),
            exchange: self.market.name,
            price,
            pair: format!("{}/{}", self.base, self.target),
            volume_24h: self.volume,
            trust_score: self.trust_score,
            last_updated: parse_timestamp(self.timestamp.as_deref()).unwrap_or(fetched_at),
        }
    }
}

// ─── Client ─────────────────────────────────────────────────────────────────

pub struct CoinGeckoClient {
    transport: Arc<dyn JsonTransport>,
    config: CoinGeckoConfig,
    listing_cache: TtlCache<Vec<CoinSummary>>,
    prices_cache: TtlCache<Vec<PricePoint>>,
    detail_cache: TtlCache<CoinSnapshot>,
    exchange_cache: TtlCache<Vec<ExchangeInfo>>,
    history_cache: TtlCache<Vec<HistoricalPoint>>,
}

impl CoinGeckoClient {
    pub fn new(transport: Arc<dyn JsonTransport>, config: CoinGeckoConfig) -> Self {
        let ttl = config.cache_ttl;
        Self {
            transport,
            config,
            listing_cache: TtlCache::new(ttl),
            prices_cache: TtlCache::new(ttl),
            detail_cache: TtlCache::new(ttl),
            exchange_cache: TtlCache::new(ttl),
            history_cache: TtlCache::new(ttl),
        }
    }

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        self.transport.get_json(&url, &query(params)).await
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_all_prices(&self) -> Result<Vec<PricePoint>, MarketError> {
        if let Some(cached) = self.prices_cache.get(PRICES_CACHE_KEY).await {
            tracing::debug!(source = %SOURCE, "Prices served from cache");
            return Ok(cached);
        }

        let listing = self.fetch_market_listing().await?;
        let fetched_at = Utc::now();

        let prices: Vec<PricePoint> = listing
            .into_iter()
            .filter(|coin| !coin.symbol.is_empty())
            .filter_map(|coin| {
                let price = coin.current_price.filter(|p| p.is_finite() && *p > 0.0)?;
                Some(PricePoint {
                    pair: format!("{}/USD", coin.symbol),
                    symbol: coin.symbol,
                    exchange: SOURCE.to_string(),
                    price,
                    volume_24h: None,
                    trust_score: None,
                    last_updated: coin.last_updated.unwrap_or(fetched_at),
                })
            })
            .collect();

        self.prices_cache.set(PRICES_CACHE_KEY, prices.clone()).await;
        Ok(prices)
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn fetch_market_listing(&self) -> Result<Vec<CoinSummary>, MarketError> {
        if let Some(cached) = self.listing_cache.get(LISTING_CACHE_KEY).await {
            tracing::debug!(source = %SOURCE, "Market listing served from cache");
            return Ok(cached);
        }

        let ids = self.config.supported_coins.join(",");
        tracing::info!(source = %SOURCE, coins = self.config.supported_coins.len(), "📥 Fetching market listing...");

        let body = self
            .get(
                "/coins/markets",
                &[
                    ("vs_currency", VS_CURRENCY),
                    ("ids", ids.as_str()),
                    ("order", "market_cap_desc"),
                    ("per_page", "100"),
                    ("page", "1"),
                    ("sparkline", "false"),
                    ("price_change_percentage", "24h"),
                ],
            )
            .await
            .map_err(|e| MarketError::from_fetch(SOURCE, e))?;

        let rows: Vec<MarketRow> = decode(body)?;
        let listing: Vec<CoinSummary> = rows
            .into_iter()
            .map(|row| CoinSummary {
                id: row.id,
                symbol: row.symbol.unwrap_or_default().to_uppercase(),
                name: row.name,
                image: row.image,
                current_price: row.current_price,
                market_cap: row.market_cap,
                market_cap_rank: row.market_cap_rank,
                price_change_24h: row.price_change_percentage_24h,
                last_updated: parse_timestamp(row.last_updated.as_deref()),
            })
            .collect();

        self.listing_cache.set(LISTING_CACHE_KEY, listing.clone()).await;
        Ok(listing)
    }

    async fn fetch_coin_detail(&self, coin_id: &str) -> Result<CoinSnapshot, MarketError> {
        validate_coin_id(coin_id)?;
        let cache_key = format!("coin_{}", coin_id);
        if let Some(cached) = self.detail_cache.get(&cache_key).await {
            tracing::debug!(source = %SOURCE, coin = %coin_id, "Coin detail served from cache");
            return Ok(cached);
        }

        tracing::info!(source = %SOURCE, coin = %coin_id, "📥 Fetching coin detail...");
        let body = self
            .get(
                &format!("/coins/{}", coin_id),
                &[
                    ("localization", "false"),
                    ("tickers", "true"),
                    ("market_data", "true"),
                    ("community_data", "false"),
                    ("developer_data", "false"),
                ],
            )
            .await
            .map_err(|e| coin_error(coin_id, e))?;

        let detail: CoinDetail = decode(body)?;
        let symbol = detail.symbol.to_uppercase();
        let fetched_at = Utc::now();

        let exchange_prices: Vec<PricePoint> = detail
            .tickers
            .into_iter()
            .take(self.config.top_exchanges)
            .map(|ticker| ticker.into_price_point(&symbol, fetched_at))
            .filter(PricePoint::has_valid_price)
            .collect();

        let market = &detail.market_data;
        let snapshot = CoinSnapshot {
            id: detail.id,
            symbol,
            name: detail.name,
            image: detail.image.and_then(|img| img.large),
            market_cap_rank: detail.market_cap_rank,
            current_price: usd(&market.current_price),
            market_cap: usd(&market.market_cap),
            total_volume: usd(&market.total_volume),
            high_24h: usd(&market.high_24h),
            low_24h: usd(&market.low_24h),
            price_change_24h: market.price_change_percentage_24h,
            price_change_7d: market.price_change_percentage_7d,
            price_change_30d: market.price_change_percentage_30d,
            exchange_prices,
            last_updated: parse_timestamp(detail.last_updated.as_deref()),
        };

        tracing::debug!(
            source = %SOURCE,
            coin = %coin_id,
            exchanges = snapshot.exchange_prices.len(),
            "✅ Coin detail fetched"
        );

        self.detail_cache.set(cache_key, snapshot.clone()).await;
        Ok(snapshot)
    }

    async fn fetch_exchanges(&self) -> Result<Vec<ExchangeInfo>, MarketError> {
        if let Some(cached) = self.exchange_cache.get(EXCHANGES_CACHE_KEY).await {
            return Ok(cached);
        }

        tracing::info!(source = %SOURCE, "📥 Fetching exchange directory...");
        let body = self
            .get("/exchanges", &[])
            .await
            .map_err(|e| MarketError::from_fetch(SOURCE, e))?;

        let rows: Vec<ExchangeRow> = decode(body)?;
        let exchanges: Vec<ExchangeInfo> = rows
            .into_iter()
            .take(self.config.top_listing)
            .map(|row| ExchangeInfo {
                id: row.id,
                name: row.name,
                url: row.url,
                image: row.image,
                trust_score: row.trust_score,
                trust_score_rank: row.trust_score_rank,
                trade_volume_24h_btc: row.trade_volume_24h_btc,
            })
            .collect();

        self.exchange_cache
            .set(EXCHANGES_CACHE_KEY, exchanges.clone())
            .await;
        Ok(exchanges)
    }

    async fn fetch_historical(
        &self,
        coin_id: &str,
        days: u32,
    ) -> Result<Vec<HistoricalPoint>, MarketError> {
        validate_coin_id(coin_id)?;
        validate_days(days)?;

        let cache_key = format!("historical_{}_{}", coin_id, days);
        if let Some(cached) = self.history_cache.get(&cache_key).await {
            return Ok(cached);
        }

        tracing::info!(source = %SOURCE, coin = %coin_id, days, "📥 Fetching price history...");
        let days_param = days.to_string();
        let body = self
            .get(
                &format!("/coins/{}/market_chart", coin_id),
                &[("vs_currency", VS_CURRENCY), ("days", days_param.as_str())],
            )
            .await
            .map_err(|e| coin_error(coin_id, e))?;

        let chart: MarketChart = decode(body)?;
        let series: Vec<HistoricalPoint> = chart
            .prices
            .into_iter()
            .map(|(timestamp, price)| HistoricalPoint {
                timestamp: timestamp as i64,
                price,
            })
            .collect();

        self.history_cache.set(cache_key, series.clone()).await;
        Ok(series)
    }
}
