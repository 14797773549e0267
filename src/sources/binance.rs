//! Binance spot REST client
//!
//! Flat `/ticker/price` listing filtered down to the coin universe, plus
//! the 24h ticker used as the authoritative spot quote for one symbol.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::{validate_symbol, JsonTransport, PairFilter, PriceSource, TickerSource};
use crate::cache::{TtlCache, DEFAULT_TTL};
use crate::error::{FetchError, MarketError};
use crate::types::PricePoint;

pub const BINANCE_URL: &str = "https://api.binance.com/api/v3";
const SOURCE: &str = "Binance";
const PRICES_CACHE_KEY: &str = "binance_prices";
/// Binance error code for an unknown trading pair
const INVALID_SYMBOL_CODE: &str = "-1121";

#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub base_url: String,
    pub pair_filter: PairFilter,
    pub cache_ttl: Duration,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: BINANCE_URL.to_string(),
            pair_filter: PairFilter::prefix("USDT", &["bitcoin".to_string(), "ethereum".to_string()]),
            cache_ttl: DEFAULT_TTL,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    last_price: String,
    volume: Option<String>,
}

fn parse_number(field: &str, raw: &str) -> Result<f64, MarketError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| MarketError::parse(SOURCE, format!("{} is not a number: '{}'", field, raw)))
}

pub struct BinanceClient {
    transport: Arc<dyn JsonTransport>,
    config: BinanceConfig,
    prices_cache: TtlCache<Vec<PricePoint>>,
    ticker_cache: TtlCache<PricePoint>,
}

impl BinanceClient {
    pub fn new(transport: Arc<dyn JsonTransport>, config: BinanceConfig) -> Self {
        let ttl = config.cache_ttl;
        Self {
            transport,
            config,
            prices_cache: TtlCache::new(ttl),
            ticker_cache: TtlCache::new(ttl),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn quote(&self) -> &str {
        self.config.pair_filter.quote()
    }
}

#[async_trait]
impl PriceSource for BinanceClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_all_prices(&self) -> Result<Vec<PricePoint>, MarketError> {
        if let Some(cached) = self.prices_cache.get(PRICES_CACHE_KEY).await {
            tracing::debug!(source = %SOURCE, "Price listing served from cache");
            return Ok(cached);
        }

        tracing::info!(source = %SOURCE, "📥 Fetching spot price listing...");
        let body = self
            .transport
            .get_json(&self.url("/ticker/price"), &[])
            .await
            .map_err(|e| MarketError::from_fetch(SOURCE, e))?;

        let tickers: Vec<TickerPrice> =
            serde_json::from_value(body).map_err(|e| MarketError::parse(SOURCE, e))?;
        let fetched_at = Utc::now();
        let quote = self.quote();

        let mut prices = Vec::new();
        for ticker in &tickers {
            let Some(base) = self.config.pair_filter.base_asset(&ticker.symbol) else {
                continue;
            };
            let price = parse_number("price", &ticker.price)?;
            prices.push(PricePoint {
                symbol: base.to_uppercase(),
                exchange: SOURCE.to_string(),
                price,
                pair: format!("{}/{}", base.to_uppercase(), quote),
                volume_24h: None,
                trust_score: None,
                last_updated: fetched_at,
            });
        }

        tracing::debug!(
            source = %SOURCE,
            listed = tickers.len(),
            relevant = prices.len(),
            "✅ Spot prices filtered"
        );

        self.prices_cache.set(PRICES_CACHE_KEY, prices.clone()).await;
        Ok(prices)
    }
}

#[async_trait]
impl TickerSource for BinanceClient {
    async fn fetch_coin_ticker(&self, symbol: &str) -> Result<PricePoint, MarketError> {
        validate_symbol(symbol)?;
        let symbol = symbol.to_uppercase();
        let cache_key = format!("binance_{}", symbol);
        if let Some(cached) = self.ticker_cache.get(&cache_key).await {
            return Ok(cached);
        }

        let pair = format!("{}{}", symbol, self.quote());
        let body = self
            .transport
            .get_json(
                &self.url("/ticker/24hr"),
                &[("symbol".to_string(), pair.clone())],
            )
            .await
            .map_err(|e| match e {
                FetchError::Status { status: 404, .. } => {
                    MarketError::NotFound(format!("Trading pair {} not found on {}", pair, SOURCE))
                }
                FetchError::Status { status: 400, ref body } if body.contains(INVALID_SYMBOL_CODE) => {
                    MarketError::NotFound(format!("Trading pair {} not found on {}", pair, SOURCE))
                }
                other => MarketError::from_fetch(SOURCE, other),
            })?;

        let ticker: Ticker24h =
            serde_json::from_value(body).map_err(|e| MarketError::parse(SOURCE, e))?;
        let price = parse_number("lastPrice", &ticker.last_price)?;
        let volume_24h = ticker
            .volume
            .as_deref()
            .map(|v| parse_number("volume", v))
            .transpose()?;

        tracing::debug!(source = %SOURCE, pair = %ticker.symbol, price, "Spot ticker fetched");

        let point = PricePoint {
            symbol: symbol.clone(),
            exchange: SOURCE.to_string(),
            price,
            pair: format!("{}/{}", symbol, self.quote()),
            volume_24h,
            trust_score: None,
            last_updated: Utc::now(),
        };

        self.ticker_cache.set(cache_key, point.clone()).await;
        Ok(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockJsonTransport;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn client(mock: MockJsonTransport) -> BinanceClient {
        BinanceClient::new(Arc::new(mock), BinanceConfig::default())
    }

    fn ticker_24h(last_price: &str) -> serde_json::Value {
        json!({
            "symbol": "BTCUSDT",
            "lastPrice": last_price,
            "priceChangePercent": "1.2",
            "highPrice": "50900.00",
            "lowPrice": "48700.00",
            "volume": "1234.5"
        })
    }

    #[tokio::test]
    async fn test_ticker_parses_numeric_strings() {
        let mut mock = MockJsonTransport::new();
        mock.expect_get_json()
            .withf(|url, query| {
                url.ends_with("/ticker/24hr")
                    && query.len() == 1
                    && query[0].0 == "symbol"
                    && query[0].1 == "BTCUSDT"
            })
            .times(1)
            .returning(|_, _| Ok(ticker_24h("49800.00")));

        let point = assert_ok!(client(mock).fetch_coin_ticker("btc").await);
        assert_eq!(point.symbol, "BTC");
        assert_eq!(point.price, 49800.0);
        assert_eq!(point.pair, "BTC/USDT");
        assert_eq!(point.volume_24h, Some(1234.5));
        assert_eq!(point.exchange, "Binance");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_cache_expires() {
        let mut mock = MockJsonTransport::new();
        mock.expect_get_json()
            .times(2)
            .returning(|_, _| Ok(ticker_24h("49800.00")));

        let binance = client(mock);
        assert_ok!(binance.fetch_coin_ticker("BTC").await);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_ok!(binance.fetch_coin_ticker("btc").await);
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_ok!(binance.fetch_coin_ticker("BTC").await);
    }

    #[tokio::test]
    async fn test_invalid_symbol_code_is_not_found() {
        let mut mock = MockJsonTransport::new();
        mock.expect_get_json().returning(|_, _| {
            Err(FetchError::Status {
                status: 400,
                body: r#"{"code":-1121,"msg":"Invalid symbol."}"#.to_string(),
            })
        });

        let err = assert_err!(client(mock).fetch_coin_ticker("XYZ").await);
        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_other_failures_are_upstream() {
        let mut mock = MockJsonTransport::new();
        mock.expect_get_json()
            .returning(|_, _| Err(FetchError::Network("connection reset".to_string())));

        let err = assert_err!(client(mock).fetch_coin_ticker("BTC").await);
        assert_eq!(err.kind(), "upstream");
    }

    #[tokio::test]
    async fn test_malformed_price_is_parse_error() {
        let mut mock = MockJsonTransport::new();
        mock.expect_get_json()
            .returning(|_, _| Ok(ticker_24h("not-a-price")));

        let err = assert_err!(client(mock).fetch_coin_ticker("BTC").await);
        assert_eq!(err.kind(), "parse");
    }

    #[tokio::test]
    async fn test_price_listing_filtered_by_pair_filter() {
        let mut mock = MockJsonTransport::new();
        mock.expect_get_json()
            .withf(|url, _| url.ends_with("/ticker/price"))
            .times(1)
            .returning(|_, _| {
                Ok(json!([
                    { "symbol": "ETHUSDT", "price": "3000.10" },
                    { "symbol": "ETHBTC", "price": "0.05" },
                    { "symbol": "BTCUSDT", "price": "50000.00" },
                    { "symbol": "BITUSDT", "price": "0.50" },
                    { "symbol": "DOGEUSDT", "price": "0.10" }
                ]))
            });

        let binance = client(mock);
        let prices = assert_ok!(binance.fetch_all_prices().await);
        let pairs: Vec<&str> = prices.iter().map(|p| p.pair.as_str()).collect();
        assert_eq!(pairs, vec!["ETH/USDT", "BIT/USDT"]);
        assert_eq!(prices[0].price, 3000.1);

        // second call is a cache hit
        assert_ok!(binance.fetch_all_prices().await);
    }

    #[tokio::test]
    async fn test_explicit_symbol_table() {
        let mut mock = MockJsonTransport::new();
        mock.expect_get_json().returning(|_, _| {
            Ok(json!([
                { "symbol": "BTCUSDT", "price": "50000.00" },
                { "symbol": "BITUSDT", "price": "0.50" }
            ]))
        });

        let config = BinanceConfig {
            pair_filter: PairFilter::explicit("USDT", ["BTC", "ETH"]),
            ..BinanceConfig::default()
        };
        let prices = assert_ok!(
            BinanceClient::new(Arc::new(mock), config)
                .fetch_all_prices()
                .await
        );
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].symbol, "BTC");
    }
}
