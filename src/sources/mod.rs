//! Upstream price sources (CoinGecko, Binance)
//!
//! Every source normalizes its native payloads into the shapes in
//! [`crate::types`] and keeps its own TTL cache in front of the network.

mod binance;
mod coingecko;
mod http;
mod pairs;

pub use binance::{BinanceClient, BinanceConfig, BINANCE_URL};
pub use coingecko::{CoinGeckoClient, CoinGeckoConfig, COINGECKO_URL};
pub use http::HttpTransport;
pub use pairs::PairFilter;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{FetchError, MarketError};
use crate::types::{CoinSnapshot, CoinSummary, ExchangeInfo, HistoricalPoint, PricePoint};

/// Default window for historical series, in days
pub const DEFAULT_HISTORY_DAYS: u32 = 7;
const MAX_HISTORY_DAYS: u32 = 3650;

/// Raw JSON transport consumed by the sources.
///
/// Implementations only move bytes; attributing failures to a source and
/// deciding what counts as "not found" is the source's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JsonTransport: Send + Sync {
    async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value, FetchError>;
}

/// Anything that can list current prices for the supported coin universe
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Exchange label stamped on every quote from this source
    fn name(&self) -> &'static str;

    /// Current prices for the supported coins, normalized
    async fn fetch_all_prices(&self) -> Result<Vec<PricePoint>, MarketError>;
}

/// Source with full coin metadata and an embedded multi-exchange listing
#[async_trait]
pub trait MarketDataSource: PriceSource {
    /// Bulk market listing of the supported coins (the scan universe)
    async fn fetch_market_listing(&self) -> Result<Vec<CoinSummary>, MarketError>;

    async fn fetch_coin_detail(&self, coin_id: &str) -> Result<CoinSnapshot, MarketError>;

    async fn fetch_exchanges(&self) -> Result<Vec<ExchangeInfo>, MarketError>;

    async fn fetch_historical(
        &self,
        coin_id: &str,
        days: u32,
    ) -> Result<Vec<HistoricalPoint>, MarketError>;
}

/// Source with a single authoritative ticker per symbol
#[async_trait]
pub trait TickerSource: PriceSource {
    async fn fetch_coin_ticker(&self, symbol: &str) -> Result<PricePoint, MarketError>;
}

/// Coin ids are path segments upstream: lowercase ascii, digits and dashes.
pub fn validate_coin_id(coin_id: &str) -> Result<(), MarketError> {
    let valid = !coin_id.is_empty()
        && coin_id.len() <= 100
        && coin_id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(MarketError::Validation(format!(
            "Invalid coin id '{}': expected lowercase letters, digits or '-'",
            coin_id
        )))
    }
}

pub fn validate_symbol(symbol: &str) -> Result<(), MarketError> {
    let valid =
        !symbol.is_empty() && symbol.len() <= 20 && symbol.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(MarketError::Validation(format!(
            "Invalid symbol '{}': expected 1-20 alphanumeric characters",
            symbol
        )))
    }
}

pub fn validate_days(days: u32) -> Result<(), MarketError> {
    if (1..=MAX_HISTORY_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(MarketError::Validation(format!(
            "days must be between 1 and {}",
            MAX_HISTORY_DAYS
        )))
    }
}
