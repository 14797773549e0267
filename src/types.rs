//! Core types used throughout PriceScope
//!
//! Normalized, source-independent shapes for quotes, coin metadata,
//! exchange listings and historical series.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trust rating attached to a quote.
///
/// Sources disagree on the shape (CoinGecko sends "green"/"yellow"/"red",
/// others send a number), so the value is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrustScore {
    Rating(String),
    Numeric(f64),
}

impl TrustScore {
    /// Rating given to quotes from the spot source, which is treated as pre-vetted.
    pub fn green() -> Self {
        TrustScore::Rating("green".to_string())
    }
}

impl fmt::Display for TrustScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustScore::Rating(label) => write!(f, "{}", label),
            TrustScore::Numeric(score) => write!(f, "{}", score),
        }
    }
}

/// One exchange's quote for one coin, in USD-equivalent terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub symbol: String,
    pub exchange: String,
    pub price: f64,
    /// Trading pair label, e.g. "BTC/USDT"
    pub pair: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<TrustScore>,
    pub last_updated: DateTime<Utc>,
}

impl PricePoint {
    /// Whether this quote may take part in ranking.
    pub fn has_valid_price(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Canonical view of a single coin as reported by the metadata source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSnapshot {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    pub market_cap_rank: Option<u32>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub total_volume: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub price_change_24h: Option<f64>,
    pub price_change_7d: Option<f64>,
    pub price_change_30d: Option<f64>,
    /// Top exchange quotes in the order the source delivered them
    pub exchange_prices: Vec<PricePoint>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// One row of the metadata source's bulk market listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSummary {
    pub id: String,
    /// Uppercase ticker; empty when the source did not report one
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub price_change_24h: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Exchange metadata from the metadata source's exchange directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeInfo {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub image: Option<String>,
    pub trust_score: Option<f64>,
    pub trust_score_rank: Option<u32>,
    pub trade_volume_24h_btc: Option<f64>,
}

/// A single (timestamp, price) sample of a historical series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub price: f64,
}
