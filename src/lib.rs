//! PriceScope Library
//!
//! Cross-exchange crypto price aggregation: cached CoinGecko and Binance
//! adapters, price comparison and arbitrage scanning

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod sources;
pub mod types;

#[cfg(feature = "server")]
pub mod api;

pub use aggregator::MarketAggregator;
pub use error::{FetchError, MarketError};
