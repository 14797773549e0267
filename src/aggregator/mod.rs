//! Market aggregation across price sources
//!
//! Merges the rich source's multi-exchange listing with spot tickers,
//! ranks exchanges by price and scans the coin universe for spreads.

mod comparison;

pub use comparison::{
    rank_opportunities, round2, ArbitrageOpportunity, MarketComparison, PriceComparison,
    PriceExtreme, UNKNOWN_EXCHANGE,
};

use futures_util::future::{join_all, try_join_all, BoxFuture};
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::MarketError;
use crate::sources::{MarketDataSource, PriceSource, TickerSource};
use crate::types::{PricePoint, TrustScore};

/// Default arbitrage threshold, in percent
pub const DEFAULT_MIN_PERCENTAGE: f64 = 1.0;

/// Bounds on an arbitrage scan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSettings {
    /// Coins compared at once
    pub concurrency: usize,
    /// Budget for a single coin's comparison
    pub per_coin_timeout: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            per_coin_timeout: Duration::from_secs(5),
        }
    }
}

pub struct MarketAggregator {
    rich: Arc<dyn MarketDataSource>,
    spot: Vec<Arc<dyn TickerSource>>,
    scan: ScanSettings,
}

impl MarketAggregator {
    pub fn new(
        rich: Arc<dyn MarketDataSource>,
        spot: Vec<Arc<dyn TickerSource>>,
        scan: ScanSettings,
    ) -> Self {
        Self { rich, spot, scan }
    }

    /// The metadata source, for callers that need its raw listings
    pub fn rich(&self) -> &Arc<dyn MarketDataSource> {
        &self.rich
    }

    /// Compare one coin across every known exchange.
    ///
    /// The rich detail and all spot tickers are fetched concurrently. A rich
    /// failure aborts the comparison with the same error; a spot failure only
    /// drops that exchange. Spot quotes are marked with a "green" trust score.
    /// The comparison is labelled with the requested `symbol`, uppercased.
    pub async fn compare_market(
        &self,
        coin_id: &str,
        symbol: &str,
    ) -> Result<MarketComparison, MarketError> {
        let spot_quotes = async {
            let fetches = self.spot.iter().map(|source| async move {
                (source.name(), source.fetch_coin_ticker(symbol).await)
            });
            Ok::<_, MarketError>(join_all(fetches).await)
        };

        let (snapshot, spot_results) =
            tokio::try_join!(self.rich.fetch_coin_detail(coin_id), spot_quotes)?;

        let mut quotes = snapshot.exchange_prices;
        for (source, result) in spot_results {
            match result {
                Ok(mut quote) => {
                    quote.trust_score = Some(TrustScore::green());
                    quotes.push(quote);
                }
                Err(e) => {
                    tracing::warn!(
                        source = %source,
                        coin = %coin_id,
                        symbol = %symbol,
                        error = %e,
                        "⚠️ Spot quote unavailable, comparing without it"
                    );
                }
            }
        }

        Ok(MarketComparison::from_quotes(
            snapshot.id,
            symbol,
            snapshot.name,
            quotes,
        ))
    }

    /// Scan the coin universe for spreads of at least `min_percentage`.
    ///
    /// The universe is the rich source's market listing; failing to load it
    /// is fatal. Coins without a symbol, failed comparisons and comparisons
    /// exceeding the per-coin timeout are logged and skipped. Results are
    /// ordered by spread, widest first; equal spreads keep listing order.
    pub async fn find_arbitrage_opportunities(
        &self,
        min_percentage: f64,
    ) -> Result<Vec<ArbitrageOpportunity>, MarketError> {
        if !min_percentage.is_finite() || min_percentage < 0.0 {
            return Err(MarketError::Validation(format!(
                "minPercentage must be a non-negative number, got {}",
                min_percentage
            )));
        }

        let listing = self.rich.fetch_market_listing().await?;
        let universe = listing.len();
        let candidates: Vec<_> = listing
            .into_iter()
            .filter(|coin| {
                if coin.symbol.is_empty() {
                    tracing::warn!(coin = %coin.id, "Skipping coin without a symbol");
                    return false;
                }
                true
            })
            .enumerate()
            .collect();

        let timeout = self.scan.per_coin_timeout;
        let mut comparisons: Vec<(usize, MarketComparison)> = stream::iter(candidates)
            .map(move |(index, coin)| async move {
                let outcome =
                    tokio::time::timeout(timeout, self.compare_market(&coin.id, &coin.symbol))
                        .await;
                match outcome {
                    Ok(Ok(comparison)) => Some((index, comparison)),
                    Ok(Err(e)) => {
                        tracing::warn!(coin = %coin.id, error = %e, "Skipping coin in arbitrage scan");
                        None
                    }
                    Err(_) => {
                        tracing::warn!(
                            coin = %coin.id,
                            timeout_ms = timeout.as_millis() as u64,
                            "Skipping coin in arbitrage scan: comparison timed out"
                        );
                        None
                    }
                }
            })
            .buffer_unordered(self.scan.concurrency.max(1))
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await;

        comparisons.sort_by_key(|(index, _)| *index);

        let mut opportunities: Vec<ArbitrageOpportunity> = comparisons
            .iter()
            .filter(|(_, c)| c.difference_percentage() >= min_percentage)
            .map(|(_, c)| c.to_opportunity())
            .collect();
        rank_opportunities(&mut opportunities);

        tracing::info!(
            universe,
            compared = comparisons.len(),
            found = opportunities.len(),
            min_percentage,
            "🔎 Arbitrage scan complete"
        );

        Ok(opportunities)
    }

    /// Current prices from every source, keyed by lowercased source name.
    ///
    /// Unlike [`MarketAggregator::compare_market`], any single source
    /// failing fails the whole call: a partial price board is not returned.
    pub async fn aggregate_prices(
        &self,
    ) -> Result<BTreeMap<String, Vec<PricePoint>>, MarketError> {
        let mut fetches: Vec<BoxFuture<'_, Result<(String, Vec<PricePoint>), MarketError>>> =
            Vec::with_capacity(self.spot.len() + 1);

        fetches.push(Box::pin(async move {
            let prices = self.rich.fetch_all_prices().await?;
            Ok((self.rich.name().to_lowercase(), prices))
        }));
        for source in &self.spot {
            fetches.push(Box::pin(async move {
                let prices = source.fetch_all_prices().await?;
                Ok((source.name().to_lowercase(), prices))
            }));
        }

        Ok(try_join_all(fetches).await?.into_iter().collect())
    }
}
