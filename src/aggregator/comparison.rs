//! Derived cross-exchange views: price comparison and arbitrage opportunities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::PricePoint;

/// Exchange label used when there is nothing to compare
pub const UNKNOWN_EXCHANGE: &str = "Unknown";

/// Round to two decimal places, half away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentages travel as two-decimal strings ("1.41") and are read back
/// from either a string or a bare number.
mod percentage {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:.2}", value))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(f64),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceExtreme {
    pub price: f64,
    pub exchange: String,
}

impl PriceExtreme {
    fn of(point: Option<&PricePoint>) -> Self {
        match point {
            Some(p) => Self {
                price: p.price,
                exchange: p.exchange.clone(),
            },
            None => Self {
                price: 0.0,
                exchange: UNKNOWN_EXCHANGE.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceComparison {
    pub lowest: PriceExtreme,
    pub highest: PriceExtreme,
    pub difference: f64,
    /// Spread relative to the lowest price, already rounded to 2 decimals
    #[serde(with = "percentage")]
    pub difference_percentage: f64,
}

/// Every known quote for one coin, cheapest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketComparison {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub exchanges: Vec<PricePoint>,
    pub price_comparison: PriceComparison,
    pub last_updated: DateTime<Utc>,
}

impl MarketComparison {
    /// Rank quotes and derive the spread.
    ///
    /// Quotes without a usable price are dropped. The sort is stable, so
    /// equal prices keep the order they arrived in.
    pub fn from_quotes(
        id: impl Into<String>,
        symbol: &str,
        name: impl Into<String>,
        quotes: Vec<PricePoint>,
    ) -> Self {
        let mut exchanges: Vec<PricePoint> =
            quotes.into_iter().filter(PricePoint::has_valid_price).collect();
        exchanges.sort_by(|a, b| a.price.total_cmp(&b.price));

        let lowest = PriceExtreme::of(exchanges.first());
        let highest = PriceExtreme::of(exchanges.last());
        let difference = highest.price - lowest.price;
        let difference_percentage = if lowest.price > 0.0 {
            round2(difference / lowest.price * 100.0)
        } else {
            0.0
        };

        Self {
            id: id.into(),
            symbol: symbol.to_uppercase(),
            name: name.into(),
            exchanges,
            price_comparison: PriceComparison {
                lowest,
                highest,
                difference,
                difference_percentage,
            },
            last_updated: Utc::now(),
        }
    }

    pub fn difference_percentage(&self) -> f64 {
        self.price_comparison.difference_percentage
    }

    /// Arbitrage view: buy at the lowest quote, sell at the highest
    pub fn to_opportunity(&self) -> ArbitrageOpportunity {
        ArbitrageOpportunity {
            id: self.id.clone(),
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            difference_percentage: self.price_comparison.difference_percentage,
            buy_from: self.price_comparison.lowest.clone(),
            sell_at: self.price_comparison.highest.clone(),
            potential_profit_per_unit: self.price_comparison.difference,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(with = "percentage")]
    pub difference_percentage: f64,
    pub buy_from: PriceExtreme,
    pub sell_at: PriceExtreme,
    pub potential_profit_per_unit: f64,
}

/// Sort opportunities by spread, widest first; ties keep their order
pub fn rank_opportunities(opportunities: &mut [ArbitrageOpportunity]) {
    opportunities.sort_by(|a, b| b.difference_percentage.total_cmp(&a.difference_percentage));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(exchange: &str, price: f64) -> PricePoint {
        PricePoint {
            symbol: "BTC".to_string(),
            exchange: exchange.to_string(),
            price,
            pair: "BTC/USD".to_string(),
            volume_24h: None,
            trust_score: None,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_spread_of_three_exchanges() {
        let comparison = MarketComparison::from_quotes(
            "bitcoin",
            "btc",
            "Bitcoin",
            vec![
                quote("Kraken", 50_000.0),
                quote("Coinbase", 50_500.0),
                quote("Binance", 49_800.0),
            ],
        );

        let order: Vec<&str> = comparison
            .exchanges
            .iter()
            .map(|q| q.exchange.as_str())
            .collect();
        assert_eq!(order, vec!["Binance", "Kraken", "Coinbase"]);
        assert_eq!(comparison.symbol, "BTC");
        assert_eq!(comparison.price_comparison.difference, 700.0);
        assert_eq!(comparison.difference_percentage(), 1.41);

        let json = serde_json::to_value(&comparison).unwrap();
        assert_eq!(json["price_comparison"]["difference_percentage"], "1.41");
        assert_eq!(json["price_comparison"]["lowest"]["exchange"], "Binance");
    }

    #[test]
    fn test_invalid_prices_excluded_before_ranking() {
        let comparison = MarketComparison::from_quotes(
            "bitcoin",
            "BTC",
            "Bitcoin",
            vec![
                quote("Zero", 0.0),
                quote("Kraken", 100.0),
                quote("Broken", f64::NAN),
                quote("Negative", -5.0),
            ],
        );
        assert_eq!(comparison.exchanges.len(), 1);
        assert_eq!(comparison.difference_percentage(), 0.0);
    }

    #[test]
    fn test_equal_prices_keep_arrival_order() {
        let comparison = MarketComparison::from_quotes(
            "bitcoin",
            "BTC",
            "Bitcoin",
            vec![quote("First", 100.0), quote("Second", 100.0)],
        );
        assert_eq!(comparison.price_comparison.lowest.exchange, "First");
        assert_eq!(comparison.price_comparison.highest.exchange, "Second");
        assert_eq!(comparison.difference_percentage(), 0.0);
    }

    #[test]
    fn test_empty_quotes_use_placeholders() {
        let comparison = MarketComparison::from_quotes("bitcoin", "BTC", "Bitcoin", vec![]);
        let prices = &comparison.price_comparison;
        assert_eq!(prices.lowest.exchange, UNKNOWN_EXCHANGE);
        assert_eq!(prices.highest.price, 0.0);
        assert_eq!(prices.difference, 0.0);
        assert_eq!(prices.difference_percentage, 0.0);
    }

    #[test]
    fn test_opportunity_mirrors_comparison() {
        let comparison = MarketComparison::from_quotes(
            "ethereum",
            "ETH",
            "Ethereum",
            vec![quote("A", 3000.0), quote("B", 3090.0)],
        );
        let opportunity = comparison.to_opportunity();
        assert_eq!(opportunity.buy_from.exchange, "A");
        assert_eq!(opportunity.sell_at.exchange, "B");
        assert_eq!(opportunity.potential_profit_per_unit, 90.0);
        assert_eq!(opportunity.difference_percentage, 3.0);

        let json = serde_json::to_string(&opportunity).unwrap();
        assert!(json.contains(r#""difference_percentage":"3.00""#));
        let back: ArbitrageOpportunity = serde_json::from_str(&json).unwrap();
        assert_eq!(back.difference_percentage, 3.0);
    }

    #[test]
    fn test_ranking_is_descending_and_stable() {
        let mut opportunities: Vec<ArbitrageOpportunity> = [("a", 1.5), ("b", 2.0), ("c", 1.5)]
            .iter()
            .map(|(id, pct)| ArbitrageOpportunity {
                id: id.to_string(),
                symbol: id.to_uppercase(),
                name: id.to_string(),
                difference_percentage: *pct,
                buy_from: PriceExtreme::of(None),
                sell_at: PriceExtreme::of(None),
                potential_profit_per_unit: 0.0,
            })
            .collect();

        rank_opportunities(&mut opportunities);
        let ids: Vec<&str> = opportunities.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.405_622_489_959_839_3), 1.41);
        assert_eq!(round2(2.0), 2.0);
        assert_eq!(round2(0.004), 0.0);
    }
}
