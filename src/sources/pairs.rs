//! Mapping flat exchange pair lists (e.g. "BTCUSDT") onto the coin universe

use std::collections::HashSet;

/// Number of leading characters compared by the prefix heuristic
const PREFIX_LEN: usize = 3;

/// Decides which pairs of a flat listing belong to the supported coins.
///
/// `Prefix` matches the first three characters of the base asset against
/// the first three characters of each coin id. It is imprecise: "bitcoin"
/// matches BITUSDT but not BTCUSDT, and coins sharing a prefix collide.
/// `Explicit` matches base assets exactly against a configured symbol table.
#[derive(Debug, Clone, PartialEq)]
pub enum PairFilter {
    Prefix {
        quote: String,
        prefixes: Vec<String>,
    },
    Explicit {
        quote: String,
        bases: HashSet<String>,
    },
}

impl PairFilter {
    pub fn prefix(quote: &str, coin_ids: &[String]) -> Self {
        let mut prefixes: Vec<String> = coin_ids
            .iter()
            .map(|id| id.chars().take(PREFIX_LEN).collect::<String>().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        prefixes.dedup();
        PairFilter::Prefix {
            quote: quote.to_uppercase(),
            prefixes,
        }
    }

    pub fn explicit<I, S>(quote: &str, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        PairFilter::Explicit {
            quote: quote.to_uppercase(),
            bases: symbols
                .into_iter()
                .map(|s| s.as_ref().to_uppercase())
                .collect(),
        }
    }

    pub fn quote(&self) -> &str {
        match self {
            PairFilter::Prefix { quote, .. } | PairFilter::Explicit { quote, .. } => quote,
        }
    }

    /// Base asset of `pair` if the pair is relevant, `None` otherwise
    pub fn base_asset<'a>(&self, pair: &'a str) -> Option<&'a str> {
        let base = pair.strip_suffix(self.quote())?;
        if base.is_empty() {
            return None;
        }

        let relevant = match self {
            PairFilter::Prefix { prefixes, .. } => {
                let lowered = base.to_lowercase();
                prefixes.iter().any(|p| lowered.starts_with(p.as_str()))
            }
            PairFilter::Explicit { bases, .. } => bases.contains(&base.to_uppercase()),
        };

        relevant.then_some(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_prefix_requires_quote_suffix() {
        let filter = PairFilter::prefix("USDT", &coins(&["ethereum"]));
        assert_eq!(filter.base_asset("ETHUSDT"), Some("ETH"));
        assert_eq!(filter.base_asset("ETHBTC"), None);
        assert_eq!(filter.base_asset("USDT"), None);
    }

    #[test]
    fn test_prefix_heuristic_is_imprecise() {
        let filter = PairFilter::prefix("usdt", &coins(&["bitcoin", "ethereum"]));
        // "bit" never matches the actual BTC ticker...
        assert_eq!(filter.base_asset("BTCUSDT"), None);
        // ...but catches unrelated tokens sharing the prefix.
        assert_eq!(filter.base_asset("BITUSDT"), Some("BIT"));
        assert_eq!(filter.base_asset("ETHFIUSDT"), Some("ETHFI"));
    }

    #[test]
    fn test_explicit_matches_exact_base() {
        let filter = PairFilter::explicit("USDT", ["btc", "ETH"]);
        assert_eq!(filter.base_asset("BTCUSDT"), Some("BTC"));
        assert_eq!(filter.base_asset("ETHUSDT"), Some("ETH"));
        assert_eq!(filter.base_asset("ETHFIUSDT"), None);
        assert_eq!(filter.quote(), "USDT");
    }
}
