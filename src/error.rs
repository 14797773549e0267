//! Error types shared by the sources, the aggregator and the HTTP boundary

use thiserror::Error;

/// Failure of a single upstream fetch, before it is attributed to a source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid JSON body: {0}")]
    Decode(String),
}

/// Domain error surfaced by every market operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    /// The requested coin or trading pair is unknown upstream
    #[error("{0}")]
    NotFound(String),

    /// Network failure or non-success status from an upstream API
    #[error("{source_name} request failed: {reason}")]
    Upstream {
        source_name: &'static str,
        reason: String,
    },

    /// Upstream answered with a shape we cannot use
    #[error("unexpected {source_name} response: {reason}")]
    Parse {
        source_name: &'static str,
        reason: String,
    },

    /// Malformed caller input
    #[error("{0}")]
    Validation(String),
}

impl MarketError {
    pub fn upstream(source_name: &'static str, reason: impl Into<String>) -> Self {
        MarketError::Upstream {
            source_name,
            reason: reason.into(),
        }
    }

    pub fn parse(source_name: &'static str, reason: impl ToString) -> Self {
        MarketError::Parse {
            source_name,
            reason: reason.to_string(),
        }
    }

    /// Attribute a transport failure to a source. Status codes are kept
    /// in the message; callers that know what "not found" looks like for
    /// their source check for it before falling back to this.
    pub fn from_fetch(source_name: &'static str, err: FetchError) -> Self {
        match err {
            FetchError::Decode(reason) => MarketError::parse(source_name, reason),
            other => MarketError::upstream(source_name, other.to_string()),
        }
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            MarketError::NotFound(_) => "not_found",
            MarketError::Upstream { .. } => "upstream",
            MarketError::Parse { .. } => "parse",
            MarketError::Validation(_) => "validation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_failures_become_parse_errors() {
        let err = MarketError::from_fetch("Binance", FetchError::Decode("eof".to_string()));
        assert_eq!(err.kind(), "parse");
        assert_eq!(err.to_string(), "unexpected Binance response: eof");
    }

    #[test]
    fn test_status_failures_become_upstream_errors() {
        let err = MarketError::from_fetch(
            "CoinGecko",
            FetchError::Status {
                status: 429,
                body: "rate limited".to_string(),
            },
        );
        assert_eq!(err.kind(), "upstream");
        assert!(err.to_string().contains("429"));
    }
}
