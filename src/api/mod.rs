//! HTTP API
//!
//! REST endpoints over the market aggregator. Every response except
//! `/health` is wrapped in [`ApiResponse`].

mod handlers;
mod types;

pub use handlers::create_router;
pub use types::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::aggregator::MarketAggregator;
use crate::error::MarketError;

/// State shared by every handler
pub struct AppState {
    pub aggregator: Arc<MarketAggregator>,
    /// Arbitrage threshold applied when the query has none
    pub default_min_percentage: f64,
    /// Optional coin id -> ticker table for default market symbols
    pub coin_symbols: HashMap<String, String>,
}

impl AppState {
    pub fn new(aggregator: Arc<MarketAggregator>, default_min_percentage: f64) -> Self {
        Self {
            aggregator,
            default_min_percentage,
            coin_symbols: HashMap::new(),
        }
    }

    pub fn with_coin_symbols(mut self, coin_symbols: HashMap<String, String>) -> Self {
        self.coin_symbols = coin_symbols;
        self
    }

    /// Ticker to compare a coin under when the caller gave none: the
    /// configured symbol, else the first three characters of the id.
    pub fn default_symbol(&self, coin_id: &str) -> String {
        match self.coin_symbols.get(coin_id) {
            Some(symbol) => symbol.to_uppercase(),
            None => coin_id.chars().take(3).collect::<String>().to_uppercase(),
        }
    }
}

pub type SharedState = Arc<AppState>;

/// Error rendered as a failed envelope
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Status code for each domain error kind
pub fn status_for(err: &MarketError) -> StatusCode {
    match err {
        MarketError::NotFound(_) => StatusCode::NOT_FOUND,
        MarketError::Upstream { .. } => StatusCode::SERVICE_UNAVAILABLE,
        MarketError::Parse { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        MarketError::Validation(_) => StatusCode::BAD_REQUEST,
    }
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(kind = err.kind(), error = %err, "❌ Request failed");
        } else {
            tracing::debug!(kind = err.kind(), error = %err, "Request rejected");
        }
        ApiError::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_to_statuses() {
        assert_eq!(
            status_for(&MarketError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&MarketError::upstream("Binance", "reset")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&MarketError::parse("CoinGecko", "missing field")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&MarketError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_default_symbol() {
        use crate::aggregator::ScanSettings;
        use crate::sources::{CoinGeckoClient, CoinGeckoConfig, MockJsonTransport};

        let gecko = CoinGeckoClient::new(
            Arc::new(MockJsonTransport::new()),
            CoinGeckoConfig::default(),
        );
        let aggregator = MarketAggregator::new(Arc::new(gecko), vec![], ScanSettings::default());
        let state = AppState::new(Arc::new(aggregator), 1.0).with_coin_symbols(HashMap::from([(
            "bitcoin".to_string(),
            "btc".to_string(),
        )]));

        assert_eq!(state.default_symbol("bitcoin"), "BTC");
        assert_eq!(state.default_symbol("ethereum"), "ETH");
        assert_eq!(state.default_symbol("xr"), "XR");
    }

    #[test]
    fn test_error_envelope_omits_data() {
        let json = serde_json::to_value(ApiResponse::<()>::error("Route not found")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Route not found");
        assert!(json.get("data").is_none());
        assert!(json["timestamp"].is_string());
    }
}
