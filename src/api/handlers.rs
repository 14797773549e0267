//! Routes and handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::collections::BTreeMap;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::types::*;
use super::{ApiError, SharedState};
use crate::aggregator::{ArbitrageOpportunity, MarketComparison};
use crate::error::MarketError;
use crate::sources::{validate_symbol, MarketDataSource, DEFAULT_HISTORY_DAYS};
use crate::types::{CoinSnapshot, CoinSummary, ExchangeInfo, HistoricalPoint, PricePoint};

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Create the API router with all endpoints
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Prices
        .route("/api/prices", get(get_prices))
        .route("/api/prices/aggregated", get(get_aggregated_prices))
        .route("/api/prices/historical/:coin_id", get(get_historical))
        .route("/api/prices/:coin_id", get(get_coin_price))
        // Exchanges and markets
        .route("/api/exchanges", get(get_exchanges))
        .route("/api/markets/:coin_id", get(get_market_comparison))
        .route("/api/arbitrage", get(get_arbitrage))
        .fallback(route_not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

// ─────────────────────────────────────────────────────────────────
// Query parsing
// ─────────────────────────────────────────────────────────────────

fn parse_days(raw: Option<&str>) -> Result<u32, MarketError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_HISTORY_DAYS),
        Some(value) => value.parse::<u32>().map_err(|_| {
            MarketError::Validation(format!("days must be a positive integer, got '{}'", value))
        }),
    }
}

fn parse_min_percentage(raw: Option<&str>, default: f64) -> Result<f64, MarketError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value.parse::<f64>().map_err(|_| {
            MarketError::Validation(format!("minPercentage must be a number, got '{}'", value))
        }),
    }
}

// ─────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────

/// GET /health - Liveness probe
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        message: "API is running".to_string(),
    })
}

/// GET /api/prices - Market listing of the supported coins
async fn get_prices(State(state): State<SharedState>) -> ApiResult<Vec<CoinSummary>> {
    let listing = state.aggregator.rich().fetch_market_listing().await?;
    Ok(Json(ApiResponse::success(
        "Cryptocurrency prices retrieved successfully",
        listing,
    )))
}

/// GET /api/prices/aggregated - Current prices from every source
async fn get_aggregated_prices(
    State(state): State<SharedState>,
) -> ApiResult<BTreeMap<String, Vec<PricePoint>>> {
    let board = state.aggregator.aggregate_prices().await?;
    Ok(Json(ApiResponse::success(
        "Aggregated prices retrieved successfully",
        board,
    )))
}

/// GET /api/prices/:coin_id - Coin detail with its exchange tickers
async fn get_coin_price(
    Path(coin_id): Path<String>,
    State(state): State<SharedState>,
) -> ApiResult<CoinSnapshot> {
    let snapshot = state.aggregator.rich().fetch_coin_detail(&coin_id).await?;
    let message = format!("Price data for {} retrieved successfully", snapshot.name);
    Ok(Json(ApiResponse::success(message, snapshot)))
}

/// GET /api/prices/historical/:coin_id?days=7
async fn get_historical(
    Path(coin_id): Path<String>,
    Query(query): Query<HistoryQuery>,
    State(state): State<SharedState>,
) -> ApiResult<Vec<HistoricalPoint>> {
    let days = parse_days(query.days.as_deref())?;
    let series = state
        .aggregator
        .rich()
        .fetch_historical(&coin_id, days)
        .await?;
    Ok(Json(ApiResponse::success(
        format!("Historical data for {} retrieved successfully", coin_id),
        series,
    )))
}

/// GET /api/exchanges - Top exchanges by trust rank
async fn get_exchanges(State(state): State<SharedState>) -> ApiResult<Vec<ExchangeInfo>> {
    let exchanges = state.aggregator.rich().fetch_exchanges().await?;
    Ok(Json(ApiResponse::success(
        "Exchanges retrieved successfully",
        exchanges,
    )))
}

/// GET /api/markets/:coin_id?symbol=BTC - Cross-exchange price comparison
async fn get_market_comparison(
    Path(coin_id): Path<String>,
    Query(query): Query<MarketQuery>,
    State(state): State<SharedState>,
) -> ApiResult<MarketComparison> {
    // A derived symbol the spot venues reject only drops their quotes
    let symbol = match query.symbol.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => {
            let symbol = s.to_uppercase();
            validate_symbol(&symbol)?;
            symbol
        }
        _ => state.default_symbol(&coin_id),
    };

    let comparison = state.aggregator.compare_market(&coin_id, &symbol).await?;
    let message = format!(
        "Market comparison for {} retrieved successfully",
        comparison.name
    );
    Ok(Json(ApiResponse::success(message, comparison)))
}

/// GET /api/arbitrage?minPercentage=1.0 - Spreads above a threshold
async fn get_arbitrage(
    Query(query): Query<ArbitrageQuery>,
    State(state): State<SharedState>,
) -> ApiResult<Vec<ArbitrageOpportunity>> {
    let min_percentage =
        parse_min_percentage(query.min_percentage.as_deref(), state.default_min_percentage)?;
    let opportunities = state
        .aggregator
        .find_arbitrage_opportunities(min_percentage)
        .await?;
    let message = format!("Found {} arbitrage opportunities", opportunities.len());
    Ok(Json(ApiResponse::success(message, opportunities)))
}

async fn route_not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Route not found")
}
