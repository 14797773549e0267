//! API response envelope and query parameters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope wrapping every API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            timestamp: Utc::now(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            timestamp: Utc::now(),
            data: None,
        }
    }
}

/// Liveness payload, deliberately outside the envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

// Query values stay strings so malformed input becomes a 400 envelope
// instead of axum's plain-text rejection.

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarketQuery {
    pub symbol: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ArbitrageQuery {
    #[serde(rename = "minPercentage")]
    pub min_percentage: Option<String>,
}
