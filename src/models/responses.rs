use serde::{Deserialize, Serialize};

use crate::models::domain::MatchResult;

/// Response for the match endpoint; this is also the unit stored in the
/// result cache, so a cache hit is byte-identical to a fresh computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResponse {
    pub results: Vec<MatchResult>,
    #[serde(rename = "totalCount")]
    pub total_count: usize,
    #[serde(rename = "filteredCount")]
    pub filtered_count: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Response for the cache invalidation endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub success: bool,
    #[serde(rename = "preferenceId")]
    pub preference_id: String,
    #[serde(rename = "droppedKeys")]
    pub dropped_keys: usize,
}
