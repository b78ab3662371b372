use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

use crate::core::{build_predicate, fallback_explanation, generic_explanation, MatchEngine};
use crate::models::{
    is_valid_preference_id, ErrorResponse, HealthResponse, InvalidateResponse, MatchQuery,
    MatchResponse, MatchResult,
};
use crate::services::{CacheKey, CacheManager, CatalogClient, CatalogError, ExplanationGenerator};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogClient>,
    pub cache: Arc<CacheManager>,
    pub explainer: Arc<ExplanationGenerator>,
    pub engine: MatchEngine,
    pub limits: RequestLimits,
}

/// Per-request tunables resolved from configuration at startup
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    pub default_limit: u32,
    pub max_limit: u32,
    pub result_ttl_secs: u64,
    pub enrich_deadline_secs: u64,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/matches/{preference_id}", web::get().to(get_matches))
        .route(
            "/matches/{preference_id}/invalidate",
            web::post().to(invalidate_matches),
        );
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let cache_healthy = state.cache.ping().await;
    let status = if cache_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Find matches endpoint
///
/// GET /api/v1/matches/{preferenceId}
///
/// Query parameters: `page`, `limit`, `sortBy` (matchScore|price|dateAdded),
/// `sortOrder` (asc|desc), `forceRefresh`, and comma-separated filter lists
/// `minPrice`, `maxPrice`, `bedrooms`, `bathrooms`, `neighborhoods`,
/// `amenities`.
///
/// The pipeline: validate, cache lookup, build predicate, fetch candidates,
/// rank (filter/score/sort/paginate), enrich the page, write back to cache.
/// Only a catalog failure aborts; cache and enrichment failures degrade.
async fn get_matches(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<MatchQuery>,
) -> impl Responder {
    let preference_id = path.into_inner();

    // Parameter validation happens before any collaborator is touched.
    if !is_valid_preference_id(&preference_id) {
        return bad_request("Invalid preference id".to_string());
    }
    if let Err(errors) = query.validate() {
        tracing::info!("Validation failed for match request: {:?}", errors);
        return bad_request(errors.to_string());
    }
    let params = match query
        .into_inner()
        .into_params(state.limits.default_limit, state.limits.max_limit)
    {
        Ok(params) => params,
        Err(message) => return bad_request(message),
    };

    tracing::info!(
        "Finding matches for preference {} (page {}, limit {}, sort {} {})",
        preference_id,
        params.page,
        params.limit,
        params.sort_by.as_str(),
        params.sort_order.as_str()
    );

    // The preference must resolve before the cache is consulted, so a
    // deleted preference can never serve stale results.
    let preference = match state.catalog.get_preference(&preference_id).await {
        Ok(preference) => preference,
        Err(CatalogError::NotFound(message)) => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: "Preference not found".to_string(),
                message,
                status_code: 404,
            });
        }
        Err(e) => {
            tracing::error!("Failed to fetch preference {}: {}", preference_id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to fetch preference".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    let cache_key = CacheKey::matches(&preference_id, &params);
    if !params.force_refresh {
        if let Some(cached) = state.cache.get::<MatchResponse>(&cache_key).await {
            tracing::debug!("Serving matches from cache: {}", cache_key);
            return HttpResponse::Ok().json(cached);
        }
    }

    let predicate = build_predicate(&params.filters);

    let candidates = match state.catalog.find_listings(&predicate).await {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::error!("Failed to query listings for {}: {}", preference_id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to query listings".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    tracing::debug!(
        "Fetched {} candidates for preference {}",
        candidates.len(),
        preference_id
    );

    let ranked = state.engine.rank(&preference, candidates, &params);

    // Fallback explanations are computed unconditionally; enrichment can
    // only replace them, never remove them.
    let mut results: Vec<MatchResult> = ranked
        .page
        .into_iter()
        .map(|candidate| {
            let explanation = if candidate.scored {
                fallback_explanation(&preference, &candidate.listing)
            } else {
                generic_explanation()
            };
            MatchResult {
                listing: candidate.listing,
                match_score: candidate.score,
                explanation,
            }
        })
        .collect();

    // Enrichment is best-effort overlay on an already-complete result: it
    // runs only for the page the caller will see, under a hard deadline.
    let deadline = Duration::from_secs(state.limits.enrich_deadline_secs);
    if tokio::time::timeout(
        deadline,
        state.explainer.enrich_page(&preference, &mut results),
    )
    .await
    .is_err()
    {
        tracing::warn!(
            "Enrichment deadline ({}s) exceeded for {}, returning fallback explanations",
            state.limits.enrich_deadline_secs,
            preference_id
        );
    }

    let response = MatchResponse {
        results,
        total_count: ranked.total_count,
        filtered_count: ranked.filtered_count,
    };

    // forceRefresh skips the read, never the write.
    state
        .cache
        .set_with_ttl(&cache_key, &response, state.limits.result_ttl_secs)
        .await;

    tracing::info!(
        "Returning {} matches for preference {} ({} filtered of {} fetched)",
        response.results.len(),
        preference_id,
        response.filtered_count,
        response.total_count
    );

    HttpResponse::Ok().json(response)
}

/// Invalidate cached matches for a preference
///
/// POST /api/v1/matches/{preferenceId}/invalidate
///
/// Called by the collaborator that owns preference mutation, right after a
/// preference update. Drops every match-result and explanation entry
/// derived from the preference.
async fn invalidate_matches(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let preference_id = path.into_inner();

    if !is_valid_preference_id(&preference_id) {
        return bad_request("Invalid preference id".to_string());
    }

    let matches_dropped = state
        .cache
        .invalidate_prefix(&CacheKey::matches_prefix(&preference_id))
        .await;
    let explanations_dropped = state
        .cache
        .invalidate_prefix(&CacheKey::explanation_prefix(&preference_id))
        .await;

    tracing::info!(
        "Invalidated cache for preference {} ({} match keys, {} explanation keys)",
        preference_id,
        matches_dropped,
        explanations_dropped
    );

    HttpResponse::Ok().json(InvalidateResponse {
        success: true,
        preference_id,
        dropped_keys: matches_dropped + explanations_dropped,
    })
}

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "Validation failed".to_string(),
        message,
        status_code: 400,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_check_response() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            timestamp: chrono::Utc::now(),
        };

        assert_eq!(response.status, "healthy");
    }

    #[test]
    fn test_bad_request_shape() {
        let response = bad_request("limit must be between 1 and 50".to_string());
        assert_eq!(response.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
