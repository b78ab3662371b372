use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use haven_match::config::Settings;
use haven_match::core::MatchEngine;
use haven_match::models::ScoringWeights;
use haven_match::routes;
use haven_match::routes::matches::{AppState, RequestLimits};
use haven_match::services::{
    CacheManager, CatalogClient, CatalogCollections, ExplanationGenerator, LlmClient, RateLimiter,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .content_type("application/json")
            .body(serde_json::to_string(self).unwrap_or_default())
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(
    err: error::JsonPayloadError,
    req: &actix_web::HttpRequest,
) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(
    err: error::QueryPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&log_level))
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting Haven match service...");

    // Load configuration
    let settings = Settings::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        panic!("Configuration error: {}", e);
    });

    info!("Configuration loaded successfully");

    // Initialize catalog client
    let collections = CatalogCollections {
        listings: settings.collection.listings,
        preferences: settings.collection.preferences,
    };

    let catalog = Arc::new(CatalogClient::new(
        settings.catalog.endpoint,
        settings.catalog.api_key,
        settings.catalog.project_id,
        settings.catalog.database_id,
        collections,
    ));

    info!("Catalog client initialized");

    // Initialize cache manager; a missing Redis degrades to L1-only
    let result_ttl = settings.cache.ttl_secs.unwrap_or(3600);
    let explanation_ttl = settings.cache.explanation_ttl_secs.unwrap_or(86_400);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(1000);

    let cache = Arc::new(
        CacheManager::connect(&settings.cache.redis_url, l1_cache_size, result_ttl).await,
    );

    info!(
        "Cache manager initialized (L1: {} entries, result TTL: {}s)",
        l1_cache_size, result_ttl
    );

    // Initialize the LLM client behind its rate limiter, if enabled
    let llm = if settings.llm.enabled {
        let limiter = Arc::new(RateLimiter::new(settings.llm.max_concurrent));
        info!(
            "LLM explanations enabled (model: {}, window: {}, timeout: {}s)",
            settings.llm.model, settings.llm.max_concurrent, settings.llm.timeout_secs
        );
        Some(Arc::new(LlmClient::new(
            settings.llm.endpoint,
            settings.llm.api_key,
            settings.llm.model,
            settings.llm.temperature,
            settings.llm.max_tokens,
            settings.llm.timeout_secs,
            limiter,
        )))
    } else {
        warn!("LLM explanations disabled, serving fallback explanations only");
        None
    };

    let explainer = Arc::new(ExplanationGenerator::new(
        llm,
        Arc::clone(&cache),
        settings.llm.min_score,
        explanation_ttl,
        settings.matching.batch_size,
    ));

    // Initialize the ranking engine with configured weights
    let weights = ScoringWeights {
        price: settings.scoring.weights.price,
        bedrooms: settings.scoring.weights.bedrooms,
        neighborhood: settings.scoring.weights.neighborhood,
        move_in: settings.scoring.weights.move_in,
        amenities: settings.scoring.weights.amenities,
    };

    let engine = MatchEngine::new(weights, settings.matching.score_bound);

    info!("Match engine initialized with weights: {:?}", weights);

    // Build application state
    let app_state = AppState {
        catalog,
        cache,
        explainer,
        engine,
        limits: RequestLimits {
            default_limit: settings.matching.default_limit,
            max_limit: settings.matching.max_limit,
            result_ttl_secs: result_ttl,
            enrich_deadline_secs: settings.matching.enrich_deadline_secs,
        },
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
