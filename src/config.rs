use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub catalog: CatalogSettings,
    pub collection: CollectionSettings,
    pub cache: CacheSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    pub endpoint: String,
    pub api_key: String,
    pub project_id: String,
    pub database_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSettings {
    pub listings: String,
    pub preferences: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub redis_url: String,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
    pub explanation_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_llm_min_score")]
    pub min_score: u8,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_llm_endpoint(),
            api_key: String::new(),
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            max_concurrent: default_llm_max_concurrent(),
            min_score: default_llm_min_score(),
        }
    }
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_temperature() -> f32 {
    0.4
}
fn default_llm_max_tokens() -> u32 {
    200
}
fn default_llm_timeout_secs() -> u64 {
    5
}
fn default_llm_max_concurrent() -> usize {
    5
}
fn default_llm_min_score() -> u8 {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
    #[serde(default = "default_score_bound")]
    pub score_bound: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_enrich_deadline_secs")]
    pub enrich_deadline_secs: u64,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            score_bound: default_score_bound(),
            batch_size: default_batch_size(),
            enrich_deadline_secs: default_enrich_deadline_secs(),
        }
    }
}

fn default_limit() -> u32 {
    20
}
fn default_max_limit() -> u32 {
    50
}
fn default_score_bound() -> usize {
    1000
}
fn default_batch_size() -> usize {
    100
}
fn default_enrich_deadline_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_price_weight")]
    pub price: f64,
    #[serde(default = "default_bedrooms_weight")]
    pub bedrooms: f64,
    #[serde(default = "default_neighborhood_weight")]
    pub neighborhood: f64,
    #[serde(default = "default_move_in_weight")]
    pub move_in: f64,
    #[serde(default = "default_amenities_weight")]
    pub amenities: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            price: default_price_weight(),
            bedrooms: default_bedrooms_weight(),
            neighborhood: default_neighborhood_weight(),
            move_in: default_move_in_weight(),
            amenities: default_amenities_weight(),
        }
    }
}

fn default_price_weight() -> f64 {
    0.30
}
fn default_bedrooms_weight() -> f64 {
    0.25
}
fn default_neighborhood_weight() -> f64 {
    0.20
}
fn default_move_in_weight() -> f64 {
    0.10
}
fn default_amenities_weight() -> f64 {
    0.15
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with HAVEN_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            // Add default config file
            .add_source(File::with_name("config/default").required(false))
            // Add local config file (for development overrides)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with HAVEN_)
            // e.g., HAVEN_SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("HAVEN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("HAVEN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Substitute well-known environment variables into config values, for
/// deployments that export plain REDIS_URL / LLM_API_KEY style variables
/// instead of the HAVEN_-prefixed form.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let redis_url = env::var("REDIS_URL")
        .or_else(|_| env::var("HAVEN_CACHE__REDIS_URL"))
        .ok();

    let catalog_endpoint = env::var("HAVEN_CATALOG__ENDPOINT").ok();
    let catalog_api_key = env::var("HAVEN_CATALOG__API_KEY").ok();
    let catalog_project_id = env::var("HAVEN_CATALOG__PROJECT_ID").ok();
    let catalog_database_id = env::var("HAVEN_CATALOG__DATABASE_ID").ok();
    let llm_api_key = env::var("LLM_API_KEY")
        .or_else(|_| env::var("HAVEN_LLM__API_KEY"))
        .ok();

    let mut builder = Config::builder().add_source(settings);

    if let Some(url) = redis_url {
        builder = builder.set_override("cache.redis_url", url)?;
    }
    if let Some(endpoint) = catalog_endpoint {
        builder = builder.set_override("catalog.endpoint", endpoint)?;
    }
    if let Some(api_key) = catalog_api_key {
        builder = builder.set_override("catalog.api_key", api_key)?;
    }
    if let Some(project_id) = catalog_project_id {
        builder = builder.set_override("catalog.project_id", project_id)?;
    }
    if let Some(database_id) = catalog_database_id {
        builder = builder.set_override("catalog.database_id", database_id)?;
    }
    if let Some(api_key) = llm_api_key {
        builder = builder.set_override("llm.api_key", api_key)?;
    }

    builder.build()
}
