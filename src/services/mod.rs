// Service exports
pub mod cache;
pub mod catalog;
pub mod enrichment;
pub mod llm;

pub use cache::{CacheError, CacheKey, CacheManager};
pub use catalog::{CatalogClient, CatalogCollections, CatalogError};
pub use enrichment::ExplanationGenerator;
pub use llm::{LlmClient, LlmError, RateLimiter};
