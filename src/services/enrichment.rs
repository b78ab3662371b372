use futures_util::future::join_all;
use std::sync::Arc;

use crate::models::{Listing, MatchResult, Preference};
use crate::services::cache::{CacheKey, CacheManager};
use crate::services::llm::LlmClient;

const SYSTEM_PROMPT: &str = "You are a housing assistant. In two or three short \
sentences, explain why the apartment listing fits the user's stored search \
preference. Mention concrete matching attributes. Do not invent details.";

/// LLM-backed explanation enrichment
///
/// Policy layer over the raw client: cache-first, score-gated, rate-limit
/// aware, and strictly best-effort. `explain` returns `None` on every
/// failure path so the caller keeps its precomputed fallback text.
pub struct ExplanationGenerator {
    llm: Option<Arc<LlmClient>>,
    cache: Arc<CacheManager>,
    min_score: u8,
    cache_ttl_secs: u64,
    batch_size: usize,
}

impl ExplanationGenerator {
    pub fn new(
        llm: Option<Arc<LlmClient>>,
        cache: Arc<CacheManager>,
        min_score: u8,
        cache_ttl_secs: u64,
        batch_size: usize,
    ) -> Self {
        Self {
            llm,
            cache,
            min_score,
            cache_ttl_secs,
            batch_size: batch_size.max(1),
        }
    }

    /// Try to produce an enriched explanation for one listing.
    ///
    /// Returns `None` when the score is below the eligibility gate, the
    /// generator is disabled, the provider is rate-limited, or the call
    /// fails in any way. Successes are cached with the long TTL.
    pub async fn explain(
        &self,
        preference: &Preference,
        listing: &Listing,
        score: u8,
    ) -> Option<String> {
        if score < self.min_score {
            return None;
        }

        let key = CacheKey::explanation(&preference.preference_id, &listing.listing_id);
        if let Some(cached) = self.cache.get::<String>(&key).await {
            tracing::trace!("Explanation cache hit: {}", key);
            return Some(cached);
        }

        let llm = self.llm.as_ref()?;

        if llm.limiter().is_limited().await {
            tracing::debug!(
                "Skipping explanation for {}: provider rate limited",
                listing.listing_id
            );
            return None;
        }

        let user_prompt = build_user_prompt(preference, listing, score);

        match llm.complete(SYSTEM_PROMPT, &user_prompt).await {
            Ok(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return None;
                }
                self.cache.set_with_ttl(&key, &text, self.cache_ttl_secs).await;
                Some(text)
            }
            Err(e) => {
                tracing::warn!(
                    "Explanation generation failed for {}: {}",
                    listing.listing_id,
                    e
                );
                None
            }
        }
    }

    /// Enrich a page of results in place, batch by batch.
    ///
    /// Enrichment of one listing is independent of all others, so each
    /// batch runs its calls concurrently; the provider-side window is
    /// bounded by the shared rate limiter, not by batch size. Results keep
    /// their fallback explanation whenever the LLM path yields nothing.
    pub async fn enrich_page(&self, preference: &Preference, results: &mut [MatchResult]) {
        if results.is_empty() {
            return;
        }

        for batch in results.chunks_mut(self.batch_size) {
            let enriched = join_all(
                batch
                    .iter()
                    .map(|result| self.explain(preference, &result.listing, result.match_score)),
            )
            .await;

            for (result, text) in batch.iter_mut().zip(enriched) {
                if let Some(text) = text {
                    result.explanation = text;
                }
            }
        }
    }
}

fn build_user_prompt(preference: &Preference, listing: &Listing, score: u8) -> String {
    // Serialization of the domain structs cannot fail; fall back to empty
    // JSON objects all the same rather than panicking in a best-effort path.
    let preference_json =
        serde_json::to_string(preference).unwrap_or_else(|_| "{}".to_string());
    let listing_json = serde_json::to_string(listing).unwrap_or_else(|_| "{}".to_string());
    format!(
        "Preference: {}\nListing: {}\nMatch score: {}/100\nWhy is this listing a good match?",
        preference_json, listing_json, score
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fallback_explanation;

    fn test_listing(id: &str) -> Listing {
        Listing {
            listing_id: id.to_string(),
            title: "Test".to_string(),
            price: 2500.0,
            bedrooms: "2".to_string(),
            bathrooms: "1".to_string(),
            neighborhood: "Downtown".to_string(),
            amenities: vec![],
            available_from: None,
            latitude: None,
            longitude: None,
            is_active: true,
            is_approved: Some(true),
            created_at: None,
        }
    }

    fn test_preference() -> Preference {
        Preference {
            preference_id: "pref1".to_string(),
            user_id: "user1".to_string(),
            price_min: Some(2000.0),
            price_max: Some(3000.0),
            bedrooms: vec!["2".to_string()],
            bathrooms: vec![],
            neighborhoods: vec!["Downtown".to_string()],
            amenities: vec![],
            move_in_date: None,
            latitude: None,
            longitude: None,
            radius_km: None,
        }
    }

    async fn l1_only_generator(llm: Option<Arc<LlmClient>>) -> ExplanationGenerator {
        let cache = Arc::new(CacheManager::connect("redis://127.0.0.1:1", 100, 60).await);
        ExplanationGenerator::new(llm, cache, 50, 86400, 100)
    }

    #[tokio::test]
    async fn test_disabled_generator_returns_none() {
        let generator = l1_only_generator(None).await;
        let result = generator
            .explain(&test_preference(), &test_listing("apt1"), 90)
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_score_below_gate_skips_cache_and_provider() {
        let generator = l1_only_generator(None).await;
        let result = generator
            .explain(&test_preference(), &test_listing("apt1"), 30)
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits() {
        let generator = l1_only_generator(None).await;
        let key = CacheKey::explanation("pref1", "apt1");
        generator
            .cache
            .set_with_ttl(&key, &"Cached reason.".to_string(), 60)
            .await;

        let result = generator
            .explain(&test_preference(), &test_listing("apt1"), 90)
            .await;
        assert_eq!(result, Some("Cached reason.".to_string()));
    }

    #[tokio::test]
    async fn test_enrich_page_keeps_fallback_when_disabled() {
        let generator = l1_only_generator(None).await;
        let preference = test_preference();
        let listing = test_listing("apt1");
        let fallback = fallback_explanation(&preference, &listing);
        let mut results = vec![MatchResult {
            listing,
            match_score: 92,
            explanation: fallback.clone(),
        }];

        generator.enrich_page(&preference, &mut results).await;

        assert_eq!(results[0].explanation, fallback);
        assert!(!results[0].explanation.is_empty());
    }

    #[tokio::test]
    async fn test_enrich_page_overrides_with_cached_text() {
        let generator = l1_only_generator(None).await;
        let preference = test_preference();
        let key = CacheKey::explanation("pref1", "apt1");
        generator
            .cache
            .set_with_ttl(&key, &"Enriched reason.".to_string(), 60)
            .await;

        let mut results = vec![MatchResult {
            listing: test_listing("apt1"),
            match_score: 92,
            explanation: "fallback".to_string(),
        }];

        generator.enrich_page(&preference, &mut results).await;

        assert_eq!(results[0].explanation, "Enriched reason.");
    }
}
