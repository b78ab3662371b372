// Integration tests for Haven Match

use haven_match::core::{fallback_explanation, MatchEngine};
use haven_match::models::{
    Listing, ListingFilters, MatchParams, MatchResponse, MatchResult, Preference, SortBy,
    SortOrder,
};

fn create_listing(id: &str, price: f64, bedrooms: &str, neighborhood: &str) -> Listing {
    Listing {
        listing_id: id.to_string(),
        title: format!("Listing {}", id),
        price,
        bedrooms: bedrooms.to_string(),
        bathrooms: "1".to_string(),
        neighborhood: neighborhood.to_string(),
        amenities: vec![],
        available_from: None,
        latitude: None,
        longitude: None,
        is_active: true,
        is_approved: Some(true),
        created_at: None,
    }
}

fn create_preference() -> Preference {
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

fn create_params(page: u32, limit: u32, sort_by: SortBy, sort_order: SortOrder) -> MatchParams {
    MatchParams {
        page,
        limit,
        sort_by,
        sort_order,
        force_refresh: false,
        filters: ListingFilters::default(),
    }
}

#[test]
fn test_end_to_end_ranking_example() {
    // The canonical scenario: a downtown two-bedroom inside the budget must
    // outrank an uptown one-bedroom far above it.
    let engine = MatchEngine::with_default_weights();
    let preference = create_preference();

    let candidates = vec![
        create_listing("uptown", 5000.0, "1", "Uptown"),
        create_listing("downtown", 2500.0, "2", "Downtown"),
    ];

    let ranked = engine.rank(
        &preference,
        candidates,
        &create_params(1, 10, SortBy::MatchScore, SortOrder::Desc),
    );

    assert_eq!(ranked.page.len(), 2);
    assert_eq!(ranked.page[0].listing.listing_id, "downtown");
    assert_eq!(ranked.page[1].listing.listing_id, "uptown");
    assert!(ranked.page[0].score > ranked.page[1].score);

    // The winner's fallback explanation mentions price, bedrooms, and
    // neighborhood.
    let text = fallback_explanation(&preference, &ranked.page[0].listing);
    assert!(text.contains("2500"), "{}", text);
    assert!(text.contains("bedroom"), "{}", text);
    assert!(text.contains("Downtown"), "{}", text);
}

#[test]
fn test_results_sorted_with_stable_ties() {
    let engine = MatchEngine::with_default_weights();
    let preference = create_preference();

    // Ten identical listings: scores tie, so input order must survive.
    let candidates: Vec<Listing> = (0..10)
        .map(|i| create_listing(&format!("apt{}", i), 2500.0, "2", "Downtown"))
        .collect();

    let ranked = engine.rank(
        &preference,
        candidates,
        &create_params(1, 10, SortBy::MatchScore, SortOrder::Desc),
    );

    let ids: Vec<String> = ranked
        .page
        .iter()
        .map(|c| c.listing.listing_id.clone())
        .collect();
    let expected: Vec<String> = (0..10).map(|i| format!("apt{}", i)).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_pagination_is_consistent_across_pages() {
    let engine = MatchEngine::with_default_weights();
    let preference = create_preference();

    let candidates: Vec<Listing> = (0..30)
        .map(|i| create_listing(&format!("apt{:02}", i), 2500.0, "2", "Downtown"))
        .collect();

    let page1 = engine.rank(
        &preference,
        candidates.clone(),
        &create_params(1, 10, SortBy::MatchScore, SortOrder::Desc),
    );
    let page2 = engine.rank(
        &preference,
        candidates,
        &create_params(2, 10, SortBy::MatchScore, SortOrder::Desc),
    );

    assert_eq!(page1.page.len(), 10);
    assert_eq!(page2.page.len(), 10);
    assert_eq!(page1.filtered_count, 30);
    assert_eq!(page2.filtered_count, 30);

    // No overlap between consecutive pages.
    for a in &page1.page {
        assert!(page2
            .page
            .iter()
            .all(|b| b.listing.listing_id != a.listing.listing_id));
    }
}

#[test]
fn test_descending_score_order_holds() {
    let engine = MatchEngine::with_default_weights();
    let preference = create_preference();

    let candidates = vec![
        create_listing("good", 2500.0, "2", "Downtown"),
        create_listing("ok", 2500.0, "2", "Uptown"),
        create_listing("poor", 6000.0, "1", "Nowhere"),
        create_listing("fine", 2900.0, "2", "Downtown"),
    ];

    let ranked = engine.rank(
        &preference,
        candidates,
        &create_params(1, 10, SortBy::MatchScore, SortOrder::Desc),
    );

    for window in ranked.page.windows(2) {
        assert!(
            window[0].score >= window[1].score,
            "results not sorted by score"
        );
    }
}

#[test]
fn test_cached_payload_roundtrip_is_identical() {
    // The cache stores the serialized response; a hit must reproduce the
    // fresh computation byte for byte.
    let engine = MatchEngine::with_default_weights();
    let preference = create_preference();
    let params = create_params(1, 10, SortBy::MatchScore, SortOrder::Desc);

    let build = |candidates: Vec<Listing>| -> MatchResponse {
        let ranked = engine.rank(&preference, candidates, &params);
        MatchResponse {
            results: ranked
                .page
                .into_iter()
                .map(|c| MatchResult {
                    explanation: fallback_explanation(&preference, &c.listing),
                    match_score: c.score,
                    listing: c.listing,
                })
                .collect(),
            total_count: ranked.total_count,
            filtered_count: ranked.filtered_count,
        }
    };

    let candidates = vec![
        create_listing("a", 2500.0, "2", "Downtown"),
        create_listing("b", 2800.0, "2", "Downtown"),
    ];

    let fresh = serde_json::to_string(&build(candidates.clone())).unwrap();
    let recomputed = serde_json::to_string(&build(candidates)).unwrap();
    assert_eq!(fresh, recomputed);

    // And the payload survives a cache round trip unchanged.
    let decoded: MatchResponse = serde_json::from_str(&fresh).unwrap();
    assert_eq!(serde_json::to_string(&decoded).unwrap(), fresh);
}

#[tokio::test]
async fn test_force_refresh_still_writes_cache() {
    use haven_match::services::{CacheKey, CacheManager};

    // L1-only cache (no Redis listening on port 1).
    let cache = CacheManager::connect("redis://127.0.0.1:1", 100, 60).await;
    let preference = create_preference();
    let mut params = create_params(1, 10, SortBy::MatchScore, SortOrder::Desc);
    params.force_refresh = true;

    let key = CacheKey::matches(&preference.preference_id, &params);
    let response = MatchResponse {
        results: vec![],
        total_count: 0,
        filtered_count: 0,
    };

    // The handler skips the read when forceRefresh is set but always
    // performs the write; the entry must be there for the next request.
    cache.set_with_ttl(&key, &response, 60).await;
    let cached: Option<MatchResponse> = cache.get(&key).await;
    assert!(cached.is_some());
}

#[tokio::test]
async fn test_invalidation_clears_every_derived_key() {
    use haven_match::services::{CacheKey, CacheManager};

    let cache = CacheManager::connect("redis://127.0.0.1:1", 100, 60).await;
    let preference = create_preference();

    // Entries differing by page/limit/sort all derive from the preference.
    for page in 1..=3 {
        let params = create_params(page, 10, SortBy::MatchScore, SortOrder::Desc);
        let key = CacheKey::matches(&preference.preference_id, &params);
        cache
            .set_with_ttl(&key, &format!("payload-{}", page), 60)
            .await;
    }

    cache
        .invalidate_prefix(&CacheKey::matches_prefix(&preference.preference_id))
        .await;

    for page in 1..=3 {
        let params = create_params(page, 10, SortBy::MatchScore, SortOrder::Desc);
        let key = CacheKey::matches(&preference.preference_id, &params);
        let cached: Option<String> = cache.get(&key).await;
        assert!(cached.is_none(), "stale entry survived for page {}", page);
    }
}
