use std::cmp::Ordering;

use crate::core::distance::within_radius;
use crate::core::scoring::score_listing;
use crate::models::{Listing, MatchParams, Preference, ScoringWeights, SortBy, SortOrder};

/// One candidate after the scoring stage
///
/// `scored` is false for candidates beyond the scoring bound; they carry a
/// default score of 0 and get the generic explanation downstream.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub listing: Listing,
    pub score: u8,
    pub scored: bool,
}

/// Result of the ranking pipeline
#[derive(Debug)]
pub struct RankedMatches {
    /// The requested page, in final order.
    pub page: Vec<ScoredCandidate>,
    /// Candidates returned by the catalog for the predicate.
    pub total_count: usize,
    /// Candidates surviving the validity/geo filter; pagination runs over
    /// this set.
    pub filtered_count: usize,
}

/// Pure ranking stages of the match pipeline
///
/// # Pipeline Stages
/// 1. Validity filter (active/approved flags, geo radius)
/// 2. Pre-score sort when sorting by price or dateAdded
/// 3. Bounded scoring (first `score_bound` candidates)
/// 4. Score sort with explicit stable tie-breaking
/// 5. Pagination
///
/// I/O-bound stages (cache, catalog, enrichment) live with their clients;
/// everything here is deterministic and synchronous.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    weights: ScoringWeights,
    score_bound: usize,
}

impl MatchEngine {
    pub fn new(weights: ScoringWeights, score_bound: usize) -> Self {
        Self {
            weights,
            score_bound: score_bound.max(1),
        }
    }

    pub fn with_default_weights() -> Self {
        Self::new(ScoringWeights::default(), 1000)
    }

    /// Run the ranking pipeline over the fetched candidates.
    pub fn rank(
        &self,
        preference: &Preference,
        candidates: Vec<Listing>,
        params: &MatchParams,
    ) -> RankedMatches {
        let total_count = candidates.len();

        let mut filtered: Vec<Listing> = candidates
            .into_iter()
            .filter(|listing| is_valid_candidate(preference, listing))
            .collect();
        let filtered_count = filtered.len();

        // Sorting by a listing attribute happens before the scoring bound
        // cuts the tail, so the bound drops the least relevant candidates.
        match params.sort_by {
            SortBy::Price => {
                filtered = stable_sort_by(filtered, params.sort_order, |a, b| {
                    a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal)
                });
            }
            SortBy::DateAdded => {
                filtered = stable_sort_by(filtered, params.sort_order, |a, b| {
                    a.created_at.cmp(&b.created_at)
                });
            }
            SortBy::MatchScore => {}
        }

        // Bounded scoring: candidates beyond the bound keep score 0 and are
        // appended after the scored set, a latency/completeness trade-off.
        let bound = self.score_bound.min(filtered.len());
        let mut scored: Vec<ScoredCandidate> = filtered
            .into_iter()
            .enumerate()
            .map(|(index, listing)| {
                if index < self.score_bound {
                    let score = score_listing(preference, &listing, &self.weights);
                    ScoredCandidate {
                        listing,
                        score,
                        scored: true,
                    }
                } else {
                    ScoredCandidate {
                        listing,
                        score: 0,
                        scored: false,
                    }
                }
            })
            .collect();

        if params.sort_by == SortBy::MatchScore {
            let remainder = scored.split_off(bound);
            scored = stable_sort_by(scored, params.sort_order, |a, b| a.score.cmp(&b.score));
            scored.extend(remainder);
        }

        let page = paginate(scored, params.page, params.limit);

        RankedMatches {
            page,
            total_count,
            filtered_count,
        }
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::with_default_weights()
    }
}

/// Defensive validity filter: drop records with missing identity, inactive
/// or unapproved listings, and listings outside the preference's geo radius
/// (when one is set; listings without coordinates cannot be verified and are
/// dropped too).
fn is_valid_candidate(preference: &Preference, listing: &Listing) -> bool {
    if listing.listing_id.trim().is_empty() {
        return false;
    }
    if !listing.is_active || !listing.approved() {
        return false;
    }

    if let (Some(center_lat), Some(center_lon), Some(radius)) = (
        preference.latitude,
        preference.longitude,
        preference.radius_km,
    ) {
        match (listing.latitude, listing.longitude) {
            (Some(lat), Some(lon)) => {
                if !within_radius(center_lat, center_lon, lat, lon, radius) {
                    return false;
                }
            }
            _ => return false,
        }
    }

    true
}

/// Stable sort with explicit tie-breaking: elements are decorated with
/// their input index and equal keys compare by that index, so the relative
/// order of ties is guaranteed rather than left to the sort algorithm.
fn stable_sort_by<T, F>(items: Vec<T>, order: SortOrder, mut cmp: F) -> Vec<T>
where
    F: FnMut(&T, &T) -> Ordering,
{
    let mut decorated: Vec<(usize, T)> = items.into_iter().enumerate().collect();
    decorated.sort_by(|(index_a, a), (index_b, b)| {
        let by_key = match order {
            SortOrder::Asc => cmp(a, b),
            SortOrder::Desc => cmp(a, b).reverse(),
        };
        by_key.then(index_a.cmp(index_b))
    });
    decorated.into_iter().map(|(_, item)| item).collect()
}

fn paginate<T>(items: Vec<T>, page: u32, limit: u32) -> Vec<T> {
    let start = (page.saturating_sub(1) as usize).saturating_mul(limit as usize);
    items.into_iter().skip(start).take(limit as usize).collect()
}
