// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Listing, ListingFilters, MatchResult, Preference, ScoringWeights, SortBy, SortOrder,
};
pub use requests::{is_valid_preference_id, MatchParams, MatchQuery};
pub use responses::{ErrorResponse, HealthResponse, InvalidateResponse, MatchResponse};
