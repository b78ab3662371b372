// Core algorithm exports
pub mod distance;
pub mod explain;
pub mod matcher;
pub mod query;
pub mod scoring;

pub use distance::{haversine_distance, within_radius};
pub use explain::{fallback_explanation, generic_explanation};
pub use matcher::{MatchEngine, RankedMatches, ScoredCandidate};
pub use query::{build_predicate, Predicate, RoomField};
pub use scoring::score_listing;
