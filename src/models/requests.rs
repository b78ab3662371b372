use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{ListingFilters, SortBy, SortOrder};

/// Raw query parameters for the match endpoint
///
/// List-valued filters arrive as comma-separated strings and are split
/// during validation. Numeric/sort fields are checked once here, at the
/// boundary, so downstream stages never re-validate.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MatchQuery {
    #[validate(range(min = 1))]
    #[serde(default)]
    pub page: Option<u32>,
    #[validate(range(min = 1))]
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(rename = "sortBy", default)]
    pub sort_by: Option<String>,
    #[serde(rename = "sortOrder", default)]
    pub sort_order: Option<String>,
    #[serde(rename = "forceRefresh", default)]
    pub force_refresh: Option<bool>,
    #[serde(rename = "minPrice", default)]
    pub min_price: Option<f64>,
    #[serde(rename = "maxPrice", default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub bedrooms: Option<String>,
    #[serde(default)]
    pub bathrooms: Option<String>,
    #[serde(default)]
    pub neighborhoods: Option<String>,
    #[serde(default)]
    pub amenities: Option<String>,
}

/// Fully validated match request parameters
#[derive(Debug, Clone, PartialEq)]
pub struct MatchParams {
    pub page: u32,
    pub limit: u32,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub force_refresh: bool,
    pub filters: ListingFilters,
}

impl MatchQuery {
    /// Validate and resolve the raw query into pipeline parameters.
    ///
    /// Returns a human-readable message on the first violation; the handler
    /// maps it to a 400 before any collaborator is touched.
    pub fn into_params(self, default_limit: u32, max_limit: u32) -> Result<MatchParams, String> {
        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err("page must be >= 1".to_string());
        }

        let limit = self.limit.unwrap_or(default_limit);
        if limit < 1 || limit > max_limit {
            return Err(format!("limit must be between 1 and {}", max_limit));
        }

        let sort_by = match self.sort_by.as_deref() {
            None => SortBy::MatchScore,
            Some(raw) => SortBy::parse(raw)
                .ok_or_else(|| "sortBy must be one of: matchScore, price, dateAdded".to_string())?,
        };

        let sort_order = match self.sort_order.as_deref() {
            None => SortOrder::Desc,
            Some(raw) => SortOrder::parse(raw)
                .ok_or_else(|| "sortOrder must be one of: asc, desc".to_string())?,
        };

        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err("minPrice must not exceed maxPrice".to_string());
            }
        }

        let filters = ListingFilters {
            min_price: self.min_price,
            max_price: self.max_price,
            bedrooms: split_csv(self.bedrooms.as_deref()),
            bathrooms: split_csv(self.bathrooms.as_deref()),
            neighborhoods: split_csv(self.neighborhoods.as_deref()),
            amenities: split_csv(self.amenities.as_deref()),
        };

        Ok(MatchParams {
            page,
            limit,
            sort_by,
            sort_order,
            force_refresh: self.force_refresh.unwrap_or(false),
            filters,
        })
    }
}

/// Preference ids are catalog document ids: 1-36 chars of [A-Za-z0-9_-]
pub fn is_valid_preference_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 36
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn split_csv(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect()
    })
    .unwrap_or_default()
}
