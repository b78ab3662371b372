use serde::{Deserialize, Serialize};

/// Apartment listing as stored in the catalog
///
/// Bedroom/bathroom descriptors are free-form text ("2", "2 Bedrooms",
/// "Studio"), not guaranteed numeric. Parsing happens at the point of use
/// and parse failures are never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "listingId")]
    pub listing_id: String,
    #[serde(default)]
    pub title: String,
    pub price: f64,
    pub bedrooms: String,
    #[serde(default)]
    pub bathrooms: String,
    pub neighborhood: String,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(rename = "availableFrom", default)]
    pub available_from: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(rename = "isActive", default = "default_true")]
    pub is_active: bool,
    #[serde(rename = "isApproved", default)]
    pub is_approved: Option<bool>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Listing {
    /// Helper to get is_approved as a bool; listings predating the approval
    /// flow carry no flag and count as approved.
    pub fn approved(&self) -> bool {
        self.is_approved.unwrap_or(true)
    }
}

fn default_true() -> bool {
    true
}

/// Stored user housing preference
///
/// Immutable once read by the pipeline for a single request. Mutations
/// happen in the catalog backend and must hit the invalidation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preference {
    #[serde(rename = "preferenceId")]
    pub preference_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "priceMin", default)]
    pub price_min: Option<f64>,
    #[serde(rename = "priceMax", default)]
    pub price_max: Option<f64>,
    #[serde(default)]
    pub bedrooms: Vec<String>,
    #[serde(default)]
    pub bathrooms: Vec<String>,
    #[serde(default)]
    pub neighborhoods: Vec<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(rename = "moveInDate", default)]
    pub move_in_date: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(rename = "radiusKm", default)]
    pub radius_km: Option<f64>,
}

/// A single scored, explained match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub listing: Listing,
    #[serde(rename = "matchScore")]
    pub match_score: u8,
    pub explanation: String,
}

/// Filter criteria parsed from request query parameters
///
/// All fields optional; an empty set of filters matches every listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilters {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub bedrooms: Vec<String>,
    pub bathrooms: Vec<String>,
    pub neighborhoods: Vec<String>,
    pub amenities: Vec<String>,
}

impl ListingFilters {
    pub fn is_empty(&self) -> bool {
        self.min_price.is_none()
            && self.max_price.is_none()
            && self.bedrooms.is_empty()
            && self.bathrooms.is_empty()
            && self.neighborhoods.is_empty()
            && self.amenities.is_empty()
    }

    /// Canonical serialization for cache keys: fixed category order,
    /// lowercased and sorted values, empty categories omitted. Two
    /// semantically identical filter sets always produce the same string.
    pub fn canonical_string(&self) -> String {
        fn fmt_num(v: f64) -> String {
            if v.fract() == 0.0 {
                format!("{}", v as i64)
            } else {
                format!("{}", v)
            }
        }

        fn sorted_values(values: &[String]) -> String {
            let mut normalized: Vec<String> = values
                .iter()
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect();
            normalized.sort();
            normalized.dedup();
            normalized.join(",")
        }

        let mut segments = Vec::new();
        if let Some(min) = self.min_price {
            segments.push(format!("minPrice={}", fmt_num(min)));
        }
        if let Some(max) = self.max_price {
            segments.push(format!("maxPrice={}", fmt_num(max)));
        }
        for (name, values) in [
            ("bedrooms", &self.bedrooms),
            ("bathrooms", &self.bathrooms),
            ("neighborhoods", &self.neighborhoods),
            ("amenities", &self.amenities),
        ] {
            if !values.is_empty() {
                segments.push(format!("{}={}", name, sorted_values(values)));
            }
        }

        if segments.is_empty() {
            "-".to_string()
        } else {
            segments.join("&")
        }
    }
}

/// Sort criterion for match results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
    #[serde(rename = "matchScore")]
    MatchScore,
    #[serde(rename = "price")]
    Price,
    #[serde(rename = "dateAdded")]
    DateAdded,
}

impl SortBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "matchScore" => Some(SortBy::MatchScore),
            "price" => Some(SortBy::Price),
            "dateAdded" => Some(SortBy::DateAdded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::MatchScore => "matchScore",
            SortBy::Price => "price",
            SortBy::DateAdded => "dateAdded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Scoring weights per dimension; should sum to 1.0 for a full-range score
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub price: f64,
    pub bedrooms: f64,
    pub neighborhood: f64,
    pub move_in: f64,
    pub amenities: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            price: 0.30,
            bedrooms: 0.25,
            neighborhood: 0.20,
            move_in: 0.10,
            amenities: 0.15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_string_order_independent() {
        let a = ListingFilters {
            min_price: Some(2000.0),
            max_price: Some(3000.0),
            bedrooms: vec!["2".to_string(), "3".to_string()],
            neighborhoods: vec!["Downtown".to_string(), "Uptown".to_string()],
            ..Default::default()
        };
        let b = ListingFilters {
            max_price: Some(3000.0),
            min_price: Some(2000.0),
            bedrooms: vec!["3".to_string(), "2".to_string()],
            neighborhoods: vec!["uptown".to_string(), "DOWNTOWN".to_string()],
            ..Default::default()
        };

        assert_eq!(a.canonical_string(), b.canonical_string());
    }

    #[test]
    fn test_canonical_string_empty() {
        let filters = ListingFilters::default();
        assert_eq!(filters.canonical_string(), "-");
    }

    #[test]
    fn test_canonical_string_whole_prices() {
        let filters = ListingFilters {
            min_price: Some(2000.0),
            ..Default::default()
        };
        assert_eq!(filters.canonical_string(), "minPrice=2000");
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!(SortBy::parse("matchScore"), Some(SortBy::MatchScore));
        assert_eq!(SortBy::parse("dateAdded"), Some(SortBy::DateAdded));
        assert_eq!(SortBy::parse("bogus"), None);
        assert_eq!(SortOrder::parse("desc"), Some(SortOrder::Desc));
        assert_eq!(SortOrder::parse("DESC"), None);
    }

    #[test]
    fn test_missing_approval_flag_counts_as_approved() {
        let json = r#"{
            "listingId": "apt1",
            "price": 2500.0,
            "bedrooms": "2",
            "neighborhood": "Downtown"
        }"#;
        let listing: Listing = serde_json::from_str(json).unwrap();
        assert!(listing.approved());
        assert!(listing.is_active);
    }
}
