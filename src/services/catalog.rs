use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::core::query::Predicate;
use crate::models::{Listing, Preference};

/// Errors that can occur when talking to the catalog backend
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Collection IDs in the catalog backend
#[derive(Debug, Clone)]
pub struct CatalogCollections {
    pub listings: String,
    pub preferences: String,
}

/// Catalog document-API client
///
/// Handles all communication with the listing/preference store:
/// - Resolving stored preferences by id
/// - Querying candidate listings for a predicate
///
/// The store's query language covers equality and numeric comparisons, so
/// the client pushes the coarse conditions (activity flag, price bounds)
/// down and applies the full predicate tree to the decoded documents.
pub struct CatalogClient {
    base_url: String,
    api_key: String,
    project_id: String,
    database_id: String,
    client: Client,
    collections: CatalogCollections,
}

impl CatalogClient {
    pub fn new(
        base_url: String,
        api_key: String,
        project_id: String,
        database_id: String,
        collections: CatalogCollections,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url,
            api_key,
            project_id,
            database_id,
            client,
            collections,
        }
    }

    /// Fetch a stored preference by id.
    pub async fn get_preference(&self, preference_id: &str) -> Result<Preference, CatalogError> {
        let query_json = format!(r#"["preferenceId={}"]"#, preference_id);
        let encoded_query = urlencoding::encode(&query_json);

        let url = format!(
            "{}/databases/{}/collections/{}/documents?query={}",
            self.base_url.trim_end_matches('/'),
            self.database_id,
            self.collections.preferences,
            encoded_query
        );

        tracing::debug!("Fetching preference from: {}", url);

        let response = self
            .client
            .get(&url)
            .header("X-Appwrite-Key", &self.api_key)
            .header("X-Appwrite-Project", &self.project_id)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CatalogError::ApiError(format!(
                "Failed to fetch preference: {}",
                response.status()
            )));
        }

        let json: Value = response.json().await?;

        let documents = json
            .get("documents")
            .and_then(|d| d.as_array())
            .ok_or_else(|| CatalogError::InvalidResponse("Missing documents array".into()))?;

        let doc = documents.first().ok_or_else(|| {
            CatalogError::NotFound(format!("Preference {} not found", preference_id))
        })?;

        let data = doc.get("data").unwrap_or(doc);

        serde_json::from_value(data.clone()).map_err(|e| {
            CatalogError::InvalidResponse(format!("Failed to parse preference: {}", e))
        })
    }

    /// Query candidate listings matching the predicate.
    ///
    /// Malformed documents are dropped during decode rather than failing
    /// the fetch; the precise predicate runs locally over the survivors.
    pub async fn find_listings(&self, predicate: &Predicate) -> Result<Vec<Listing>, CatalogError> {
        let url = format!(
            "{}/databases/{}/collections/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.database_id,
            self.collections.listings
        );

        let mut queries = vec!["equal(\"isActive\", true)".to_string()];

        // Price bounds are the one range condition the store indexes well.
        if let Some((min, max)) = predicate.price_bounds() {
            if let Some(min) = min {
                queries.push(format!("greaterThanEqual(\"price\", {})", min));
            }
            if let Some(max) = max {
                queries.push(format!("lessThanEqual(\"price\", {})", max));
            }
        }

        let queries_json = serde_json::to_string(&queries)
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;
        let encoded_queries = urlencoding::encode(&queries_json);
        let full_url = format!("{}?query={}", url, encoded_queries);

        let response = self
            .client
            .get(&full_url)
            .header("X-Appwrite-Key", &self.api_key)
            .header("X-Appwrite-Project", &self.project_id)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CatalogError::ApiError(format!(
                "Failed to query listings: {}",
                response.status()
            )));
        }

        let json: Value = response.json().await?;

        let total = json.get("total").and_then(|t| t.as_u64()).unwrap_or(0);

        let documents = json
            .get("documents")
            .and_then(|d| d.as_array())
            .ok_or_else(|| CatalogError::InvalidResponse("Missing documents array".into()))?;

        let listings: Vec<Listing> = documents
            .iter()
            .filter_map(|doc| {
                let data = doc.get("data").unwrap_or(doc);
                serde_json::from_value(data.clone()).ok()
            })
            .filter(|listing: &Listing| predicate.matches(listing))
            .collect();

        tracing::debug!(
            "Queried {} matching listings (store total: {})",
            listings.len(),
            total
        );

        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListingFilters;

    fn test_client(base_url: &str) -> CatalogClient {
        CatalogClient::new(
            base_url.to_string(),
            "test_key".to_string(),
            "test_project".to_string(),
            "test_db".to_string(),
            CatalogCollections {
                listings: "listings".to_string(),
                preferences: "preferences".to_string(),
            },
        )
    }

    #[test]
    fn test_catalog_client_creation() {
        let client = test_client("https://catalog.test/v1");
        assert_eq!(client.base_url, "https://catalog.test/v1");
        assert_eq!(client.collections.listings, "listings");
    }

    #[tokio::test]
    async fn test_find_listings_drops_malformed_and_applies_predicate() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "total": 3,
            "documents": [
                {"listingId": "a1", "price": 2500.0, "bedrooms": "2", "neighborhood": "Downtown"},
                {"listingId": "a2", "price": 5000.0, "bedrooms": "1", "neighborhood": "Uptown"},
                {"price": "not-a-listing"}
            ]
        });
        let _mock = server
            .mock(
                "GET",
                mockito::Matcher::Regex("/databases/.*/documents.*".to_string()),
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = test_client(&server.url());
        let predicate = crate::core::query::build_predicate(&ListingFilters {
            max_price: Some(3000.0),
            ..Default::default()
        });

        let listings = client.find_listings(&predicate).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].listing_id, "a1");
    }

    #[tokio::test]
    async fn test_get_preference_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock(
                "GET",
                mockito::Matcher::Regex("/databases/.*/documents.*".to_string()),
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"total": 0, "documents": []}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client.get_preference("missing").await;
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
    }
}
