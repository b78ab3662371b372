use crate::core::query::normalize_token;
use crate::core::scoring::{parse_date, parse_room_count};
use crate::models::{Listing, Preference};

/// Deterministic, rule-based explanation used whenever the LLM path yields
/// nothing. Pure function of (preference, listing); never fails and never
/// returns an empty string. Each dimension is checked independently so a
/// parse failure on one silently contributes nothing.
pub fn fallback_explanation(preference: &Preference, listing: &Listing) -> String {
    let mut points = Vec::new();

    if let Some(line) = price_point(preference, listing) {
        points.push(line);
    }
    if let Some(line) = bedroom_point(preference, listing) {
        points.push(line);
    }
    if let Some(line) = neighborhood_point(preference, listing) {
        points.push(line);
    }
    if let Some(line) = move_in_point(preference, listing) {
        points.push(line);
    }
    if let Some(line) = amenity_point(preference, listing) {
        points.push(line);
    }

    if points.is_empty() {
        generic_explanation()
    } else {
        points.join("\n")
    }
}

/// Explanation attached to candidates beyond the scoring bound and to
/// listings with no matching dimension.
pub fn generic_explanation() -> String {
    "This listing may match some of your preferences.".to_string()
}

fn price_point(preference: &Preference, listing: &Listing) -> Option<String> {
    if !listing.price.is_finite() || listing.price <= 0.0 {
        return None;
    }
    let min = preference.price_min;
    let max = preference.price_max;
    if min.is_none() && max.is_none() {
        return None;
    }
    let inside = min.map_or(true, |m| listing.price >= m) && max.map_or(true, |m| listing.price <= m);
    if !inside {
        return None;
    }

    let budget = match (min, max) {
        (Some(lo), Some(hi)) => format!("{:.0}-{:.0}", lo, hi),
        (None, Some(hi)) => format!("up to {:.0}", hi),
        (Some(lo), None) => format!("{:.0} or more", lo),
        (None, None) => return None,
    };
    Some(format!(
        "- Priced at {:.0}, within your {} budget",
        listing.price, budget
    ))
}

fn bedroom_point(preference: &Preference, listing: &Listing) -> Option<String> {
    if preference.bedrooms.is_empty() {
        return None;
    }
    let count = parse_room_count(&listing.bedrooms)?;
    let satisfied = preference.bedrooms.iter().any(|wanted| {
        let wanted = wanted.trim();
        if wanted.eq_ignore_ascii_case("studio") {
            return count == 0.0;
        }
        if let Some(stripped) = wanted.strip_suffix('+') {
            return stripped
                .trim()
                .parse::<f64>()
                .map(|n| count >= n)
                .unwrap_or(false);
        }
        wanted.parse::<f64>().map(|n| count == n).unwrap_or(false)
    });
    if !satisfied {
        return None;
    }

    if count == 0.0 {
        Some("- Studio layout, matching your bedroom preference".to_string())
    } else {
        Some(format!(
            "- {} bedroom{}, matching your preference",
            count,
            if count == 1.0 { "" } else { "s" }
        ))
    }
}

fn neighborhood_point(preference: &Preference, listing: &Listing) -> Option<String> {
    if preference.neighborhoods.is_empty() || listing.neighborhood.trim().is_empty() {
        return None;
    }
    let actual = listing.neighborhood.to_lowercase();
    let hit = preference
        .neighborhoods
        .iter()
        .any(|n| actual.contains(&n.to_lowercase()));
    if hit {
        Some(format!(
            "- Located in {}, one of your preferred neighborhoods",
            listing.neighborhood
        ))
    } else {
        None
    }
}

fn move_in_point(preference: &Preference, listing: &Listing) -> Option<String> {
    let move_in = preference.move_in_date.as_deref().and_then(parse_date)?;
    let available = listing.available_from.as_deref().and_then(parse_date)?;
    if available <= move_in {
        Some(format!(
            "- Available from {}, in time for your move-in date",
            available
        ))
    } else {
        None
    }
}

fn amenity_point(preference: &Preference, listing: &Listing) -> Option<String> {
    if preference.amenities.is_empty() {
        return None;
    }
    let normalized: Vec<String> = listing.amenities.iter().map(|a| normalize_token(a)).collect();
    let matched = preference
        .amenities
        .iter()
        .filter(|wanted| {
            let wanted = normalize_token(wanted);
            !wanted.is_empty() && normalized.iter().any(|a| a.contains(&wanted))
        })
        .count();
    if matched == 0 {
        return None;
    }
    Some(format!(
        "- Includes {} of your {} requested amenities",
        matched,
        preference.amenities.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_listing() -> Listing {
        Listing {
            listing_id: "apt1".to_string(),
            title: "Bright two-bedroom".to_string(),
            price: 2500.0,
            bedrooms: "2".to_string(),
            bathrooms: "1".to_string(),
            neighborhood: "Downtown".to_string(),
            amenities: vec!["Gym".to_string()],
            available_from: Some("2026-08-15".to_string()),
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
            amenities: vec!["gym".to_string()],
            move_in_date: Some("2026-09-01".to_string()),
            latitude: None,
            longitude: None,
            radius_km: None,
        }
    }

    #[test]
    fn test_mentions_price_bedrooms_neighborhood() {
        let text = fallback_explanation(&test_preference(), &test_listing());
        assert!(text.contains("2500"), "missing price line: {}", text);
        assert!(text.contains("bedroom"), "missing bedroom line: {}", text);
        assert!(text.contains("Downtown"), "missing neighborhood line: {}", text);
    }

    #[test]
    fn test_no_matching_dimension_yields_generic_text() {
        let preference = test_preference();
        let mut listing = test_listing();
        listing.price = 9000.0;
        listing.bedrooms = "1".to_string();
        listing.neighborhood = "Uptown".to_string();
        listing.amenities = vec![];
        listing.available_from = None;

        let text = fallback_explanation(&preference, &listing);
        assert_eq!(text, generic_explanation());
    }

    #[test]
    fn test_never_empty_even_on_malformed_listing() {
        let preference = test_preference();
        let mut listing = test_listing();
        listing.price = f64::NAN;
        listing.bedrooms = "???".to_string();
        listing.available_from = Some("not a date".to_string());
        listing.neighborhood = String::new();

        let text = fallback_explanation(&preference, &listing);
        assert!(!text.is_empty());
    }

    #[test]
    fn test_studio_bedroom_line() {
        let mut preference = test_preference();
        preference.bedrooms = vec!["Studio".to_string()];
        let mut listing = test_listing();
        listing.bedrooms = "Studio".to_string();

        let text = fallback_explanation(&preference, &listing);
        assert!(text.contains("Studio layout"), "{}", text);
    }

    #[test]
    fn test_amenity_count_line() {
        let mut preference = test_preference();
        preference.amenities = vec!["gym".to_string(), "pool".to_string()];

        let text = fallback_explanation(&preference, &test_listing());
        assert!(text.contains("1 of your 2 requested amenities"), "{}", text);
    }

    #[test]
    fn test_unbounded_budget_wording() {
        let mut preference = test_preference();
        preference.price_min = None;

        let text = fallback_explanation(&preference, &test_listing());
        assert!(text.contains("up to 3000"), "{}", text);
    }
}
