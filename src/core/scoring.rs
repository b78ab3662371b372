use chrono::NaiveDate;

use crate::core::query::normalize_token;
use crate::models::{Listing, Preference, ScoringWeights};

/// Calculate a match score (0-100) for a listing against a preference
///
/// Scoring formula:
/// score = (
///     price_fit * 0.30 +           # inside budget = 1, linear decay outside
///     bedroom_fit * 0.25 +         # descriptor satisfies a requested value
///     neighborhood_fit * 0.20 +    # preferred neighborhood
///     move_in_fit * 0.10 +         # available by the move-in date
///     amenity_overlap * 0.15       # requested amenities present, as a ratio
/// ) * 100
///
/// Total and deterministic: an unset preference dimension is neutral (1.0),
/// missing or unparseable listing data contributes 0 for that dimension, and
/// non-finite intermediates collapse to 0 before the final clamp.
pub fn score_listing(preference: &Preference, listing: &Listing, weights: &ScoringWeights) -> u8 {
    let price = finite_or_zero(price_fit(preference, listing));
    let bedrooms = finite_or_zero(room_fit(&preference.bedrooms, &listing.bedrooms));
    let bathrooms = finite_or_zero(room_fit(&preference.bathrooms, &listing.bathrooms));
    let neighborhood = finite_or_zero(neighborhood_fit(preference, listing));
    let move_in = finite_or_zero(move_in_fit(preference, listing));
    let amenities = finite_or_zero(amenity_overlap(preference, listing));

    // Bedrooms and bathrooms share one weighted dimension; an unmet
    // bathroom requirement zeroes it, no requirement leaves it untouched.
    let rooms = bedrooms * bathrooms;

    let total = (price * weights.price
        + rooms * weights.bedrooms
        + neighborhood * weights.neighborhood
        + move_in * weights.move_in
        + amenities * weights.amenities)
        * 100.0;

    if !total.is_finite() {
        return 0;
    }

    total.round().clamp(0.0, 100.0) as u8
}

#[inline]
fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Price fit (0-1): 1.0 inside the budget, linearly decaying with the
/// overshoot relative to the budget width (or the violated bound when the
/// range is half-open).
fn price_fit(preference: &Preference, listing: &Listing) -> f64 {
    if !listing.price.is_finite() || listing.price <= 0.0 {
        return 0.0;
    }

    let (min, max) = (preference.price_min, preference.price_max);
    if min.is_none() && max.is_none() {
        return 1.0;
    }

    let below = min.map_or(0.0, |m| (m - listing.price).max(0.0));
    let above = max.map_or(0.0, |m| (listing.price - m).max(0.0));
    let overshoot = below.max(above);
    if overshoot == 0.0 {
        return 1.0;
    }

    let reference = match (min, max) {
        (Some(lo), Some(hi)) if hi > lo => hi - lo,
        (_, Some(hi)) if hi > 0.0 => hi,
        (Some(lo), _) if lo > 0.0 => lo,
        _ => return 0.0,
    };

    (1.0 - overshoot / reference).max(0.0)
}

/// Room fit (0-1): 1.0 when the listing descriptor satisfies any requested
/// value ("2", "Studio", "3+"). No requirement is neutral; an unparseable
/// descriptor contributes 0.
fn room_fit(requested: &[String], descriptor: &str) -> f64 {
    let requirements: Vec<RoomRequirement> = requested
        .iter()
        .filter_map(|v| RoomRequirement::parse(v))
        .collect();
    if requirements.is_empty() {
        return 1.0;
    }

    let Some(count) = parse_room_count(descriptor) else {
        return 0.0;
    };

    if requirements.iter().any(|r| r.satisfied_by(count)) {
        1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RoomRequirement {
    Exactly(f64),
    AtLeast(f64),
}

impl RoomRequirement {
    fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("studio") {
            return Some(RoomRequirement::Exactly(0.0));
        }
        if let Some(stripped) = value.strip_suffix('+') {
            return stripped
                .trim()
                .parse::<f64>()
                .ok()
                .map(RoomRequirement::AtLeast);
        }
        value.parse::<f64>().ok().map(RoomRequirement::Exactly)
    }

    fn satisfied_by(&self, count: f64) -> bool {
        match self {
            RoomRequirement::Exactly(n) => (count - n).abs() < f64::EPSILON,
            RoomRequirement::AtLeast(n) => count >= *n,
        }
    }
}

/// Parse a free-form room descriptor into a count: "Studio…" is 0,
/// otherwise the leading number ("2 Bedrooms" -> 2, "1.5 Baths" -> 1.5).
pub fn parse_room_count(descriptor: &str) -> Option<f64> {
    let descriptor = descriptor.trim();
    if descriptor.to_lowercase().starts_with("studio") {
        return Some(0.0);
    }
    let leading: String = descriptor
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    leading.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn neighborhood_fit(preference: &Preference, listing: &Listing) -> f64 {
    if preference.neighborhoods.is_empty() {
        return 1.0;
    }
    if listing.neighborhood.trim().is_empty() {
        return 0.0;
    }
    let actual = listing.neighborhood.to_lowercase();
    let hit = preference
        .neighborhoods
        .iter()
        .any(|n| actual.contains(&n.to_lowercase()));
    if hit {
        1.0
    } else {
        0.0
    }
}

/// Move-in feasibility (0 or 1): the listing is available on or before the
/// preferred move-in date. Listings with no parseable availability get 0;
/// a preference without a parseable move-in date is neutral.
fn move_in_fit(preference: &Preference, listing: &Listing) -> f64 {
    let Some(move_in) = preference.move_in_date.as_deref().and_then(parse_date) else {
        return 1.0;
    };
    let Some(available) = listing.available_from.as_deref().and_then(parse_date) else {
        return 0.0;
    };
    if available <= move_in {
        1.0
    } else {
        0.0
    }
}

fn amenity_overlap(preference: &Preference, listing: &Listing) -> f64 {
    if preference.amenities.is_empty() {
        return 1.0;
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
    matched as f64 / preference.amenities.len() as f64
}

/// Parse an ISO date ("2026-09-01") or an RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
}
