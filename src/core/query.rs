use crate::models::{Listing, ListingFilters};

/// Which free-text room descriptor a condition applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomField {
    Bedrooms,
    Bathrooms,
}

/// Store-agnostic predicate tree
///
/// Conditions from different filter categories are ANDed (`All`); values
/// within one category are ORed (`Any`). The catalog client translates the
/// coarse parts (price range) into its query language and applies the full
/// tree to decoded documents via [`Predicate::matches`].
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every listing; produced when no filters are supplied.
    True,
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    /// Closed or half-open numeric price range; absent bound = unconstrained.
    PriceRange {
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Exact, case-insensitive match on the trimmed descriptor.
    RoomExact { field: RoomField, value: String },
    /// Case-insensitive prefix match ("2 " catches "2 Bedrooms").
    RoomPrefix { field: RoomField, value: String },
    /// Leading integer of the descriptor is >= min; covers multi-digit
    /// counts ("10 Bedrooms" satisfies min=3).
    RoomAtLeast { field: RoomField, min: u32 },
    /// Case-insensitive substring/equality on the neighborhood.
    NeighborhoodIs { value: String },
    /// Normalized substring match against the amenity collection.
    HasAmenity { value: String },
}

impl Predicate {
    /// Evaluate this predicate against one listing.
    pub fn matches(&self, listing: &Listing) -> bool {
        match self {
            Predicate::True => true,
            Predicate::All(parts) => parts.iter().all(|p| p.matches(listing)),
            Predicate::Any(parts) => parts.iter().any(|p| p.matches(listing)),
            Predicate::PriceRange { min, max } => {
                listing.price.is_finite()
                    && min.map_or(true, |m| listing.price >= m)
                    && max.map_or(true, |m| listing.price <= m)
            }
            Predicate::RoomExact { field, value } => {
                room_descriptor(listing, *field).trim().eq_ignore_ascii_case(value)
            }
            Predicate::RoomPrefix { field, value } => room_descriptor(listing, *field)
                .trim()
                .to_lowercase()
                .starts_with(&value.to_lowercase()),
            Predicate::RoomAtLeast { field, min } => {
                leading_number(room_descriptor(listing, *field)).is_some_and(|n| n >= *min)
            }
            Predicate::NeighborhoodIs { value } => listing
                .neighborhood
                .to_lowercase()
                .contains(&value.to_lowercase()),
            Predicate::HasAmenity { value } => {
                let wanted = normalize_token(value);
                listing
                    .amenities
                    .iter()
                    .any(|a| normalize_token(a).contains(&wanted))
            }
        }
    }

    /// Extract the price bounds, if this tree carries a price condition at
    /// the top level. The catalog client pushes these down to the store.
    pub fn price_bounds(&self) -> Option<(Option<f64>, Option<f64>)> {
        match self {
            Predicate::PriceRange { min, max } => Some((*min, *max)),
            Predicate::All(parts) => parts.iter().find_map(|p| p.price_bounds()),
            _ => None,
        }
    }
}

/// Build a predicate from filter criteria.
///
/// Unrecognized filter values (a bedroom selection that is neither numeric,
/// "Studio", nor the "N+" sentinel) are skipped, never an error. No filters
/// supplied produces [`Predicate::True`].
pub fn build_predicate(filters: &ListingFilters) -> Predicate {
    let mut groups = Vec::new();

    if filters.min_price.is_some() || filters.max_price.is_some() {
        groups.push(Predicate::PriceRange {
            min: filters.min_price,
            max: filters.max_price,
        });
    }

    for (field, values) in [
        (RoomField::Bedrooms, &filters.bedrooms),
        (RoomField::Bathrooms, &filters.bathrooms),
    ] {
        let conditions: Vec<Predicate> = values
            .iter()
            .filter_map(|v| room_condition(field, v))
            .collect();
        match conditions.len() {
            0 => {}
            1 => groups.push(conditions.into_iter().next().unwrap()),
            _ => groups.push(Predicate::Any(conditions)),
        }
    }

    let neighborhoods: Vec<Predicate> = filters
        .neighborhoods
        .iter()
        .filter(|v| !v.trim().is_empty())
        .map(|v| Predicate::NeighborhoodIs {
            value: v.trim().to_string(),
        })
        .collect();
    if !neighborhoods.is_empty() {
        groups.push(any_or_single(neighborhoods));
    }

    let amenities: Vec<Predicate> = filters
        .amenities
        .iter()
        .filter(|v| !v.trim().is_empty())
        .map(|v| Predicate::HasAmenity {
            value: v.trim().to_string(),
        })
        .collect();
    if !amenities.is_empty() {
        groups.push(any_or_single(amenities));
    }

    match groups.len() {
        0 => Predicate::True,
        1 => groups.into_iter().next().unwrap(),
        _ => Predicate::All(groups),
    }
}

fn any_or_single(mut conditions: Vec<Predicate>) -> Predicate {
    if conditions.len() == 1 {
        conditions.remove(0)
    } else {
        Predicate::Any(conditions)
    }
}

/// Translate one bedroom/bathroom filter value into a condition.
///
/// "Studio" matches "0", "0 Bedrooms" and any case-insensitive "studio…"
/// prefix; "N+" matches any descriptor whose leading integer is >= N;
/// a plain number matches exactly or as a "N " prefix ("2 Bedrooms").
fn room_condition(field: RoomField, value: &str) -> Option<Predicate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if value.eq_ignore_ascii_case("studio") {
        return Some(Predicate::Any(vec![
            Predicate::RoomExact {
                field,
                value: "0".to_string(),
            },
            Predicate::RoomPrefix {
                field,
                value: "0 ".to_string(),
            },
            Predicate::RoomPrefix {
                field,
                value: "studio".to_string(),
            },
        ]));
    }

    if let Some(stripped) = value.strip_suffix('+') {
        let min: u32 = stripped.trim().parse().ok()?;
        return Some(Predicate::RoomAtLeast { field, min });
    }

    // Plain numeric selection; anything else is unrecognized and ignored.
    if value.parse::<f64>().is_ok() {
        return Some(Predicate::Any(vec![
            Predicate::RoomExact {
                field,
                value: value.to_string(),
            },
            Predicate::RoomPrefix {
                field,
                value: format!("{} ", value),
            },
        ]));
    }

    None
}

fn room_descriptor(listing: &Listing, field: RoomField) -> &str {
    match field {
        RoomField::Bedrooms => &listing.bedrooms,
        RoomField::Bathrooms => &listing.bathrooms,
    }
}

/// Leading integer of a descriptor ("4 Bedrooms" -> 4); None when the text
/// does not start with a digit.
pub fn leading_number(s: &str) -> Option<u32> {
    let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Lowercase, fold hyphens into spaces, and collapse whitespace, so that
/// "pet-friendly" and "Pet Friendly" compare equal.
pub fn normalize_token(s: &str) -> String {
    s.to_lowercase()
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
