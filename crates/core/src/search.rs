//! Product search with optional radius filtering.
//!
//! Candidates are available products joined with their producer. A candidate
//! matches when every supplied filter matches:
//!
//! - `query` - case-insensitive substring of the product name or description
//!   (blank matches everything)
//! - `category` - case-insensitive exact match
//! - `tags` - the product carries at least one of them
//! - `origin` + `radius_km` - producer lies within the radius
//!
//! Results are sorted by distance when an origin is given, otherwise by
//! recency (newest first).

use std::cmp::Ordering;

use serde::Serialize;
use thiserror::Error;

use crate::catalog::{Producer, Product};
use crate::types::Location;
use crate::types::location::display_km;

/// Errors produced while validating search criteria.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SearchError {
    #[error("radius must be a non-negative number of kilometers (got {0})")]
    InvalidRadius(f64),
}

/// Filters for a product search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub query: String,
    pub category: Option<String>,
    /// Match-any tag filter. Empty means no tag filter.
    pub tags: Vec<String>,
    /// Point distances are measured from.
    pub origin: Option<Location>,
    /// Only honored together with `origin`.
    pub radius_km: Option<f64>,
    pub limit: Option<usize>,
}

/// A product together with its producer, as loaded from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCandidate {
    pub product: Product,
    pub producer: Producer,
}

/// A matching product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub product: Product,
    pub producer: Producer,
    /// Distance from the search origin, rounded to 0.1 km.
    pub distance_km: Option<f64>,
}

impl SearchCriteria {
    /// Criteria matching every available product.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Check that numeric filters are usable.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::InvalidRadius` for negative or non-finite radii.
    pub fn validate(&self) -> Result<(), SearchError> {
        match self.radius_km {
            Some(r) if !r.is_finite() || r < 0.0 => Err(SearchError::InvalidRadius(r)),
            _ => Ok(()),
        }
    }

    /// Whether the product passes the text, category and tag filters.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if !product.available {
            return false;
        }

        let query = self.query.trim().to_lowercase();
        if !query.is_empty() {
            let in_name = product.name.to_lowercase().contains(&query);
            let in_description = product
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&query));
            if !in_name && !in_description {
                return false;
            }
        }

        if let Some(category) = self.category.as_deref().map(str::trim)
            && !category.is_empty()
            && !product.category.trim().eq_ignore_ascii_case(category)
        {
            return false;
        }

        let tags: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tags.is_empty() || product.has_any_tag(&tags)
    }
}

/// Run a search over `candidates`.
///
/// # Errors
///
/// Returns `SearchError` if the criteria are invalid.
pub fn search(
    criteria: &SearchCriteria,
    candidates: Vec<SearchCandidate>,
) -> Result<Vec<SearchHit>, SearchError> {
    criteria.validate()?;

    // (hit, exact distance) - the radius filter and ordering use the unrounded value
    let mut hits: Vec<(SearchHit, Option<f64>)> = candidates
        .into_iter()
        .filter(|c| criteria.matches(&c.product))
        .filter_map(|c| {
            let distance = criteria
                .origin
                .zip(c.producer.location)
                .map(|(origin, at)| origin.distance_km(&at));

            if let (Some(_), Some(radius)) = (criteria.origin, criteria.radius_km) {
                match distance {
                    Some(d) if d <= radius => {}
                    _ => return None,
                }
            }

            let hit = SearchHit {
                distance_km: distance.map(display_km),
                product: c.product,
                producer: c.producer,
            };
            Some((hit, distance))
        })
        .collect();

    if criteria.origin.is_some() {
        hits.sort_by(|(a, da), (b, db)| by_distance(*da, *db).then_with(|| by_recency(a, b)));
    } else {
        hits.sort_by(|(a, _), (b, _)| by_recency(a, b));
    }

    let limit = criteria.limit.unwrap_or(usize::MAX);
    Ok(hits.into_iter().take(limit).map(|(hit, _)| hit).collect())
}

/// Ascending distance; unknown distances last.
fn by_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Newest first; equal timestamps fall back to the higher id.
fn by_recency(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.product
        .created_at
        .cmp(&a.product.created_at)
        .then_with(|| b.product.id.cmp(&a.product.id))
}
