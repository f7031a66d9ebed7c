//! Product route handlers.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Deserializer};
use tracing::instrument;

use farmstand_core::{Location, Product, ProductId, SearchCriteria, SearchHit, search};

use crate::db::ProductPatch;
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::state::AppState;

/// Deserialize an optional query value, treating an empty string as absent.
fn empty_string_as_none<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Search query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub lng: Option<f64>,
    /// Radius in kilometers.
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub radius: Option<f64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub category: Option<String>,
    /// Comma-separated tags; any one must match.
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub limit: Option<usize>,
}

impl SearchQuery {
    /// Convert raw query parameters into validated search criteria.
    fn into_criteria(self) -> Result<SearchCriteria> {
        let origin = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Location::new(lat, lng)?),
            (None, None) => None,
            _ => {
                return Err(AppError::BadRequest(
                    "lat and lng must be given together".to_string(),
                ));
            }
        };

        let criteria = SearchCriteria {
            query: self.q,
            category: self.category,
            tags: parse_tags(self.tags.as_deref()),
            origin,
            radius_km: self.radius,
            limit: self.limit,
        };
        criteria.validate()?;
        Ok(criteria)
    }
}

fn parse_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(|tags| {
        tags.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

/// Search available products, optionally within a radius.
#[instrument(skip(state))]
pub async fn search_products(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchHit>>> {
    let criteria = query.into_criteria()?;
    let candidates = state.store().list_search_candidates().await?;
    let hits = search(&criteria, candidates)?;

    tracing::debug!(results = hits.len(), "Product search");
    Ok(Json(hits))
}

/// Show a single product.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let product = state
        .store()
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    Ok(Json(product))
}

/// Update price, stock or availability. Only the owning producer may do this.
#[instrument(skip(state, patch))]
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Path(id): Path<ProductId>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>> {
    validate_patch(&patch)?;

    let store = state.store();
    let product = store
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    let producer = store
        .get_producer(product.producer_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("product {id} has no producer")))?;
    if producer.user_id != user_id {
        return Err(AppError::Forbidden(
            "only the producer can edit this product".to_string(),
        ));
    }

    let updated = store.update_product(id, &patch).await?;
    tracing::info!(product_id = %id, "Product updated");
    Ok(Json(updated))
}

/// Reject negative stock and prices that are negative or finer than a cent.
fn validate_patch(patch: &ProductPatch) -> Result<()> {
    if let Some(price) = patch.price {
        if price.is_sign_negative() && !price.is_zero() {
            return Err(AppError::BadRequest("price cannot be negative".to_string()));
        }
        if price.normalize().scale() > 2 {
            return Err(AppError::BadRequest(
                "price must have at most two decimal places".to_string(),
            ));
        }
    }
    if patch.stock.is_some_and(|s| s < 0) {
        return Err(AppError::BadRequest("stock cannot be negative".to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn price(p: rust_decimal::Decimal) -> ProductPatch {
        ProductPatch {
            price: Some(p),
            ..ProductPatch::default()
        }
    }

    #[test]
    fn test_validate_patch() {
        assert!(validate_patch(&ProductPatch::default()).is_ok());
        assert!(validate_patch(&price(dec!(4.25))).is_ok());
        assert!(validate_patch(&price(dec!(4.500))).is_ok());
        assert!(validate_patch(&price(dec!(0))).is_ok());

        let err = validate_patch(&price(dec!(1.005))).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("two decimal places")));
        assert!(validate_patch(&price(dec!(-1))).is_err());
        assert!(
            validate_patch(&ProductPatch {
                stock: Some(-3),
                ..ProductPatch::default()
            })
            .is_err()
        );
    }

    fn query(pairs: &str) -> SearchQuery {
        let uri: axum::http::Uri = format!("/products/search?{pairs}").parse().unwrap();
        Query::<SearchQuery>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(
            parse_tags(Some("organic, local,,")),
            vec!["organic".to_string(), "local".to_string()]
        );
        assert!(parse_tags(None).is_empty());
        assert!(parse_tags(Some(" ")).is_empty());
    }

    #[test]
    fn test_empty_params_are_absent() {
        let q = query("q=&lat=&lng=&radius=&limit=");
        assert!(q.lat.is_none());
        assert!(q.radius.is_none());
        assert!(q.limit.is_none());

        let criteria = q.into_criteria().unwrap();
        assert!(criteria.origin.is_none());
        assert!(criteria.query.is_empty());
    }

    #[test]
    fn test_full_query_builds_criteria() {
        let criteria = query("q=kale&lat=45.52&lng=-122.68&radius=25&category=produce&tags=organic,greens&limit=5")
            .into_criteria()
            .unwrap();
        assert_eq!(criteria.query, "kale");
        assert!(criteria.origin.is_some());
        assert_eq!(criteria.radius_km, Some(25.0));
        assert_eq!(criteria.tags.len(), 2);
        assert_eq!(criteria.limit, Some(5));
    }

    #[test]
    fn test_lat_without_lng_rejected() {
        let err = query("lat=45.0").into_criteria().unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        let err = query("lat=91&lng=0").into_criteria().unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_negative_radius_rejected() {
        let err = query("lat=45&lng=-122&radius=-3")
            .into_criteria()
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
