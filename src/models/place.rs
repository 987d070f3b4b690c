use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::BTreeMap;

use super::input::{coerce_coordinate, required_field, validate_coordinates};
use super::meta::RecordMeta;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Place {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub city: String,
    pub country: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Place {
    pub fn id(&self) -> &str {
        &self.meta.id
    }
}

/// Inline place payload, as sent on its own or inside a review submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPlace {
    pub name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub latitude: Value,
    #[serde(default)]
    pub longitude: Value,
}

/// A place payload that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceDraft {
    pub name: String,
    pub city: String,
    pub country: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl NewPlace {
    pub fn validate(&self) -> AppResult<PlaceDraft> {
        let name = required_field(self.name.as_deref(), "Place name")?;
        let city = required_field(self.city.as_deref(), "City")?;
        let country = required_field(self.country.as_deref(), "Country")?;
        let latitude = coerce_coordinate(&self.latitude, "latitude")?;
        let longitude = coerce_coordinate(&self.longitude, "longitude")?;
        validate_coordinates(latitude, longitude)?;

        Ok(PlaceDraft {
            name,
            city,
            country,
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            latitude,
            longitude,
        })
    }
}

/// Star value -> number of reviews. Always holds all five keys.
pub type RatingDistribution = BTreeMap<i64, i64>;

pub fn empty_distribution() -> RatingDistribution {
    (1..=5).map(|star| (star, 0)).collect()
}

/// Mean rating rounded to two decimals, `None` when there is nothing to average.
pub fn average_rating(distribution: &RatingDistribution) -> Option<f64> {
    let total: i64 = distribution.values().sum();
    if total == 0 {
        return None;
    }
    let sum: i64 = distribution.iter().map(|(star, count)| star * count).sum();
    Some(round2(sum as f64 / total as f64))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceStatistics {
    pub place_id: String,
    pub place_name: String,
    pub total_reviews: i64,
    pub average_rating: Option<f64>,
    pub rating_distribution: RatingDistribution,
}

impl PlaceStatistics {
    /// Build from `(rating, count)` rows; stars without reviews stay at zero.
    pub fn from_counts(place: &Place, counts: &[(i64, i64)]) -> Self {
        let mut rating_distribution = empty_distribution();
        for (rating, count) in counts {
            if let Some(slot) = rating_distribution.get_mut(rating) {
                *slot += count;
            }
        }
        Self {
            place_id: place.meta.id.clone(),
            place_name: place.name.clone(),
            total_reviews: rating_distribution.values().sum(),
            average_rating: average_rating(&rating_distribution),
            rating_distribution,
        }
    }
}

/// A place in search, nearby and popular listings.
#[derive(Debug, Clone, Serialize)]
pub struct PlaceSummary {
    #[serde(flatten)]
    pub place: Place,
    pub review_count: i64,
    pub average_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// A single place with its statistics embedded.
#[derive(Debug, Clone, Serialize)]
pub struct PlaceDetail {
    #[serde(flatten)]
    pub place: Place,
    pub statistics: PlaceStatistics,
}
