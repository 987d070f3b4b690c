// Place resolver - place identity, lookup and geographic search.
//
// A place is identified by its exact (name, city, country) triple. Review and
// rating aggregates are always computed from the reviews table on read.

use sqlx::FromRow;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::database::JournalDatabase;
use crate::error::{AppError, AppResult};
use crate::infrastructure::blob_store::{remove_all_quietly, BlobStore};
use crate::models::input::{like_pattern, validate_coordinates};
use crate::models::place::round2;
use crate::models::{
    NewPlace, Place, PlaceDetail, PlaceDraft, PlacePatch, PlaceStatistics, PlaceSummary,
    RecordMeta,
};
use crate::services::cascade;
use crate::services::identity::{fetch_user, require_user};

pub const EARTH_RADIUS_KM: f64 = 6371.0;
const KM_PER_DEGREE: f64 = 111.0;

const SUMMARY_SELECT: &str = "SELECT p.*, COUNT(r.id) AS review_count, \
     AVG(r.rating) AS average_rating \
     FROM places p LEFT JOIN reviews r ON r.place_id = p.id";

/// Which search to run. Filters are exclusive: city wins over country, country over term.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceFilter {
    City(String),
    Country(String),
    Term(String),
    All,
}

impl PlaceFilter {
    pub fn from_params(
        term: Option<&str>,
        city: Option<&str>,
        country: Option<&str>,
    ) -> Self {
        let present = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        if let Some(city) = present(city) {
            PlaceFilter::City(city)
        } else if let Some(country) = present(country) {
            PlaceFilter::Country(country)
        } else if let Some(term) = present(term) {
            PlaceFilter::Term(term)
        } else {
            PlaceFilter::All
        }
    }
}

#[derive(FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    place: Place,
    review_count: i64,
    average_rating: Option<f64>,
}

impl SummaryRow {
    fn into_summary(self, distance_km: Option<f64>) -> PlaceSummary {
        PlaceSummary {
            place: self.place,
            review_count: self.review_count,
            average_rating: self.average_rating.map(round2),
            distance_km,
        }
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

#[derive(Clone)]
pub struct PlaceResolver {
    db: Arc<JournalDatabase>,
    blobs: Arc<dyn BlobStore>,
}

impl PlaceResolver {
    pub fn new(db: Arc<JournalDatabase>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }

    pub async fn get(&self, place_id: &str) -> AppResult<Place> {
        sqlx::query_as::<_, Place>("SELECT * FROM places WHERE id = ?")
            .bind(place_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Place not found"))
    }

    pub async fn detail(&self, place_id: &str) -> AppResult<PlaceDetail> {
        let place = self.get(place_id).await?;
        let statistics = self.statistics_for(&place).await?;
        Ok(PlaceDetail { place, statistics })
    }

    pub async fn find_by_identity(
        &self,
        name: &str,
        city: &str,
        country: &str,
    ) -> AppResult<Option<Place>> {
        Ok(sqlx::query_as::<_, Place>(
            "SELECT * FROM places WHERE name = ? AND city = ? AND country = ?",
        )
        .bind(name)
        .bind(city)
        .bind(country)
        .fetch_optional(self.db.pool())
        .await?)
    }

    /// Create a new place. An identical (name, city, country) triple is a conflict.
    #[instrument(skip(self, payload))]
    pub async fn create(&self, payload: &NewPlace) -> AppResult<Place> {
        let draft = payload.validate()?;
        if self
            .find_by_identity(&draft.name, &draft.city, &draft.country)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("Place already exists"));
        }

        let place = place_from(draft);
        let inserted = sqlx::query(
            "INSERT INTO places (id, name, city, country, description, latitude, longitude, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&place.meta.id)
        .bind(&place.name)
        .bind(&place.city)
        .bind(&place.country)
        .bind(&place.description)
        .bind(place.latitude)
        .bind(place.longitude)
        .bind(place.meta.created_at)
        .bind(place.meta.updated_at)
        .execute(self.db.pool())
        .await;

        match inserted.map_err(AppError::from) {
            Ok(_) => {
                info!(place_id = %place.meta.id, name = %place.name, "Place created");
                Ok(place)
            }
            Err(AppError::Conflict(_)) => Err(AppError::conflict("Place already exists")),
            Err(e) => Err(e),
        }
    }

    /// Return the place with this identity, creating it on first sight.
    ///
    /// The unique index decides races: a concurrent insert of the same triple
    /// is skipped and the surviving row is returned.
    #[instrument(skip(self, payload))]
    pub async fn find_or_create(&self, payload: &NewPlace) -> AppResult<Place> {
        let draft = payload.validate()?;
        let candidate = place_from(draft);

        let inserted = sqlx::query(
            "INSERT INTO places (id, name, city, country, description, latitude, longitude, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (name, city, country) DO NOTHING",
        )
        .bind(&candidate.meta.id)
        .bind(&candidate.name)
        .bind(&candidate.city)
        .bind(&candidate.country)
        .bind(&candidate.description)
        .bind(candidate.latitude)
        .bind(candidate.longitude)
        .bind(candidate.meta.created_at)
        .bind(candidate.meta.updated_at)
        .execute(self.db.pool())
        .await?
        .rows_affected();

        if inserted == 1 {
            info!(place_id = %candidate.meta.id, name = %candidate.name, "Place created");
            return Ok(candidate);
        }

        debug!(name = %candidate.name, city = %candidate.city, "Reusing existing place");
        self.find_by_identity(&candidate.name, &candidate.city, &candidate.country)
            .await?
            .ok_or_else(|| AppError::Internal("Place vanished after conflict".into()))
    }

    pub async fn search(&self, filter: &PlaceFilter, limit: i64) -> AppResult<Vec<PlaceSummary>> {
        let (clause, pattern) = match filter {
            PlaceFilter::City(city) => ("WHERE LOWER(p.city) LIKE ? ESCAPE '\\'", Some(city)),
            PlaceFilter::Country(country) => {
                ("WHERE LOWER(p.country) LIKE ? ESCAPE '\\'", Some(country))
            }
            PlaceFilter::Term(term) => (
                "WHERE LOWER(p.name) LIKE ? ESCAPE '\\' OR LOWER(p.city) LIKE ? ESCAPE '\\' \
                 OR LOWER(p.country) LIKE ? ESCAPE '\\' OR LOWER(p.description) LIKE ? ESCAPE '\\'",
                Some(term),
            ),
            PlaceFilter::All => ("", None),
        };
        let sql = format!(
            "{} {} GROUP BY p.id ORDER BY p.name, p.rowid LIMIT ?",
            SUMMARY_SELECT, clause
        );

        let mut query = sqlx::query_as::<_, SummaryRow>(&sql);
        if let Some(raw) = pattern {
            let pattern = like_pattern(raw);
            let placeholders = clause.matches('?').count();
            for _ in 0..placeholders {
                query = query.bind(pattern.clone());
            }
        }
        let rows = query.bind(limit).fetch_all(self.db.pool()).await?;
        Ok(rows.into_iter().map(|row| row.into_summary(None)).collect())
    }

    /// Places inside an approximate bounding box, nearest first.
    ///
    /// The box is `radius/111` degrees of latitude and `radius/(111 * cos(lat))`
    /// degrees of longitude, so results near the corners may exceed the radius.
    #[instrument(skip(self))]
    pub async fn nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        limit: i64,
    ) -> AppResult<Vec<PlaceSummary>> {
        validate_coordinates(Some(latitude), Some(longitude))?;
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(AppError::validation("Radius must be a positive number"));
        }

        let lat_range = radius_km / KM_PER_DEGREE;
        let lon_range =
            radius_km / (KM_PER_DEGREE * latitude.to_radians().cos().abs().max(0.01));

        let sql = format!(
            "{} WHERE p.latitude IS NOT NULL AND p.longitude IS NOT NULL \
             AND p.latitude BETWEEN ? AND ? AND p.longitude BETWEEN ? AND ? \
             GROUP BY p.id",
            SUMMARY_SELECT
        );
        let rows = sqlx::query_as::<_, SummaryRow>(&sql)
            .bind(latitude - lat_range)
            .bind(latitude + lat_range)
            .bind(longitude - lon_range)
            .bind(longitude + lon_range)
            .fetch_all(self.db.pool())
            .await?;

        let mut results: Vec<PlaceSummary> = rows
            .into_iter()
            .filter_map(|row| {
                let (lat, lon) = (row.place.latitude?, row.place.longitude?);
                let distance = round2(haversine_km(latitude, longitude, lat, lon));
                Some(row.into_summary(Some(distance)))
            })
            .collect();
        results.sort_by(|a, b| {
            a.distance_km
                .unwrap_or(f64::MAX)
                .total_cmp(&b.distance_km.unwrap_or(f64::MAX))
        });
        results.truncate(limit.max(0) as usize);
        Ok(results)
    }

    /// Places with the most reviews first.
    pub async fn popular(&self, limit: i64) -> AppResult<Vec<PlaceSummary>> {
        let sql = format!(
            "{} GROUP BY p.id ORDER BY review_count DESC, p.rowid LIMIT ?",
            SUMMARY_SELECT
        );
        let rows = sqlx::query_as::<_, SummaryRow>(&sql)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(|row| row.into_summary(None)).collect())
    }

    pub async fn statistics(&self, place_id: &str) -> AppResult<PlaceStatistics> {
        let place = self.get(place_id).await?;
        self.statistics_for(&place).await
    }

    async fn statistics_for(&self, place: &Place) -> AppResult<PlaceStatistics> {
        let counts: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT rating, COUNT(*) FROM reviews WHERE place_id = ? GROUP BY rating",
        )
        .bind(&place.meta.id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(PlaceStatistics::from_counts(place, &counts))
    }

    /// Any signed-in user may correct a place. Identity and coordinates are re-checked.
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        place_id: &str,
        patch: PlacePatch,
        requester_id: &str,
    ) -> AppResult<Place> {
        require_user(self.db.pool(), requester_id).await?;
        let mut place = self.get(place_id).await?;

        if let Some(name) = patch.name {
            place.name = name;
        }
        if let Some(city) = patch.city {
            place.city = city;
        }
        if let Some(country) = patch.country {
            place.country = country;
        }
        if let Some(description) = patch.description {
            place.description = description;
        }
        if let Some(latitude) = patch.latitude {
            place.latitude = latitude;
        }
        if let Some(longitude) = patch.longitude {
            place.longitude = longitude;
        }
        validate_coordinates(place.latitude, place.longitude)?;

        if let Some(existing) = self
            .find_by_identity(&place.name, &place.city, &place.country)
            .await?
        {
            if existing.meta.id != place.meta.id {
                return Err(AppError::conflict(
                    "A place with this name, city and country already exists",
                ));
            }
        }

        place.meta.touch();
        sqlx::query(
            "UPDATE places SET name = ?, city = ?, country = ?, description = ?, latitude = ?, \
             longitude = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&place.name)
        .bind(&place.city)
        .bind(&place.country)
        .bind(&place.description)
        .bind(place.latitude)
        .bind(place.longitude)
        .bind(place.meta.updated_at)
        .bind(&place.meta.id)
        .execute(self.db.pool())
        .await?;

        Ok(place)
    }

    /// Admin only. Removes every review of the place along with their photos, likes and comments.
    #[instrument(skip(self))]
    pub async fn delete(&self, place_id: &str, requester_id: &str) -> AppResult<()> {
        self.get(place_id).await?;
        match fetch_user(self.db.pool(), requester_id).await? {
            Some(user) if user.is_admin => {}
            _ => return Err(AppError::forbidden("Only administrators can delete places")),
        }

        let mut tx = self.db.begin().await?;
        let blobs = cascade::delete_place(&mut tx, place_id).await?;
        tx.commit().await?;

        remove_all_quietly(self.blobs.as_ref(), &blobs).await;
        info!(place_id = %place_id, removed_blobs = blobs.len(), "Place deleted");
        Ok(())
    }
}

fn place_from(draft: PlaceDraft) -> Place {
    Place {
        meta: RecordMeta::new(),
        name: draft.name,
        city: draft.city,
        country: draft.country,
        description: draft.description,
        latitude: draft.latitude,
        longitude: draft.longitude,
    }
}
