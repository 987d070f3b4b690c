use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::Value;

use super::{collection, created, done, patch_from, success, success_with_message, ApiJson, ApiQuery, LimitQuery};
use crate::app_state::AppState;
use crate::error::{AppError, AppResult, CollectionError};
use crate::infrastructure::middleware::Vc;
use crate::models::{clamp_limit, NewPlace, PlacePatch};
use crate::services::PlaceFilter;

const DEFAULT_RADIUS_KM: f64 = 10.0;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(search_places_handler).post(create_place_handler))
        .route("/nearby", get(nearby_places_handler))
        .route("/popular", get(popular_places_handler))
        .route(
            "/{id}",
            get(get_place_handler)
                .put(update_place_handler)
                .delete(delete_place_handler),
        )
        .route("/{id}/reviews", get(place_reviews_handler))
        .route("/{id}/statistics", get(place_statistics_handler))
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(alias = "search")]
    q: Option<String>,
    city: Option<String>,
    country: Option<String>,
    limit: Option<i64>,
}

/// Coordinates arrive as strings so malformed values get a proper validation message.
#[derive(Debug, Default, Deserialize)]
struct NearbyQuery {
    lat: Option<String>,
    #[serde(alias = "lng")]
    lon: Option<String>,
    radius: Option<String>,
    limit: Option<i64>,
}

fn parse_number(raw: Option<&str>, message: &str) -> AppResult<Option<f64>> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| AppError::validation(message)),
    }
}

async fn search_places_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchQuery>,
) -> Result<Json<Value>, CollectionError> {
    let filter = PlaceFilter::from_params(
        params.q.as_deref(),
        params.city.as_deref(),
        params.country.as_deref(),
    );
    let places = state.places.search(&filter, clamp_limit(params.limit)).await?;
    Ok(collection(places))
}

async fn nearby_places_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<NearbyQuery>,
) -> Result<Json<Value>, CollectionError> {
    let lat = parse_number(params.lat.as_deref(), "Invalid latitude")?;
    let lon = parse_number(params.lon.as_deref(), "Invalid longitude")?;
    let (Some(lat), Some(lon)) = (lat, lon) else {
        return Err(AppError::validation("Latitude and longitude are required").into());
    };
    let radius = parse_number(params.radius.as_deref(), "Invalid radius")?.unwrap_or(DEFAULT_RADIUS_KM);

    let places = state
        .places
        .nearby(lat, lon, radius, clamp_limit(params.limit))
        .await?;
    Ok(collection(places))
}

async fn popular_places_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<LimitQuery>,
) -> Result<Json<Value>, CollectionError> {
    Ok(collection(state.places.popular(params.limit()).await?))
}

async fn create_place_handler(
    State(state): State<AppState>,
    vc: Vc,
    ApiJson(payload): ApiJson<NewPlace>,
) -> AppResult<(StatusCode, Json<Value>)> {
    vc.require_user()?;
    let place = state.places.create(&payload).await?;
    Ok(created(place, "Place created successfully"))
}

async fn get_place_handler(
    State(state): State<AppState>,
    AxumPath(place_id): AxumPath<String>,
) -> AppResult<Json<Value>> {
    Ok(success(state.places.detail(&place_id).await?))
}

async fn update_place_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(place_id): AxumPath<String>,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<Json<Value>> {
    let requester_id = vc.require_user()?;
    let patch: PlacePatch = patch_from(&body)?;
    let place = state.places.update(&place_id, patch, requester_id).await?;
    Ok(success_with_message(place, "Place updated successfully"))
}

async fn delete_place_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(place_id): AxumPath<String>,
) -> AppResult<Json<Value>> {
    let requester_id = vc.require_user()?;
    state.places.delete(&place_id, requester_id).await?;
    Ok(done("Place deleted successfully"))
}

async fn place_reviews_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(place_id): AxumPath<String>,
    ApiQuery(params): ApiQuery<LimitQuery>,
) -> Result<Json<Value>, CollectionError> {
    let reviews = state
        .reviews
        .by_place(&place_id, params.limit(), vc.viewer_id())
        .await?;
    Ok(collection(reviews))
}

async fn place_statistics_handler(
    State(state): State<AppState>,
    AxumPath(place_id): AxumPath<String>,
) -> AppResult<Json<Value>> {
    Ok(success(state.places.statistics(&place_id).await?))
}
