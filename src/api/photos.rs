// Photo endpoints. Stored blobs themselves are served by ServeDir (see `create_router`).

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path as AxumPath, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde_json::Value;

use super::{collection, created, done, patch_from, success, success_with_message, ApiJson, ApiQuery, LimitQuery, UploadForm};
use crate::app_state::AppState;
use crate::error::{AppError, AppResult, CollectionError};
use crate::infrastructure::middleware::Vc;
use crate::models::PhotoPatch;

/// Multipart parts accepted as the uploaded file, in order of preference.
const FILE_FIELDS: &[&str] = &["photo_file", "file"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(recent_photos_handler).post(upload_photo_handler))
        .route("/mine", get(my_photos_handler))
        .route("/orphaned", get(orphaned_photos_handler))
        .route("/review/{review_id}", get(review_photos_handler))
        .route(
            "/{id}",
            get(get_photo_handler)
                .put(update_photo_handler)
                .delete(delete_photo_handler),
        )
}

async fn recent_photos_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<LimitQuery>,
) -> Result<Json<Value>, CollectionError> {
    Ok(collection(state.photos.recent(params.limit()).await?))
}

async fn upload_photo_handler(
    State(state): State<AppState>,
    vc: Vc,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user_id = vc.require_user()?;
    let multipart = multipart.map_err(|_| AppError::validation("No file provided"))?;
    let mut form = UploadForm::read(multipart, FILE_FIELDS).await?;
    let upload = form.require_file()?;
    let description = form.text("description").map(str::to_string);

    let photo = state
        .photos
        .create(user_id, upload, form.text("review_id"), description)
        .await?;
    Ok(created(photo, "Photo uploaded successfully"))
}

async fn my_photos_handler(
    State(state): State<AppState>,
    vc: Vc,
    ApiQuery(params): ApiQuery<LimitQuery>,
) -> Result<Json<Value>, CollectionError> {
    let user_id = vc.require_user()?;
    Ok(collection(state.photos.by_user(user_id, params.limit()).await?))
}

/// The viewer's uploads not yet attached to a review.
async fn orphaned_photos_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> Result<Json<Value>, CollectionError> {
    let user_id = vc.require_user()?;
    Ok(collection(state.photos.orphaned(user_id).await?))
}

async fn review_photos_handler(
    State(state): State<AppState>,
    AxumPath(review_id): AxumPath<String>,
    ApiQuery(params): ApiQuery<LimitQuery>,
) -> Result<Json<Value>, CollectionError> {
    Ok(collection(
        state.photos.by_review(&review_id, params.limit()).await?,
    ))
}

async fn get_photo_handler(
    State(state): State<AppState>,
    AxumPath(photo_id): AxumPath<String>,
) -> AppResult<Json<Value>> {
    Ok(success(state.photos.get(&photo_id).await?))
}

async fn update_photo_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(photo_id): AxumPath<String>,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<Json<Value>> {
    let requester_id = vc.require_user()?;
    let patch: PhotoPatch = patch_from(&body)?;
    let photo = state.photos.update(&photo_id, patch, requester_id).await?;
    Ok(success_with_message(photo, "Photo updated successfully"))
}

async fn delete_photo_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(photo_id): AxumPath<String>,
) -> AppResult<Json<Value>> {
    let requester_id = vc.require_user()?;
    state.photos.delete(&photo_id, requester_id).await?;
    Ok(done("Photo deleted successfully"))
}
