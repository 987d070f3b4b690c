// Review endpoints, including the like and comment sub-resources.

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get},
    Router,
};
use serde::Deserialize;
use serde_json::Value;

use super::{collection, created, done, patch_from, success, success_with_message, ApiJson, ApiQuery, LimitQuery};
use crate::app_state::AppState;
use crate::error::{AppResult, CollectionError};
use crate::infrastructure::middleware::Vc;
use crate::models::{clamp_limit, NewReview, ReviewPatch};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reviews_handler).post(create_review_handler))
        .route("/mine", get(my_reviews_handler))
        .route("/recent", get(recent_reviews_handler))
        .route("/top-rated", get(top_rated_reviews_handler))
        .route("/statistics/{place_id}", get(review_statistics_handler))
        .route(
            "/{id}",
            get(get_review_handler)
                .put(update_review_handler)
                .delete(delete_review_handler),
        )
        .route(
            "/{id}/like",
            get(like_summary_handler)
                .post(like_review_handler)
                .delete(unlike_review_handler),
        )
        .route(
            "/{id}/comments",
            get(list_comments_handler).post(add_comment_handler),
        )
        .route("/{id}/comments/{comment_id}", delete(delete_comment_handler))
}

#[derive(Debug, Default, Deserialize)]
struct ReviewListQuery {
    search: Option<String>,
    user_id: Option<String>,
    place_id: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct CommentRequest {
    content: Option<String>,
}

/// `search` wins over `place_id`, which wins over `user_id`; no filter lists the newest reviews.
async fn list_reviews_handler(
    State(state): State<AppState>,
    vc: Vc,
    ApiQuery(params): ApiQuery<ReviewListQuery>,
) -> Result<Json<Value>, CollectionError> {
    let limit = clamp_limit(params.limit);
    let viewer = vc.viewer_id();
    let reviews = if let Some(term) = params.search.as_deref() {
        state.reviews.search(term, limit, viewer).await?
    } else if let Some(place_id) = params.place_id.as_deref() {
        state.reviews.by_place(place_id, limit, viewer).await?
    } else if let Some(user_id) = params.user_id.as_deref() {
        state.reviews.by_user(user_id, limit, viewer).await?
    } else {
        state.reviews.recent(limit, viewer).await?
    };
    Ok(collection(reviews))
}

async fn create_review_handler(
    State(state): State<AppState>,
    vc: Vc,
    ApiJson(payload): ApiJson<NewReview>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user_id = vc.require_user()?;
    let review = state.reviews.create(user_id, payload).await?;
    Ok(created(review, "Review created successfully"))
}

async fn my_reviews_handler(
    State(state): State<AppState>,
    vc: Vc,
    ApiQuery(params): ApiQuery<LimitQuery>,
) -> Result<Json<Value>, CollectionError> {
    let user_id = vc.require_user()?;
    let reviews = state
        .reviews
        .by_user(user_id, params.limit(), Some(user_id))
        .await?;
    Ok(collection(reviews))
}

async fn recent_reviews_handler(
    State(state): State<AppState>,
    vc: Vc,
    ApiQuery(params): ApiQuery<LimitQuery>,
) -> Result<Json<Value>, CollectionError> {
    Ok(collection(
        state.reviews.recent(params.limit(), vc.viewer_id()).await?,
    ))
}

async fn top_rated_reviews_handler(
    State(state): State<AppState>,
    vc: Vc,
    ApiQuery(params): ApiQuery<LimitQuery>,
) -> Result<Json<Value>, CollectionError> {
    Ok(collection(
        state.reviews.top_rated(params.limit(), vc.viewer_id()).await?,
    ))
}

async fn review_statistics_handler(
    State(state): State<AppState>,
    AxumPath(place_id): AxumPath<String>,
) -> AppResult<Json<Value>> {
    Ok(success(state.reviews.statistics(&place_id).await?))
}

async fn get_review_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(review_id): AxumPath<String>,
) -> AppResult<Json<Value>> {
    Ok(success(state.reviews.get(&review_id, vc.viewer_id()).await?))
}

async fn update_review_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(review_id): AxumPath<String>,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<Json<Value>> {
    let requester_id = vc.require_user()?;
    let patch: ReviewPatch = patch_from(&body)?;
    let review = state.reviews.update(&review_id, patch, requester_id).await?;
    Ok(success_with_message(review, "Review updated successfully"))
}

async fn delete_review_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(review_id): AxumPath<String>,
) -> AppResult<Json<Value>> {
    let requester_id = vc.require_user()?;
    state.reviews.delete(&review_id, requester_id).await?;
    Ok(done("Review deleted successfully"))
}

async fn like_summary_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(review_id): AxumPath<String>,
) -> AppResult<Json<Value>> {
    Ok(success(state.likes.summary(&review_id, vc.viewer_id()).await?))
}

async fn like_review_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(review_id): AxumPath<String>,
) -> AppResult<Json<Value>> {
    let user_id = vc.require_user()?;
    let outcome = state.likes.like(&review_id, user_id).await?;
    Ok(success_with_message(outcome.summary, outcome.message))
}

async fn unlike_review_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(review_id): AxumPath<String>,
) -> AppResult<Json<Value>> {
    let user_id = vc.require_user()?;
    let outcome = state.likes.unlike(&review_id, user_id).await?;
    Ok(success_with_message(outcome.summary, outcome.message))
}

async fn list_comments_handler(
    State(state): State<AppState>,
    AxumPath(review_id): AxumPath<String>,
    ApiQuery(params): ApiQuery<LimitQuery>,
) -> Result<Json<Value>, CollectionError> {
    Ok(collection(
        state.comments.list(&review_id, params.limit()).await?,
    ))
}

async fn add_comment_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(review_id): AxumPath<String>,
    ApiJson(payload): ApiJson<CommentRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user_id = vc.require_user()?;
    let content = payload.content.unwrap_or_default();
    let comment = state.comments.add(&review_id, user_id, &content).await?;
    Ok(created(comment, "Comment added successfully"))
}

async fn delete_comment_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath((review_id, comment_id)): AxumPath<(String, String)>,
) -> AppResult<Json<Value>> {
    let requester_id = vc.require_user()?;
    state
        .comments
        .delete(&review_id, &comment_id, requester_id)
        .await?;
    Ok(done("Comment deleted successfully"))
}
