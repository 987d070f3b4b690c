use axum::{
    extract::{Path as AxumPath, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::Value;

use super::{done, success};
use crate::app_state::AppState;
use crate::error::AppResult;
use crate::infrastructure::middleware::Vc;

pub fn routes() -> Router<AppState> {
    Router::new().route("/{id}", get(public_profile_handler).delete(delete_user_handler))
}

async fn public_profile_handler(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
) -> AppResult<Json<Value>> {
    Ok(success(state.identity.public_profile(&user_id).await?))
}

/// Self-service or admin removal of an account and everything it owns.
async fn delete_user_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(user_id): AxumPath<String>,
) -> AppResult<Json<Value>> {
    let requester_id = vc.require_user()?;
    state.identity.delete_account(&user_id, requester_id).await?;
    Ok(done("User deleted successfully"))
}
