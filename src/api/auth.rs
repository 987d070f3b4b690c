// Account endpoints: registration, login, token refresh and self-service profile.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{created, done, patch_from, success, success_with_message, ApiJson, UploadForm};
use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::infrastructure::middleware::Vc;
use crate::models::{NewUser, ProfilePatch, UserView};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/refresh", post(refresh_handler))
        .route("/profile", get(profile_handler).put(update_profile_handler))
        .route("/change-password", put(change_password_handler))
        .route("/deactivate", put(deactivate_handler))
        .route("/stats", get(stats_handler))
        .route("/avatar", post(avatar_handler))
        .route("/account", delete(delete_account_handler))
}

/// `login` may carry an email or a username; `email` and `username` are accepted as well.
#[derive(Debug, Default, Deserialize)]
struct LoginRequest {
    login: Option<String>,
    email: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChangePasswordRequest {
    #[serde(alias = "old_password")]
    current_password: Option<String>,
    new_password: Option<String>,
}

/// Own profile plus the reviews the caller has liked.
#[derive(Debug, Serialize)]
struct ProfileResponse {
    #[serde(flatten)]
    user: UserView,
    liked_review_ids: Vec<String>,
}

async fn register_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<NewUser>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let session = state.identity.register(payload).await?;
    Ok(created(session, "User registered successfully"))
}

async fn login_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<Value>> {
    let login = payload
        .login
        .or(payload.email)
        .or(payload.username)
        .unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    let session = state.identity.authenticate(&login, &password).await?;
    Ok(success_with_message(session, "Login successful"))
}

async fn refresh_handler(State(state): State<AppState>, vc: Vc) -> AppResult<Json<Value>> {
    let user_id = vc.require_refresh()?;
    let access_token = state.identity.refresh(user_id).await?;
    Ok(success(json!({ "access_token": access_token })))
}

async fn profile_handler(State(state): State<AppState>, vc: Vc) -> AppResult<Json<Value>> {
    let user_id = vc.require_user()?;
    let profile = ProfileResponse {
        user: state.identity.profile(user_id).await?,
        liked_review_ids: state.likes.liked_review_ids(user_id).await?,
    };
    Ok(success(profile))
}

async fn update_profile_handler(
    State(state): State<AppState>,
    vc: Vc,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<Json<Value>> {
    let user_id = vc.require_user()?;
    let patch: ProfilePatch = patch_from(&body)?;
    let user = state.identity.update_profile(user_id, patch).await?;
    Ok(success_with_message(user, "Profile updated successfully"))
}

async fn change_password_handler(
    State(state): State<AppState>,
    vc: Vc,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> AppResult<Json<Value>> {
    let user_id = vc.require_user()?;
    let (Some(current), Some(new)) = (payload.current_password, payload.new_password) else {
        return Err(AppError::validation(
            "Current password and new password are required",
        ));
    };
    state.identity.change_password(user_id, &current, &new).await?;
    Ok(done("Password changed successfully"))
}

async fn deactivate_handler(State(state): State<AppState>, vc: Vc) -> AppResult<Json<Value>> {
    let user_id = vc.require_user()?;
    let user = state.identity.deactivate(user_id).await?;
    Ok(success_with_message(user, "Account deactivated"))
}

async fn stats_handler(State(state): State<AppState>, vc: Vc) -> AppResult<Json<Value>> {
    let user_id = vc.require_user()?;
    Ok(success(state.identity.stats(user_id).await?))
}

async fn avatar_handler(
    State(state): State<AppState>,
    vc: Vc,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<Value>> {
    let user_id = vc.require_user()?;
    let multipart = multipart.map_err(|_| AppError::validation("No file provided"))?;
    let mut form = UploadForm::read(multipart, &["avatar"]).await?;
    let user = state.identity.set_avatar(user_id, form.require_file()?).await?;
    Ok(success_with_message(user, "Avatar updated successfully"))
}

async fn delete_account_handler(State(state): State<AppState>, vc: Vc) -> AppResult<Json<Value>> {
    let user_id = vc.require_user()?;
    state.identity.delete_account(user_id, user_id).await?;
    Ok(done("Account deleted successfully"))
}
