// ViewerContext Middleware - resolves the bearer token once per request
// and injects the resulting ViewerContext into request extensions.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::infrastructure::security::TokenService;
use crate::infrastructure::viewer::ViewerContext;

/// Application state that can verify bearer tokens.
pub trait HasTokenService {
    fn token_service(&self) -> &TokenService;
}

/// Requests without a token run as anonymous viewers; a token that is
/// present but invalid is rejected outright.
pub async fn viewer_context_middleware<T>(
    State(app_state): State<T>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError>
where
    T: HasTokenService + Clone + Send + Sync + 'static,
{
    let viewer_context = create_viewer_context(request.headers(), app_state.token_service())?;
    request.extensions_mut().insert(viewer_context);
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> AppResult<Option<&str>> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::unauthorized("Invalid authorization header"))?;
    value
        .strip_prefix("Bearer ")
        .map(|token| Some(token.trim()))
        .ok_or_else(|| AppError::unauthorized("Invalid authorization header"))
}

fn create_viewer_context(
    headers: &HeaderMap,
    tokens: &TokenService,
) -> AppResult<Arc<ViewerContext>> {
    let request_id = format!("req-{}", Uuid::new_v4());
    let viewer_context = match bearer_token(headers)? {
        Some(token) => {
            let claims = tokens.verify(token)?;
            ViewerContext::authenticated(claims.sub, claims.token_type, request_id)
        }
        None => ViewerContext::anonymous(request_id),
    };
    Ok(Arc::new(viewer_context))
}
