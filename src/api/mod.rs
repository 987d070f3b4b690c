// HTTP surface - axum router and handlers under /api/v1.
//
// Handlers stay thin: pull the viewer and input out of the request, call one
// manager operation, wrap the result in the success envelope.

pub mod auth;
pub mod photos;
pub mod places;
pub mod reviews;
pub mod users;

use axum::{
    extract::{
        rejection::JsonRejection, DefaultBodyLimit, FromRequest, FromRequestParts, Multipart,
        Query, Request, State,
    },
    http::{request::Parts, StatusCode},
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tower_http::services::ServeDir;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult, CollectionError};
use crate::infrastructure::middleware::viewer_context_middleware;
use crate::models::{clamp_limit, Patch, UploadedFile, FILES_ROUTE};

pub fn create_router(state: AppState) -> Router {
    let upload_dir = state.config.uploads.dir.clone();
    let body_limit = state.config.uploads.max_content_length;

    let api = Router::new()
        .route("/health", get(health_handler))
        .nest("/auth", auth::routes())
        .nest("/users", users::routes())
        .nest("/places", places::routes())
        .nest("/reviews", reviews::routes())
        .nest("/photos", photos::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            viewer_context_middleware::<AppState>,
        ));

    Router::new()
        .nest("/api/v1", api)
        .nest_service(FILES_ROUTE, ServeDir::new(upload_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.db.health_check().await?;
    Ok(Json(json!({"status": "healthy", "database": "connected"})))
}

/// `{"success": true, "data": ...}`
pub(crate) fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({"success": true, "data": data}))
}

pub(crate) fn success_with_message<T: Serialize>(data: T, message: &str) -> Json<Value> {
    Json(json!({"success": true, "data": data, "message": message}))
}

pub(crate) fn created<T: Serialize>(data: T, message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, success_with_message(data, message))
}

pub(crate) fn done(message: &str) -> Json<Value> {
    Json(json!({"success": true, "message": message}))
}

/// Collection envelope with `count`.
pub(crate) fn collection<T: Serialize>(items: Vec<T>) -> Json<Value> {
    let count = items.len();
    Json(json!({"success": true, "data": items, "count": count}))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    pub fn limit(&self) -> i64 {
        clamp_limit(self.limit)
    }
}

/// JSON body whose rejections render as `{"error": ...}` like every other failure.
pub(crate) struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Err(AppError::PayloadTooLarge("Request body too large".to_string()))
            }
            Err(rejection) => Err(AppError::validation(rejection.body_text())),
        }
    }
}

/// Query string for collection endpoints. A malformed one answers
/// `{"success": false, "error": ...}` with 400.
pub(crate) struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = CollectionError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection| AppError::validation(rejection.body_text()).into())
    }
}

/// Build an allow-listed patch from an update body. An empty object is rejected.
pub(crate) fn patch_from<P: Patch>(body: &Value) -> AppResult<P> {
    match body {
        Value::Object(map) if map.is_empty() => Err(AppError::validation("No data provided")),
        _ => P::from_json(body),
    }
}

/// Multipart form with at most one file.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// Read every part; the first part named in `file_fields` becomes the file.
    pub async fn read(mut multipart: Multipart, file_fields: &[&str]) -> AppResult<Self> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if file_fields.contains(&name.as_str()) {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if form.file.is_none() {
                    form.file = Some(UploadedFile {
                        original_name,
                        bytes: bytes.to_vec(),
                    });
                }
            } else {
                let text = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    pub fn require_file(&mut self) -> AppResult<UploadedFile> {
        self.file
            .take()
            .ok_or_else(|| AppError::validation("No file provided"))
    }

    /// A text field, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("File too large".to_string())
    } else {
        AppError::validation(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReviewPatch;

    #[test]
    fn test_collection_envelope_counts() {
        let Json(body) = collection(vec![1, 2, 3]);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 3);
        assert_eq!(body["data"], json!([1, 2, 3]));
    }

    #[test]
    fn test_empty_patch_body_is_rejected() {
        let err = patch_from::<ReviewPatch>(&json!({})).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "No data provided"));
        assert!(patch_from::<ReviewPatch>(&json!({"rating": 5})).is_ok());
    }

    #[test]
    fn test_limit_query_is_clamped() {
        assert_eq!(LimitQuery::default().limit(), 20);
        assert_eq!(LimitQuery { limit: Some(1000) }.limit(), 100);
    }
}
