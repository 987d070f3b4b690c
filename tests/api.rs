// End-to-end tests against the full router.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use naya_journal::{api::create_router, app_state::AppState, config::Config};

const BOUNDARY: &str = "naya-test-boundary";

struct TestApp {
    router: Router,
    _dir: TempDir,
}

struct Account {
    id: String,
    access: String,
    refresh: String,
}

async fn spawn_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let state = AppState::new(Config::for_testing(dir.path())).await.unwrap();
    TestApp {
        router: create_router(state),
        _dir: dir,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, bytes) = self.send(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn upload(
        &self,
        uri: &str,
        token: &str,
        field: &str,
        filename: &str,
        extra: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut body = String::new();
        for (name, value) in extra {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: image/jpeg\r\n\r\nnot-really-a-jpeg\r\n--{BOUNDARY}--\r\n"
        ));
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn register(&self, username: &str, email: &str) -> Account {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({"username": username, "email": email, "password": "secret123"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        Account {
            id: body["data"]["user"]["id"].as_str().unwrap().to_string(),
            access: body["data"]["access_token"].as_str().unwrap().to_string(),
            refresh: body["data"]["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    async fn create_review(&self, account: &Account, rating: Value) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/api/v1/reviews",
            Some(&account.access),
            Some(json!({
                "title": "Great view",
                "content": "Went up at sunset, worth every step.",
                "rating": rating,
                "place": {
                    "name": "Eiffel Tower",
                    "city": "Paris",
                    "country": "France",
                    "latitude": 48.8584,
                    "longitude": 2.2945
                }
            })),
        )
        .await
    }
}

#[tokio::test]
async fn test_health() {
    let app = spawn_app().await;
    let (status, body) = app.call(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_register_login_and_token_types() {
    let app = spawn_app().await;
    let ana = app.register("ana", "Ana@Example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({"email": "ana@example.com", "password": "secret123"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], "ana@example.com");
    assert!(body["data"]["user"].get("password_hash").is_none());

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({"email": "ana@example.com", "password": "wrong-one"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, _) = app.call(Method::GET, "/api/v1/auth/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .call(Method::GET, "/api/v1/auth/profile", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .call(Method::GET, "/api/v1/auth/profile", Some(&ana.refresh), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(Method::POST, "/api/v1/auth/refresh", Some(&ana.access), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = app
        .call(Method::POST, "/api/v1/auth/refresh", Some(&ana.refresh), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let fresh = body["data"]["access_token"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(Method::GET, "/api/v1/auth/profile", Some(&fresh), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], ana.id.as_str());
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = spawn_app().await;
    app.register("ana", "ana@example.com").await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({"username": "ana2", "email": "ANA@example.com", "password": "secret123"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already registered");
}

#[tokio::test]
async fn test_review_lifecycle_over_http() {
    let app = spawn_app().await;
    let ana = app.register("ana", "ana@example.com").await;
    let bob = app.register("bob", "bob@example.com").await;

    let (status, body) = app.create_review(&ana, json!(4)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let review = &body["data"];
    for key in ["user", "place", "photos", "likes_count", "liked_by_user", "comments_count"] {
        assert!(review.get(key).is_some(), "missing {}", key);
    }
    let review_id = review["id"].as_str().unwrap().to_string();
    let place_id = review["place"]["id"].as_str().unwrap().to_string();

    let (status, body) = app.create_review(&ana, json!(2)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "User has already reviewed this place");

    let (status, body) = app.create_review(&bob, json!(6)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Rating must be an integer between 1 and 5");

    let uri = format!("/api/v1/reviews/{}", review_id);
    let (status, _) = app
        .call(Method::PUT, &uri, Some(&bob.access), Some(json!({"title": "Mine now"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(Method::PUT, &uri, Some(&ana.access), Some(json!({"rating": 5})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rating"], 5);
    assert_eq!(body["data"]["title"], "Great view");

    let (status, body) = app
        .call(Method::PUT, &uri, Some(&ana.access), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No data provided");

    let (status, body) = app
        .call(Method::GET, &format!("/api/v1/places/{}/reviews", place_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = app
        .call(Method::GET, &format!("/api/v1/reviews/statistics/{}", place_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_reviews"], 1);
    assert_eq!(body["data"]["average_rating"], 5.0);
}

#[tokio::test]
async fn test_likes_and_comments_over_http() {
    let app = spawn_app().await;
    let ana = app.register("ana", "ana@example.com").await;
    let bob = app.register("bob", "bob@example.com").await;
    let (_, body) = app.create_review(&ana, json!(5)).await;
    let review_id = body["data"]["id"].as_str().unwrap().to_string();
    let like_uri = format!("/api/v1/reviews/{}/like", review_id);

    let (status, body) = app.call(Method::POST, &like_uri, Some(&bob.access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Review liked");
    let (_, body) = app.call(Method::POST, &like_uri, Some(&bob.access), None).await;
    assert_eq!(body["message"], "Review already liked");
    assert_eq!(body["data"]["likes_count"], 1);

    let review_uri = format!("/api/v1/reviews/{}", review_id);
    let (_, body) = app.call(Method::GET, &review_uri, Some(&bob.access), None).await;
    assert_eq!(body["data"]["liked_by_user"], true);
    let (_, body) = app.call(Method::GET, &review_uri, None, None).await;
    assert_eq!(body["data"]["liked_by_user"], false);
    assert_eq!(body["data"]["likes_count"], 1);

    let comments_uri = format!("/api/v1/reviews/{}/comments", review_id);
    let (status, body) = app
        .call(Method::POST, &comments_uri, Some(&bob.access), Some(json!({"content": "Lovely!"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["user"]["username"], "bob");

    let (_, body) = app.call(Method::GET, &comments_uri, None, None).await;
    assert_eq!(body["count"], 1);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("{}/{}", comments_uri, comment_id),
            Some(&ana.access),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app.call(Method::GET, "/api/v1/auth/profile", Some(&bob.access), None).await;
    assert_eq!(body["data"]["username"], "bob");
    assert_eq!(body["data"]["liked_review_ids"], json!([review_id]));

    let (_, body) = app.call(Method::DELETE, &like_uri, Some(&bob.access), None).await;
    assert_eq!(body["message"], "Review unliked");
    assert_eq!(body["data"]["likes_count"], 0);

    let (_, body) = app.call(Method::GET, "/api/v1/auth/profile", Some(&bob.access), None).await;
    assert_eq!(body["data"]["liked_review_ids"], json!([]));
}

#[tokio::test]
async fn test_collection_errors_use_success_flag() {
    let app = spawn_app().await;
    let (status, body) = app
        .call(Method::GET, "/api/v1/places/missing/reviews", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"success": false, "error": "Place not found"}));

    let (status, body) = app.call(Method::GET, "/api/v1/reviews/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Review not found"}));
}

#[tokio::test]
async fn test_malformed_query_string_is_json() {
    let app = spawn_app().await;
    let (status, body) = app
        .call(Method::GET, "/api/v1/reviews/recent?limit=abc", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

    let (status, body) = app
        .call(Method::GET, "/api/v1/places/popular?limit=10", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_nearby_finds_created_place() {
    let app = spawn_app().await;
    let ana = app.register("ana", "ana@example.com").await;
    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/places",
            Some(&ana.access),
            Some(json!({
                "name": "Eiffel Tower",
                "city": "Paris",
                "country": "France",
                "latitude": 48.8584,
                "longitude": 2.2945
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .call(
            Method::GET,
            "/api/v1/places/nearby?lat=48.8584&lng=2.2945&radius=5",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["name"], "Eiffel Tower");
    assert_eq!(body["data"][0]["distance_km"], 0.0);

    let (status, body) = app
        .call(Method::GET, "/api/v1/places/nearby?lat=48.8584", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_photo_upload_serve_and_cascade() {
    let app = spawn_app().await;
    let ana = app.register("ana", "ana@example.com").await;
    let (_, body) = app.create_review(&ana, json!(4)).await;
    let review_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .upload("/api/v1/photos", &ana.access, "photo_file", "tower.jpg", &[
            ("review_id", review_id.as_str()),
            ("description", "At dusk"),
        ])
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["description"], "At dusk");
    let file_url = body["data"]["file_url"].as_str().unwrap().to_string();
    assert!(file_url.starts_with("/api/v1/photos/files/"));

    let request = Request::builder().uri(&file_url).body(Body::empty()).unwrap();
    let (status, bytes) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"not-really-a-jpeg".to_vec());

    let (status, body) = app
        .upload("/api/v1/photos", &ana.access, "file", "notes.txt", &[])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "File type not allowed");

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/v1/reviews/{}", review_id), Some(&ana.access), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder().uri(&file_url).body(Body::empty()).unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_place_delete_is_admin_only() {
    let app = spawn_app().await;
    let ana = app.register("ana", "ana@example.com").await;
    let admin = app.register("root", "admin@example.com").await;
    let (_, body) = app.create_review(&ana, json!(3)).await;
    let place_uri = format!("/api/v1/places/{}", body["data"]["place"]["id"].as_str().unwrap());

    let (status, body) = app.call(Method::DELETE, &place_uri, Some(&ana.access), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only administrators can delete places");

    let (status, _) = app.call(Method::DELETE, &place_uri, Some(&admin.access), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.call(Method::GET, "/api/v1/reviews/recent", None, None).await;
    assert_eq!(body["count"], 0);
}
