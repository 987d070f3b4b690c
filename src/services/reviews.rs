// Review aggregate manager.
//
// Owns the one-review-per-user-per-place rule, resolves inline places, renders
// reviews with their author, place, photos and social counts, and cascades
// deletes to photos, likes and comments.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::database::JournalDatabase;
use crate::error::{AppError, AppResult};
use crate::infrastructure::blob_store::{remove_all_quietly, BlobStore};
use crate::models::input::{
    coerce_rating, like_pattern, parse_visit_date, validate_content, validate_title,
};
use crate::models::{
    NewReview, Place, PlaceStatistics, RatingDistribution, RecordMeta, Review, ReviewPatch,
    ReviewView,
};
use crate::services::cascade;
use crate::services::comments::CommentService;
use crate::services::identity::{ensure_owner_or_admin, require_user};
use crate::services::likes::LikeService;
use crate::services::photos::PhotoManager;
use crate::services::places::PlaceResolver;

const ALREADY_REVIEWED: &str = "User has already reviewed this place";

#[derive(Clone)]
pub struct ReviewManager {
    db: Arc<JournalDatabase>,
    blobs: Arc<dyn BlobStore>,
    places: PlaceResolver,
    photos: PhotoManager,
    likes: LikeService,
    comments: CommentService,
}

impl ReviewManager {
    pub fn new(
        db: Arc<JournalDatabase>,
        blobs: Arc<dyn BlobStore>,
        places: PlaceResolver,
        photos: PhotoManager,
        likes: LikeService,
        comments: CommentService,
    ) -> Self {
        Self {
            db,
            blobs,
            places,
            photos,
            likes,
            comments,
        }
    }

    /// Create a review for `user_id`.
    ///
    /// An inline place is resolved (or created) before anything else is
    /// validated, so a place created here survives a rejected review.
    #[instrument(skip(self, payload))]
    pub async fn create(&self, user_id: &str, payload: NewReview) -> AppResult<ReviewView> {
        let place = self.resolve_place(&payload).await?;
        let rating = coerce_rating(&payload.rating)?;
        require_user(self.db.pool(), user_id).await?;

        if self.exists_for(user_id, place.id()).await? {
            return Err(AppError::conflict(ALREADY_REVIEWED));
        }

        let title = validate_title(payload.title.as_deref().unwrap_or_default())?;
        let content = validate_content(payload.content.as_deref().unwrap_or_default())?;
        let visit_date = parse_visit_date(&payload.visit_date)?;

        let review = Review {
            meta: RecordMeta::new(),
            title,
            content,
            rating,
            visit_date,
            user_id: user_id.to_string(),
            place_id: place.meta.id.clone(),
        };

        let inserted = sqlx::query(
            "INSERT INTO reviews (id, title, content, rating, visit_date, user_id, place_id, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&review.meta.id)
        .bind(&review.title)
        .bind(&review.content)
        .bind(review.rating)
        .bind(review.visit_date)
        .bind(&review.user_id)
        .bind(&review.place_id)
        .bind(review.meta.created_at)
        .bind(review.meta.updated_at)
        .execute(self.db.pool())
        .await;
        match inserted.map_err(AppError::from) {
            Ok(_) => {}
            Err(AppError::Conflict(_)) => return Err(AppError::conflict(ALREADY_REVIEWED)),
            Err(e) => return Err(e),
        }

        info!(review_id = %review.meta.id, place_id = %place.meta.id, rating, "Review created");
        self.view(review, Some(user_id)).await
    }

    pub async fn get(&self, review_id: &str, viewer_id: Option<&str>) -> AppResult<ReviewView> {
        let review = self.fetch(review_id).await?;
        self.view(review, viewer_id).await
    }

    /// Author or admin only. Fields absent from the patch keep their values.
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        review_id: &str,
        patch: ReviewPatch,
        requester_id: &str,
    ) -> AppResult<ReviewView> {
        let mut review = self.fetch(review_id).await?;
        ensure_owner_or_admin(
            self.db.pool(),
            &review.user_id,
            requester_id,
            "You can only update your own reviews",
        )
        .await?;

        review.apply(&patch);
        sqlx::query(
            "UPDATE reviews SET title = ?, content = ?, rating = ?, visit_date = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&review.title)
        .bind(&review.content)
        .bind(review.rating)
        .bind(review.visit_date)
        .bind(review.meta.updated_at)
        .bind(&review.meta.id)
        .execute(self.db.pool())
        .await?;

        info!(review_id = %review_id, "Review updated");
        self.view(review, Some(requester_id)).await
    }

    /// Author or admin only. Photos, likes and comments go in the same
    /// transaction; photo blobs are removed once it has committed.
    #[instrument(skip(self))]
    pub async fn delete(&self, review_id: &str, requester_id: &str) -> AppResult<()> {
        let review = self.fetch(review_id).await?;
        ensure_owner_or_admin(
            self.db.pool(),
            &review.user_id,
            requester_id,
            "You can only delete your own reviews",
        )
        .await?;

        let mut tx = self.db.begin().await?;
        let blobs = cascade::delete_review(&mut tx, review_id).await?;
        tx.commit().await?;

        remove_all_quietly(self.blobs.as_ref(), &blobs).await;
        info!(review_id = %review_id, removed_blobs = blobs.len(), "Review deleted");
        Ok(())
    }

    pub async fn by_place(
        &self,
        place_id: &str,
        limit: i64,
        viewer_id: Option<&str>,
    ) -> AppResult<Vec<ReviewView>> {
        self.places.get(place_id).await?;
        self.list(
            "SELECT * FROM reviews WHERE place_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
            Some(place_id),
            limit,
            viewer_id,
        )
        .await
    }

    pub async fn by_user(
        &self,
        user_id: &str,
        limit: i64,
        viewer_id: Option<&str>,
    ) -> AppResult<Vec<ReviewView>> {
        require_user(self.db.pool(), user_id).await?;
        self.list(
            "SELECT * FROM reviews WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
            Some(user_id),
            limit,
            viewer_id,
        )
        .await
    }

    pub async fn recent(&self, limit: i64, viewer_id: Option<&str>) -> AppResult<Vec<ReviewView>> {
        self.list(
            "SELECT * FROM reviews ORDER BY created_at DESC, rowid DESC LIMIT ?",
            None,
            limit,
            viewer_id,
        )
        .await
    }

    pub async fn top_rated(&self, limit: i64, viewer_id: Option<&str>) -> AppResult<Vec<ReviewView>> {
        self.list(
            "SELECT * FROM reviews ORDER BY rating DESC, created_at DESC, rowid DESC LIMIT ?",
            None,
            limit,
            viewer_id,
        )
        .await
    }

    /// Case-insensitive substring search over title and content. A blank term matches nothing.
    pub async fn search(
        &self,
        term: &str,
        limit: i64,
        viewer_id: Option<&str>,
    ) -> AppResult<Vec<ReviewView>> {
        if term.trim().is_empty() {
            return Ok(Vec::new());
        }
        let pattern = like_pattern(term);
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE LOWER(title) LIKE ? ESCAPE '\\' \
             OR LOWER(content) LIKE ? ESCAPE '\\' \
             ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;
        self.views(reviews, viewer_id).await
    }

    pub async fn statistics(&self, place_id: &str) -> AppResult<PlaceStatistics> {
        self.places.statistics(place_id).await
    }

    /// Mean rating of a place's reviews, `None` without reviews.
    pub async fn average_rating(&self, place_id: &str) -> AppResult<Option<f64>> {
        Ok(self.statistics(place_id).await?.average_rating)
    }

    pub async fn rating_distribution(&self, place_id: &str) -> AppResult<RatingDistribution> {
        Ok(self.statistics(place_id).await?.rating_distribution)
    }

    async fn resolve_place(&self, payload: &NewReview) -> AppResult<Place> {
        let place_id = payload
            .place_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        match (place_id, &payload.place) {
            (Some(place_id), _) => self.places.get(place_id).await,
            (None, Some(inline)) => self.places.find_or_create(inline).await,
            (None, None) => Err(AppError::validation("Place information is required")),
        }
    }

    async fn exists_for(&self, user_id: &str, place_id: &str) -> AppResult<bool> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM reviews WHERE user_id = ? AND place_id = ?)",
        )
        .bind(user_id)
        .bind(place_id)
        .fetch_one(self.db.pool())
        .await?)
    }

    async fn fetch(&self, review_id: &str) -> AppResult<Review> {
        sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
            .bind(review_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Review not found"))
    }

    async fn list(
        &self,
        sql: &str,
        key: Option<&str>,
        limit: i64,
        viewer_id: Option<&str>,
    ) -> AppResult<Vec<ReviewView>> {
        let mut query = sqlx::query_as::<_, Review>(sql);
        if let Some(key) = key {
            query = query.bind(key);
        }
        let reviews = query.bind(limit).fetch_all(self.db.pool()).await?;
        self.views(reviews, viewer_id).await
    }

    async fn views(&self, reviews: Vec<Review>, viewer_id: Option<&str>) -> AppResult<Vec<ReviewView>> {
        let mut views = Vec::with_capacity(reviews.len());
        for review in reviews {
            views.push(self.view(review, viewer_id).await?);
        }
        Ok(views)
    }

    async fn view(&self, review: Review, viewer_id: Option<&str>) -> AppResult<ReviewView> {
        let user = require_user(self.db.pool(), &review.user_id).await?.to_public();
        let place = self.places.get(&review.place_id).await?;
        let photos = self.photos.for_review(review.id()).await?;
        let likes = self.likes.count(review.id(), viewer_id).await?;
        let comments_count = self.comments.count(review.id()).await?;

        Ok(ReviewView {
            review,
            user,
            place,
            photos,
            likes_count: likes.likes_count,
            liked_by_user: likes.liked_by_user,
            comments_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patch, UploadedFile};
    use crate::services::test_support::{fixture, insert_user, Fixture};
    use serde_json::{json, Value};

    fn payload(body: Value) -> NewReview {
        serde_json::from_value(body).unwrap()
    }

    fn eiffel_review(rating: Value) -> NewReview {
        payload(json!({
            "title": "Great view",
            "content": "Went up at sunset, worth every step.",
            "rating": rating,
            "place": {"name": "Eiffel Tower", "city": "Paris", "country": "France"}
        }))
    }

    async fn review_count(fx: &Fixture, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(fx.db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_returns_full_view() {
        let fx = fixture().await;
        let ana = insert_user(&fx.db, "ana", false).await;

        let view = fx.reviews().create(&ana, eiffel_review(json!(4))).await.unwrap();
        assert_eq!(view.review.rating, 4);
        assert_eq!(view.user.username, "ana");
        assert_eq!(view.place.name, "Eiffel Tower");
        assert!(view.photos.is_empty());
        assert_eq!(view.likes_count, 0);
        assert!(!view.liked_by_user);
        assert_eq!(view.comments_count, 0);

        let body = serde_json::to_value(&view).unwrap();
        for key in ["id", "user", "place", "photos", "likes_count", "liked_by_user", "comments_count"] {
            assert!(body.get(key).is_some(), "missing {}", key);
        }
    }

    #[tokio::test]
    async fn test_second_review_for_same_place_conflicts() {
        let fx = fixture().await;
        let reviews = fx.reviews();
        let ana = insert_user(&fx.db, "ana", false).await;
        reviews.create(&ana, eiffel_review(json!(4))).await.unwrap();

        let mut again = eiffel_review(json!(1));
        again.title = Some("Changed my mind".to_string());
        let err = reviews.create(&ana, again).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == ALREADY_REVIEWED));
    }

    #[tokio::test]
    async fn test_inline_places_resolve_to_same_place() {
        let fx = fixture().await;
        let reviews = fx.reviews();
        let ana = insert_user(&fx.db, "ana", false).await;
        let bob = insert_user(&fx.db, "bob", false).await;

        let first = reviews.create(&ana, eiffel_review(json!(4))).await.unwrap();
        let mut second = eiffel_review(json!(5));
        if let Some(place) = second.place.as_mut() {
            place.description = Some("Different words".to_string());
            place.latitude = json!(48.8584);
            place.longitude = json!(2.2945);
        }
        let second = reviews.create(&bob, second).await.unwrap();

        assert_eq!(first.place.meta.id, second.place.meta.id);
        assert_eq!(review_count(&fx, "places").await, 1);
    }

    #[tokio::test]
    async fn test_rating_boundaries() {
        let fx = fixture().await;
        let reviews = fx.reviews();
        let ana = insert_user(&fx.db, "ana", false).await;

        for bad in [json!(0), json!(6), json!(4.5), Value::Null] {
            let err = reviews.create(&ana, eiffel_review(bad)).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }

        for (rating, city) in [(json!(1), "Paris"), (json!(5), "Lyon"), (json!("3"), "Nice")] {
            let mut body = eiffel_review(rating);
            if let Some(place) = body.place.as_mut() {
                place.city = Some(city.to_string());
            }
            reviews.create(&ana, body).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_place_survives_rejected_review() {
        let fx = fixture().await;
        let ana = insert_user(&fx.db, "ana", false).await;
        let mut body = eiffel_review(json!(4));
        body.content = Some("short".to_string());

        let err = fx.reviews().create(&ana, body).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(review_count(&fx, "places").await, 1);
        assert_eq!(review_count(&fx, "reviews").await, 0);
    }

    #[tokio::test]
    async fn test_place_resolution_errors() {
        let fx = fixture().await;
        let reviews = fx.reviews();
        let ana = insert_user(&fx.db, "ana", false).await;

        let err = reviews
            .create(&ana, payload(json!({"title": "Title", "content": "Long enough text", "rating": 3})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Place information is required"));

        let err = reviews
            .create(
                &ana,
                payload(json!({"place_id": "nope", "title": "Title", "content": "Long enough text", "rating": 3})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = reviews.create("ghost", eiffel_review(json!(3))).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_rating_only_keeps_text() {
        let fx = fixture().await;
        let reviews = fx.reviews();
        let ana = insert_user(&fx.db, "ana", false).await;
        let created = reviews.create(&ana, eiffel_review(json!(4))).await.unwrap();

        let patch = ReviewPatch::from_json(&json!({"rating": 5, "user_id": "someone", "place_id": "x"}))
            .unwrap();
        reviews.update(created.review.id(), patch, &ana).await.unwrap();

        let fetched = reviews.get(created.review.id(), None).await.unwrap();
        assert_eq!(fetched.review.rating, 5);
        assert_eq!(fetched.review.title, created.review.title);
        assert_eq!(fetched.review.content, created.review.content);
        assert_eq!(fetched.review.user_id, ana);
        assert_eq!(fetched.review.place_id, created.review.place_id);
    }

    #[tokio::test]
    async fn test_authorization_and_admin_bypass() {
        let fx = fixture().await;
        let reviews = fx.reviews();
        let ana = insert_user(&fx.db, "ana", false).await;
        let bob = insert_user(&fx.db, "bob", false).await;
        let admin = insert_user(&fx.db, "root", true).await;
        let created = reviews.create(&ana, eiffel_review(json!(4))).await.unwrap();
        let id = created.review.id();

        let patch = ReviewPatch {
            title: Some("Hijacked".to_string()),
            ..Default::default()
        };
        let err = reviews.update(id, patch.clone(), &bob).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = reviews.delete(id, &bob).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let updated = reviews.update(id, patch, &admin).await.unwrap();
        assert_eq!(updated.review.title, "Hijacked");
        reviews.delete(id, &admin).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_cascades_to_photos_likes_comments() {
        let fx = fixture().await;
        let reviews = fx.reviews();
        let ana = insert_user(&fx.db, "ana", false).await;
        let bob = insert_user(&fx.db, "bob", false).await;
        let created = reviews.create(&ana, eiffel_review(json!(4))).await.unwrap();
        let id = created.review.id().to_string();

        let photo = fx
            .photos()
            .create(
                &ana,
                UploadedFile {
                    original_name: "tower.jpg".to_string(),
                    bytes: b"jpeg".to_vec(),
                },
                Some(&id),
                None,
            )
            .await
            .unwrap();
        fx.likes().like(&id, &bob).await.unwrap();
        let comment = fx.comments().add(&id, &bob, "Lovely shot").await.unwrap();

        let view = reviews.get(&id, Some(&bob)).await.unwrap();
        assert_eq!(view.photos.len(), 1);
        assert_eq!(view.likes_count, 1);
        assert!(view.liked_by_user);
        assert_eq!(view.comments_count, 1);

        reviews.delete(&id, &ana).await.unwrap();

        assert!(matches!(reviews.get(&id, None).await.unwrap_err(), AppError::NotFound(_)));
        assert!(matches!(
            fx.photos().get(photo.photo.id()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(!fx.blobs.exists(&photo.photo.file_path).await.unwrap());
        assert_eq!(review_count(&fx, "review_likes").await, 0);
        assert_eq!(review_count(&fx, "review_comments").await, 0);
        assert!(matches!(
            fx.comments().delete(&id, &comment.comment.meta.id, &bob).await.unwrap_err(),
            AppError::NotFound(_)
        ));

        let err = reviews.delete(&id, &ana).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_aggregates_for_4_4_5() {
        let fx = fixture().await;
        let reviews = fx.reviews();
        let mut place_id = String::new();
        for (name, rating) in [("ana", 4), ("bob", 4), ("cy", 5)] {
            let user = insert_user(&fx.db, name, false).await;
            let view = reviews.create(&user, eiffel_review(json!(rating))).await.unwrap();
            place_id = view.place.meta.id;
        }

        assert_eq!(reviews.average_rating(&place_id).await.unwrap(), Some(4.33));
        let expected: RatingDistribution = [(1, 0), (2, 0), (3, 0), (4, 2), (5, 1)].into();
        assert_eq!(reviews.rating_distribution(&place_id).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_listings() {
        let fx = fixture().await;
        let reviews = fx.reviews();
        let ana = insert_user(&fx.db, "ana", false).await;

        for (city, rating, title) in [("Paris", 3, "Crowded"), ("Lyon", 5, "Stunning"), ("Nice", 4, "Sunny")] {
            let mut body = eiffel_review(json!(rating));
            body.title = Some(title.to_string());
            if let Some(place) = body.place.as_mut() {
                place.city = Some(city.to_string());
            }
            reviews.create(&ana, body).await.unwrap();
        }

        let top: Vec<_> = reviews
            .top_rated(10, None)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.review.rating)
            .collect();
        assert_eq!(top, vec![5, 4, 3]);

        let recent = reviews.recent(2, None).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].review.title, "Sunny");

        let found = reviews.search("STUN", 10, None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(reviews.search("   ", 10, None).await.unwrap().is_empty());

        assert_eq!(reviews.by_user(&ana, 10, None).await.unwrap().len(), 3);
        assert!(matches!(
            reviews.by_user("ghost", 10, None).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            reviews.by_place("ghost", 10, None).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
