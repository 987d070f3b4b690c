// Like sub-aggregate. Liking and unliking are both idempotent.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::database::JournalDatabase;
use crate::error::{AppError, AppResult};
use crate::models::{LikeOutcome, LikeSummary, ReviewLike};
use crate::services::identity::require_user;

pub const LIKED: &str = "Review liked";
pub const ALREADY_LIKED: &str = "Review already liked";
pub const UNLIKED: &str = "Review unliked";

pub(crate) async fn ensure_review_exists(db: &JournalDatabase, review_id: &str) -> AppResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reviews WHERE id = ?)")
        .bind(review_id)
        .fetch_one(db.pool())
        .await?;
    if !exists {
        return Err(AppError::not_found("Review not found"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct LikeService {
    db: Arc<JournalDatabase>,
}

impl LikeService {
    pub fn new(db: Arc<JournalDatabase>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn like(&self, review_id: &str, user_id: &str) -> AppResult<LikeOutcome> {
        ensure_review_exists(&self.db, review_id).await?;
        require_user(self.db.pool(), user_id).await?;

        let like = ReviewLike::new(user_id, review_id);
        let inserted = sqlx::query(
            "INSERT INTO review_likes (id, user_id, review_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) ON CONFLICT (user_id, review_id) DO NOTHING",
        )
        .bind(&like.meta.id)
        .bind(&like.user_id)
        .bind(&like.review_id)
        .bind(like.meta.created_at)
        .bind(like.meta.updated_at)
        .execute(self.db.pool())
        .await?
        .rows_affected();

        let message = if inserted == 1 { LIKED } else { ALREADY_LIKED };
        debug!(review_id = %review_id, user_id = %user_id, outcome = message, "Like");
        Ok(LikeOutcome {
            summary: self.count(review_id, Some(user_id)).await?,
            message,
        })
    }

    /// Removing a like that does not exist is a no-op.
    #[instrument(skip(self))]
    pub async fn unlike(&self, review_id: &str, user_id: &str) -> AppResult<LikeOutcome> {
        ensure_review_exists(&self.db, review_id).await?;

        sqlx::query("DELETE FROM review_likes WHERE review_id = ? AND user_id = ?")
            .bind(review_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(LikeOutcome {
            summary: self.count(review_id, Some(user_id)).await?,
            message: UNLIKED,
        })
    }

    pub async fn summary(&self, review_id: &str, viewer_id: Option<&str>) -> AppResult<LikeSummary> {
        ensure_review_exists(&self.db, review_id).await?;
        self.count(review_id, viewer_id).await
    }

    /// Like count and viewer flag without checking that the review exists.
    pub(crate) async fn count(
        &self,
        review_id: &str,
        viewer_id: Option<&str>,
    ) -> AppResult<LikeSummary> {
        let likes_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM review_likes WHERE review_id = ?")
                .bind(review_id)
                .fetch_one(self.db.pool())
                .await?;

        let liked_by_user = match viewer_id {
            Some(user_id) => {
                sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM review_likes WHERE review_id = ? AND user_id = ?)",
                )
                .bind(review_id)
                .bind(user_id)
                .fetch_one(self.db.pool())
                .await?
            }
            None => false,
        };

        Ok(LikeSummary {
            likes_count,
            liked_by_user,
        })
    }

    pub async fn liked_review_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        Ok(sqlx::query_scalar(
            "SELECT review_id FROM review_likes WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?)
    }
}
