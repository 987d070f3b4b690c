// Comment sub-aggregate. Comments read oldest first.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::database::JournalDatabase;
use crate::error::{AppError, AppResult};
use crate::models::input::validate_comment;
use crate::models::{CommentView, RecordMeta, ReviewComment};
use crate::services::identity::{ensure_owner_or_admin, require_user};
use crate::services::likes::ensure_review_exists;

#[derive(Clone)]
pub struct CommentService {
    db: Arc<JournalDatabase>,
}

impl CommentService {
    pub fn new(db: Arc<JournalDatabase>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, content))]
    pub async fn add(&self, review_id: &str, user_id: &str, content: &str) -> AppResult<CommentView> {
        let content = validate_comment(content)?;
        ensure_review_exists(&self.db, review_id).await?;
        let author = require_user(self.db.pool(), user_id).await?;

        let comment = ReviewComment {
            meta: RecordMeta::new(),
            content,
            user_id: user_id.to_string(),
            review_id: review_id.to_string(),
        };
        sqlx::query(
            "INSERT INTO review_comments (id, content, user_id, review_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&comment.meta.id)
        .bind(&comment.content)
        .bind(&comment.user_id)
        .bind(&comment.review_id)
        .bind(comment.meta.created_at)
        .bind(comment.meta.updated_at)
        .execute(self.db.pool())
        .await?;

        info!(comment_id = %comment.meta.id, review_id = %review_id, "Comment added");
        Ok(CommentView {
            comment,
            user: author.to_public(),
        })
    }

    /// The comment must belong to `review_id`; only its author or an admin may remove it.
    #[instrument(skip(self))]
    pub async fn delete(&self, review_id: &str, comment_id: &str, requester_id: &str) -> AppResult<()> {
        let comment = sqlx::query_as::<_, ReviewComment>(
            "SELECT * FROM review_comments WHERE id = ? AND review_id = ?",
        )
        .bind(comment_id)
        .bind(review_id)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| AppError::not_found("Comment not found"))?;

        ensure_owner_or_admin(
            self.db.pool(),
            &comment.user_id,
            requester_id,
            "You can only delete your own comments",
        )
        .await?;

        sqlx::query("DELETE FROM review_comments WHERE id = ?")
            .bind(comment_id)
            .execute(self.db.pool())
            .await?;
        info!(comment_id = %comment_id, "Comment deleted");
        Ok(())
    }

    pub async fn list(&self, review_id: &str, limit: i64) -> AppResult<Vec<CommentView>> {
        ensure_review_exists(&self.db, review_id).await?;

        let comments = sqlx::query_as::<_, ReviewComment>(
            "SELECT * FROM review_comments WHERE review_id = ? \
             ORDER BY created_at ASC, rowid ASC LIMIT ?",
        )
        .bind(review_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        let mut views = Vec::with_capacity(comments.len());
        for comment in comments {
            let user = require_user(self.db.pool(), &comment.user_id).await?.to_public();
            views.push(CommentView { comment, user });
        }
        Ok(views)
    }

    pub async fn count(&self, review_id: &str) -> AppResult<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM review_comments WHERE review_id = ?")
                .bind(review_id)
                .fetch_one(self.db.pool())
                .await?,
        )
    }
}
