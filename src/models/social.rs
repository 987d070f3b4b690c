use serde::Serialize;
use sqlx::FromRow;

use super::meta::RecordMeta;
use super::user::PublicUser;

#[derive(Debug, Clone, FromRow)]
pub struct ReviewLike {
    #[sqlx(flatten)]
    pub meta: RecordMeta,
    pub user_id: String,
    pub review_id: String,
}

impl ReviewLike {
    pub fn new(user_id: &str, review_id: &str) -> Self {
        Self {
            meta: RecordMeta::new(),
            user_id: user_id.to_string(),
            review_id: review_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ReviewComment {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub content: String,
    pub user_id: String,
    pub review_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: ReviewComment,
    pub user: PublicUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeSummary {
    pub likes_count: i64,
    pub liked_by_user: bool,
}

/// Result of a like/unlike call: the fresh summary plus what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeOutcome {
    pub summary: LikeSummary,
    pub message: &'static str,
}
