use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use super::meta::RecordMeta;
use super::patch::ReviewPatch;
use super::photo::PhotoView;
use super::place::{NewPlace, Place};
use super::user::PublicUser;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Review {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub title: String,
    pub content: String,
    pub rating: i64,
    pub visit_date: Option<NaiveDate>,
    pub user_id: String,
    pub place_id: String,
}

impl Review {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Apply an already validated patch. Fields absent from the patch are untouched.
    pub fn apply(&mut self, patch: &ReviewPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(rating) = patch.rating {
            self.rating = rating;
        }
        if let Some(visit_date) = patch.visit_date {
            self.visit_date = visit_date;
        }
        self.meta.touch();
    }
}

/// Review submission. `rating` and `visit_date` stay raw so they can be coerced.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewReview {
    pub place_id: Option<String>,
    pub place: Option<NewPlace>,
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub rating: Value,
    #[serde(default)]
    pub visit_date: Value,
}

/// A review with everything a client renders alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub user: PublicUser,
    pub place: Place,
    pub photos: Vec<PhotoView>,
    pub likes_count: i64,
    pub liked_by_user: bool,
    pub comments_count: i64,
}
