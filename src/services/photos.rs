// Photo attachment manager - binds uploaded blobs to a user and optionally a review.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::database::JournalDatabase;
use crate::error::{AppError, AppResult};
use crate::infrastructure::blob_store::{remove_quietly, BlobStore};
use crate::models::input::allowed_extension;
use crate::models::{Photo, PhotoPatch, PhotoView, RecordMeta, UploadedFile};
use crate::services::identity::{ensure_owner_or_admin, require_user};

const LINK_DENIED: &str = "You can only add photos to your own reviews";

#[derive(Clone)]
pub struct PhotoManager {
    db: Arc<JournalDatabase>,
    blobs: Arc<dyn BlobStore>,
    allowed_extensions: Arc<BTreeSet<String>>,
}

impl PhotoManager {
    pub fn new(db: Arc<JournalDatabase>, blobs: Arc<dyn BlobStore>, config: &Config) -> Self {
        Self {
            db,
            blobs,
            allowed_extensions: Arc::new(config.uploads.allowed_extensions.clone()),
        }
    }

    /// Store an upload and record it. The blob is removed again if the record cannot be written.
    #[instrument(skip(self, upload, description), fields(original_name = %upload.original_name))]
    pub async fn create(
        &self,
        user_id: &str,
        upload: UploadedFile,
        review_id: Option<&str>,
        description: Option<String>,
    ) -> AppResult<PhotoView> {
        if upload.bytes.is_empty() || upload.original_name.trim().is_empty() {
            return Err(AppError::validation("No file provided"));
        }
        let ext = allowed_extension(&upload.original_name, self.allowed_extensions.iter())
            .ok_or_else(|| AppError::validation("File type not allowed"))?;
        require_user(self.db.pool(), user_id).await?;
        if let Some(review_id) = review_id {
            self.ensure_can_link(review_id, user_id).await?;
        }

        let filename = format!("{}.{}", Uuid::new_v4().simple(), ext);
        let photo = Photo {
            meta: RecordMeta::new(),
            file_path: filename.clone(),
            filename,
            original_name: upload.original_name.trim().to_string(),
            description: description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            user_id: user_id.to_string(),
            review_id: review_id.map(str::to_string),
        };

        self.blobs.save(&upload.bytes, &photo.file_path).await?;
        let inserted = sqlx::query(
            "INSERT INTO photos (id, filename, original_name, file_path, description, user_id, \
             review_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&photo.meta.id)
        .bind(&photo.filename)
        .bind(&photo.original_name)
        .bind(&photo.file_path)
        .bind(&photo.description)
        .bind(&photo.user_id)
        .bind(&photo.review_id)
        .bind(photo.meta.created_at)
        .bind(photo.meta.updated_at)
        .execute(self.db.pool())
        .await;
        if let Err(e) = inserted {
            remove_quietly(self.blobs.as_ref(), &photo.file_path).await;
            return Err(e.into());
        }

        info!(photo_id = %photo.meta.id, size = upload.bytes.len(), "Photo uploaded");
        Ok(photo.to_view())
    }

    pub async fn get(&self, photo_id: &str) -> AppResult<PhotoView> {
        Ok(self.fetch(photo_id).await?.to_view())
    }

    /// Only `description` and `review_id` change; re-linking follows the upload rules.
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        photo_id: &str,
        patch: PhotoPatch,
        requester_id: &str,
    ) -> AppResult<PhotoView> {
        let mut photo = self.fetch(photo_id).await?;
        ensure_owner_or_admin(
            self.db.pool(),
            &photo.user_id,
            requester_id,
            "You can only update your own photos",
        )
        .await?;

        if let Some(Some(review_id)) = &patch.review_id {
            self.ensure_can_link(review_id, requester_id).await?;
        }
        if let Some(description) = patch.description {
            photo.description = description;
        }
        if let Some(review_id) = patch.review_id {
            photo.review_id = review_id;
        }
        photo.meta.touch();

        sqlx::query("UPDATE photos SET description = ?, review_id = ?, updated_at = ? WHERE id = ?")
            .bind(&photo.description)
            .bind(&photo.review_id)
            .bind(photo.meta.updated_at)
            .bind(&photo.meta.id)
            .execute(self.db.pool())
            .await?;
        Ok(photo.to_view())
    }

    /// Delete the record, then the blob. Blob removal is best-effort: a failure
    /// is logged and the call still succeeds.
    #[instrument(skip(self))]
    pub async fn delete(&self, photo_id: &str, requester_id: &str) -> AppResult<()> {
        let photo = self.fetch(photo_id).await?;
        ensure_owner_or_admin(
            self.db.pool(),
            &photo.user_id,
            requester_id,
            "You can only delete your own photos",
        )
        .await?;

        sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(photo_id)
            .execute(self.db.pool())
            .await?;
        remove_quietly(self.blobs.as_ref(), &photo.file_path).await;
        info!(photo_id = %photo_id, "Photo deleted");
        Ok(())
    }

    /// Drafts: photos of a user that are not attached to any review.
    pub async fn orphaned(&self, user_id: &str) -> AppResult<Vec<PhotoView>> {
        self.list(
            "SELECT * FROM photos WHERE user_id = ? AND review_id IS NULL \
             ORDER BY created_at DESC, rowid DESC",
            Some(user_id),
            None,
        )
        .await
    }

    pub async fn by_user(&self, user_id: &str, limit: i64) -> AppResult<Vec<PhotoView>> {
        self.list(
            "SELECT * FROM photos WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
            Some(user_id),
            Some(limit),
        )
        .await
    }

    pub async fn by_review(&self, review_id: &str, limit: i64) -> AppResult<Vec<PhotoView>> {
        crate::services::likes::ensure_review_exists(&self.db, review_id).await?;
        self.list(
            "SELECT * FROM photos WHERE review_id = ? ORDER BY created_at ASC, rowid ASC LIMIT ?",
            Some(review_id),
            Some(limit),
        )
        .await
    }

    pub async fn recent(&self, limit: i64) -> AppResult<Vec<PhotoView>> {
        self.list(
            "SELECT * FROM photos ORDER BY created_at DESC, rowid DESC LIMIT ?",
            None,
            Some(limit),
        )
        .await
    }

    /// Every photo attached to a review, in upload order.
    pub(crate) async fn for_review(&self, review_id: &str) -> AppResult<Vec<PhotoView>> {
        self.list(
            "SELECT * FROM photos WHERE review_id = ? ORDER BY created_at ASC, rowid ASC",
            Some(review_id),
            None,
        )
        .await
    }

    async fn list(&self, sql: &str, key: Option<&str>, limit: Option<i64>) -> AppResult<Vec<PhotoView>> {
        let mut query = sqlx::query_as::<_, Photo>(sql);
        if let Some(key) = key {
            query = query.bind(key);
        }
        if let Some(limit) = limit {
            query = query.bind(limit);
        }
        let photos = query.fetch_all(self.db.pool()).await?;
        Ok(photos.iter().map(Photo::to_view).collect())
    }

    async fn fetch(&self, photo_id: &str) -> AppResult<Photo> {
        sqlx::query_as::<_, Photo>("SELECT * FROM photos WHERE id = ?")
            .bind(photo_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Photo not found"))
    }

    /// The review must exist and belong to the actor, unless the actor is an admin.
    async fn ensure_can_link(&self, review_id: &str, actor_id: &str) -> AppResult<()> {
        let owner: String = sqlx::query_scalar("SELECT user_id FROM reviews WHERE id = ?")
            .bind(review_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Review not found"))?;
        ensure_owner_or_admin(self.db.pool(), &owner, actor_id, LINK_DENIED).await
    }
}
