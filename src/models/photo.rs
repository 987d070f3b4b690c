use serde::Serialize;
use sqlx::FromRow;

use super::meta::RecordMeta;

/// Route under which stored blobs are served.
pub const FILES_ROUTE: &str = "/api/v1/photos/files";

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Photo {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Generated, collision-free stored name.
    pub filename: String,
    /// Name the client uploaded, kept for display.
    pub original_name: String,
    /// Path relative to the blob store root.
    pub file_path: String,
    pub description: Option<String>,
    pub user_id: String,
    pub review_id: Option<String>,
}

impl Photo {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn file_url(&self) -> String {
        format!("{}/{}", FILES_ROUTE, self.filename)
    }

    pub fn to_view(&self) -> PhotoView {
        PhotoView {
            file_url: self.file_url(),
            photo: self.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoView {
    #[serde(flatten)]
    pub photo: Photo,
    pub file_url: String,
}

/// A file received from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub bytes: Vec<u8>,
}
