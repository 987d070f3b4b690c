use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::meta::RecordMeta;
use super::photo::FILES_ROUTE;

/// A stored account. Never serialized directly: use [`User::to_view`] or [`User::to_public`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    #[sqlx(flatten)]
    pub meta: RecordMeta,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub avatar_path: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_admin: bool,
}

impl User {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn avatar_url(&self) -> Option<String> {
        self.avatar_path
            .as_ref()
            .map(|path| format!("{}/{}", FILES_ROUTE, path))
    }

    /// The account as its owner sees it.
    pub fn to_view(&self) -> UserView {
        UserView {
            meta: self.meta.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            bio: self.bio.clone(),
            location: self.location.clone(),
            avatar_url: self.avatar_url(),
            is_active: self.is_active,
            is_verified: self.is_verified,
            is_admin: self.is_admin,
        }
    }

    /// The snapshot embedded in reviews, comments and photo listings.
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.meta.id.clone(),
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            bio: self.bio.clone(),
            location: self.location.clone(),
            avatar_url: self.avatar_url(),
            created_at: self.meta.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Registration payload. Fields are optional so missing ones become validation errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub reviews_count: i64,
    pub photos_count: i64,
    pub likes_given: i64,
    pub comments_count: i64,
    pub member_since: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            meta: RecordMeta::new(),
            email: "ana@example.com".to_string(),
            username: "ana".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            first_name: Some("Ana".to_string()),
            last_name: None,
            bio: None,
            location: Some("Lisbon".to_string()),
            avatar_path: Some("avatars/abc.png".to_string()),
            is_active: true,
            is_verified: false,
            is_admin: false,
        }
    }

    #[test]
    fn test_views_never_expose_password_hash() {
        let user = sample_user();
        let private = serde_json::to_value(user.to_view()).unwrap();
        let public = serde_json::to_value(user.to_public()).unwrap();

        assert!(private.get("password_hash").is_none());
        assert!(public.get("password_hash").is_none());
        assert!(public.get("email").is_none());
        assert_eq!(private["email"], "ana@example.com");
        assert_eq!(private["id"], user.meta.id.as_str());
    }

    #[test]
    fn test_avatar_url() {
        let user = sample_user();
        assert_eq!(
            user.avatar_url().as_deref(),
            Some("/api/v1/photos/files/avatars/abc.png")
        );
    }
}
