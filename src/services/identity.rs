// Identity store - accounts, credentials and profile maintenance.

use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::database::JournalDatabase;
use crate::error::{AppError, AppResult};
use crate::infrastructure::blob_store::{remove_all_quietly, remove_quietly, BlobStore};
use crate::infrastructure::security::{
    hash_password, verify_password, TokenPair, TokenService, TokenType,
};
use crate::models::input::{allowed_extension, validate_email, validate_password, validate_username};
use crate::models::{
    NewUser, ProfilePatch, PublicUser, RecordMeta, UploadedFile, User, UserStats, UserView,
};
use crate::services::cascade;

/// Tokens plus the account they were issued for.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: UserView,
}

pub(crate) async fn fetch_user(pool: &SqlitePool, user_id: &str) -> AppResult<Option<User>> {
    Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?)
}

pub(crate) async fn require_user(pool: &SqlitePool, user_id: &str) -> AppResult<User> {
    fetch_user(pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// Owners may always act on their own records; admins may act on anyone's.
pub(crate) async fn ensure_owner_or_admin(
    pool: &SqlitePool,
    owner_id: &str,
    requester_id: &str,
    denied: &str,
) -> AppResult<()> {
    if owner_id == requester_id {
        return Ok(());
    }
    match fetch_user(pool, requester_id).await? {
        Some(user) if user.is_admin => Ok(()),
        _ => Err(AppError::forbidden(denied)),
    }
}

#[derive(Clone)]
pub struct IdentityStore {
    db: Arc<JournalDatabase>,
    blobs: Arc<dyn BlobStore>,
    tokens: TokenService,
    admin_emails: Arc<BTreeSet<String>>,
    allowed_extensions: Arc<BTreeSet<String>>,
}

impl IdentityStore {
    pub fn new(
        db: Arc<JournalDatabase>,
        blobs: Arc<dyn BlobStore>,
        tokens: TokenService,
        config: &Config,
    ) -> Self {
        Self {
            db,
            blobs,
            tokens,
            admin_emails: Arc::new(config.auth.admin_emails.clone()),
            allowed_extensions: Arc::new(config.uploads.allowed_extensions.clone()),
        }
    }

    pub async fn get(&self, user_id: &str) -> AppResult<User> {
        require_user(self.db.pool(), user_id).await
    }

    pub async fn public_profile(&self, user_id: &str) -> AppResult<PublicUser> {
        Ok(self.get(user_id).await?.to_public())
    }

    pub async fn profile(&self, user_id: &str) -> AppResult<UserView> {
        Ok(self.get(user_id).await?.to_view())
    }

    #[instrument(skip(self, payload), fields(username = ?payload.username))]
    pub async fn register(&self, payload: NewUser) -> AppResult<AuthSession> {
        let (Some(username), Some(email), Some(password)) =
            (&payload.username, &payload.email, &payload.password)
        else {
            return Err(AppError::validation(
                "Username, email and password are required",
            ));
        };
        let username = validate_username(username)?;
        let email = validate_email(email)?;
        validate_password(password)?;

        self.ensure_unique(&email, &username, None).await?;

        let user = User {
            meta: RecordMeta::new(),
            is_admin: self.admin_emails.contains(&email),
            email,
            username,
            password_hash: hash_password(password)?,
            first_name: clean(payload.first_name),
            last_name: clean(payload.last_name),
            bio: clean(payload.bio),
            location: clean(payload.location),
            avatar_path: None,
            is_active: true,
            is_verified: false,
        };

        sqlx::query(
            "INSERT INTO users (id, email, username, password_hash, first_name, last_name, bio, \
             location, avatar_path, is_active, is_verified, is_admin, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.meta.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.bio)
        .bind(&user.location)
        .bind(&user.avatar_path)
        .bind(user.is_active)
        .bind(user.is_verified)
        .bind(user.is_admin)
        .bind(user.meta.created_at)
        .bind(user.meta.updated_at)
        .execute(self.db.pool())
        .await?;

        info!(user_id = %user.meta.id, is_admin = user.is_admin, "User registered");
        self.session_for(&user)
    }

    /// `login` is either the email or the username.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, login: &str, password: &str) -> AppResult<AuthSession> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(AppError::validation("Login and password are required"));
        }

        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE email = ? OR username = ? LIMIT 1",
        )
        .bind(login.to_lowercase())
        .bind(login)
        .fetch_optional(self.db.pool())
        .await?;

        let user = match user {
            Some(user) if verify_password(password, &user.password_hash)? => user,
            _ => {
                warn!("Failed login attempt");
                return Err(AppError::unauthorized("Invalid credentials"));
            }
        };
        if !user.is_active {
            return Err(AppError::forbidden("Account is deactivated"));
        }

        info!(user_id = %user.meta.id, "User logged in");
        self.session_for(&user)
    }

    /// New access token for the owner of a refresh token.
    pub async fn refresh(&self, user_id: &str) -> AppResult<String> {
        let user = self.get(user_id).await?;
        if !user.is_active {
            return Err(AppError::forbidden("Account is deactivated"));
        }
        self.tokens.issue(&user.meta.id, TokenType::Access)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_profile(&self, user_id: &str, patch: ProfilePatch) -> AppResult<UserView> {
        let mut user = self.get(user_id).await?;

        let email = patch.email.as_deref().unwrap_or(&user.email).to_string();
        let username = patch.username.as_deref().unwrap_or(&user.username).to_string();
        self.ensure_unique(&email, &username, Some(user_id)).await?;

        user.email = email;
        user.username = username;
        if let Some(first_name) = patch.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            user.last_name = last_name;
        }
        if let Some(bio) = patch.bio {
            user.bio = bio;
        }
        if let Some(location) = patch.location {
            user.location = location;
        }
        user.meta.touch();

        sqlx::query(
            "UPDATE users SET email = ?, username = ?, first_name = ?, last_name = ?, bio = ?, \
             location = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.bio)
        .bind(&user.location)
        .bind(user.meta.updated_at)
        .bind(&user.meta.id)
        .execute(self.db.pool())
        .await?;

        Ok(user.to_view())
    }

    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self.get(user_id).await?;
        if !verify_password(current_password, &user.password_hash)? {
            return Err(AppError::validation("Current password is incorrect"));
        }
        validate_password(new_password)?;

        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(hash_password(new_password)?)
            .bind(chrono::Utc::now())
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Store a new avatar and drop the previous blob.
    #[instrument(skip(self, upload), fields(original_name = %upload.original_name))]
    pub async fn set_avatar(&self, user_id: &str, upload: UploadedFile) -> AppResult<UserView> {
        let mut user = self.get(user_id).await?;
        if upload.bytes.is_empty() {
            return Err(AppError::validation("No file provided"));
        }
        let ext = allowed_extension(&upload.original_name, self.allowed_extensions.iter())
            .ok_or_else(|| AppError::validation("File type not allowed"))?;

        let path = format!("avatars/{}.{}", Uuid::new_v4().simple(), ext);
        self.blobs.save(&upload.bytes, &path).await?;

        let previous = user.avatar_path.replace(path.clone());
        user.meta.touch();
        let updated = sqlx::query("UPDATE users SET avatar_path = ?, updated_at = ? WHERE id = ?")
            .bind(&path)
            .bind(user.meta.updated_at)
            .bind(user_id)
            .execute(self.db.pool())
            .await;
        if let Err(e) = updated {
            remove_quietly(self.blobs.as_ref(), &path).await;
            return Err(e.into());
        }

        if let Some(previous) = previous {
            remove_quietly(self.blobs.as_ref(), &previous).await;
        }
        Ok(user.to_view())
    }

    pub async fn deactivate(&self, user_id: &str) -> AppResult<UserView> {
        let mut user = self.get(user_id).await?;
        user.is_active = false;
        user.meta.touch();
        sqlx::query("UPDATE users SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(user.meta.updated_at)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        info!(user_id = %user_id, "Account deactivated");
        Ok(user.to_view())
    }

    pub async fn stats(&self, user_id: &str) -> AppResult<UserStats> {
        let user = self.get(user_id).await?;
        let pool = self.db.pool();
        let count = |sql: &'static str| async move {
            sqlx::query_scalar::<_, i64>(sql)
                .bind(user_id)
                .fetch_one(pool)
                .await
        };

        Ok(UserStats {
            reviews_count: count("SELECT COUNT(*) FROM reviews WHERE user_id = ?").await?,
            photos_count: count("SELECT COUNT(*) FROM photos WHERE user_id = ?").await?,
            likes_given: count("SELECT COUNT(*) FROM review_likes WHERE user_id = ?").await?,
            comments_count: count("SELECT COUNT(*) FROM review_comments WHERE user_id = ?")
                .await?,
            member_since: user.meta.created_at,
        })
    }

    /// Remove an account with everything it owns. Self-service or admin only.
    #[instrument(skip(self))]
    pub async fn delete_account(&self, user_id: &str, requester_id: &str) -> AppResult<()> {
        self.get(user_id).await?;
        ensure_owner_or_admin(
            self.db.pool(),
            user_id,
            requester_id,
            "You can only delete your own account",
        )
        .await?;

        let mut tx = self.db.begin().await?;
        let blobs = cascade::delete_user(&mut tx, user_id).await?;
        tx.commit().await?;

        remove_all_quietly(self.blobs.as_ref(), &blobs).await;
        info!(user_id = %user_id, removed_blobs = blobs.len(), "Account deleted");
        Ok(())
    }

    fn session_for(&self, user: &User) -> AppResult<AuthSession> {
        Ok(AuthSession {
            tokens: self.tokens.issue_pair(&user.meta.id)?,
            user: user.to_view(),
        })
    }

    async fn ensure_unique(
        &self,
        email: &str,
        username: &str,
        except_id: Option<&str>,
    ) -> AppResult<()> {
        let except_id = except_id.unwrap_or("");
        let taken = |sql: &'static str, value: &str| {
            let value = value.to_string();
            let pool = self.db.pool();
            async move {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(value)
                    .bind(except_id)
                    .fetch_one(pool)
                    .await
            }
        };

        if taken("SELECT COUNT(*) FROM users WHERE email = ? AND id != ?", email).await? > 0 {
            return Err(AppError::conflict("Email already registered"));
        }
        if taken("SELECT COUNT(*) FROM users WHERE username = ? AND id != ?", username).await? > 0
        {
            return Err(AppError::conflict("Username already taken"));
        }
        Ok(())
    }
}

/// Trimmed optional profile text; blanks become `None`.
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
