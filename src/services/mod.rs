// Aggregate managers. Each owns the rules for one slice of the journal and
// talks to the database directly.

pub mod cascade;
pub mod comments;
pub mod identity;
pub mod likes;
pub mod photos;
pub mod places;
pub mod reviews;

pub use comments::CommentService;
pub use identity::{AuthSession, IdentityStore};
pub use likes::LikeService;
pub use photos::PhotoManager;
pub use places::{haversine_km, PlaceFilter, PlaceResolver};
pub use reviews::ReviewManager;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use tempfile::TempDir;

    use super::*;
    use crate::config::Config;
    use crate::database::JournalDatabase;
    use crate::infrastructure::blob_store::{BlobStore, LocalBlobStore};
    use crate::infrastructure::security::TokenService;
    use crate::models::{NewPlace, RecordMeta};

    pub struct Fixture {
        pub db: Arc<JournalDatabase>,
        pub blobs: Arc<LocalBlobStore>,
        pub config: Config,
        pub dir: TempDir,
    }

    impl Fixture {
        fn blob_store(&self) -> Arc<dyn BlobStore> {
            self.blobs.clone()
        }

        pub fn identity(&self) -> IdentityStore {
            IdentityStore::new(
                self.db.clone(),
                self.blob_store(),
                TokenService::new(&self.config.auth),
                &self.config,
            )
        }

        pub fn places(&self) -> PlaceResolver {
            PlaceResolver::new(self.db.clone(), self.blob_store())
        }

        pub fn likes(&self) -> LikeService {
            LikeService::new(self.db.clone())
        }

        pub fn comments(&self) -> CommentService {
            CommentService::new(self.db.clone())
        }

        pub fn photos(&self) -> PhotoManager {
            PhotoManager::new(self.db.clone(), self.blob_store(), &self.config)
        }

        pub fn reviews(&self) -> ReviewManager {
            ReviewManager::new(
                self.db.clone(),
                self.blob_store(),
                self.places(),
                self.photos(),
                self.likes(),
                self.comments(),
            )
        }
    }

    pub async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = Config::for_testing(dir.path());
        let db = JournalDatabase::connect(&config.database).await.unwrap();
        db.init().await.unwrap();
        Fixture {
            db: Arc::new(db),
            blobs: Arc::new(LocalBlobStore::new(dir.path())),
            config,
            dir,
        }
    }

    /// Insert an account directly. The email is `{username}@example.com`.
    pub async fn insert_user(db: &Arc<JournalDatabase>, username: &str, is_admin: bool) -> String {
        let meta = RecordMeta::new();
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, is_admin, is_active, \
             is_verified, created_at, updated_at) VALUES (?, ?, ?, 'not-a-hash', ?, 1, 0, ?, ?)",
        )
        .bind(&meta.id)
        .bind(username)
        .bind(format!("{}@example.com", username))
        .bind(is_admin)
        .bind(meta.created_at)
        .bind(meta.updated_at)
        .execute(db.pool())
        .await
        .unwrap();
        meta.id
    }

    pub async fn insert_review(
        db: &Arc<JournalDatabase>,
        user_id: &str,
        place_id: &str,
        rating: i64,
    ) -> String {
        let meta = RecordMeta::new();
        sqlx::query(
            "INSERT INTO reviews (id, title, content, rating, user_id, place_id, created_at, \
             updated_at) VALUES (?, 'Seeded review', 'Seeded review content', ?, ?, ?, ?, ?)",
        )
        .bind(&meta.id)
        .bind(rating)
        .bind(user_id)
        .bind(place_id)
        .bind(meta.created_at)
        .bind(meta.updated_at)
        .execute(db.pool())
        .await
        .unwrap();
        meta.id
    }

    pub fn new_place(name: &str, city: &str, country: &str) -> NewPlace {
        NewPlace {
            name: Some(name.to_string()),
            city: Some(city.to_string()),
            country: Some(country.to_string()),
            ..Default::default()
        }
    }
}
