use std::sync::Arc;
use tracing::info;

use crate::{
    config::Config,
    database::JournalDatabase,
    infrastructure::{
        blob_store::{BlobStore, LocalBlobStore},
        middleware::HasTokenService,
        security::TokenService,
    },
    services::{
        CommentService, IdentityStore, LikeService, PhotoManager, PlaceResolver, ReviewManager,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: Arc<JournalDatabase>,
    pub tokens: TokenService,
    pub identity: IdentityStore,
    pub places: PlaceResolver,
    pub reviews: ReviewManager,
    pub likes: LikeService,
    pub comments: CommentService,
    pub photos: PhotoManager,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Initialize database
        let database = JournalDatabase::connect(&config.database).await?;
        database.init().await?;
        let db = Arc::new(database);

        tokio::fs::create_dir_all(&config.uploads.dir).await?;
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&config.uploads.dir));
        info!(upload_dir = %config.uploads.dir.display(), "Blob store ready");

        let tokens = TokenService::new(&config.auth);
        let identity = IdentityStore::new(db.clone(), blobs.clone(), tokens.clone(), &config);
        let places = PlaceResolver::new(db.clone(), blobs.clone());
        let likes = LikeService::new(db.clone());
        let comments = CommentService::new(db.clone());
        let photos = PhotoManager::new(db.clone(), blobs.clone(), &config);
        let reviews = ReviewManager::new(
            db.clone(),
            blobs,
            places.clone(),
            photos.clone(),
            likes.clone(),
            comments.clone(),
        );

        Ok(Self {
            config,
            db,
            tokens,
            identity,
            places,
            reviews,
            likes,
            comments,
            photos,
        })
    }
}

impl HasTokenService for AppState {
    fn token_service(&self) -> &TokenService {
        &self.tokens
    }
}
