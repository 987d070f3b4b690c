// Infrastructure collaborators the journal services depend on
pub mod blob_store;            // Blob storage for photos and avatars
pub mod middleware;            // Viewer context middleware and extractor
pub mod security;              // Password hashing and JWTs
pub mod viewer;                // Viewer context

pub use blob_store::{BlobStore, LocalBlobStore};
pub use security::{TokenPair, TokenService, TokenType};
pub use viewer::ViewerContext;
