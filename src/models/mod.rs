// Journal entities - every record embeds RecordMeta and knows how to render itself.

pub mod input;
pub mod meta;
pub mod patch;
pub mod photo;
pub mod place;
pub mod review;
pub mod social;
pub mod user;

pub use meta::RecordMeta;
pub use patch::{Patch, PhotoPatch, PlacePatch, ProfilePatch, ReviewPatch};
pub use photo::{Photo, PhotoView, UploadedFile, FILES_ROUTE};
pub use place::{
    NewPlace, Place, PlaceDetail, PlaceDraft, PlaceStatistics, PlaceSummary, RatingDistribution,
};
pub use review::{NewReview, Review, ReviewView};
pub use social::{CommentView, LikeOutcome, LikeSummary, ReviewComment, ReviewLike};
pub use user::{NewUser, PublicUser, User, UserStats, UserView};

/// Default and upper bound for list endpoints.
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Clamp a caller-supplied limit into `[1, MAX_LIMIT]`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}
