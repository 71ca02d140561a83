use crate::errors::{RepoError, StorageError};
use crate::models::{Comment, Like, Photo, Post, PostCounter};
use async_trait::async_trait;
use axum::body::Bytes;
use uuid::Uuid;

// Send+Sync+'static required for Arc<dyn>

/// Photo documents (metadata only; bytes live in [`FileStorage`]).
#[async_trait]
pub trait PhotoRepository: Send + Sync + 'static {
    async fn insert(&self, photo: &Photo) -> Result<(), RepoError>;

    /// Returns Ok(None) if the photo is not found.
    async fn get(&self, photo_id: Uuid) -> Result<Option<Photo>, RepoError>;

    /// All photos owned by `user_id`, newest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Photo>, RepoError>;

    /// Deletes the photo only if it is owned by `user_id`, returning the
    /// deleted document. "Missing" and "not yours" both yield Ok(None).
    async fn delete_owned(&self, photo_id: Uuid, user_id: &str) -> Result<Option<Photo>, RepoError>;
}

#[async_trait]
pub trait PostRepository: Send + Sync + 'static {
    async fn insert(&self, post: &Post) -> Result<(), RepoError>;

    async fn get(&self, post_id: Uuid) -> Result<Option<Post>, RepoError>;

    /// Reverse lookup of the post whose stored photo reference is `photo_id`.
    async fn find_by_photo(&self, photo_id: Uuid) -> Result<Option<Post>, RepoError>;

    /// All posts owned by `user_id`, newest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Post>, RepoError>;

    async fn delete_owned(&self, post_id: Uuid, user_id: &str) -> Result<Option<Post>, RepoError>;

    /// Adds `delta` to one denormalized counter. Not transactional with any
    /// other write. Returns false (and changes nothing) when the post does
    /// not exist or the counter would drop below zero.
    async fn adjust_counter(&self, post_id: Uuid, counter: PostCounter, delta: i64) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync + 'static {
    async fn insert(&self, comment: &Comment) -> Result<(), RepoError>;

    /// Comments whose stored post reference equals `post_id`, newest first.
    async fn list_by_post(&self, post_id: &str) -> Result<Vec<Comment>, RepoError>;

    /// Returns the number of comments removed.
    async fn delete_by_post(&self, post_id: &str) -> Result<usize, RepoError>;
}

/// Likes are unique per (post, user) only by convention: callers `find`
/// before they `insert`.
#[async_trait]
pub trait LikeRepository: Send + Sync + 'static {
    async fn find(&self, post_id: &str, user_id: &str) -> Result<Option<Like>, RepoError>;

    async fn insert(&self, like: &Like) -> Result<(), RepoError>;

    async fn delete(&self, like_id: Uuid) -> Result<(), RepoError>;

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Like>, RepoError>;
}

/// Trait defining operations for storing and retrieving file data (photo bytes).
#[async_trait]
pub trait FileStorage: Send + Sync + 'static {
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// Fails with `StorageError::NotFound` when no object exists under `key`.
    async fn download(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Succeeds even if the object does not exist.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}
