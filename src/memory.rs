//! In-process storage backend.
//!
//! Each collection sits behind its own mutex which is held for a single
//! operation only, so multi-step handlers interleave the same way they do
//! against DynamoDB.

use crate::{
    domain::{CommentRepository, FileStorage, LikeRepository, PhotoRepository, PostRepository},
    errors::{RepoError, StorageError},
    models::{newest_first, Comment, Like, Photo, Post, PostCounter},
};
use async_trait::async_trait;
use axum::body::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    photos: Mutex<HashMap<Uuid, Photo>>,
    posts: Mutex<HashMap<Uuid, Post>>,
    comments: Mutex<HashMap<Uuid, Comment>>,
    likes: Mutex<HashMap<Uuid, Like>>,
    blobs: Mutex<HashMap<String, Bytes>>,
    fail_post_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent post insert fail with a backend error.
    pub fn fail_post_inserts(&self, fail: bool) {
        self.fail_post_inserts.store(fail, Ordering::SeqCst);
    }

    pub async fn photo_count(&self) -> usize {
        self.photos.lock().await.len()
    }

    pub async fn post_count(&self) -> usize {
        self.posts.lock().await.len()
    }

    /// Like documents referencing `post_id`, including orphans.
    pub async fn likes_for_post(&self, post_id: &str) -> usize {
        self.likes
            .lock()
            .await
            .values()
            .filter(|like| like.post_id == post_id)
            .count()
    }

    pub async fn comments_for_post(&self, post_id: &str) -> usize {
        self.comments
            .lock()
            .await
            .values()
            .filter(|comment| comment.post_id == post_id)
            .count()
    }

    pub async fn has_blob(&self, key: &str) -> bool {
        self.blobs.lock().await.contains_key(key)
    }
}

#[async_trait]
impl PhotoRepository for MemoryStore {
    async fn insert(&self, photo: &Photo) -> Result<(), RepoError> {
        self.photos.lock().await.insert(photo.photo_id, photo.clone());
        Ok(())
    }

    async fn get(&self, photo_id: Uuid) -> Result<Option<Photo>, RepoError> {
        Ok(self.photos.lock().await.get(&photo_id).cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Photo>, RepoError> {
        let mut photos: Vec<Photo> = self
            .photos
            .lock()
            .await
            .values()
            .filter(|photo| photo.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut photos, |p| (p.created_at, p.photo_id));
        Ok(photos)
    }

    async fn delete_owned(&self, photo_id: Uuid, user_id: &str) -> Result<Option<Photo>, RepoError> {
        let mut photos = self.photos.lock().await;
        match photos.get(&photo_id) {
            Some(photo) if photo.user_id == user_id => Ok(photos.remove(&photo_id)),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn insert(&self, post: &Post) -> Result<(), RepoError> {
        if self.fail_post_inserts.load(Ordering::SeqCst) {
            return Err(RepoError::BackendError(anyhow::anyhow!(
                "memory: post inserts are disabled"
            )));
        }
        self.posts.lock().await.insert(post.post_id, post.clone());
        Ok(())
    }

    async fn get(&self, post_id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.posts.lock().await.get(&post_id).cloned())
    }

    async fn find_by_photo(&self, photo_id: Uuid) -> Result<Option<Post>, RepoError> {
        let photo_id = photo_id.to_string();
        Ok(self
            .posts
            .lock()
            .await
            .values()
            .find(|post| post.photo_id == photo_id)
            .cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Post>, RepoError> {
        let mut posts: Vec<Post> = self
            .posts
            .lock()
            .await
            .values()
            .filter(|post| post.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut posts, |p| (p.created_at, p.post_id));
        Ok(posts)
    }

    async fn delete_owned(&self, post_id: Uuid, user_id: &str) -> Result<Option<Post>, RepoError> {
        let mut posts = self.posts.lock().await;
        match posts.get(&post_id) {
            Some(post) if post.user_id == user_id => Ok(posts.remove(&post_id)),
            _ => Ok(None),
        }
    }

    async fn adjust_counter(&self, post_id: Uuid, counter: PostCounter, delta: i64) -> Result<bool, RepoError> {
        let mut posts = self.posts.lock().await;
        let Some(post) = posts.get_mut(&post_id) else {
            return Ok(false);
        };
        let value = match counter {
            PostCounter::Likes => &mut post.likes,
            PostCounter::Shares => &mut post.shares,
            PostCounter::Comments => &mut post.comments,
        };
        match value.checked_add_signed(delta) {
            Some(next) => {
                *value = next;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn insert(&self, comment: &Comment) -> Result<(), RepoError> {
        self.comments
            .lock()
            .await
            .insert(comment.comment_id, comment.clone());
        Ok(())
    }

    async fn list_by_post(&self, post_id: &str) -> Result<Vec<Comment>, RepoError> {
        let mut comments: Vec<Comment> = self
            .comments
            .lock()
            .await
            .values()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        newest_first(&mut comments, |c| (c.created_at, c.comment_id));
        Ok(comments)
    }

    async fn delete_by_post(&self, post_id: &str) -> Result<usize, RepoError> {
        let mut comments = self.comments.lock().await;
        let before = comments.len();
        comments.retain(|_, comment| comment.post_id != post_id);
        Ok(before - comments.len())
    }
}

#[async_trait]
impl LikeRepository for MemoryStore {
    async fn find(&self, post_id: &str, user_id: &str) -> Result<Option<Like>, RepoError> {
        Ok(self
            .likes
            .lock()
            .await
            .values()
            .find(|like| like.post_id == post_id && like.user_id == user_id)
            .cloned())
    }

    async fn insert(&self, like: &Like) -> Result<(), RepoError> {
        self.likes.lock().await.insert(like.like_id, like.clone());
        Ok(())
    }

    async fn delete(&self, like_id: Uuid) -> Result<(), RepoError> {
        self.likes.lock().await.remove(&like_id);
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Like>, RepoError> {
        let mut likes: Vec<Like> = self
            .likes
            .lock()
            .await
            .values()
            .filter(|like| like.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut likes, |l| (l.created_at, l.like_id));
        Ok(likes)
    }
}

#[async_trait]
impl FileStorage for MemoryStore {
    async fn upload(&self, key: &str, data: Bytes, _content_type: &str) -> Result<(), StorageError> {
        self.blobs.lock().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Bytes, StorageError> {
        self.blobs
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.blobs.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(user_id: &str) -> Post {
        let now = Utc::now();
        Post {
            post_id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            photo_id: Uuid::now_v7().to_string(),
            photo_url: String::new(),
            caption: String::new(),
            location: String::new(),
            likes: 0,
            shares: 0,
            comments: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn counters_never_go_negative_or_create_posts() {
        let store = MemoryStore::new();
        let p = post("u1");
        PostRepository::insert(&store, &p).await.unwrap();

        assert!(!store.adjust_counter(p.post_id, PostCounter::Likes, -1).await.unwrap());
        assert!(store.adjust_counter(p.post_id, PostCounter::Likes, 1).await.unwrap());
        assert!(store.adjust_counter(p.post_id, PostCounter::Likes, -1).await.unwrap());
        assert!(!store.adjust_counter(Uuid::now_v7(), PostCounter::Likes, 1).await.unwrap());

        let stored = PostRepository::get(&store, p.post_id).await.unwrap().unwrap();
        assert_eq!(stored.likes, 0);
        assert_eq!(stored.updated_at, p.updated_at);
        assert_eq!(store.post_count().await, 1);
    }

    #[tokio::test]
    async fn owner_scoped_delete_ignores_other_users() {
        let store = MemoryStore::new();
        let p = post("u1");
        PostRepository::insert(&store, &p).await.unwrap();

        assert!(PostRepository::delete_owned(&store, p.post_id, "u2").await.unwrap().is_none());
        assert_eq!(store.post_count().await, 1);
        let deleted = PostRepository::delete_owned(&store, p.post_id, "u1").await.unwrap();
        assert_eq!(deleted.map(|d| d.post_id), Some(p.post_id));
        assert_eq!(store.post_count().await, 0);
    }

    #[tokio::test]
    async fn like_uniqueness_is_not_enforced_by_storage() {
        let store = MemoryStore::new();
        let like = |id| Like {
            like_id: id,
            post_id: "p".into(),
            user_id: "u".into(),
            created_at: Utc::now(),
        };
        LikeRepository::insert(&store, &like(Uuid::now_v7())).await.unwrap();
        LikeRepository::insert(&store, &like(Uuid::now_v7())).await.unwrap();
        assert_eq!(store.likes_for_post("p").await, 2);
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let store = MemoryStore::new();
        let err = store.download("photos/missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        FileStorage::delete(&store, "photos/missing").await.unwrap();
    }
}
