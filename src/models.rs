use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display name recorded on comments submitted without one.
pub const ANONYMOUS: &str = "Anonymous";

/// Relative URL under which a photo's bytes are served.
pub fn photo_url(photo_id: Uuid) -> String {
    format!("/api/photos/{}", photo_id)
}

/// Blob-storage key holding a photo's bytes.
pub fn image_key(photo_id: Uuid) -> String {
    format!("photos/{}", photo_id)
}

// --- Stored documents ---

#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub photo_id: Uuid,
    pub user_id: String,
    pub filename: String,
    pub mimetype: String,
    pub size: u64,
    pub caption: String,
    pub location: String,
    pub image_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub post_id: Uuid,
    pub user_id: String,
    /// Photo identifier as stored text; not enforced as a reference.
    pub photo_id: String,
    pub photo_url: String,
    pub caption: String,
    pub location: String,
    pub likes: u64,
    pub shares: u64,
    pub comments: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// A fresh post for a just-uploaded photo, all counters at zero.
    pub fn for_photo(photo: &Photo) -> Self {
        Post {
            post_id: Uuid::now_v7(),
            user_id: photo.user_id.clone(),
            photo_id: photo.photo_id.to_string(),
            photo_url: photo_url(photo.photo_id),
            caption: photo.caption.clone(),
            location: photo.location.clone(),
            likes: 0,
            shares: 0,
            comments: 0,
            created_at: photo.created_at,
            updated_at: photo.updated_at,
        }
    }
}

/// The denormalized counters kept on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostCounter {
    Likes,
    Shares,
    Comments,
}

impl PostCounter {
    pub fn attribute(self) -> &'static str {
        match self {
            PostCounter::Likes => "likes",
            PostCounter::Shares => "shares",
            PostCounter::Comments => "comments",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub comment_id: Uuid,
    pub post_id: String,
    pub user_id: String,
    pub username: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Like {
    pub like_id: Uuid,
    pub post_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Newest first; UUIDv7 ids break ties in creation order.
pub(crate) fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

// --- Wire shapes ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub photo_id: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoView {
    pub id: String,
    pub post_id: Option<String>,
    pub url: String,
    pub caption: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub filename: String,
    pub likes: u64,
}

impl PhotoView {
    pub fn new(photo: &Photo, post: Option<&Post>) -> Self {
        PhotoView {
            id: photo.photo_id.to_string(),
            post_id: post.map(|p| p.post_id.to_string()),
            url: photo_url(photo.photo_id),
            caption: photo.caption.clone(),
            location: photo.location.clone(),
            created_at: photo.created_at,
            filename: photo.filename.clone(),
            likes: post.map_or(0, |p| p.likes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Comment> for CommentView {
    fn from(comment: &Comment) -> Self {
        CommentView {
            id: comment.comment_id.to_string(),
            user_id: comment.user_id.clone(),
            username: comment.username.clone(),
            text: comment.text.clone(),
            created_at: comment.created_at,
        }
    }
}

/// A post with its comments inlined. The comment list occupies the `comments`
/// key, so the stored counter is exposed as `commentCount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub photo_id: String,
    pub photo_url: String,
    pub caption: String,
    pub location: String,
    pub likes: u64,
    pub shares: u64,
    pub comment_count: u64,
    pub comments: Vec<CommentView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostView {
    pub fn new(post: Post, comments: &[Comment]) -> Self {
        PostView {
            id: post.post_id.to_string(),
            user_id: post.user_id,
            photo_id: post.photo_id,
            photo_url: post.photo_url,
            caption: post.caption,
            location: post.location,
            likes: post.likes,
            shares: post.shares,
            comment_count: post.comments,
            comments: comments.iter().map(CommentView::from).collect(),
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCreated {
    pub success: bool,
    pub comment_id: String,
    pub comment: CommentView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeToggled {
    pub success: bool,
    pub liked: bool,
    pub likes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeState {
    pub liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub timestamp: DateTime<Utc>,
}

// --- Request bodies ---

/// Body of the owner-scoped delete and like endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_view_keeps_counter_beside_comment_list() {
        let now = Utc::now();
        let photo = Photo {
            photo_id: Uuid::now_v7(),
            user_id: "u1".into(),
            filename: "sunset.jpg".into(),
            mimetype: "image/jpeg".into(),
            size: 3,
            caption: "Sunset".into(),
            location: "Beach".into(),
            image_key: "photos/x".into(),
            created_at: now,
            updated_at: now,
        };
        let mut post = Post::for_photo(&photo);
        post.comments = 2;

        let json = serde_json::to_value(PostView::new(post.clone(), &[])).unwrap();
        assert_eq!(json["_id"], post.post_id.to_string());
        assert_eq!(json["photoUrl"], format!("/api/photos/{}", photo.photo_id));
        assert_eq!(json["commentCount"], 2);
        assert_eq!(json["comments"], serde_json::json!([]));
        assert_eq!(json["likes"], 0);
        assert_eq!(json["shares"], 0);
    }

    #[test]
    fn newest_first_breaks_ties_by_id() {
        let now = Utc::now();
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();
        let mut items = vec![(now, first), (now, second)];
        newest_first(&mut items, |item| *item);
        assert_eq!(items, vec![(now, second), (now, first)]);
    }
}
