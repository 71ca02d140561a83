pub mod comments;
pub mod health;
pub mod likes;
pub mod photos;
pub mod posts;

use crate::{
    db::Store,
    errors::AppError,
    models::{Comment, Post, PostView, UserRequest},
};
use axum::{extract::rejection::JsonRejection, Json};
use uuid::Uuid;

/// Parses an identifier in the storage layer's native format.
pub(crate) fn parse_id(raw: &str, kind: &'static str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|source| {
        tracing::debug!(invalid_id = %raw, kind, "Rejecting malformed identifier");
        AppError::InvalidId { kind, source }
    })
}

/// Treats a missing or empty string field as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Extracts the required `userId` of a JSON body.
///
/// A request sent without a JSON content type counts as an empty body.
pub(crate) fn require_user(payload: Result<Json<UserRequest>, JsonRejection>) -> Result<String, AppError> {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(JsonRejection::MissingJsonContentType(_)) => UserRequest::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    non_empty(body.user_id).ok_or_else(|| AppError::validation("User ID is required"))
}

/// Inlines each post's comments, newest first.
pub(crate) async fn with_comments(
    store: &Store,
    posts: Vec<Post>,
    failure: &'static str,
) -> Result<Vec<PostView>, AppError> {
    let mut views = Vec::with_capacity(posts.len());
    for post in posts {
        let comments: Vec<Comment> = store
            .comments
            .list_by_post(&post.post_id.to_string())
            .await
            .map_err(AppError::internal(failure))?;
        views.push(PostView::new(post, &comments));
    }
    Ok(views)
}
