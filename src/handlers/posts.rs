use crate::{
    errors::AppError,
    handlers::{parse_id, photos::delete_image, require_user, with_comments},
    models::{newest_first, PostView, SuccessResponse, UserRequest},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing;
use uuid::Uuid;

/// Handler for GET /api/posts/user/{user_id}
pub async fn list_user_posts(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let store = state.database.store()?;
    let failure = "Failed to get user posts";

    let posts = store
        .posts
        .list_by_user(&user_id)
        .await
        .map_err(AppError::internal(failure))?;
    let views = with_comments(&store, posts, failure).await?;

    tracing::debug!(%user_id, count = views.len(), "Listed user posts");
    Ok(Json(views))
}

/// Handler for GET /api/users/{user_id}/liked-posts
///
/// Likes left behind by deleted posts are skipped.
pub async fn list_liked_posts(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let store = state.database.store()?;
    let failure = "Failed to get liked posts";

    let likes = store
        .likes
        .list_by_user(&user_id)
        .await
        .map_err(AppError::internal(failure))?;

    let mut seen = HashSet::new();
    let mut posts = Vec::with_capacity(likes.len());
    for like in likes {
        let Ok(post_id) = Uuid::parse_str(&like.post_id) else {
            tracing::warn!(like_id = %like.like_id, post_id = %like.post_id, "Like references a malformed post ID");
            continue;
        };
        if !seen.insert(post_id) {
            continue;
        }
        match store.posts.get(post_id).await.map_err(AppError::internal(failure))? {
            Some(post) => posts.push(post),
            None => tracing::debug!(like_id = %like.like_id, %post_id, "Skipping like of a deleted post"),
        }
    }
    newest_first(&mut posts, |p| (p.created_at, p.post_id));

    let views = with_comments(&store, posts, failure).await?;
    tracing::debug!(%user_id, count = views.len(), "Listed liked posts");
    Ok(Json(views))
}

/// Handler for DELETE /api/posts/{post_id}
///
/// Cascades to the post's photo (same owner) and its comments. Likes of the
/// post are left in place.
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let store = state.database.store()?;
    let post_id = parse_id(&id_str, "post")?;
    let user_id = require_user(payload)?;
    let failure = "Failed to delete post";

    let post = store
        .posts
        .delete_owned(post_id, &user_id)
        .await
        .map_err(AppError::internal(failure))?
        .ok_or_else(|| AppError::not_found("Post not found or unauthorized"))?;

    match Uuid::parse_str(&post.photo_id) {
        Ok(photo_id) => {
            let photo = store
                .photos
                .delete_owned(photo_id, &user_id)
                .await
                .map_err(AppError::internal(failure))?;
            match photo {
                Some(photo) => delete_image(&store, &photo, failure).await?,
                None => tracing::warn!(%post_id, %photo_id, "Post referenced a photo that was already gone"),
            }
        }
        Err(_) => tracing::warn!(%post_id, photo_id = %post.photo_id, "Post references a malformed photo ID"),
    }

    let removed = store
        .comments
        .delete_by_post(&post_id.to_string())
        .await
        .map_err(AppError::internal(failure))?;

    tracing::info!(%post_id, %user_id, comments_removed = removed, "Post deleted");
    Ok(Json(SuccessResponse { success: true }))
}
