use crate::{
    errors::AppError,
    handlers::{non_empty, parse_id},
    models::{Comment, CommentCreated, CommentView, NewComment, PostCounter, ANONYMOUS},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing;
use uuid::Uuid;

/// Handler for POST /api/posts/{post_id}/comments
pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    payload: Result<Json<NewComment>, JsonRejection>,
) -> Result<Json<CommentCreated>, AppError> {
    let store = state.database.store()?;
    let Json(body) = payload?;
    let (Some(user_id), Some(text)) = (non_empty(body.user_id), non_empty(body.text)) else {
        return Err(AppError::validation("User ID and comment text are required"));
    };
    let post_id = parse_id(&id_str, "post")?;
    let failure = "Failed to add comment";

    if store
        .posts
        .get(post_id)
        .await
        .map_err(AppError::internal(failure))?
        .is_none()
    {
        return Err(AppError::not_found("Post not found"));
    }

    let now = Utc::now();
    let comment = Comment {
        comment_id: Uuid::now_v7(),
        post_id: post_id.to_string(),
        user_id,
        username: non_empty(body.username).unwrap_or_else(|| ANONYMOUS.to_string()),
        text,
        created_at: now,
        updated_at: now,
    };
    store
        .comments
        .insert(&comment)
        .await
        .map_err(AppError::internal(failure))?;

    // Not atomic with the insert above; a crash in between under-counts.
    if !store
        .posts
        .adjust_counter(post_id, PostCounter::Comments, 1)
        .await
        .map_err(AppError::internal(failure))?
    {
        tracing::warn!(%post_id, "Comment stored but post counter was not incremented");
    }

    tracing::info!(%post_id, comment_id = %comment.comment_id, "Comment added");
    Ok(Json(CommentCreated {
        success: true,
        comment_id: comment.comment_id.to_string(),
        comment: CommentView::from(&comment),
    }))
}

/// Handler for GET /api/posts/{post_id}/comments
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<Json<Vec<CommentView>>, AppError> {
    let store = state.database.store()?;
    let post_id = parse_id(&id_str, "post")?;

    let comments = store
        .comments
        .list_by_post(&post_id.to_string())
        .await
        .map_err(AppError::internal("Failed to get comments"))?;

    Ok(Json(comments.iter().map(CommentView::from).collect()))
}
