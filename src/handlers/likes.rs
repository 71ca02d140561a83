use crate::{
    errors::AppError,
    handlers::{parse_id, require_user},
    models::{Like, LikeState, LikeToggled, PostCounter, UserRequest},
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

/// Handler for POST /api/posts/{post_id}/like
///
/// Read-check-then-write with no lock: two concurrent toggles by the same
/// user can both see "not liked" and both insert.
pub async fn toggle_like(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<LikeToggled>, AppError> {
    let store = state.database.store()?;
    let user_id = require_user(payload)?;
    let post_id = parse_id(&id_str, "post")?;
    let failure = "Failed to toggle like";

    if store
        .posts
        .get(post_id)
        .await
        .map_err(AppError::internal(failure))?
        .is_none()
    {
        return Err(AppError::not_found("Post not found"));
    }

    let post_key = post_id.to_string();
    let existing = store
        .likes
        .find(&post_key, &user_id)
        .await
        .map_err(AppError::internal(failure))?;

    let liked = match existing {
        Some(like) => {
            store
                .likes
                .delete(like.like_id)
                .await
                .map_err(AppError::internal(failure))?;
            if !store
                .posts
                .adjust_counter(post_id, PostCounter::Likes, -1)
                .await
                .map_err(AppError::internal(failure))?
            {
                tracing::warn!(%post_id, delta = -1, "Like removed but post counter was not adjusted");
            }
            false
        }
        None => {
            let like = Like {
                like_id: Uuid::now_v7(),
                post_id: post_key,
                user_id: user_id.clone(),
                created_at: Utc::now(),
            };
            store
                .likes
                .insert(&like)
                .await
                .map_err(AppError::internal(failure))?;
            if !store
                .posts
                .adjust_counter(post_id, PostCounter::Likes, 1)
                .await
                .map_err(AppError::internal(failure))?
            {
                tracing::warn!(%post_id, delta = 1, "Like stored but post counter was not adjusted");
            }
            true
        }
    };

    let likes = store
        .posts
        .get(post_id)
        .await
        .map_err(AppError::internal(failure))?
        .ok_or_else(|| AppError::not_found("Post not found"))?
        .likes;

    tracing::info!(%post_id, %user_id, liked, likes, "Like toggled");
    Ok(Json(LikeToggled { success: true, liked, likes }))
}

/// Handler for POST /api/posts/{post_id}/like/check
pub async fn check_like(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<LikeState>, AppError> {
    let store = state.database.store()?;
    let user_id = require_user(payload)?;
    let post_id = parse_id(&id_str, "post")?;

    let liked = store
        .likes
        .find(&post_id.to_string(), &user_id)
        .await
        .map_err(AppError::internal("Failed to check like"))?
        .is_some();

    Ok(Json(LikeState { liked }))
}
