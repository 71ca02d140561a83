use crate::{
    handlers::{comments, health, likes, photos, posts},
    AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Room for the multipart framing and text fields around the photo itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Creates the Axum router and associates routes with handlers.
pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/api/health", get(health::health))
        .route(
            "/api/photos/upload",
            post(photos::upload_photo).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/photos/user/{user_id}", get(photos::list_user_photos))
        .route(
            "/api/photos/{photo_id}",
            get(photos::get_photo).delete(photos::delete_photo),
        )
        .route("/api/posts/user/{user_id}", get(posts::list_user_posts))
        .route("/api/posts/{post_id}", delete(posts::delete_post))
        .route(
            "/api/posts/{post_id}/comments",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route("/api/posts/{post_id}/like", post(likes::toggle_like))
        .route("/api/posts/{post_id}/like/check", post(likes::check_like))
        .route("/api/users/{user_id}/liked-posts", get(posts::list_liked_posts))
        // Middleware Layers
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
