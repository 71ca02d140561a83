use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};
use vistagram::{
    client::{ClientError, PhotoUpload, VistagramClient},
    create_router,
    domain::LikeRepository,
    memory::MemoryStore,
    models::Like,
    AppState, ConnectionState, Database, Store,
};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";
const UPLOAD_LIMIT: usize = 1024;

struct TestApp {
    client: VistagramClient,
    http: reqwest::Client,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.client.base_url(), path)
    }
}

async fn serve(database: Database) -> String {
    let app = create_router(Arc::new(AppState::new(database, UPLOAD_LIMIT)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    format!("http://{}", addr)
}

async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let base_url = serve(Database::ready(Store::memory(store.clone()))).await;
    TestApp {
        client: VistagramClient::new(base_url),
        http: reqwest::Client::new(),
        store,
    }
}

fn photo(caption: &str) -> PhotoUpload {
    PhotoUpload {
        data: PNG_BYTES.to_vec(),
        filename: "sunset.png".to_string(),
        mimetype: "image/png".to_string(),
        caption: Some(caption.to_string()),
        location: Some("Lisbon".to_string()),
    }
}

/// Uploads a photo for `user_id` and returns (photo id, post id).
async fn upload(app: &TestApp, user_id: &str) -> (String, String) {
    let uploaded = app.client.upload_photo(user_id, photo("Sunset")).await.expect("upload");
    let photos = app.client.user_photos(user_id).await.expect("list photos");
    let post_id = photos
        .iter()
        .find(|p| p.id == uploaded.id)
        .and_then(|p| p.post_id.clone())
        .expect("post for uploaded photo");
    (uploaded.id, post_id)
}

fn api_status(err: ClientError) -> (StatusCode, String) {
    match err {
        ClientError::Api { status, message } => (status, message),
        other => panic!("expected an API error, got {other:?}"),
    }
}

#[tokio::test]
async fn upload_creates_photo_and_post() {
    let app = spawn_app().await;

    let uploaded = app.client.upload_photo("u1", photo("Sunset")).await.expect("upload");
    assert_eq!(uploaded.url, app.url(&format!("/api/photos/{}", uploaded.id)));
    assert_eq!(app.store.photo_count().await, 1);
    assert_eq!(app.store.post_count().await, 1);

    let (bytes, content_type) = app.client.photo_bytes(&uploaded.url).await.expect("photo bytes");
    assert_eq!(bytes, PNG_BYTES);
    assert_eq!(content_type.as_deref(), Some("image/png"));

    let posts = app.client.user_posts("u1").await.expect("posts");
    assert_eq!(posts.len(), 1);
    let post = &posts[0];
    assert_eq!(post.photo_id, uploaded.id);
    assert_eq!(post.photo_url, uploaded.url);
    assert_eq!(post.caption, "Sunset");
    assert_eq!(post.location, "Lisbon");
    assert_eq!((post.likes, post.shares, post.comment_count), (0, 0, 0));
    assert!(post.comments.is_empty());

    let photos = app.client.user_photos("u1").await.expect("photos");
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].post_id.as_deref(), Some(post.id.as_str()));
    assert_eq!(photos[0].filename, "sunset.png");
    assert_eq!(photos[0].likes, 0);
}

#[tokio::test]
async fn upload_response_has_relative_url() {
    let app = spawn_app().await;
    let form = reqwest::multipart::Form::new()
        .part(
            "photo",
            reqwest::multipart::Part::bytes(PNG_BYTES.to_vec())
                .file_name("a.png")
                .mime_str("image/png")
                .unwrap(),
        )
        .text("userId", "u1");
    let response = app
        .http
        .post(app.url("/api/photos/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    let id = body["photoId"].as_str().unwrap();
    assert_eq!(body["url"], format!("/api/photos/{id}"));

    let response = app.http.get(app.url(&format!("/api/photos/{id}"))).send().await.unwrap();
    assert_eq!(
        response.headers()["cache-control"].to_str().unwrap(),
        "public, max-age=31536000"
    );
    assert_eq!(
        response.headers()["content-disposition"].to_str().unwrap(),
        "inline; filename=\"a.png\""
    );
}

#[tokio::test]
async fn upload_validation_errors() {
    let app = spawn_app().await;

    let mut text = photo("x");
    text.mimetype = "text/plain".to_string();
    text.filename = "notes.txt".to_string();
    let (status, message) = api_status(app.client.upload_photo("u1", text).await.unwrap_err());
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "Only image files are allowed");

    let (status, message) = api_status(app.client.upload_photo("", photo("x")).await.unwrap_err());
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "User ID is required");

    let mut large = photo("x");
    large.data = vec![0; UPLOAD_LIMIT + 1];
    let (status, message) = api_status(app.client.upload_photo("u1", large).await.unwrap_err());
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "File too large");

    let form = reqwest::multipart::Form::new().text("userId", "u1");
    let response = app
        .http
        .post(app.url("/api/photos/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "No file uploaded" }));

    assert_eq!(app.store.photo_count().await, 0);
    assert_eq!(app.store.post_count().await, 0);
}

#[tokio::test]
async fn failed_post_insert_leaves_orphaned_photo() {
    let app = spawn_app().await;
    app.store.fail_post_inserts(true);

    let (status, message) = api_status(app.client.upload_photo("u1", photo("x")).await.unwrap_err());
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message, "Upload failed");

    assert_eq!(app.store.photo_count().await, 1);
    assert_eq!(app.store.post_count().await, 0);
    let photos = app.client.user_photos("u1").await.unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].post_id, None);
    assert_eq!(photos[0].likes, 0);
}

#[tokio::test]
async fn photo_lookup_distinguishes_malformed_and_missing_ids() {
    let app = spawn_app().await;

    let response = app.http.get(app.url("/api/photos/not-an-id")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid photo ID");

    let missing = uuid::Uuid::now_v7();
    let response = app.http.get(app.url(&format!("/api/photos/{missing}"))).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Photo not found" }));
}

#[tokio::test]
async fn comments_increment_counter_and_list_newest_first() {
    let app = spawn_app().await;
    let (_, post_id) = upload(&app, "u1").await;

    for n in 0..3 {
        let comment = app
            .client
            .add_comment(&post_id, "u2", Some("Bea"), &format!("comment {n}"))
            .await
            .expect("add comment");
        assert_eq!(comment.username, "Bea");
    }
    let anonymous = app.client.add_comment(&post_id, "u3", None, "hi").await.unwrap();
    assert_eq!(anonymous.username, "Anonymous");

    let comments = app.client.comments(&post_id).await.unwrap();
    let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, ["hi", "comment 2", "comment 1", "comment 0"]);

    let posts = app.client.user_posts("u1").await.unwrap();
    assert_eq!(posts[0].comment_count, 4);
    assert_eq!(posts[0].comments, comments);
}

#[tokio::test]
async fn comment_validation_errors() {
    let app = spawn_app().await;
    let (_, post_id) = upload(&app, "u1").await;

    let response = app
        .http
        .post(app.url(&format!("/api/posts/{post_id}/comments")))
        .json(&json!({ "userId": "u2", "text": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "User ID and comment text are required" }));

    let (status, message) = api_status(app.client.add_comment("bogus", "u2", None, "hi").await.unwrap_err());
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "Invalid post ID");

    let missing = uuid::Uuid::now_v7().to_string();
    let (status, message) = api_status(app.client.add_comment(&missing, "u2", None, "hi").await.unwrap_err());
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(message, "Post not found");
    assert_eq!(app.store.comments_for_post(&missing).await, 0);

    assert!(app.client.comments(&missing).await.unwrap().is_empty());
}

#[tokio::test]
async fn toggling_like_twice_restores_state() {
    let app = spawn_app().await;
    let (photo_id, post_id) = upload(&app, "u1").await;

    assert!(!app.client.check_like(&post_id, "u2").await.unwrap());

    let liked = app.client.toggle_like(&post_id, "u2").await.unwrap();
    assert!(liked.success);
    assert!(liked.liked);
    assert_eq!(liked.likes, 1);
    assert!(app.client.check_like(&post_id, "u2").await.unwrap());

    let photos = app.client.user_photos("u1").await.unwrap();
    assert_eq!(photos.iter().find(|p| p.id == photo_id).unwrap().likes, 1);

    let unliked = app.client.toggle_like(&post_id, "u2").await.unwrap();
    assert!(!unliked.liked);
    assert_eq!(unliked.likes, 0);
    assert!(!app.client.check_like(&post_id, "u2").await.unwrap());
    assert_eq!(app.store.likes_for_post(&post_id).await, 0);
}

#[tokio::test]
async fn like_requires_user_and_existing_post() {
    let app = spawn_app().await;
    let (_, post_id) = upload(&app, "u1").await;

    let response = app
        .http
        .post(app.url(&format!("/api/posts/{post_id}/like")))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "User ID is required");

    let missing = uuid::Uuid::now_v7().to_string();
    let (status, _) = api_status(app.client.toggle_like(&missing, "u2").await.unwrap_err());
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.likes_for_post(&missing).await, 0);
}

#[tokio::test]
async fn liked_posts_lists_what_the_user_liked() {
    let app = spawn_app().await;
    let (_, first) = upload(&app, "u1").await;
    let (_, second) = upload(&app, "u1").await;
    let (_, unliked) = upload(&app, "u3").await;

    app.client.toggle_like(&first, "u2").await.unwrap();
    app.client.toggle_like(&second, "u2").await.unwrap();
    app.client.add_comment(&second, "u2", Some("Bea"), "nice").await.unwrap();

    let posts = app.client.liked_posts("u2").await.unwrap();
    let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, [second.as_str(), first.as_str()]);
    assert!(!ids.contains(&unliked.as_str()));
    assert_eq!(posts[0].comments.len(), 1);
    assert_eq!(posts[0].likes, 1);
    assert!(posts[0].photo_url.starts_with(app.client.base_url()));
}

#[tokio::test]
async fn deleting_post_cascades_but_keeps_likes() {
    let app = spawn_app().await;
    let (photo_id, post_id) = upload(&app, "u1").await;
    app.client.add_comment(&post_id, "u2", None, "first").await.unwrap();
    app.client.add_comment(&post_id, "u3", None, "second").await.unwrap();
    app.client.toggle_like(&post_id, "u2").await.unwrap();

    let (status, message) = api_status(app.client.delete_post(&post_id, "u2").await.unwrap_err());
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(message, "Post not found or unauthorized");

    assert!(app.client.delete_post(&post_id, "u1").await.unwrap());

    assert!(app.client.user_posts("u1").await.unwrap().is_empty());
    assert!(app.client.user_photos("u1").await.unwrap().is_empty());
    assert!(app.client.comments(&post_id).await.unwrap().is_empty());
    assert!(!app.store.has_blob(&format!("photos/{photo_id}")).await);

    // Likes of the deleted post stay behind.
    assert_eq!(app.store.likes_for_post(&post_id).await, 1);
    assert!(app.client.check_like(&post_id, "u2").await.unwrap());
    assert!(app.client.liked_posts("u2").await.unwrap().is_empty());

    let (status, _) = api_status(app.client.delete_post(&post_id, "u1").await.unwrap_err());
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_photo_leaves_post_dangling() {
    let app = spawn_app().await;
    let (photo_id, post_id) = upload(&app, "u1").await;

    let (status, message) = api_status(app.client.delete_photo(&photo_id, "u2").await.unwrap_err());
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(message, "Photo not found or unauthorized");

    assert!(app.client.delete_photo(&photo_id, "u1").await.unwrap());
    assert!(app.client.user_photos("u1").await.unwrap().is_empty());

    let posts = app.client.user_posts("u1").await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, post_id);

    let (status, _) = api_status(app.client.photo_bytes(&posts[0].photo_url).await.unwrap_err());
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_requires_user_id() {
    let app = spawn_app().await;
    let (photo_id, post_id) = upload(&app, "u1").await;

    for path in [format!("/api/photos/{photo_id}"), format!("/api/posts/{post_id}")] {
        let response = app
            .http
            .delete(app.url(&path))
            .json(&json!({ "userId": "" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "User ID is required");
    }

    let response = app.http.delete(app.url("/api/posts/123")).json(&json!({ "userId": "u1" })).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.store.post_count().await, 1);
}

#[tokio::test]
async fn handlers_wait_for_connection_but_health_answers() {
    let (database, sender) = Database::connecting();
    let client = VistagramClient::new(serve(database).await);

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.database, "connecting");

    let (status, message) = api_status(client.user_posts("u1").await.unwrap_err());
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message, "Database not connected");

    sender.send_replace(ConnectionState::Ready(Store::memory(Arc::new(MemoryStore::new()))));
    assert_eq!(client.health().await.unwrap().database, "ready");
    assert!(client.user_posts("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn upload_without_multipart_body_reports_missing_file() {
    let app = spawn_app().await;

    let response = app
        .http
        .post(app.url("/api/photos/upload"))
        .json(&json!({ "userId": "u1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let content_type = response.headers()[reqwest::header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("application/json"), "got {content_type}");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No file uploaded");
    assert_eq!(app.store.photo_count().await, 0);
}

#[tokio::test]
async fn requests_without_a_body_need_a_user_id() {
    let app = spawn_app().await;
    let (photo_id, post_id) = upload(&app, "u1").await;

    let requests = [
        app.http.delete(app.url(&format!("/api/photos/{photo_id}"))),
        app.http.delete(app.url(&format!("/api/posts/{post_id}"))),
        app.http.post(app.url(&format!("/api/posts/{post_id}/like"))),
        app.http.post(app.url(&format!("/api/posts/{post_id}/like/check"))),
    ];
    for request in requests {
        let response = request.send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "User ID is required");
    }
    assert_eq!(app.store.photo_count().await, 1);
    assert_eq!(app.store.post_count().await, 1);
}

#[tokio::test]
async fn duplicate_likes_are_removed_one_toggle_at_a_time() {
    let app = spawn_app().await;
    let (_, post_id) = upload(&app, "u1").await;
    assert!(app.client.toggle_like(&post_id, "u2").await.unwrap().liked);

    // What two racing toggles leave behind: a second like by the same user.
    let duplicate = Like {
        like_id: uuid::Uuid::now_v7(),
        post_id: post_id.clone(),
        user_id: "u2".to_string(),
        created_at: chrono::Utc::now(),
    };
    LikeRepository::insert(&*app.store, &duplicate).await.unwrap();
    assert_eq!(app.store.likes_for_post(&post_id).await, 2);

    let toggled = app.client.toggle_like(&post_id, "u2").await.unwrap();
    assert!(!toggled.liked);
    assert_eq!(toggled.likes, 0);
    assert_eq!(app.store.likes_for_post(&post_id).await, 1);
    assert!(app.client.check_like(&post_id, "u2").await.unwrap());

    let posts = app.client.user_posts("u1").await.unwrap();
    assert_eq!(posts[0].likes, 0);

    // The counter is already at zero, so removing the leftover skips it.
    let toggled = app.client.toggle_like(&post_id, "u2").await.unwrap();
    assert!(toggled.success);
    assert!(!toggled.liked);
    assert_eq!(toggled.likes, 0);
    assert_eq!(app.store.likes_for_post(&post_id).await, 0);
}
