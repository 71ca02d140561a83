use crate::{
    db::Store,
    errors::{AppError, StorageError},
    handlers::{non_empty, parse_id, require_user},
    models::{image_key, photo_url, Photo, PhotoView, Post, SuccessResponse, UploadResponse, UserRequest},
    AppState,
};
use axum::{
    body::{Body, Bytes},
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::Response,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing;
use uuid::Uuid;

/// The file part of an upload.
struct UploadedFile {
    filename: String,
    mimetype: String,
    data: Bytes,
}

/// Handler for POST /api/photos/upload
///
/// Stores the bytes, then the photo document, then the post referencing it.
/// The three writes are independent: a failure part-way leaves whatever was
/// already written in place.
pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let store = state.database.store()?;
    // A body that is not multipart carries no file part.
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(%rejection, "Upload is not a multipart form");
        AppError::validation("No file uploaded")
    })?;

    let mut file: Option<UploadedFile> = None;
    let mut user_id = None;
    let mut caption = None;
    let mut location = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        match field_name.as_str() {
            "userId" => user_id = Some(field.text().await?),
            "caption" => caption = Some(field.text().await?),
            "location" => location = Some(field.text().await?),
            "photo" => {
                let filename = field.file_name().unwrap_or("photo").to_string();
                let mimetype = field
                    .content_type()
                    .map(|m| m.to_string())
                    .or_else(|| mime_guess::from_path(&filename).first_raw().map(|s| s.to_string()))
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                if !mimetype.starts_with("image/") {
                    tracing::debug!(%filename, %mimetype, "Rejecting non-image upload");
                    return Err(AppError::validation("Only image files are allowed"));
                }
                let data = field.bytes().await?;
                if data.len() > state.max_upload_bytes {
                    return Err(AppError::validation("File too large"));
                }
                file = Some(UploadedFile { filename, mimetype, data });
            }
            _ => tracing::debug!("Ignoring unknown multipart field: {}", field_name),
        }
    }

    let file = file.ok_or_else(|| AppError::validation("No file uploaded"))?;
    let user_id = non_empty(user_id).ok_or_else(|| AppError::validation("User ID is required"))?;

    let photo_id = Uuid::now_v7();
    let now = Utc::now();
    let photo = Photo {
        photo_id,
        user_id,
        filename: file.filename,
        mimetype: file.mimetype,
        size: file.data.len() as u64,
        caption: caption.unwrap_or_default(),
        location: location.unwrap_or_default(),
        image_key: image_key(photo_id),
        created_at: now,
        updated_at: now,
    };

    store
        .files
        .upload(&photo.image_key, file.data, &photo.mimetype)
        .await
        .map_err(AppError::internal("Upload failed"))?;
    store
        .photos
        .insert(&photo)
        .await
        .map_err(AppError::internal("Upload failed"))?;

    let post = Post::for_photo(&photo);
    store
        .posts
        .insert(&post)
        .await
        .map_err(AppError::internal("Upload failed"))?;

    tracing::info!(photo_id = %photo_id, post_id = %post.post_id, user_id = %photo.user_id, "Photo uploaded");
    Ok(Json(UploadResponse {
        success: true,
        photo_id: photo_id.to_string(),
        url: photo_url(photo_id),
    }))
}

/// Handler for GET /api/photos/{photo_id}
///
/// No ownership check: anyone holding the identifier can fetch the bytes.
pub async fn get_photo(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<Response, AppError> {
    let store = state.database.store()?;
    let photo_id = parse_id(&id_str, "photo")?;
    tracing::debug!(%photo_id, "Fetching photo");

    let photo = store
        .photos
        .get(photo_id)
        .await
        .map_err(AppError::internal("Failed to get photo"))?
        .ok_or_else(|| AppError::not_found("Photo not found"))?;

    let data = match store.files.download(&photo.image_key).await {
        Ok(data) => data,
        Err(StorageError::NotFound(key)) => {
            tracing::warn!(%photo_id, image_key = %key, "Photo document has no stored bytes");
            return Err(AppError::not_found("Photo not found"));
        }
        Err(e) => return Err(AppError::internal("Failed to get photo")(e)),
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &photo.mimetype)
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", photo.filename.replace('"', "")),
        )
        .header(header::CACHE_CONTROL, "public, max-age=31536000")
        .body(Body::from(data))
        .map_err(|e| AppError::InternalServerError(format!("Failed to build photo response: {}", e)))
}

/// Handler for GET /api/photos/user/{user_id}
pub async fn list_user_photos(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<PhotoView>>, AppError> {
    let store = state.database.store()?;
    let failure = "Failed to get user photos";

    let photos = store
        .photos
        .list_by_user(&user_id)
        .await
        .map_err(AppError::internal(failure))?;

    let mut views = Vec::with_capacity(photos.len());
    for photo in &photos {
        let post = store
            .posts
            .find_by_photo(photo.photo_id)
            .await
            .map_err(AppError::internal(failure))?;
        views.push(PhotoView::new(photo, post.as_ref()));
    }

    tracing::debug!(%user_id, count = views.len(), "Listed user photos");
    Ok(Json(views))
}

/// Handler for DELETE /api/photos/{photo_id}
///
/// Removes the photo only. A post that references it keeps pointing at it.
pub async fn delete_photo(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let store = state.database.store()?;
    let photo_id = parse_id(&id_str, "photo")?;
    let user_id = require_user(payload)?;
    let failure = "Failed to delete photo";

    let photo = store
        .photos
        .delete_owned(photo_id, &user_id)
        .await
        .map_err(AppError::internal(failure))?
        .ok_or_else(|| AppError::not_found("Photo not found or unauthorized"))?;

    delete_image(&store, &photo, failure).await?;

    tracing::info!(%photo_id, %user_id, "Photo deleted");
    Ok(Json(SuccessResponse { success: true }))
}

/// Removes a photo's bytes, tolerating bytes that are already gone.
pub(crate) async fn delete_image(store: &Store, photo: &Photo, failure: &'static str) -> Result<(), AppError> {
    match store.files.delete(&photo.image_key).await {
        Ok(()) => {
            tracing::debug!(image_key = %photo.image_key, "Deleted photo bytes");
            Ok(())
        }
        Err(StorageError::NotFound(_)) => {
            tracing::warn!(image_key = %photo.image_key, "Photo bytes not found during delete, continuing");
            Ok(())
        }
        Err(e) => {
            tracing::error!(image_key = %photo.image_key, error = ?e, "Failed to delete photo bytes");
            Err(AppError::internal(failure)(e))
        }
    }
}
