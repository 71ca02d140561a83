//! Typed HTTP client for the Vistagram API.
//!
//! Mirrors the endpoints one method each, turns RFC 3339 timestamps into
//! `DateTime<Utc>` and rewrites relative URLs against the base URL.

use crate::errors::ErrorBody;
use crate::models::{
    CommentCreated, CommentView, HealthResponse, LikeState, LikeToggled, NewComment, PhotoView, PostView,
    SuccessResponse, UploadResponse, UserRequest,
};
use reqwest::{
    multipart::{Form, Part},
    Method, RequestBuilder, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Server responded {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("Server rejected the request without reporting success")]
    Rejected,
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Transport(e) => e.status(),
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Rejected => None,
        }
    }
}

/// A photo as returned by upload: its id and absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPhoto {
    pub id: String,
    pub url: String,
}

/// Photo fields the client sends on upload.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub data: Vec<u8>,
    pub filename: String,
    pub mimetype: String,
    pub caption: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VistagramClient {
    http: reqwest::Client,
    base_url: String,
}

impl VistagramClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves a URL returned by the server against the base URL.
    pub fn ensure_full_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with("://") {
            format!("http{}", url)
        } else if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            format!("{}/{}", self.base_url, url)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    pub async fn upload_photo(&self, user_id: &str, upload: PhotoUpload) -> Result<UploadedPhoto, ClientError> {
        let part = Part::bytes(upload.data)
            .file_name(upload.filename)
            .mime_str(&upload.mimetype)?;
        let mut form = Form::new().part("photo", part).text("userId", user_id.to_string());
        if let Some(caption) = upload.caption {
            form = form.text("caption", caption);
        }
        if let Some(location) = upload.location {
            form = form.text("location", location);
        }

        let response = self
            .request(Method::POST, "/api/photos/upload")
            .multipart(form)
            .send()
            .await?;
        let result: UploadResponse = decode(response).await?;
        if !result.success {
            return Err(ClientError::Rejected);
        }
        Ok(UploadedPhoto {
            url: self.ensure_full_url(&result.url),
            id: result.photo_id,
        })
    }

    /// Raw bytes and content type of a photo, by relative or absolute URL.
    pub async fn photo_bytes(&self, url: &str) -> Result<(Vec<u8>, Option<String>), ClientError> {
        let response = self.http.get(self.ensure_full_url(url)).send().await?;
        let response = check(response).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok((response.bytes().await?.to_vec(), content_type))
    }

    pub async fn user_photos(&self, user_id: &str) -> Result<Vec<PhotoView>, ClientError> {
        let response = self
            .request(Method::GET, &format!("/api/photos/user/{}", user_id))
            .send()
            .await?;
        let mut photos: Vec<PhotoView> = decode(response).await?;
        for photo in &mut photos {
            photo.url = self.ensure_full_url(&photo.url);
        }
        Ok(photos)
    }

    pub async fn delete_photo(&self, photo_id: &str, user_id: &str) -> Result<bool, ClientError> {
        let response = self
            .request(Method::DELETE, &format!("/api/photos/{}", photo_id))
            .json(&user_body(user_id))
            .send()
            .await?;
        Ok(decode::<SuccessResponse>(response).await?.success)
    }

    pub async fn delete_post(&self, post_id: &str, user_id: &str) -> Result<bool, ClientError> {
        let response = self
            .request(Method::DELETE, &format!("/api/posts/{}", post_id))
            .json(&user_body(user_id))
            .send()
            .await?;
        Ok(decode::<SuccessResponse>(response).await?.success)
    }

    pub async fn user_posts(&self, user_id: &str) -> Result<Vec<PostView>, ClientError> {
        let response = self
            .request(Method::GET, &format!("/api/posts/user/{}", user_id))
            .send()
            .await?;
        self.posts(response).await
    }

    pub async fn liked_posts(&self, user_id: &str) -> Result<Vec<PostView>, ClientError> {
        let response = self
            .request(Method::GET, &format!("/api/users/{}/liked-posts", user_id))
            .send()
            .await?;
        self.posts(response).await
    }

    async fn posts(&self, response: Response) -> Result<Vec<PostView>, ClientError> {
        let mut posts: Vec<PostView> = decode(response).await?;
        for post in &mut posts {
            post.photo_url = self.ensure_full_url(&post.photo_url);
        }
        Ok(posts)
    }

    pub async fn add_comment(
        &self,
        post_id: &str,
        user_id: &str,
        username: Option<&str>,
        text: &str,
    ) -> Result<CommentView, ClientError> {
        let body = NewComment {
            user_id: Some(user_id.to_string()),
            username: username.map(str::to_string),
            text: Some(text.to_string()),
        };
        let response = self
            .request(Method::POST, &format!("/api/posts/{}/comments", post_id))
            .json(&body)
            .send()
            .await?;
        let created: CommentCreated = decode(response).await?;
        if !created.success {
            return Err(ClientError::Rejected);
        }
        Ok(created.comment)
    }

    pub async fn comments(&self, post_id: &str) -> Result<Vec<CommentView>, ClientError> {
        let response = self
            .request(Method::GET, &format!("/api/posts/{}/comments", post_id))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn toggle_like(&self, post_id: &str, user_id: &str) -> Result<LikeToggled, ClientError> {
        let response = self
            .request(Method::POST, &format!("/api/posts/{}/like", post_id))
            .json(&user_body(user_id))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn check_like(&self, post_id: &str, user_id: &str) -> Result<bool, ClientError> {
        let response = self
            .request(Method::POST, &format!("/api/posts/{}/like/check", post_id))
            .json(&user_body(user_id))
            .send()
            .await?;
        Ok(decode::<LikeState>(response).await?.liked)
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self.request(Method::GET, "/api/health").send().await?;
        decode(response).await
    }
}

fn user_body(user_id: &str) -> UserRequest {
    UserRequest {
        user_id: Some(user_id.to_string()),
    }
}

/// Turns a non-2xx response into `ClientError::Api` using the `error` field.
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(ClientError::Api { status, message })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    Ok(check(response).await?.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_full_url_resolves_relative_paths() {
        let client = VistagramClient::new("http://localhost:3001/");
        assert_eq!(client.base_url(), "http://localhost:3001");
        assert_eq!(
            client.ensure_full_url("/api/photos/abc"),
            "http://localhost:3001/api/photos/abc"
        );
        assert_eq!(
            client.ensure_full_url("api/photos/abc"),
            "http://localhost:3001/api/photos/abc"
        );
        assert_eq!(client.ensure_full_url("://cdn.test/a.png"), "http://cdn.test/a.png");
        assert_eq!(client.ensure_full_url("https://cdn.test/a.png"), "https://cdn.test/a.png");
    }
}
