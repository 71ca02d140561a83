//! Storage connection state.
//!
//! The HTTP server starts accepting requests before storage is provisioned.
//! Handlers ask [`Database::store`] for the repositories and get a 500 until
//! the background [`connect`] task has published [`ConnectionState::Ready`].

use std::{sync::Arc, time::Duration};

use backoff::ExponentialBackoff;
use tokio::sync::watch;

use crate::{
    aws_clients::{create_dynamodb_client, create_s3_client, create_sdk_config},
    config::{Config, StorageBackend},
    domain::{CommentRepository, FileStorage, LikeRepository, PhotoRepository, PostRepository},
    errors::AppError,
    memory::MemoryStore,
    repositories::{
        DynamoDbCommentRepository, DynamoDbLikeRepository, DynamoDbPhotoRepository, DynamoDbPostRepository,
    },
    startup::init_resources,
    storage::S3FileStorage,
};

/// How long startup keeps retrying resource provisioning before giving up.
const PROVISION_TIMEOUT: Duration = Duration::from_secs(60);

/// The repositories and blob storage handlers operate on.
#[derive(Clone)]
pub struct Store {
    pub photos: Arc<dyn PhotoRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub likes: Arc<dyn LikeRepository>,
    pub files: Arc<dyn FileStorage>,
}

impl Store {
    /// Every collection backed by the same in-memory store.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Store {
            photos: store.clone(),
            posts: store.clone(),
            comments: store.clone(),
            likes: store.clone(),
            files: store,
        }
    }
}

#[derive(Clone)]
pub enum ConnectionState {
    Connecting,
    Ready(Store),
    Failed(String),
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready(_) => "ready",
            ConnectionState::Failed(_) => "failed",
        }
    }
}

/// Read side of the connection state, cloned into every request.
#[derive(Clone)]
pub struct Database {
    state: watch::Receiver<ConnectionState>,
}

impl Database {
    /// A database that is still connecting, plus the sender that settles it.
    pub fn connecting() -> (Self, watch::Sender<ConnectionState>) {
        let (sender, state) = watch::channel(ConnectionState::Connecting);
        (Database { state }, sender)
    }

    /// A database that is ready from the start.
    pub fn ready(store: Store) -> Self {
        let (_sender, state) = watch::channel(ConnectionState::Ready(store));
        Database { state }
    }

    pub fn status(&self) -> &'static str {
        self.state.borrow().label()
    }

    pub fn store(&self) -> Result<Store, AppError> {
        match &*self.state.borrow() {
            ConnectionState::Ready(store) => Ok(store.clone()),
            ConnectionState::Connecting => Err(AppError::DatabaseUnavailable("still connecting".to_string())),
            ConnectionState::Failed(reason) => Err(AppError::DatabaseUnavailable(reason.clone())),
        }
    }
}

/// Builds the configured backend and publishes the outcome on `sender`.
pub async fn connect(config: Arc<Config>, sender: watch::Sender<ConnectionState>) {
    let state = match open_store(&config).await {
        Ok(store) => {
            tracing::info!(backend = ?config.storage_backend, "Storage connected");
            ConnectionState::Ready(store)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect storage");
            ConnectionState::Failed(e.to_string())
        }
    };
    sender.send_replace(state);
}

async fn open_store(config: &Config) -> Result<Store, AppError> {
    match config.storage_backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data will not survive a restart");
            Ok(Store::memory(Arc::new(MemoryStore::new())))
        }
        StorageBackend::DynamoDb => {
            tracing::info!("Initializing AWS clients...");
            let sdk_config = create_sdk_config(config).await;
            let db_client = create_dynamodb_client(&sdk_config);
            let s3_client = create_s3_client(&sdk_config);

            let policy = ExponentialBackoff {
                max_elapsed_time: Some(PROVISION_TIMEOUT),
                ..ExponentialBackoff::default()
            };
            backoff::future::retry(policy, || async {
                init_resources(&db_client, &s3_client, config).await.map_err(|e| {
                    tracing::warn!(error = %e, "Storage not ready yet, retrying");
                    backoff::Error::transient(e)
                })
            })
            .await?;

            let bucket_name = config
                .photo_bucket_name
                .clone()
                .ok_or_else(|| AppError::ConfigError("PHOTO_BUCKET_NAME is not set".to_string()))?;

            Ok(Store {
                photos: Arc::new(DynamoDbPhotoRepository::new(db_client.clone(), config.table_name("photos"))),
                posts: Arc::new(DynamoDbPostRepository::new(db_client.clone(), config.table_name("posts"))),
                comments: Arc::new(DynamoDbCommentRepository::new(
                    db_client.clone(),
                    config.table_name("comments"),
                )),
                likes: Arc::new(DynamoDbLikeRepository::new(db_client, config.table_name("likes"))),
                files: Arc::new(S3FileStorage::new(s3_client, bucket_name)),
            })
        }
    }
}
