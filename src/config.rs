use std::{env, net::SocketAddr, str::FromStr};
use thiserror::Error;

/// Default photo size limit (5 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
}

/// Which storage implementation backs the repositories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    DynamoDb,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamodb" => Ok(Self::DynamoDb),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend '{other}' (expected 'dynamodb' or 'memory')")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub storage_backend: StorageBackend,
    /// Only required by the DynamoDB backend.
    pub photo_bucket_name: Option<String>,
    pub table_prefix: String,
    pub aws_region: String,
    // Optional endpoint for LocalStack
    pub localstack_endpoint: Option<String>,
    /// Use static LocalStack credentials instead of the default provider chain.
    pub localstack_credentials: bool,
    pub max_upload_bytes: usize,
    pub public_base_url: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3001".to_string());
        let bind_address = SocketAddr::from_str(&bind_address_str)
            .map_err(|e| ConfigError::InvalidVar("BIND_ADDRESS".into(), e.to_string()))?;

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(raw) => raw
                .parse()
                .map_err(|e| ConfigError::InvalidVar("STORAGE_BACKEND".into(), e))?,
            None => StorageBackend::DynamoDb,
        };

        let photo_bucket_name = var("PHOTO_BUCKET_NAME");
        if storage_backend == StorageBackend::DynamoDb && photo_bucket_name.is_none() {
            return Err(ConfigError::MissingVar("PHOTO_BUCKET_NAME".into()));
        }

        let table_prefix = var("TABLE_PREFIX").unwrap_or_else(|| "vistagram".to_string());

        let aws_region = var("AWS_DEFAULT_REGION").unwrap_or_else(|| "us-east-1".to_string());

        // Allow overriding endpoint for localstack/testing
        let localstack_endpoint = var("AWS_ENDPOINT_URL");
        let localstack_credentials = localstack_endpoint.is_some() && var("AWS_ACCESS_KEY_ID").is_none();

        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidVar("MAX_UPLOAD_BYTES".into(), e.to_string()))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Config {
            bind_address,
            storage_backend,
            photo_bucket_name,
            table_prefix,
            aws_region,
            localstack_endpoint,
            localstack_credentials,
            max_upload_bytes,
            public_base_url: var("PUBLIC_BASE_URL"),
        })
    }

    /// Full table name for one of the collections.
    pub fn table_name(&self, collection: &str) -> String {
        format!("{}_{}", self.table_prefix, collection)
    }
}
