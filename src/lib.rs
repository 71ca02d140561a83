//! Vistagram: photo sharing backend.
//!
//! Photos, posts, comments and likes live in four independent collections
//! kept loosely in sync through denormalized counters on the post.

pub mod aws_clients;
pub mod client;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod startup;
pub mod storage;

pub use crate::db::{ConnectionState, Database, Store};
pub use crate::routes::create_router;

/// AppState holds shared resources for the web server.
pub struct AppState {
    pub database: Database,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(database: Database, max_upload_bytes: usize) -> Self {
        Self { database, max_upload_bytes }
    }
}
