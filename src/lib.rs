use std::{io, path::Path, sync::Arc};

use axum::{routing::get_service, Extension, Router};
use deadpool::managed::Pool;
use diesel_async::{pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub mod api;
pub mod approval;
pub mod auth;
pub mod blob;
pub mod config;
pub mod directory;
pub mod engine;
pub mod enrollment;
pub mod error;
pub mod export;
pub mod feedback;
pub mod models;
pub mod notify;
pub mod policy;
pub mod registration;
pub mod rotation;
pub mod schema;
pub mod store;

pub use engine::Hub;

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

pub fn connect_to_db(db_url: &str) -> anyhow::Result<DbPool> {
    let db_config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
    Pool::builder(db_config)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build database pool: {e}"))
}

/// Everything a handler can reach.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub keys: Arc<auth::Keys>,
    pub blobs: Arc<dyn blob::BlobStore>,
    pub events: notify::BroadcastPublisher,
}

pub fn app(state: AppState, upload_dir: impl AsRef<Path>) -> Router {
    let serve = get_service(ServeDir::new(upload_dir)).handle_error(handle_error);
    Router::new()
        .nest("/api", api::app())
        .nest("/uploads", serve)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

async fn handle_error(err: io::Error) -> error::AppError {
    err.into()
}
