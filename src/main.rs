use axum::http::Method;
use campus_hub::{
    auth::Keys,
    blob::DiskBlobStore,
    config::Config,
    connect_to_db,
    notify::BroadcastPublisher,
    rotation::SystemClock,
    store::{Backend, MemoryStore, PgStore},
    AppState, Hub,
};
use envconfig::Envconfig;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::init_from_env()?;
    let policy = config.policy()?;
    let keys = Keys::from_base64_secret(&config.jwt_secret, config.session())
        .map_err(|e| anyhow::anyhow!("JWT_SECRET is not valid base64: {e}"))?;

    let store = match config.db_url.as_deref() {
        Some(url) => Backend::Postgres(PgStore::new(connect_to_db(url)?)),
        None => {
            tracing::warn!("DATABASE_URL is not set, state lives in memory and is lost on restart");
            Backend::Memory(MemoryStore::new())
        }
    };
    let events = BroadcastPublisher::new(config.event_buffer);
    let hub = Hub::new(store, Arc::new(events.clone()), Arc::new(SystemClock), policy);
    let blobs = DiskBlobStore::open(&config.upload_dir)
        .await
        .map_err(|e| anyhow::anyhow!("cannot open {}: {e}", config.upload_dir))?;

    let state = AppState {
        hub: Arc::new(hub),
        keys: Arc::new(keys),
        blobs: Arc::new(blobs),
        events,
    };

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(Any);
    let app = campus_hub::app(state, &config.upload_dir).layer(cors);

    tracing::info!(port = config.port, "listening");
    axum::Server::bind(&([0, 0, 0, 0], config.port).into())
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
