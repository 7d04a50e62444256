use crate::{auth::Caller, error::AppResult, notify::NotificationSummary, AppState};
use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;

#[derive(Serialize)]
struct ReadResponse {
    marked: usize,
}

async fn summary(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
) -> AppResult<Json<NotificationSummary>> {
    Ok(Json(state.hub.notification_summary(&caller).await?))
}

async fn read(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
) -> AppResult<Json<ReadResponse>> {
    Ok(Json(ReadResponse {
        marked: state.hub.mark_read(&caller).await?,
    }))
}

pub fn app() -> Router {
    Router::new()
        .route("/summary", get(summary))
        .route("/read", post(read))
}
