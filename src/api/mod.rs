use crate::{
    error::{AppError, AppResult},
    AppState,
};
use axum::{
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

pub mod activity;
pub mod audit;
pub mod club;
pub mod events;
pub mod feedback;
pub mod notification;
pub mod time;
pub mod upload;
pub mod user;

pub fn app() -> Router {
    Router::new()
        .nest("/user", user::app())
        .nest("/club", club::app())
        .nest("/activity", activity::app())
        .nest("/audit", audit::app())
        .nest("/notification", notification::app())
        .nest("/feedback", feedback::app())
        .route("/uploads", post(upload::store))
        .route("/events", get(events::stream))
        .route("/time", get(time::now))
}

pub(crate) fn csv_download(file_name: String, body: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
}

/// Rejects handles that do not name a stored upload.
pub(crate) async fn ensure_uploaded(state: &AppState, handle: Option<&str>) -> AppResult<()> {
    match handle {
        Some(handle) if !handle.trim().is_empty() => {
            if state.blobs.contains(handle.trim()).await? {
                Ok(())
            } else {
                Err(AppError::bad_request(format!("no upload named `{handle}`")))
            }
        }
        _ => Ok(()),
    }
}
