use crate::{auth::Caller, error::AppResult, AppState};
use axum::{body::Bytes, extract::ContentLengthLimit, Extension, Json};
use serde::Serialize;

const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Serialize)]
pub struct UploadResponse {
    handle: String,
    url: String,
}

/// Stores the raw request body and hands back its blob handle.
pub async fn store(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    ContentLengthLimit(body): ContentLengthLimit<Bytes, MAX_UPLOAD_BYTES>,
) -> AppResult<Json<UploadResponse>> {
    let handle = state.blobs.store(&body).await?;
    tracing::info!(user = %caller.token, %handle, "file uploaded");
    Ok(Json(UploadResponse {
        url: format!("/uploads/{handle}"),
        handle,
    }))
}
