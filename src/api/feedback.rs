use crate::{
    auth::Caller,
    error::AppResult,
    models::{Feedback, FeedbackStatus},
    AppState,
};
use axum::{
    extract::{Path, Query},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;

#[derive(Deserialize)]
struct SubmitRequest {
    content: String,
    #[serde(default)]
    media: Vec<String>,
}

#[derive(Deserialize)]
struct ReplyRequest {
    reply: String,
}

#[derive(Deserialize)]
struct ListQuery {
    status: Option<FeedbackStatus>,
}

async fn submit(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Json(req): Json<SubmitRequest>,
) -> AppResult<Json<Feedback>> {
    Ok(Json(
        state
            .hub
            .submit_feedback(&caller, &req.content, req.media)
            .await?,
    ))
}

async fn mine(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
) -> AppResult<Json<Vec<Feedback>>> {
    Ok(Json(state.hub.my_feedback(&caller).await?))
}

async fn all(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Feedback>>> {
    Ok(Json(state.hub.all_feedback(&caller, query.status).await?))
}

async fn reply(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Path(feedback_id): Path<i32>,
    Json(req): Json<ReplyRequest>,
) -> AppResult<Json<Feedback>> {
    Ok(Json(
        state
            .hub
            .reply_feedback(&caller, feedback_id, &req.reply)
            .await?,
    ))
}

pub fn app() -> Router {
    Router::new()
        .route("/submit", post(submit))
        .route("/mine", get(mine))
        .route("/all", get(all))
        .route("/reply/:feedback_id", post(reply))
}
