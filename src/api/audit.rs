use crate::{
    approval::{ApprovalKind, AuditStatus, Decision, Outcome},
    auth::Caller,
    error::AppResult,
    AppState,
};
use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;

#[derive(Deserialize)]
struct DecisionRequest {
    kind: ApprovalKind,
    id: i32,
    decision: Decision,
}

async fn decide(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Json(req): Json<DecisionRequest>,
) -> AppResult<Json<Outcome>> {
    Ok(Json(
        state
            .hub
            .approve(&caller, req.kind, req.id, req.decision)
            .await?,
    ))
}

async fn status(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
) -> AppResult<Json<AuditStatus>> {
    Ok(Json(state.hub.audit_status(&caller).await?))
}

pub fn app() -> Router {
    Router::new()
        .route("/decide", post(decide))
        .route("/status", get(status))
}
