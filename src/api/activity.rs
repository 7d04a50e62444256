use crate::{
    api::{csv_download, ensure_uploaded},
    auth::Caller,
    error::AppResult,
    export,
    models::{Activity, Phase, Registration},
    registration::{ActivityRoster, ActivitySubmission, ActivityView, Applicant},
    AppState,
};
use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[serde(flatten)]
    applicant: Applicant,
    payment_proof: Option<String>,
}

#[derive(Deserialize)]
struct PhaseRequest {
    phase: Phase,
}

async fn list(Extension(state): Extension<AppState>) -> AppResult<Json<Vec<ActivityView>>> {
    Ok(Json(state.hub.approved_activities().await?))
}

async fn create(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Json(req): Json<ActivitySubmission>,
) -> AppResult<Json<Activity>> {
    ensure_uploaded(&state, req.payment_qr_code.as_deref()).await?;
    Ok(Json(state.hub.create_activity(&caller, req).await?))
}

async fn register(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Path(activity_id): Path<i32>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<Registration>> {
    ensure_uploaded(&state, req.payment_proof.as_deref()).await?;
    Ok(Json(
        state
            .hub
            .submit_registration(&caller, activity_id, req.applicant, req.payment_proof)
            .await?,
    ))
}

async fn set_phase(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Path(activity_id): Path<i32>,
    Json(req): Json<PhaseRequest>,
) -> AppResult<Json<Activity>> {
    Ok(Json(state.hub.set_phase(&caller, activity_id, req.phase).await?))
}

async fn participants(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Path(activity_id): Path<i32>,
) -> AppResult<Json<ActivityRoster>> {
    Ok(Json(state.hub.activity_roster(&caller, activity_id).await?))
}

async fn export_participants(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Path(activity_id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let roster = state.hub.activity_roster(&caller, activity_id).await?;
    Ok(csv_download(
        format!("activity-{activity_id}-participants.csv"),
        export::activity_roster(&roster)?,
    ))
}

async fn remove(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Path(activity_id): Path<i32>,
) -> AppResult<Json<()>> {
    state.hub.delete_activity(&caller, activity_id).await?;
    Ok(Json(()))
}

pub fn app() -> Router {
    Router::new()
        .route("/list", get(list))
        .route("/create", post(create))
        .route("/register/:activity_id", post(register))
        .route("/phase/:activity_id", put(set_phase))
        .route("/participants/:activity_id", get(participants))
        .route("/participants/:activity_id/export", get(export_participants))
        .route("/delete/:activity_id", delete(remove))
}
