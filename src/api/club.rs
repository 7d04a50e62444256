use crate::{
    api::csv_download,
    auth::Caller,
    enrollment::{ClubRoster, ClubSubmission, ClubView, DirectoryEntry, MyEnrollment},
    error::AppResult,
    export,
    models::{Club, ClubEdit, Enrollment},
    AppState,
};
use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct NameQuery {
    name: String,
}

#[derive(Serialize)]
struct NameAvailability {
    available: bool,
}

#[derive(Serialize)]
struct LeaveResponse {
    removed: usize,
}

async fn list(Extension(state): Extension<AppState>) -> AppResult<Json<Vec<ClubView>>> {
    Ok(Json(state.hub.approved_clubs().await?))
}

async fn directory(Extension(state): Extension<AppState>) -> AppResult<Json<Vec<DirectoryEntry>>> {
    Ok(Json(state.hub.club_directory().await?))
}

async fn name_available(
    Extension(state): Extension<AppState>,
    Query(query): Query<NameQuery>,
) -> AppResult<Json<NameAvailability>> {
    Ok(Json(NameAvailability {
        available: state.hub.check_name_availability(&query.name).await?,
    }))
}

async fn create(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Json(req): Json<ClubSubmission>,
) -> AppResult<Json<Club>> {
    Ok(Json(state.hub.create_club(&caller, req).await?))
}

async fn mine(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
) -> AppResult<Json<Option<MyEnrollment>>> {
    Ok(Json(state.hub.my_enrollment(&caller).await?))
}

async fn join(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Path(club_id): Path<i32>,
) -> AppResult<Json<Enrollment>> {
    Ok(Json(state.hub.submit_enrollment(&caller, club_id).await?))
}

async fn rotate(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Path(club_id): Path<i32>,
) -> AppResult<Json<Enrollment>> {
    Ok(Json(state.hub.rotate(&caller, club_id).await?))
}

async fn leave(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
) -> AppResult<Json<LeaveResponse>> {
    Ok(Json(LeaveResponse {
        removed: state.hub.leave(&caller).await?,
    }))
}

async fn edit(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Path(club_id): Path<i32>,
    Json(req): Json<ClubEdit>,
) -> AppResult<Json<Club>> {
    Ok(Json(state.hub.edit_club(&caller, club_id, req).await?))
}

async fn dissolve(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Path(club_id): Path<i32>,
) -> AppResult<Json<()>> {
    state.hub.dissolve(&caller, club_id).await?;
    Ok(Json(()))
}

async fn members(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Path(club_id): Path<i32>,
) -> AppResult<Json<ClubRoster>> {
    Ok(Json(state.hub.club_members(&caller, club_id).await?))
}

async fn export_members(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Path(club_id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let roster = state.hub.club_members(&caller, club_id).await?;
    Ok(csv_download(
        format!("club-{club_id}-members.csv"),
        export::club_roster(&roster)?,
    ))
}

pub fn app() -> Router {
    Router::new()
        .route("/list", get(list))
        .route("/directory", get(directory))
        .route("/name-available", get(name_available))
        .route("/create", post(create))
        .route("/mine", get(mine))
        .route("/leave", post(leave))
        .route("/join/:club_id", post(join))
        .route("/rotate/:club_id", post(rotate))
        .route("/edit/:club_id", put(edit))
        .route("/dissolve/:club_id", delete(dissolve))
        .route("/members/:club_id", get(members))
        .route("/members/:club_id/export", get(export_members))
}
