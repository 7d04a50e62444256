use crate::{
    auth::Caller,
    directory::SearchResults,
    error::AppResult,
    models::{Role, User},
    AppState,
};
use axum::{
    extract::{Path, Query},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    class: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    user_id: String,
    name: String,
    class: String,
}

#[derive(Deserialize)]
struct RoleRequest {
    role: Role,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
}

#[derive(Serialize)]
struct SessionResponse {
    user: User,
    token: String,
}

impl SessionResponse {
    fn issue(state: &AppState, user: User) -> AppResult<Self> {
        Ok(SessionResponse {
            token: state.keys.generate_jwt(&user)?,
            user,
        })
    }
}

async fn register(
    Extension(state): Extension<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<SessionResponse>> {
    let user = state.hub.register(&req.name, &req.class).await?;
    Ok(Json(SessionResponse::issue(&state, user)?))
}

async fn login(
    Extension(state): Extension<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<SessionResponse>> {
    let user = state.hub.login(&req.user_id, &req.name, &req.class).await?;
    Ok(Json(SessionResponse::issue(&state, user)?))
}

async fn me(Caller(caller): Caller) -> Json<User> {
    Json(caller)
}

async fn set_role(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Path(user_id): Path<String>,
    Json(req): Json<RoleRequest>,
) -> AppResult<Json<User>> {
    Ok(Json(state.hub.set_role(&caller, &user_id, req.role).await?))
}

async fn search(
    Extension(state): Extension<AppState>,
    Caller(caller): Caller,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<SearchResults>> {
    Ok(Json(state.hub.search(&caller, &query.q).await?))
}

pub fn app() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/role/:user_id", put(set_role))
        .route("/search", get(search))
}
