use crate::AppState;
use axum::{Extension, Json};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTime {
    now: DateTime<FixedOffset>,
    utc_offset_minutes: i32,
    rotation_open: bool,
}

/// Server time on the offset the rotation window is enforced in.
pub async fn now(Extension(state): Extension<AppState>) -> Json<ServerTime> {
    let window = state.hub.policy().rotation;
    let at = state.hub.clock().now();
    Json(ServerTime {
        now: window.local_time(at),
        utc_offset_minutes: window.offset().local_minus_utc() / 60,
        rotation_open: window.is_open(at),
    })
}
