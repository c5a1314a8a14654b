//! `GET /healthz` and `GET /readyz` (SPEC_FULL.md's "[AMBIENT] Health/
//! readiness"), grounded in the teacher's `http::health` module.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::ws::AppState;

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(OkResponse { ok: true }))
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(err) = state.store.ping().await {
        warn!("readiness check failed (database): {err}");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(OkResponse { ok: false })).into_response();
    }

    if let Err(err) = state.pubsub.ping().await {
        warn!("readiness check failed (redis): {err}");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(OkResponse { ok: false })).into_response();
    }

    (StatusCode::OK, Json(OkResponse { ok: true })).into_response()
}
