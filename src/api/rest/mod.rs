pub mod fleet;
pub mod notifications;
pub mod shipments;
pub mod tasks;
pub mod ws;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::error::DispatchError;
use crate::models::shipment::Shipment;
use crate::models::task::RiderTask;
use crate::models::vehicle::Vehicle;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(shipments::router())
        .merge(tasks::router())
        .merge(fleet::router())
        .merge(notifications::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    shipments: usize,
    tasks: usize,
    vehicles: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, DispatchError> {
    let shipments = state.repo.find::<Shipment>(&[]).await?.len();
    let tasks = state.repo.find::<RiderTask>(&[]).await?.len();
    let vehicles = state.repo.find::<Vehicle>(&[]).await?.len();

    Ok(Json(HealthResponse {
        status: "ok",
        shipments,
        tasks,
        vehicles,
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
