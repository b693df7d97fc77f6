use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::fleet::parse_capacity;
use crate::error::DispatchError;
use crate::models::vehicle::{Vehicle, VehicleCategory};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vehicles", post(register_vehicle).get(list_vehicles))
        .route("/riders/:id/capacity-check", post(capacity_check))
}

#[derive(Deserialize)]
pub struct RegisterVehicleRequest {
    pub category: VehicleCategory,
    pub registration: String,
    pub capacity: String,
}

async fn register_vehicle(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterVehicleRequest>,
) -> Result<Json<Vehicle>, DispatchError> {
    if payload.registration.trim().is_empty() {
        return Err(DispatchError::BadRequest(
            "registration cannot be empty".to_string(),
        ));
    }
    if parse_capacity(&payload.capacity).is_none() {
        return Err(DispatchError::BadRequest(format!(
            "capacity '{}' must start with a weight figure",
            payload.capacity
        )));
    }

    let vehicle = Vehicle::register(payload.category, payload.registration, payload.capacity);
    state.repo.insert(&vehicle).await?;

    Ok(Json(vehicle))
}

async fn list_vehicles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Vehicle>>, DispatchError> {
    let vehicles = state.repo.find::<Vehicle>(&[]).await?;
    Ok(Json(vehicles.into_iter().map(|v| v.value).collect()))
}

#[derive(Serialize)]
struct CapacityCheckResponse {
    vehicle_id: Option<Uuid>,
}

/// Runs the capacity planner for a rider on demand. A null `vehicle_id`
/// means no available vehicle covers the load; assignments were left alone.
async fn capacity_check(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CapacityCheckResponse>, DispatchError> {
    let vehicle_id = state.fleet.ensure_capacity(id).await?;
    Ok(Json(CapacityCheckResponse { vehicle_id }))
}
