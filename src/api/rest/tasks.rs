use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::shipment::Shipment;
use crate::models::task::{RiderTask, RiderTaskStatus, TaskKind};
use crate::state::AppState;
use crate::store::Predicate;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", post(create_task))
        .route("/tasks/:id", get(get_task))
        .route("/tasks/:id/status", patch(update_task_status))
        .route("/riders/:id/tasks", get(list_rider_tasks))
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub rider_id: Uuid,
    pub kind: TaskKind,
    pub shipment_id: Option<Uuid>,
    pub address: String,
    pub customer_name: String,
    pub earnings: f64,
    pub distance_km: f64,
}

/// Hub operations hand out delivery legs (and ad-hoc pickups) through here;
/// consolidation creates its own pickup tasks internally.
async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<Json<RiderTask>, DispatchError> {
    if payload.address.trim().is_empty() {
        return Err(DispatchError::BadRequest(
            "task address cannot be empty".to_string(),
        ));
    }
    if let Some(shipment_id) = payload.shipment_id {
        if state.repo.fetch::<Shipment>(shipment_id).await?.is_none() {
            return Err(DispatchError::NotFound(format!(
                "shipment {shipment_id} not found"
            )));
        }
    }

    let task = RiderTask::new(
        payload.rider_id,
        payload.kind,
        payload.shipment_id,
        payload.address,
        payload.customer_name,
        payload.earnings,
        payload.distance_km,
    );
    state.repo.insert(&task).await?;

    Ok(Json(task))
}

#[derive(Deserialize)]
pub struct UpdateTaskStatusRequest {
    pub status: RiderTaskStatus,
}

async fn update_task_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskStatusRequest>,
) -> Result<Json<RiderTask>, DispatchError> {
    let task = state
        .coordinator
        .apply_task_transition(id, payload.status)
        .await?;

    Ok(Json(task))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RiderTask>, DispatchError> {
    let task = state
        .repo
        .fetch::<RiderTask>(id)
        .await?
        .ok_or_else(|| DispatchError::NotFound(format!("task {id} not found")))?;

    Ok(Json(task.value))
}

async fn list_rider_tasks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RiderTask>>, DispatchError> {
    let tasks = state
        .repo
        .find::<RiderTask>(&[Predicate::eq("rider_id", json!(id))])
        .await?;

    Ok(Json(tasks.into_iter().map(|t| t.value).collect()))
}
