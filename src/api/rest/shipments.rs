use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::consolidation::pickup_task_for;
use crate::error::DispatchError;
use crate::lifecycle;
use crate::models::notification::Severity;
use crate::models::shipment::{
    Address, PaymentMethod, ServiceTier, Shipment, ShipmentStatus,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shipments", post(place_shipment))
        .route("/shipments/:id", get(get_shipment))
}

#[derive(Deserialize)]
pub struct PlaceShipmentRequest {
    pub customer_id: Uuid,
    pub customer_name: String,
    pub pickup_address: Address,
    pub dropoff_address: Address,
    pub weight_kg: f64,
    pub tier: ServiceTier,
    pub price: Option<f64>,
    pub payment_method: PaymentMethod,
    pub rider_id: Option<Uuid>,
}

/// Ordering flow: a shipment enters Placed; when a rider is named up front
/// the single pickup task is created and the shipment moves to
/// PickupAssigned in the same request.
async fn place_shipment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PlaceShipmentRequest>,
) -> Result<Json<Shipment>, DispatchError> {
    if payload.customer_name.trim().is_empty() {
        return Err(DispatchError::BadRequest(
            "customer name cannot be empty".to_string(),
        ));
    }
    if payload.weight_kg <= 0.0 {
        return Err(DispatchError::BadRequest(
            "weight must be greater than zero".to_string(),
        ));
    }
    if payload.pickup_address.city.trim().is_empty() {
        return Err(DispatchError::BadRequest(
            "pickup city cannot be empty".to_string(),
        ));
    }

    let shipment = Shipment::place(
        payload.customer_id,
        payload.customer_name,
        payload.pickup_address,
        payload.dropoff_address,
        payload.weight_kg,
        payload.tier,
        payload.price,
        payload.payment_method,
    );
    state.repo.insert(&shipment).await?;

    let shipment = match payload.rider_id {
        Some(rider_id) => {
            let mut assigned = lifecycle::shipment::transition(
                &shipment,
                ShipmentStatus::PickupAssigned,
                Some(shipment.pickup_address.city.clone()),
            )?;
            assigned.rider_id = Some(rider_id);
            let saved = state.repo.save(0, &assigned).await?;

            let task = pickup_task_for(rider_id, &saved.value);
            state.repo.insert(&task).await?;

            let _ = state
                .notifier
                .notify(
                    rider_id,
                    "New pickup assigned",
                    &format!("Pickup at {}", task.address),
                    Severity::Info,
                    Some(saved.value.id),
                )
                .await;

            saved.value
        }
        None => shipment,
    };

    Ok(Json(shipment))
}

async fn get_shipment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Shipment>, DispatchError> {
    let shipment = state
        .repo
        .fetch::<Shipment>(id)
        .await?
        .ok_or_else(|| DispatchError::NotFound(format!("shipment {id} not found")))?;

    Ok(Json(shipment.value))
}
