use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::geo::leg_distance_km;
use crate::lifecycle;
use crate::models::notification::Severity;
use crate::models::shipment::{Shipment, ShipmentStatus};
use crate::models::task::{RiderTask, TaskKind};
use crate::notify::NotificationSink;
use crate::observability::metrics::Metrics;
use crate::store::{Predicate, Repository, Versioned};

const PICKUP_EARNINGS_SHARE: f64 = 0.8;
const FALLBACK_PICKUP_EARNINGS: f64 = 25.0;

/// Builds the rider work item for a pickup leg of a shipment.
pub fn pickup_task_for(rider_id: Uuid, shipment: &Shipment) -> RiderTask {
    let earnings = shipment
        .price
        .map(|price| price * PICKUP_EARNINGS_SHARE)
        .unwrap_or(FALLBACK_PICKUP_EARNINGS);

    let distance_km = leg_distance_km(
        shipment.pickup_address.location,
        shipment.dropoff_address.location,
    )
    .unwrap_or(0.0);

    RiderTask::new(
        rider_id,
        TaskKind::Pickup,
        Some(shipment.id),
        format!(
            "{}, {}",
            shipment.pickup_address.street, shipment.pickup_address.city
        ),
        shipment.customer_name.clone(),
        earnings,
        distance_km,
    )
}

/// Batches unassigned shipments that originate in the same city as a pickup
/// the rider just finished. Clustering is by exact (case-insensitive) city
/// string; there is no geo radius involved.
#[derive(Clone)]
pub struct RouteConsolidationMatcher {
    repo: Repository,
    notifier: Arc<dyn NotificationSink>,
    metrics: Metrics,
}

impl RouteConsolidationMatcher {
    pub fn new(repo: Repository, notifier: Arc<dyn NotificationSink>, metrics: Metrics) -> Self {
        Self {
            repo,
            notifier,
            metrics,
        }
    }

    pub async fn consolidate(
        &self,
        rider_id: Uuid,
        reference_shipment_id: Uuid,
    ) -> Result<usize, DispatchError> {
        let Some(reference) = self.repo.fetch::<Shipment>(reference_shipment_id).await? else {
            warn!(shipment_id = %reference_shipment_id, "reference shipment missing; nothing to consolidate");
            return Ok(0);
        };
        let origin_city = reference.value.pickup_address.city;

        let placed: Vec<Versioned<Shipment>> = self
            .repo
            .find(&[Predicate::eq("current_status", json!(ShipmentStatus::Placed))])
            .await?;

        let mut assigned = 0usize;
        for candidate in placed {
            if candidate.value.id == reference_shipment_id {
                continue;
            }
            if !candidate
                .value
                .pickup_address
                .city
                .eq_ignore_ascii_case(&origin_city)
            {
                continue;
            }

            match self.claim(rider_id, &candidate).await {
                Ok(()) => assigned += 1,
                Err(DispatchError::ConcurrentModification(_)) => {
                    // Another dispatcher took it between our query and write.
                    info!(shipment_id = %candidate.value.id, "lost consolidation race; skipping");
                }
                Err(err) => {
                    warn!(shipment_id = %candidate.value.id, error = %err, "failed to batch shipment");
                }
            }
        }

        if assigned > 0 {
            self.metrics
                .consolidated_shipments_total
                .inc_by(assigned as u64);
            info!(
                rider_id = %rider_id,
                city = %origin_city,
                count = assigned,
                "route consolidation assigned shipments"
            );
        }

        Ok(assigned)
    }

    async fn claim(
        &self,
        rider_id: Uuid,
        candidate: &Versioned<Shipment>,
    ) -> Result<(), DispatchError> {
        let mut updated = lifecycle::shipment::transition(
            &candidate.value,
            ShipmentStatus::PickupAssigned,
            Some(candidate.value.pickup_address.city.clone()),
        )?;
        updated.rider_id = Some(rider_id);

        let saved = self.repo.save(candidate.version, &updated).await?;

        let task = pickup_task_for(rider_id, &saved.value);
        self.repo.insert(&task).await?;

        self.notifier
            .notify(
                rider_id,
                "New route assignment",
                &format!(
                    "Pickup added on your route: {} ({})",
                    task.address, saved.value.customer_name
                ),
                Severity::Info,
                Some(saved.value.id),
            )
            .await?;

        Ok(())
    }
}
