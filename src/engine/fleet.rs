use std::sync::Arc;

use dashmap::DashMap;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::notification::Severity;
use crate::models::shipment::{Shipment, ShipmentStatus};
use crate::models::vehicle::{Vehicle, VehicleStatus};
use crate::notify::NotificationSink;
use crate::observability::metrics::Metrics;
use crate::store::{Predicate, Repository, Versioned};

/// Extracts the leading integer from a fleet capacity string ("450kg" → 450).
/// The unit suffix is assumed consistent across the fleet and ignored.
pub fn parse_capacity(raw: &str) -> Option<u32> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn covers(vehicle: &Vehicle, load_kg: f64) -> bool {
    parse_capacity(&vehicle.capacity)
        .map(|capacity| capacity as f64 >= load_kg)
        .unwrap_or(false)
}

/// Keeps a rider's vehicle sufficient for their active load, swapping to the
/// smallest available vehicle that fits when it is not.
#[derive(Clone)]
pub struct FleetCapacityPlanner {
    repo: Repository,
    notifier: Arc<dyn NotificationSink>,
    metrics: Metrics,
    unresolved: Arc<DashMap<Uuid, ()>>,
}

impl FleetCapacityPlanner {
    pub fn new(repo: Repository, notifier: Arc<dyn NotificationSink>, metrics: Metrics) -> Self {
        Self {
            repo,
            notifier,
            metrics,
            unresolved: Arc::new(DashMap::new()),
        }
    }

    /// Sum of the rider's non-terminal shipment weights. Derived on demand,
    /// never persisted.
    pub async fn rider_load(&self, rider_id: Uuid) -> Result<f64, DispatchError> {
        let active: Vec<Versioned<Shipment>> = self
            .repo
            .find(&[
                Predicate::eq("rider_id", json!(rider_id)),
                Predicate::ne("current_status", json!(ShipmentStatus::Delivered)),
            ])
            .await?;

        Ok(active.iter().map(|s| s.value.weight_kg).sum())
    }

    pub async fn ensure_capacity(&self, rider_id: Uuid) -> Result<Option<Uuid>, DispatchError> {
        let load_kg = self.rider_load(rider_id).await?;

        let mut current = self.current_vehicle(rider_id).await?;
        if let Some(vehicle) = &current {
            if covers(&vehicle.value, load_kg) {
                self.resolved(rider_id);
                self.metrics
                    .vehicle_reassignments_total
                    .with_label_values(&["unchanged"])
                    .inc();
                return Ok(Some(vehicle.value.id));
            }
        }

        // Claim races with other planner runs; one fresh retry before
        // declaring the capacity unresolved.
        for _attempt in 0..2 {
            let Some(candidate) = self.smallest_sufficient(load_kg).await? else {
                break;
            };

            let mut claimed = candidate.value.clone();
            claimed.claim(rider_id);

            match self.repo.save(candidate.version, &claimed).await {
                Ok(saved) => {
                    if let Some(previous) = current.take() {
                        self.release(previous).await;
                    }
                    self.resolved(rider_id);
                    self.metrics
                        .vehicle_reassignments_total
                        .with_label_values(&["upgraded"])
                        .inc();

                    let _ = self
                        .notifier
                        .notify(
                            rider_id,
                            "Vehicle upgraded",
                            &format!(
                                "Your load of {load_kg}kg now rides on {} ({})",
                                saved.value.registration, saved.value.capacity
                            ),
                            Severity::Success,
                            Some(saved.value.id),
                        )
                        .await;

                    info!(
                        rider_id = %rider_id,
                        vehicle_id = %saved.value.id,
                        load_kg,
                        "vehicle reassigned for rider load"
                    );
                    return Ok(Some(saved.value.id));
                }
                Err(DispatchError::ConcurrentModification(_)) => {
                    info!(vehicle_id = %claimed.id, "vehicle claimed elsewhere; retrying selection");
                }
                Err(err) => return Err(err),
            }
        }

        warn!(rider_id = %rider_id, load_kg, "no available vehicle covers rider load");
        self.unresolved.insert(rider_id, ());
        self.metrics
            .riders_with_unresolved_capacity
            .set(self.unresolved.len() as i64);
        self.metrics
            .vehicle_reassignments_total
            .with_label_values(&["unresolved"])
            .inc();
        Ok(None)
    }

    async fn current_vehicle(
        &self,
        rider_id: Uuid,
    ) -> Result<Option<Versioned<Vehicle>>, DispatchError> {
        let mut assigned: Vec<Versioned<Vehicle>> = self
            .repo
            .find(&[Predicate::eq("current_driver", json!(rider_id))])
            .await?;
        Ok(assigned.pop())
    }

    async fn smallest_sufficient(
        &self,
        load_kg: f64,
    ) -> Result<Option<Versioned<Vehicle>>, DispatchError> {
        let mut available: Vec<Versioned<Vehicle>> = self
            .repo
            .find(&[Predicate::eq("status", json!(VehicleStatus::Available))])
            .await?;

        available.sort_by_key(|v| parse_capacity(&v.value.capacity).unwrap_or(0));
        Ok(available.into_iter().find(|v| covers(&v.value, load_kg)))
    }

    async fn release(&self, previous: Versioned<Vehicle>) {
        let mut released = previous.value.clone();
        released.release();

        if let Err(err) = self.repo.save(previous.version, &released).await {
            warn!(vehicle_id = %released.id, error = %err, "failed to release previous vehicle");
        }
    }

    fn resolved(&self, rider_id: Uuid) {
        if self.unresolved.remove(&rider_id).is_some() {
            self.metrics
                .riders_with_unresolved_capacity
                .set(self.unresolved.len() as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::{FleetCapacityPlanner, parse_capacity};
    use crate::lifecycle;
    use crate::models::shipment::{Address, PaymentMethod, ServiceTier, Shipment, ShipmentStatus};
    use crate::models::vehicle::{Vehicle, VehicleCategory, VehicleStatus};
    use crate::notify::{NotificationSink, StoreNotificationSink};
    use crate::observability::metrics::Metrics;
    use crate::store::memory::MemoryGateway;
    use crate::store::Repository;

    fn planner() -> (FleetCapacityPlanner, Repository) {
        let repo = Repository::new(Arc::new(MemoryGateway::new(64)));
        let notifier: Arc<dyn NotificationSink> =
            Arc::new(StoreNotificationSink::new(repo.clone()));
        let planner = FleetCapacityPlanner::new(repo.clone(), notifier, Metrics::new());
        (planner, repo)
    }

    async fn seed_shipment(repo: &Repository, rider: Uuid, weight_kg: f64) {
        let mut shipment = Shipment::place(
            Uuid::new_v4(),
            "Ada Customer".to_string(),
            Address {
                street: "12 Elm St".to_string(),
                city: "Springfield".to_string(),
                location: None,
            },
            Address {
                street: "99 Oak Ave".to_string(),
                city: "Metropolis".to_string(),
                location: None,
            },
            weight_kg,
            ServiceTier::Standard,
            Some(60.0),
            PaymentMethod::Prepaid,
        );
        shipment.rider_id = Some(rider);
        repo.insert(&shipment).await.unwrap();
    }

    async fn seed_vehicle(repo: &Repository, capacity: &str) -> Vehicle {
        let vehicle = Vehicle::register(
            VehicleCategory::Van,
            format!("KA-{}", &Uuid::new_v4().to_string()[..8]),
            capacity.to_string(),
        );
        repo.insert(&vehicle).await.unwrap();
        vehicle
    }

    #[test]
    fn capacity_parsing_takes_the_leading_integer() {
        assert_eq!(parse_capacity("450kg"), Some(450));
        assert_eq!(parse_capacity(" 20kg "), Some(20));
        assert_eq!(parse_capacity("5"), Some(5));
        assert_eq!(parse_capacity("kg450"), None);
        assert_eq!(parse_capacity(""), None);
    }

    #[tokio::test]
    async fn unassigned_rider_gets_the_smallest_sufficient_vehicle() {
        let (planner, repo) = planner();
        let rider = Uuid::new_v4();

        seed_shipment(&repo, rider, 5.0).await;
        let big = seed_vehicle(&repo, "20kg").await;
        let small = seed_vehicle(&repo, "5kg").await;

        let assigned = planner.ensure_capacity(rider).await.unwrap();
        assert_eq!(assigned, Some(small.id));

        let small_now = repo.fetch::<Vehicle>(small.id).await.unwrap().unwrap().value;
        assert_eq!(small_now.status, VehicleStatus::InUse);
        assert_eq!(small_now.current_driver, Some(rider));

        let big_now = repo.fetch::<Vehicle>(big.id).await.unwrap().unwrap().value;
        assert_eq!(big_now.status, VehicleStatus::Available);
        assert_eq!(big_now.current_driver, None);
    }

    #[tokio::test]
    async fn sufficient_current_vehicle_is_left_alone() {
        let (planner, repo) = planner();
        let rider = Uuid::new_v4();

        seed_shipment(&repo, rider, 8.0).await;
        let mut current = seed_vehicle(&repo, "10kg").await;
        // Already assigned to the rider.
        let stored = repo.fetch::<Vehicle>(current.id).await.unwrap().unwrap();
        current.claim(rider);
        repo.save(stored.version, &current).await.unwrap();
        seed_vehicle(&repo, "50kg").await;

        let assigned = planner.ensure_capacity(rider).await.unwrap();
        assert_eq!(assigned, Some(current.id));

        let unchanged = repo.fetch::<Vehicle>(current.id).await.unwrap().unwrap().value;
        assert_eq!(unchanged.status, VehicleStatus::InUse);
        assert_eq!(unchanged.current_driver, Some(rider));
    }

    #[tokio::test]
    async fn grown_load_releases_the_small_vehicle_and_claims_a_bigger_one() {
        let (planner, repo) = planner();
        let rider = Uuid::new_v4();

        seed_shipment(&repo, rider, 15.0).await;
        let mut small = seed_vehicle(&repo, "10kg").await;
        let stored = repo.fetch::<Vehicle>(small.id).await.unwrap().unwrap();
        small.claim(rider);
        repo.save(stored.version, &small).await.unwrap();

        seed_vehicle(&repo, "12kg").await;
        let sufficient = seed_vehicle(&repo, "18kg").await;
        seed_vehicle(&repo, "40kg").await;

        let assigned = planner.ensure_capacity(rider).await.unwrap();
        assert_eq!(assigned, Some(sufficient.id));

        let released = repo.fetch::<Vehicle>(small.id).await.unwrap().unwrap().value;
        assert_eq!(released.status, VehicleStatus::Available);
        assert_eq!(released.current_driver, None);

        let claimed = repo.fetch::<Vehicle>(sufficient.id).await.unwrap().unwrap().value;
        assert_eq!(claimed.current_driver, Some(rider));
    }

    #[tokio::test]
    async fn exhausted_fleet_leaves_assignment_untouched_and_returns_none() {
        let (planner, repo) = planner();
        let rider = Uuid::new_v4();

        seed_shipment(&repo, rider, 100.0).await;
        let mut current = seed_vehicle(&repo, "10kg").await;
        let stored = repo.fetch::<Vehicle>(current.id).await.unwrap().unwrap();
        current.claim(rider);
        repo.save(stored.version, &current).await.unwrap();
        seed_vehicle(&repo, "50kg").await;

        let assigned = planner.ensure_capacity(rider).await.unwrap();
        assert_eq!(assigned, None);

        // The insufficient vehicle stays with the rider.
        let unchanged = repo.fetch::<Vehicle>(current.id).await.unwrap().unwrap().value;
        assert_eq!(unchanged.status, VehicleStatus::InUse);
        assert_eq!(unchanged.current_driver, Some(rider));
    }

    #[tokio::test]
    async fn delivered_shipments_do_not_count_toward_load() {
        let (planner, repo) = planner();
        let rider = Uuid::new_v4();

        seed_shipment(&repo, rider, 4.0).await;

        let mut delivered = Shipment::place(
            Uuid::new_v4(),
            "Ada Customer".to_string(),
            Address {
                street: "1 Pine Rd".to_string(),
                city: "Springfield".to_string(),
                location: None,
            },
            Address {
                street: "2 Fir Rd".to_string(),
                city: "Metropolis".to_string(),
                location: None,
            },
            90.0,
            ServiceTier::Standard,
            Some(60.0),
            PaymentMethod::Prepaid,
        );
        delivered.rider_id = Some(rider);
        let delivered =
            lifecycle::shipment::transition(&delivered, ShipmentStatus::Delivered, None).unwrap();
        repo.insert(&delivered).await.unwrap();

        let load = planner.rider_load(rider).await.unwrap();
        assert!((load - 4.0).abs() < 1e-9);
    }
}
