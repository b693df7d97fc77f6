use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VehicleCategory {
    Bike,
    Van,
    Truck,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VehicleStatus {
    Available,
    InUse,
    Maintenance,
}

/// Capacity is carried as entered by fleet admin, e.g. "450kg"; only the
/// leading integer is meaningful to the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub category: VehicleCategory,
    pub registration: String,
    pub status: VehicleStatus,
    pub current_driver: Option<Uuid>,
    pub capacity: String,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn register(category: VehicleCategory, registration: String, capacity: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            registration,
            status: VehicleStatus::Available,
            current_driver: None,
            capacity,
            created_at: Utc::now(),
        }
    }

    /// Status and driver move together: InUse iff a driver is set.
    pub fn claim(&mut self, rider_id: Uuid) {
        self.status = VehicleStatus::InUse;
        self.current_driver = Some(rider_id);
    }

    pub fn release(&mut self) {
        self.status = VehicleStatus::Available;
        self.current_driver = None;
    }
}
