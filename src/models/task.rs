use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskKind {
    Pickup,
    Delivery,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiderTaskStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl RiderTaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RiderTaskStatus::Completed | RiderTaskStatus::Cancelled)
    }

    /// Position in the forward ordering. Cancelled sits outside it.
    pub fn rank(&self) -> Option<u8> {
        match self {
            RiderTaskStatus::Pending => Some(0),
            RiderTaskStatus::Accepted => Some(1),
            RiderTaskStatus::InProgress => Some(2),
            RiderTaskStatus::Completed => Some(3),
            RiderTaskStatus::Cancelled => None,
        }
    }
}

/// One unit of rider work. Kind and shipment link are fixed at creation;
/// only `status` moves afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiderTask {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub kind: TaskKind,
    pub status: RiderTaskStatus,
    pub shipment_id: Option<Uuid>,
    pub address: String,
    pub customer_name: String,
    pub earnings: f64,
    pub distance_km: f64,
    pub created_at: DateTime<Utc>,
}

impl RiderTask {
    pub fn new(
        rider_id: Uuid,
        kind: TaskKind,
        shipment_id: Option<Uuid>,
        address: String,
        customer_name: String,
        earnings: f64,
        distance_km: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rider_id,
            kind,
            status: RiderTaskStatus::Pending,
            shipment_id,
            address,
            customer_name,
            earnings,
            distance_km,
            created_at: Utc::now(),
        }
    }
}
