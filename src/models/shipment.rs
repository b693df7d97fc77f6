use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ShipmentStatus {
    Placed,
    PickupAssigned,
    Picked,
    OriginHubArrival,
    InTransit,
    DestinationHubArrival,
    OutForDelivery,
    Delivered,
    Exception,
    Delayed,
}

impl ShipmentStatus {
    /// Delivered is the only state a shipment can never leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ShipmentStatus::Delivered)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ShipmentStatus::Placed => "Order placed",
            ShipmentStatus::PickupAssigned => "Rider assigned for pickup",
            ShipmentStatus::Picked => "Package picked up",
            ShipmentStatus::OriginHubArrival => "Arrived at origin hub",
            ShipmentStatus::InTransit => "In transit between hubs",
            ShipmentStatus::DestinationHubArrival => "Arrived at destination hub",
            ShipmentStatus::OutForDelivery => "Out for delivery",
            ShipmentStatus::Delivered => "Delivered",
            ShipmentStatus::Exception => "Delivery exception reported",
            ShipmentStatus::Delayed => "Shipment delayed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServiceTier {
    Standard,
    Express,
    SameDay,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    Prepaid,
    CashOnDelivery,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentEvent {
    pub status: ShipmentStatus,
    pub at: DateTime<Utc>,
    pub description: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub rider_id: Option<Uuid>,
    pub pickup_address: Address,
    pub dropoff_address: Address,
    pub weight_kg: f64,
    pub tier: ServiceTier,
    pub current_status: ShipmentStatus,
    pub events: Vec<ShipmentEvent>,
    pub price: Option<f64>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Shipment {
    /// Ordering-flow constructor. Seeds the event history with the initial
    /// Placed event so `current_status` matches the last event from birth.
    #[allow(clippy::too_many_arguments)]
    pub fn place(
        customer_id: Uuid,
        customer_name: String,
        pickup_address: Address,
        dropoff_address: Address,
        weight_kg: f64,
        tier: ServiceTier,
        price: Option<f64>,
        payment_method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        let initial = ShipmentEvent {
            status: ShipmentStatus::Placed,
            at: now,
            description: ShipmentStatus::Placed.describe().to_string(),
            location: Some(pickup_address.city.clone()),
        };

        Self {
            id: Uuid::new_v4(),
            customer_id,
            customer_name,
            rider_id: None,
            pickup_address,
            dropoff_address,
            weight_kg,
            tier,
            current_status: ShipmentStatus::Placed,
            events: vec![initial],
            price,
            payment_method,
            payment_status: PaymentStatus::Pending,
            created_at: now,
        }
    }
}
