use chrono::Utc;

use crate::error::DispatchError;
use crate::models::shipment::{Shipment, ShipmentEvent, ShipmentStatus};

/// Appends a status event and moves `current_status`. Pure: the input is
/// untouched, the updated shipment comes back by value.
///
/// Delivered is a hard stop; any other move is accepted, including backward
/// ones, so dispatchers can route through Exception/Delayed and recover.
pub fn transition(
    shipment: &Shipment,
    new_status: ShipmentStatus,
    location: Option<String>,
) -> Result<Shipment, DispatchError> {
    if shipment.current_status.is_terminal() {
        return Err(DispatchError::InvalidTransition(format!(
            "shipment {} is already delivered",
            shipment.id
        )));
    }

    let mut updated = shipment.clone();
    updated.events.push(ShipmentEvent {
        status: new_status,
        at: Utc::now(),
        description: new_status.describe().to_string(),
        location,
    });
    updated.current_status = new_status;

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::transition;
    use crate::models::shipment::{
        Address, PaymentMethod, ServiceTier, Shipment, ShipmentStatus,
    };

    fn placed_shipment() -> Shipment {
        Shipment::place(
            Uuid::new_v4(),
            "Ada Customer".to_string(),
            Address {
                street: "12 Elm St".to_string(),
                city: "Springfield".to_string(),
                location: None,
            },
            Address {
                street: "99 Oak Ave".to_string(),
                city: "Gotham".to_string(),
                location: None,
            },
            4.5,
            ServiceTier::Standard,
            Some(120.0),
            PaymentMethod::Prepaid,
        )
    }

    #[test]
    fn placed_shipment_history_starts_consistent() {
        let shipment = placed_shipment();
        assert_eq!(shipment.current_status, ShipmentStatus::Placed);
        assert_eq!(shipment.events.len(), 1);
        assert_eq!(shipment.events.last().unwrap().status, shipment.current_status);
    }

    #[test]
    fn transition_appends_event_and_syncs_status() {
        let shipment = placed_shipment();
        let updated = transition(
            &shipment,
            ShipmentStatus::PickupAssigned,
            Some("Springfield".to_string()),
        )
        .unwrap();

        assert_eq!(updated.current_status, ShipmentStatus::PickupAssigned);
        assert_eq!(updated.events.len(), 2);
        let last = updated.events.last().unwrap();
        assert_eq!(last.status, updated.current_status);
        assert_eq!(last.location.as_deref(), Some("Springfield"));
        // Earlier history untouched.
        assert_eq!(updated.events[0].status, ShipmentStatus::Placed);
    }

    #[test]
    fn backward_and_skip_ahead_moves_are_permitted() {
        let shipment = placed_shipment();
        let ahead = transition(&shipment, ShipmentStatus::OutForDelivery, None).unwrap();
        let back = transition(&ahead, ShipmentStatus::Exception, None).unwrap();
        let resumed = transition(&back, ShipmentStatus::InTransit, None).unwrap();

        assert_eq!(resumed.current_status, ShipmentStatus::InTransit);
        assert_eq!(resumed.events.len(), 4);
    }

    #[test]
    fn delivered_shipment_rejects_further_transitions() {
        let shipment = placed_shipment();
        let delivered = transition(&shipment, ShipmentStatus::Delivered, None).unwrap();

        let err = transition(&delivered, ShipmentStatus::InTransit, None).unwrap_err();
        assert!(err.to_string().contains("invalid transition"));

        // Input untouched by the failed call.
        assert_eq!(delivered.current_status, ShipmentStatus::Delivered);
        assert_eq!(delivered.events.len(), 2);
    }
}
