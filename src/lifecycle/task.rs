use crate::error::DispatchError;
use crate::models::shipment::ShipmentStatus;
use crate::models::task::{RiderTask, RiderTaskStatus, TaskKind};

/// Strict single-step progression Pending → Accepted → InProgress →
/// Completed, with Pending → Cancelled as the only escape.
pub fn transition(task: &RiderTask, new_status: RiderTaskStatus) -> Result<RiderTask, DispatchError> {
    if task.status.is_terminal() {
        return Err(DispatchError::InvalidTransition(format!(
            "task {} is already {:?}",
            task.id, task.status
        )));
    }

    let allowed = match (task.status.rank(), new_status.rank()) {
        (Some(current), Some(next)) => next == current + 1,
        // Cancellation is only reachable while the task is still pending.
        (Some(_), None) => {
            new_status == RiderTaskStatus::Cancelled && task.status == RiderTaskStatus::Pending
        }
        (None, _) => false,
    };

    if !allowed {
        return Err(DispatchError::InvalidTransition(format!(
            "task {} cannot move {:?} -> {:?}",
            task.id, task.status, new_status
        )));
    }

    let mut updated = task.clone();
    updated.status = new_status;
    Ok(updated)
}

/// Shipment synchronization mapping, executed by the coordinator after a
/// task transition commits.
pub fn shipment_effect(kind: TaskKind, new_status: RiderTaskStatus) -> Option<ShipmentStatus> {
    match (kind, new_status) {
        (TaskKind::Pickup, RiderTaskStatus::Completed) => Some(ShipmentStatus::Picked),
        (TaskKind::Delivery, RiderTaskStatus::InProgress) => Some(ShipmentStatus::OutForDelivery),
        (TaskKind::Delivery, RiderTaskStatus::Completed) => Some(ShipmentStatus::Delivered),
        _ => None,
    }
}
