use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::consolidation::RouteConsolidationMatcher;
use crate::engine::fleet::FleetCapacityPlanner;
use crate::error::DispatchError;
use crate::lifecycle;
use crate::lifecycle::task::shipment_effect;
use crate::models::notification::Severity;
use crate::models::shipment::Shipment;
use crate::models::task::{RiderTask, RiderTaskStatus, TaskKind};
use crate::notify::NotificationSink;
use crate::observability::metrics::Metrics;
use crate::store::Repository;

/// Customer-facing copy for a task status change, when the change is one a
/// customer cares about.
fn customer_update(
    kind: TaskKind,
    status: RiderTaskStatus,
) -> Option<(&'static str, &'static str, Severity)> {
    match (kind, status) {
        (TaskKind::Pickup, RiderTaskStatus::Accepted) => Some((
            "Rider on the way",
            "A rider accepted your pickup and is heading over.",
            Severity::Info,
        )),
        (TaskKind::Pickup, RiderTaskStatus::Completed) => Some((
            "Package picked up",
            "Your package is with the rider and on its way to the hub.",
            Severity::Success,
        )),
        (TaskKind::Delivery, RiderTaskStatus::InProgress) => Some((
            "Out for delivery",
            "Your package has left the hub and is out for delivery.",
            Severity::Info,
        )),
        (TaskKind::Delivery, RiderTaskStatus::Completed) => Some((
            "Package delivered",
            "Your package was delivered. Thanks for shipping with us.",
            Severity::Success,
        )),
        _ => None,
    }
}

/// Entry point for task status changes. The task transition is the source of
/// truth; everything after it (shipment sync, notifications, consolidation,
/// capacity planning) is best-effort and never rolls it back.
pub struct DispatchCoordinator {
    repo: Repository,
    notifier: Arc<dyn NotificationSink>,
    consolidation: RouteConsolidationMatcher,
    fleet: FleetCapacityPlanner,
    metrics: Metrics,
    side_effect_timeout: Duration,
}

impl DispatchCoordinator {
    pub fn new(
        repo: Repository,
        notifier: Arc<dyn NotificationSink>,
        consolidation: RouteConsolidationMatcher,
        fleet: FleetCapacityPlanner,
        metrics: Metrics,
        side_effect_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            notifier,
            consolidation,
            fleet,
            metrics,
            side_effect_timeout,
        }
    }

    pub async fn apply_task_transition(
        &self,
        task_id: Uuid,
        new_status: RiderTaskStatus,
    ) -> Result<RiderTask, DispatchError> {
        let Some(stored) = self.repo.fetch::<RiderTask>(task_id).await? else {
            self.count_transition("rejected");
            return Err(DispatchError::NotFound(format!("task {task_id} not found")));
        };

        let updated = match lifecycle::task::transition(&stored.value, new_status) {
            Ok(updated) => updated,
            Err(err) => {
                self.count_transition("rejected");
                return Err(err);
            }
        };

        let saved = match self.repo.save(stored.version, &updated).await {
            Ok(saved) => saved,
            Err(err) => {
                self.count_transition("conflict");
                return Err(err);
            }
        };
        self.count_transition("applied");

        info!(
            task_id = %task_id,
            rider_id = %saved.value.rider_id,
            status = ?saved.value.status,
            "task transition applied"
        );

        self.run_side_effects(&saved.value).await;

        Ok(saved.value)
    }

    fn count_transition(&self, outcome: &str) {
        self.metrics
            .task_transitions_total
            .with_label_values(&[outcome])
            .inc();
    }

    async fn run_side_effects(&self, task: &RiderTask) {
        if task.shipment_id.is_some() {
            let timer = self
                .metrics
                .side_effect_latency_seconds
                .with_label_values(&["shipment_sync"])
                .start_timer();
            if let Err(err) = self.sync_linked_shipment(task).await {
                warn!(task_id = %task.id, error = %err, "shipment sync side effect failed");
            }
            timer.observe_duration();
        }

        if task.kind == TaskKind::Pickup && task.status == RiderTaskStatus::Completed {
            if let Some(shipment_id) = task.shipment_id {
                self.consolidate_and_replan(task.rider_id, shipment_id).await;
            }
        }
    }

    async fn consolidate_and_replan(&self, rider_id: Uuid, shipment_id: Uuid) {
        let timer = self
            .metrics
            .side_effect_latency_seconds
            .with_label_values(&["consolidation"])
            .start_timer();
        let assigned = timeout(
            self.side_effect_timeout,
            self.consolidation.consolidate(rider_id, shipment_id),
        )
        .await;
        timer.observe_duration();

        let assigned = match assigned {
            Ok(Ok(count)) => count,
            Ok(Err(err)) => {
                warn!(rider_id = %rider_id, error = %err, "route consolidation failed");
                return;
            }
            Err(_) => {
                warn!(rider_id = %rider_id, "route consolidation timed out");
                return;
            }
        };

        if assigned == 0 {
            return;
        }

        let timer = self
            .metrics
            .side_effect_latency_seconds
            .with_label_values(&["capacity_planning"])
            .start_timer();
        match timeout(self.side_effect_timeout, self.fleet.ensure_capacity(rider_id)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                warn!(rider_id = %rider_id, error = %err, "capacity planning failed");
            }
            Err(_) => {
                warn!(rider_id = %rider_id, "capacity planning timed out");
            }
        }
        timer.observe_duration();
    }

    async fn sync_linked_shipment(&self, task: &RiderTask) -> Result<(), DispatchError> {
        let Some(shipment_id) = task.shipment_id else {
            return Ok(());
        };

        let Some(mut stored) = self.repo.fetch::<Shipment>(shipment_id).await? else {
            return Err(DispatchError::NotFound(format!(
                "shipment {shipment_id} linked by task {} not found",
                task.id
            )));
        };

        if let Some(target) = shipment_effect(task.kind, task.status) {
            // One retry against a fresh read; a second loss is reported.
            let mut attempt = 0;
            loop {
                let updated = lifecycle::shipment::transition(
                    &stored.value,
                    target,
                    Some(task.address.clone()),
                )?;

                match self.repo.save(stored.version, &updated).await {
                    Ok(saved) => {
                        stored = saved;
                        break;
                    }
                    Err(DispatchError::ConcurrentModification(msg)) if attempt == 0 => {
                        attempt += 1;
                        stored = self
                            .repo
                            .fetch::<Shipment>(shipment_id)
                            .await?
                            .ok_or_else(|| DispatchError::NotFound(msg.clone()))?;
                    }
                    Err(err) => return Err(err),
                }
            }

            info!(
                shipment_id = %shipment_id,
                status = ?stored.value.current_status,
                "shipment synchronized with task transition"
            );
        }

        if let Some((title, message, severity)) = customer_update(task.kind, task.status) {
            self.notifier
                .notify(
                    stored.value.customer_id,
                    title,
                    message,
                    severity,
                    Some(shipment_id),
                )
                .await?;
        }

        Ok(())
    }
}
