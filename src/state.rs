use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::engine::consolidation::RouteConsolidationMatcher;
use crate::engine::coordinator::DispatchCoordinator;
use crate::engine::fleet::FleetCapacityPlanner;
use crate::notify::{NotificationSink, StoreNotificationSink};
use crate::observability::metrics::Metrics;
use crate::store::memory::MemoryGateway;
use crate::store::{PersistenceGateway, Repository};

pub struct AppState {
    pub repo: Repository,
    pub coordinator: DispatchCoordinator,
    pub fleet: FleetCapacityPlanner,
    pub notifier: Arc<dyn NotificationSink>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let gateway: Arc<dyn PersistenceGateway> =
            Arc::new(MemoryGateway::new(config.event_buffer_size));
        Self::with_gateway(gateway, config)
    }

    /// The gateway is chosen once here and injected everywhere; nothing
    /// below this point knows which store it is talking to.
    pub fn with_gateway(gateway: Arc<dyn PersistenceGateway>, config: &Config) -> Self {
        let repo = Repository::new(gateway);
        let notifier: Arc<dyn NotificationSink> =
            Arc::new(StoreNotificationSink::new(repo.clone()));
        let metrics = Metrics::new();

        let consolidation =
            RouteConsolidationMatcher::new(repo.clone(), notifier.clone(), metrics.clone());
        let fleet = FleetCapacityPlanner::new(repo.clone(), notifier.clone(), metrics.clone());
        let coordinator = DispatchCoordinator::new(
            repo.clone(),
            notifier.clone(),
            consolidation,
            fleet.clone(),
            metrics.clone(),
            Duration::from_millis(config.side_effect_timeout_ms),
        );

        Self {
            repo,
            coordinator,
            fleet,
            notifier,
            metrics,
        }
    }
}
