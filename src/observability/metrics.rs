use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub task_transitions_total: IntCounterVec,
    pub consolidated_shipments_total: IntCounter,
    pub vehicle_reassignments_total: IntCounterVec,
    pub riders_with_unresolved_capacity: IntGauge,
    pub side_effect_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let task_transitions_total = IntCounterVec::new(
            Opts::new("task_transitions_total", "Rider task transitions by outcome"),
            &["outcome"],
        )
        .expect("valid task_transitions_total metric");

        let consolidated_shipments_total = IntCounter::new(
            "consolidated_shipments_total",
            "Shipments batched onto a rider by route consolidation",
        )
        .expect("valid consolidated_shipments_total metric");

        let vehicle_reassignments_total = IntCounterVec::new(
            Opts::new(
                "vehicle_reassignments_total",
                "Capacity planner runs by outcome",
            ),
            &["outcome"],
        )
        .expect("valid vehicle_reassignments_total metric");

        let riders_with_unresolved_capacity = IntGauge::new(
            "riders_with_unresolved_capacity",
            "Riders whose load exceeds every available vehicle",
        )
        .expect("valid riders_with_unresolved_capacity metric");

        let side_effect_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "side_effect_latency_seconds",
                "Latency of dispatch side effects in seconds",
            ),
            &["stage"],
        )
        .expect("valid side_effect_latency_seconds metric");

        registry
            .register(Box::new(task_transitions_total.clone()))
            .expect("register task_transitions_total");
        registry
            .register(Box::new(consolidated_shipments_total.clone()))
            .expect("register consolidated_shipments_total");
        registry
            .register(Box::new(vehicle_reassignments_total.clone()))
            .expect("register vehicle_reassignments_total");
        registry
            .register(Box::new(riders_with_unresolved_capacity.clone()))
            .expect("register riders_with_unresolved_capacity");
        registry
            .register(Box::new(side_effect_latency_seconds.clone()))
            .expect("register side_effect_latency_seconds");

        Self {
            registry,
            task_transitions_total,
            consolidated_shipments_total,
            vehicle_reassignments_total,
            riders_with_unresolved_capacity,
            side_effect_latency_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
