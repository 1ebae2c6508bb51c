//! Replication metrics, labelled by member name.

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::error;


lazy_static! {
    pub static ref FORWARD_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("forward_failures", "Writes that could not be forwarded to a replica"),
        &["member", "target"]
    )
    .expect("metric can not be created");

    pub static ref TRANSFER_APPLIED: IntCounterVec = IntCounterVec::new(
        Opts::new("transfer_applied", "Transfer log entries replayed successfully"),
        &["member", "target"]
    )
    .expect("metric can not be created");

    pub static ref TRANSFER_LOG_PENDING: IntGaugeVec = IntGaugeVec::new(
        Opts::new("transfer_log_pending", "Entries waiting in the transfer log"),
        &["member"]
    )
    .expect("metric can not be created");

    pub static ref HOUSEKEEPING_RUNS: IntCounterVec = IntCounterVec::new(
        Opts::new("housekeeping_runs", "Completed housekeeping passes"),
        &["member"]
    )
    .expect("metric can not be created");

    pub static ref REPAIR_ENQUEUED: IntCounterVec = IntCounterVec::new(
        Opts::new("repair_enqueued", "Repair entries queued by the consistency sweep"),
        &["member", "target"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new_custom(Some("dstore".to_string()), None)
            .expect("registry can be created");
        register_custom_metrics(&registry);
        registry
    };
}

pub fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(FORWARD_FAILURES.clone()),
        Box::new(TRANSFER_APPLIED.clone()),
        Box::new(TRANSFER_LOG_PENDING.clone()),
        Box::new(HOUSEKEEPING_RUNS.clone()),
        Box::new(REPAIR_ENQUEUED.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            error!("collector can not be registered: {:?}", e);
        }
    }
}

/// Text exposition of every registered metric
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("custom metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}
