use prometheus::{
    register_counter_with_registry, register_histogram_with_registry, Counter, Histogram, Registry,
};
use smsr_core::BatchReport;
use std::sync::Arc;

pub struct GatewayMetrics {
    pub batches_received: Counter,
    pub entries_rejected: Counter,
    pub deliveries_succeeded: Counter,
    pub deliveries_failed: Counter,
    pub auth_failures: Counter,
    pub legacy_decrypt_failures: Counter,
    pub request_latency: Histogram,
    pub registry: Arc<Registry>,
}

impl GatewayMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Arc::new(Registry::new());

        let batches_received = register_counter_with_registry!(
            "smsr_gateway_batches_received_total",
            "Total number of notification batches received",
            registry
        )?;

        let entries_rejected = register_counter_with_registry!(
            "smsr_gateway_entries_rejected_total",
            "Total number of batch entries that failed validation",
            registry
        )?;

        let deliveries_succeeded = register_counter_with_registry!(
            "smsr_gateway_deliveries_succeeded_total",
            "Total number of messages delivered to a recipient",
            registry
        )?;

        let deliveries_failed = register_counter_with_registry!(
            "smsr_gateway_deliveries_failed_total",
            "Total number of failed entry or recipient deliveries",
            registry
        )?;

        let auth_failures = register_counter_with_registry!(
            "smsr_gateway_auth_failures_total",
            "Total number of requests rejected for a bad auth key",
            registry
        )?;

        let legacy_decrypt_failures = register_counter_with_registry!(
            "smsr_gateway_legacy_decrypt_failures_total",
            "Total number of legacy envelopes that failed to decrypt",
            registry
        )?;

        let request_latency = register_histogram_with_registry!(
            "smsr_gateway_request_latency_seconds",
            "Request latency in seconds",
            registry
        )?;

        Ok(Self {
            batches_received,
            entries_rejected,
            deliveries_succeeded,
            deliveries_failed,
            auth_failures,
            legacy_decrypt_failures,
            request_latency,
            registry,
        })
    }

    /// Count the results of one dispatched batch.
    pub fn record_report(&self, report: &BatchReport) {
        self.entries_rejected.inc_by(report.rejected_entries() as f64);
        self.deliveries_succeeded.inc_by(report.delivered_count() as f64);
        self.deliveries_failed.inc_by(report.failed_count() as f64);
    }

    pub fn export_prometheus(&self) -> anyhow::Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
