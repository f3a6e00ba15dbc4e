// src/metrics/collector.rs
use crate::probe::FailureReason;
use crate::status::Status;
use anyhow::Result;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Point-in-time counters and gauges for the sampler. Only the current
/// latency is kept; there is no history.
pub struct MetricsCollector {
    pub probes_total: IntCounterVec,
    pub probe_duration_seconds: Histogram,
    pub latency_ms: Gauge,
    pub status: IntGauge,
    pub scheduler_running: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let probes_total = IntCounterVec::new(
            Opts::new("pingtray_probes_total", "Total probes by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(probes_total.clone()))?;

        let probe_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "pingtray_probe_duration_seconds",
            "Wall-clock time spent per probe, including timeouts",
        ))?;
        registry.register(Box::new(probe_duration_seconds.clone()))?;

        let latency_ms = Gauge::new(
            "pingtray_latency_ms",
            "Most recent round-trip time in milliseconds (NaN after a failure)",
        )?;
        registry.register(Box::new(latency_ms.clone()))?;

        let status = IntGauge::new(
            "pingtray_status",
            "Current status (0=unknown, 1=excellent, 2=good, 3=fair, 4=poor)",
        )?;
        registry.register(Box::new(status.clone()))?;

        let scheduler_running = IntGauge::new(
            "pingtray_scheduler_running",
            "Sampler state (1=running, 0=stopped)",
        )?;
        registry.register(Box::new(scheduler_running.clone()))?;

        Ok(Self {
            probes_total,
            probe_duration_seconds,
            latency_ms,
            status,
            scheduler_running,
        })
    }

    pub fn record_probe(&self, failure: Option<FailureReason>, duration: Duration) {
        let outcome = failure.map(|r| r.as_str()).unwrap_or("success");
        self.probes_total.with_label_values(&[outcome]).inc();
        self.probe_duration_seconds.observe(duration.as_secs_f64());
    }

    pub fn update_status(&self, status: &Status) {
        self.status.set(status.level.ordinal());
        self.latency_ms.set(status.latency_ms.unwrap_or(f64::NAN));
    }

    pub fn set_running(&self, running: bool) {
        self.scheduler_running.set(if running { 1 } else { 0 });
    }
}
