//! Operator Metrics
//!
//! Prometheus collectors for sync outcomes and server classification,
//! registered on a private registry so tests can build as many as they like.

use crate::error::{Error, Result};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

/// Collectors exported on `/metrics`
pub struct OperatorMetrics {
    registry: Registry,
    /// Finished syncs by outcome (`success`, `failure`)
    pub syncs_total: IntCounterVec,
    /// Rejected sync requests (already in flight)
    pub syncs_rejected_total: IntCounterVec,
    /// Wall time of the sync pipeline
    pub sync_duration_seconds: HistogramVec,
    /// Admitted server entries per registry after the last successful sync
    pub registry_servers: IntGaugeVec,
    /// Syncs currently running in this process
    pub syncs_in_flight: IntGauge,
    /// Servers per classification (`deployed`, `orphaned`) of the last scan
    pub classified_servers: IntGaugeVec,
    /// Successful attachments
    pub attachments_total: IntCounterVec,
}

impl OperatorMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("mcp_registry".to_string()), None)
            .map_err(metrics_error)?;

        let syncs_total = IntCounterVec::new(
            Opts::new("syncs_total", "Finished registry syncs"),
            &["namespace", "outcome"],
        )
        .map_err(metrics_error)?;
        let syncs_rejected_total = IntCounterVec::new(
            Opts::new("syncs_rejected_total", "Sync requests rejected while a sync was in flight"),
            &["namespace"],
        )
        .map_err(metrics_error)?;
        let sync_duration_seconds = HistogramVec::new(
            HistogramOpts::new("sync_duration_seconds", "Duration of the sync pipeline")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["outcome"],
        )
        .map_err(metrics_error)?;
        let registry_servers = IntGaugeVec::new(
            Opts::new("servers", "Admitted server entries per registry"),
            &["namespace", "registry"],
        )
        .map_err(metrics_error)?;
        let syncs_in_flight = IntGauge::new("syncs_in_flight", "Syncs currently running")
            .map_err(metrics_error)?;
        let classified_servers = IntGaugeVec::new(
            Opts::new("classified_servers", "Servers by ownership classification"),
            &["namespace", "class"],
        )
        .map_err(metrics_error)?;
        let attachments_total = IntCounterVec::new(
            Opts::new("attachments_total", "Servers attached to registries"),
            &["namespace"],
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(syncs_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(syncs_rejected_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(sync_duration_seconds.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(registry_servers.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(syncs_in_flight.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(classified_servers.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(attachments_total.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            syncs_total,
            syncs_rejected_total,
            sync_duration_seconds,
            registry_servers,
            syncs_in_flight,
            classified_servers,
            attachments_total,
        })
    }

    /// Text exposition of every collector
    pub fn encode(&self) -> Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics: {}", e))
}
