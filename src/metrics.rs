use std::time::Instant;

use chrono::{DateTime, Utc};
use kube::ResourceExt;
use prometheus::{histogram_opts, opts, HistogramVec, IntCounter, IntCounterVec, Registry};
use serde::Serialize;

use crate::api::cluster::Cluster;
use crate::Error;

#[derive(Clone)]
pub struct Metrics {
    pub reconciliations: IntCounter,
    pub failures: IntCounterVec,
    pub reconcile_duration: HistogramVec,
    pub pruned_operations: IntCounter,
    pub status_updates: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let reconcile_duration = HistogramVec::new(
            histogram_opts!(
                "cluster_ops_controller_reconcile_duration_seconds",
                "The duration of reconcile to complete in seconds"
            )
            .buckets(vec![0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.]),
            &[],
        )?;
        let failures = IntCounterVec::new(
            opts!(
                "cluster_ops_controller_reconciliation_errors_total",
                "reconciliation errors",
            ),
            &["instance", "error"],
        )?;
        let reconciliations =
            IntCounter::new("cluster_ops_controller_reconciliations_total", "reconciliations")?;
        let pruned_operations = IntCounter::new(
            "cluster_ops_controller_pruned_operations_total",
            "cluster operations deleted by the retention policy",
        )?;
        let status_updates = IntCounter::new(
            "cluster_ops_controller_status_updates_total",
            "cluster status writes",
        )?;

        Ok(Metrics {
            reconciliations,
            failures,
            reconcile_duration,
            pruned_operations,
            status_updates,
        })
    }

    /// Register API metrics to start tracking them.
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.reconcile_duration.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        registry.register(Box::new(self.reconciliations.clone()))?;
        registry.register(Box::new(self.pruned_operations.clone()))?;
        registry.register(Box::new(self.status_updates.clone()))?;
        Ok(self)
    }

    pub fn reconcile_failure(&self, cluster: &Cluster, error: &Error) {
        self.failures
            .with_label_values(&[cluster.name_any().as_str(), error.metric_label().as_str()])
            .inc()
    }

    pub fn count_and_measure(&self) -> ReconcileMeasurer {
        self.reconciliations.inc();
        ReconcileMeasurer {
            start: Instant::now(),
            metric: self.reconcile_duration.clone(),
        }
    }
}

/// Smart function duration measurer
///
/// Relies on Drop to calculate duration and register the observation in the histogram
pub struct ReconcileMeasurer {
    start: Instant,
    metric: HistogramVec,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric.with_label_values(&[]).observe(duration);
    }
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    /// Last reconciled cluster
    pub last_cluster: Option<String>,
    pub reporter: String,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            last_cluster: None,
            reporter: "cluster-ops-controller".into(),
        }
    }
}
