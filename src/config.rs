//! Controller configuration
//!
//! Two sources feed the controller: process [`Settings`] read from the
//! environment at startup, and the [`ConfigProperty`] ConfigMap read from the
//! controller namespace on every reconciliation.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::telemetry::LogFormat;

/// Name of the ConfigMap holding the in-cluster configuration
pub static CONFIG_MAP_NAME: &str = "kubean-config";

/// Key of the retention count in [`CONFIG_MAP_NAME`]
pub static BACKEND_LIMIT_KEY: &str = "CLUSTER_OPERATIONS_BACKEND_LIMIT";
/// Key of the registry used for the images of operation jobs
pub static SPRAY_JOB_IMAGE_REGISTRY_KEY: &str = "SPRAY_JOB_IMAGE_REGISTRY";

pub const DEFAULT_BACKEND_LIMIT: usize = 30;
pub const MAX_BACKEND_LIMIT: usize = 200;

pub static DEFAULT_NAMESPACE: &str = "kubean-system";
pub static SERVICE_ACCOUNT_NAMESPACE_FILE: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Process settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Delay before a successfully reconciled cluster is looked at again
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    /// Period of the sweep enqueueing every cluster
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Delay before retrying a failed reconciliation
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,

    /// Maximum number of clusters reconciled at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: u16,

    #[serde(default = "default_sweep_buffer")]
    pub sweep_buffer: usize,

    /// Address of the health and metrics server
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_reconcile_interval() -> u64 {
    15
}

fn default_sweep_interval() -> u64 {
    600
}

fn default_error_backoff() -> u64 {
    60
}

fn default_concurrency() -> u16 {
    4
}

fn default_sweep_buffer() -> usize {
    64
}

fn default_bind_address() -> String {
    "0.0.0.0:8443".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval(),
            sweep_interval_secs: default_sweep_interval(),
            error_backoff_secs: default_error_backoff(),
            concurrency: default_concurrency(),
            sweep_buffer: default_sweep_buffer(),
            bind_address: default_bind_address(),
            log_format: LogFormat::default(),
        }
    }
}

impl Settings {
    /// Load settings from `CLUSTER_OPS_*` environment variables
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("CLUSTER_OPS").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

/// Configuration read from the [`CONFIG_MAP_NAME`] ConfigMap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigProperty {
    /// Raw retention count, normalized by [`ConfigProperty::retention_limit`]
    pub cluster_operations_backend_limit: String,
    pub spray_job_image_registry: Option<String>,
}

impl ConfigProperty {
    pub fn from_data(data: &BTreeMap<String, String>) -> Self {
        Self {
            cluster_operations_backend_limit: data
                .get(BACKEND_LIMIT_KEY)
                .cloned()
                .unwrap_or_default(),
            spray_job_image_registry: data
                .get(SPRAY_JOB_IMAGE_REGISTRY_KEY)
                .filter(|registry| !registry.is_empty())
                .cloned(),
        }
    }

    /// Number of finished operations kept per cluster.
    ///
    /// Malformed or non-positive values fall back to the default, values above
    /// the maximum are clamped.
    pub fn retention_limit(&self) -> usize {
        match self.cluster_operations_backend_limit.trim().parse::<i64>() {
            Ok(limit) if limit <= 0 => DEFAULT_BACKEND_LIMIT,
            Ok(limit) => usize::try_from(limit)
                .unwrap_or(MAX_BACKEND_LIMIT)
                .min(MAX_BACKEND_LIMIT),
            Err(_) => DEFAULT_BACKEND_LIMIT,
        }
    }
}

/// Namespace the controller runs in, from `POD_NAMESPACE` or the service
/// account mount.
pub fn current_namespace() -> Option<String> {
    namespace_from(
        std::env::var("POD_NAMESPACE").ok(),
        Path::new(SERVICE_ACCOUNT_NAMESPACE_FILE),
    )
}

pub fn current_namespace_or_default() -> String {
    current_namespace().unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}

fn namespace_from(env: Option<String>, file: &Path) -> Option<String> {
    env.filter(|ns| !ns.trim().is_empty())
        .or_else(|| std::fs::read_to_string(file).ok())
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty())
}
