use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Settings;
use crate::metrics::Diagnostics;
use crate::Metrics;

use super::store::ClusterStore;

// Context for the reconciler
#[derive(Clone)]
pub struct Context {
    /// Object store holding clusters and operations
    pub store: Arc<dyn ClusterStore>,
    /// Diagnostoics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prom metrics
    pub metrics: Metrics,
    pub settings: Settings,
}
