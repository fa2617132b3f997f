use std::sync::Arc;

use futures::channel::mpsc;
use futures::StreamExt;
use kube::{
    api::{Api, ListParams},
    client::Client,
    runtime::{
        controller::{Config as ControllerConfig, Controller},
        reflector::ObjectRef,
        watcher::Config,
    },
};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::api::cluster::Cluster;
use crate::api::cluster_operation::ClusterOperation;
use crate::config::{current_namespace_or_default, Settings};
use crate::controllers::cluster::{error_policy, reconcile};
use crate::controllers::controller::Context;
use crate::controllers::store::{ClusterStore, KubeStore};
use crate::controllers::sweep::sweep;
use crate::metrics::Diagnostics;
use crate::{Metrics, Result};

/// State shared between the controller and the web server
#[derive(Clone, Default)]
pub struct State {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
}

/// State wrapper around the controller outputs for the web server
impl State {
    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub fn to_context(
        &self,
        store: Arc<dyn ClusterStore>,
        settings: Settings,
    ) -> Result<Arc<Context>> {
        Ok(Arc::new(Context {
            store,
            metrics: Metrics::new()?.register(&self.registry)?,
            diagnostics: self.diagnostics.clone(),
            settings,
        }))
    }
}

/// Run the cluster controller until `token` is cancelled or a termination
/// signal is received.
///
/// Reconciliation requests come from the Cluster watch, from the
/// ClusterOperation watch mapped to the owning cluster, and from the periodic
/// sweep. The controller never runs two passes for the same cluster at once
/// and runs at most `settings.concurrency` passes overall.
pub async fn run(state: State, settings: Settings, token: CancellationToken) -> Result<()> {
    let client = Client::try_default().await?;
    let clusters = Api::<Cluster>::all(client.clone());
    if let Err(e) = clusters.list(&ListParams::default().limit(1)).await {
        error!("Clusters are not queryable; {e:?}. Is the CRD installed?");
        return Err(e.into());
    }

    let store: Arc<dyn ClusterStore> = Arc::new(KubeStore::new(
        client.clone(),
        current_namespace_or_default(),
    ));
    let ctx = state.to_context(store.clone(), settings.clone())?;

    let (requests, sweep_requests) = mpsc::channel(settings.sweep_buffer);
    let sweeper = tokio::spawn(sweep(
        store,
        settings.sweep_interval(),
        requests,
        token.clone(),
    ));

    let controller = Controller::new(clusters, Config::default().any_semantic())
        .with_config(ControllerConfig::default().concurrency(settings.concurrency))
        .watches(
            Api::<ClusterOperation>::all(client),
            Config::default(),
            |operation| {
                operation
                    .cluster_name()
                    .map(|name| ObjectRef::<Cluster>::new(&name))
            },
        )
        .reconcile_on(sweep_requests)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!(cluster = %obj.name, "Reconciled"),
                Err(e) => debug!("Reconcile request not processed: {e}"),
            }
        });

    info!(
        concurrency = settings.concurrency,
        "Starting cluster controller"
    );
    tokio::select! {
        _ = controller => info!("Cluster controller stopped"),
        _ = token.cancelled() => info!("Cluster controller cancelled"),
    }

    token.cancel();
    if let Err(e) = sweeper.await {
        warn!("Cluster sweep task failed: {e}");
    }
    Ok(())
}
