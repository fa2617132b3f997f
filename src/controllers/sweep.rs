use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::{SendError, Sender};
use futures::SinkExt as _;
use kube::runtime::reflector::ObjectRef;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::cluster::Cluster;

use super::store::ClusterStore;

/// Periodically request a reconciliation of every cluster.
///
/// Runs until `token` is cancelled or the receiving side of `requests` is
/// dropped. The first sweep happens immediately.
pub async fn sweep(
    store: Arc<dyn ClusterStore>,
    every: Duration,
    mut requests: Sender<ObjectRef<Cluster>>,
    token: CancellationToken,
) {
    info!(interval_secs = every.as_secs(), "Starting cluster sweep");

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            _ = token.cancelled() => break,
            sent = enqueue_all(store.as_ref(), &mut requests) => {
                if sent.is_err() {
                    info!("Reconcile request channel closed");
                    break;
                }
            }
        }
    }

    info!("Stopped cluster sweep");
}

async fn enqueue_all(
    store: &dyn ClusterStore,
    requests: &mut Sender<ObjectRef<Cluster>>,
) -> Result<(), SendError> {
    let clusters = match store.list_clusters().await {
        Ok(clusters) => clusters,
        Err(e) => {
            warn!("Failed to list clusters for sweep: {e}");
            return Ok(());
        }
    };

    debug!(clusters = clusters.len(), "Sweeping clusters");
    for cluster in &clusters {
        requests.send(ObjectRef::from_obj(cluster)).await?;
    }
    Ok(())
}
