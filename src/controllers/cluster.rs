use std::sync::Arc;

use chrono::Utc;
use kube::{runtime::controller::Action, Resource, ResourceExt};
use tracing::{debug, info, instrument, warn};

use crate::api::cluster::Cluster;
use crate::config::ConfigProperty;
use crate::{telemetry, Error, Result};

use super::conditions::{aggregate_conditions, condition_sequences_equal};
use super::controller::Context;
use super::retention::{clean_excess_operations, sort_for_retention};
use super::store::ClusterStore;
use super::{CleanupError, StatusSyncError, StatusSyncResult};

#[instrument(skip_all, fields(trace_id = display(telemetry::get_trace_id()), name = cluster.name_any()))]
pub async fn reconcile(cluster: Arc<Cluster>, ctx: Arc<Context>) -> Result<Action> {
    let name = cluster.name_any();
    {
        let mut diagnostics = ctx.diagnostics.write().await;
        diagnostics.last_event = Utc::now();
        diagnostics.last_cluster = Some(name.clone());
    }

    reconcile_cluster(&name, &ctx).await
}

pub fn error_policy(cluster: Arc<Cluster>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&cluster, error);
    Action::requeue(ctx.settings.error_backoff())
}

/// One reconciliation pass for the named cluster.
///
/// Only a failed cluster lookup is returned as an error. Failures of the later
/// steps are logged and counted, and the cluster is requeued after the regular
/// interval like a successful pass.
pub async fn reconcile_cluster(name: &str, ctx: &Context) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure();
    let store = ctx.store.as_ref();

    let Some(cluster) = store.get_cluster(name).await? else {
        debug!("Cluster no longer exists");
        return Ok(Action::await_change());
    };

    adopt_references(store, &cluster).await;

    let keep = match store.fetch_config().await {
        Ok(config) => config.retention_limit(),
        Err(e) => {
            warn!("Failed to fetch controller config, using defaults: {e}");
            ConfigProperty::default().retention_limit()
        }
    };

    match clean_excess_operations(store, name, keep).await {
        Ok(deleted) => ctx.metrics.pruned_operations.inc_by(deleted as u64),
        Err(e) => {
            if let CleanupError::Delete { deleted, .. } = &e {
                ctx.metrics.pruned_operations.inc_by(*deleted as u64);
            }
            warn!("Failed to clean excess cluster operations: {e}");
            ctx.metrics.reconcile_failure(&cluster, &e.into());
        }
    }

    match sync_status(store, &cluster).await {
        Ok(true) => ctx.metrics.status_updates.inc(),
        Ok(false) => {}
        Err(e) => {
            warn!("Failed to sync cluster status: {e}");
            ctx.metrics.reconcile_failure(&cluster, &e.into());
        }
    }

    Ok(Action::requeue(ctx.settings.reconcile_interval()))
}

/// Rebuild the cluster conditions from its operations and write them when
/// they differ from the stored ones. Returns whether the status was written.
pub async fn sync_status(store: &dyn ClusterStore, cluster: &Cluster) -> StatusSyncResult<bool> {
    let mut operations = store
        .list_operations(&cluster.name_any())
        .await
        .map_err(StatusSyncError::List)?;
    sort_for_retention(&mut operations);

    let conditions = aggregate_conditions(&operations);
    if condition_sequences_equal(&conditions, cluster.conditions()) {
        debug!("Cluster status is up to date");
        return Ok(false);
    }

    let mut updated = cluster.clone();
    updated.status.get_or_insert_with(Default::default).conditions = conditions;
    store
        .update_cluster_status(&updated)
        .await
        .map_err(StatusSyncError::Update)?;

    info!(
        conditions = updated.conditions().len(),
        "Updated cluster status"
    );
    Ok(true)
}

/// Make the cluster the owner of the ConfigMaps and Secrets it references, so
/// they are collected together with it. Objects that already have an owner are
/// left alone.
async fn adopt_references(store: &dyn ClusterStore, cluster: &Cluster) {
    let Some(owner) = cluster.owner_ref(&()) else {
        return;
    };

    for reference in cluster.config_references() {
        match store.adopt_reference(&reference, &owner).await {
            Ok(true) => info!(
                reference = reference.name(),
                namespace = reference.namespace(),
                "Set cluster as owner of reference"
            ),
            Ok(false) => {}
            Err(e) => warn!(
                reference = reference.name(),
                namespace = reference.namespace(),
                "Failed to set cluster as owner of reference: {e}"
            ),
        }
    }
}
