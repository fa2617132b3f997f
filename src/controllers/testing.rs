//! In-memory [`ClusterStore`] and fixtures shared by the controller tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::DateTime;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{OwnerReference, Time};
use kube::ResourceExt;

use crate::api::cluster::{Cluster, ClusterSpec, ConfigMapRef, ConfigReference};
use crate::api::cluster_operation::{
    ClusterOperation, ClusterOperationSpec, ClusterOperationStatus, OperationPhase,
    CLUSTER_LABEL, ELIMINATE_SCORE_ANNOTATION,
};
use crate::config::ConfigProperty;

use super::store::ClusterStore;
use super::{StoreError, StoreResult};

pub(crate) fn store_error(msg: &str) -> StoreError {
    StoreError::Serialize(serde::de::Error::custom(msg))
}

pub(crate) fn operation(name: &str, cluster: &str, score: i64, created: i64) -> ClusterOperation {
    let mut op = ClusterOperation::new(
        name,
        ClusterOperationSpec {
            cluster: cluster.into(),
            action: "cluster.yml".into(),
            ..Default::default()
        },
    );
    op.labels_mut().insert(CLUSTER_LABEL.into(), cluster.into());
    op.annotations_mut()
        .insert(ELIMINATE_SCORE_ANNOTATION.into(), score.to_string());
    op.metadata.creation_timestamp = DateTime::from_timestamp(created, 0).map(Time);
    op
}

pub(crate) fn running(name: &str, cluster: &str, score: i64, created: i64) -> ClusterOperation {
    let mut op = operation(name, cluster, score, created);
    op.status = Some(ClusterOperationStatus {
        status: Some(OperationPhase::Running),
        start_time: op.metadata.creation_timestamp.clone(),
        end_time: None,
    });
    op
}

pub(crate) fn cluster(name: &str) -> Cluster {
    let mut cluster = Cluster::new(
        name,
        ClusterSpec {
            hosts_conf_ref: Some(ConfigMapRef {
                name: "hosts-a".into(),
                namespace: "kubean-system".into(),
            }),
            vars_conf_ref: Some(ConfigMapRef {
                name: "vars-a".into(),
                namespace: "kubean-system".into(),
            }),
            ..Default::default()
        },
    );
    cluster.metadata.uid = Some(format!("{name}-uid"));
    cluster
}

#[derive(Default)]
pub(crate) struct InMemoryStore {
    clusters: Mutex<BTreeMap<String, Cluster>>,
    operations: Mutex<BTreeMap<String, ClusterOperation>>,
    config: Mutex<ConfigProperty>,
    /// Referenced objects by `namespace/name`, with their owners
    references: Mutex<BTreeMap<String, Vec<OwnerReference>>>,
    failing_deletes: Mutex<BTreeSet<String>>,
    fail_list_operations: AtomicBool,
    fail_update: AtomicBool,
    delete_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

fn reference_key(reference: &ConfigReference) -> String {
    format!("{}/{}", reference.namespace(), reference.name())
}

impl InMemoryStore {
    pub(crate) fn insert_cluster(&self, cluster: Cluster) {
        self.clusters
            .lock()
            .unwrap()
            .insert(cluster.name_any(), cluster);
    }

    pub(crate) fn insert_operation(&self, operation: ClusterOperation) {
        self.operations
            .lock()
            .unwrap()
            .insert(operation.name_any(), operation);
    }

    pub(crate) fn insert_reference(&self, reference: &ConfigReference, owners: Vec<OwnerReference>) {
        self.references
            .lock()
            .unwrap()
            .insert(reference_key(reference), owners);
    }

    pub(crate) fn set_config(&self, config: ConfigProperty) {
        *self.config.lock().unwrap() = config;
    }

    pub(crate) fn stored_cluster(&self, name: &str) -> Option<Cluster> {
        self.clusters.lock().unwrap().get(name).cloned()
    }

    pub(crate) fn reference_owners(&self, reference: &ConfigReference) -> Option<Vec<OwnerReference>> {
        self.references
            .lock()
            .unwrap()
            .get(&reference_key(reference))
            .cloned()
    }

    /// Names of the operations bound to `cluster`, sorted
    pub(crate) fn operation_names(&self, cluster: &str) -> Vec<String> {
        self.operations
            .lock()
            .unwrap()
            .values()
            .filter(|op| op.cluster_name().as_deref() == Some(cluster))
            .map(|op| op.name_any())
            .collect()
    }

    pub(crate) fn fail_delete_of(&self, name: &str) {
        self.failing_deletes.lock().unwrap().insert(name.into());
    }

    pub(crate) fn fail_list_operations(&self, fail: bool) {
        self.fail_list_operations.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterStore for InMemoryStore {
    async fn get_cluster(&self, name: &str) -> StoreResult<Option<Cluster>> {
        Ok(self.stored_cluster(name))
    }

    async fn list_clusters(&self) -> StoreResult<Vec<Cluster>> {
        Ok(self.clusters.lock().unwrap().values().cloned().collect())
    }

    async fn list_operations(&self, cluster: &str) -> StoreResult<Vec<ClusterOperation>> {
        if self.fail_list_operations.load(Ordering::SeqCst) {
            return Err(store_error("this is error"));
        }
        Ok(self
            .operations
            .lock()
            .unwrap()
            .values()
            .filter(|op| op.cluster_name().as_deref() == Some(cluster))
            .cloned()
            .collect())
    }

    async fn delete_operation(&self, name: &str) -> StoreResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_deletes.lock().unwrap().contains(name) {
            return Err(store_error("delete refused"));
        }
        self.operations.lock().unwrap().remove(name);
        Ok(())
    }

    async fn update_cluster_status(&self, cluster: &Cluster) -> StoreResult<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(store_error("conflict"));
        }
        if let Some(stored) = self.clusters.lock().unwrap().get_mut(&cluster.name_any()) {
            stored.status = cluster.status.clone();
        }
        Ok(())
    }

    async fn adopt_reference(
        &self,
        reference: &ConfigReference,
        owner: &OwnerReference,
    ) -> StoreResult<bool> {
        if reference.is_empty() {
            return Ok(false);
        }
        let mut references = self.references.lock().unwrap();
        match references.get_mut(&reference_key(reference)) {
            Some(owners) if owners.is_empty() => {
                owners.push(owner.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fetch_config(&self) -> StoreResult<ConfigProperty> {
        Ok(self.config.lock().unwrap().clone())
    }
}
