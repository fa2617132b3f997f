use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::api::cluster::{Cluster, ConfigReference};
use crate::api::cluster_operation::{ClusterOperation, CLUSTER_LABEL};
use crate::config::{ConfigProperty, CONFIG_MAP_NAME};

use super::StoreResult;

/// Access to the object store holding clusters and their operations.
///
/// Not-found is never an error here: lookups return `None` and deletes of
/// missing objects succeed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get_cluster(&self, name: &str) -> StoreResult<Option<Cluster>>;

    async fn list_clusters(&self) -> StoreResult<Vec<Cluster>>;

    /// Operations bound to the cluster through the cluster label.
    async fn list_operations(&self, cluster: &str) -> StoreResult<Vec<ClusterOperation>>;

    async fn delete_operation(&self, name: &str) -> StoreResult<()>;

    async fn update_cluster_status(&self, cluster: &Cluster) -> StoreResult<()>;

    /// Set `owner` on the referenced object unless it already has owners.
    /// Returns whether the object was changed.
    async fn adopt_reference(
        &self,
        reference: &ConfigReference,
        owner: &OwnerReference,
    ) -> StoreResult<bool>;

    async fn fetch_config(&self) -> StoreResult<ConfigProperty>;
}

/// Store backed by the kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    /// Namespace holding the controller configuration
    namespace: String,
}

impl KubeStore {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_cluster(&self, name: &str) -> StoreResult<Option<Cluster>> {
        Ok(Api::<Cluster>::all(self.client.clone()).get_opt(name).await?)
    }

    async fn list_clusters(&self) -> StoreResult<Vec<Cluster>> {
        let clusters = Api::<Cluster>::all(self.client.clone())
            .list(&ListParams::default())
            .await?;
        Ok(clusters.items)
    }

    async fn list_operations(&self, cluster: &str) -> StoreResult<Vec<ClusterOperation>> {
        let lp = ListParams::default().labels(&format!("{CLUSTER_LABEL}={cluster}"));
        let operations = Api::<ClusterOperation>::all(self.client.clone())
            .list(&lp)
            .await?;
        Ok(operations.items)
    }

    async fn delete_operation(&self, name: &str) -> StoreResult<()> {
        let api = Api::<ClusterOperation>::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                debug!(name, "Cluster operation already deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_cluster_status(&self, cluster: &Cluster) -> StoreResult<()> {
        let api = Api::<Cluster>::all(self.client.clone());
        let patch = json!({ "status": cluster.status });
        api.patch_status(
            &cluster.name_any(),
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await?;
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

        match reference {
            ConfigReference::ConfigMap { name, namespace } => {
                adopt(Api::<ConfigMap>::namespaced(self.client.clone(), namespace), name, owner)
                    .await
            }
            ConfigReference::Secret { name, namespace } => {
                adopt(Api::<Secret>::namespaced(self.client.clone(), namespace), name, owner).await
            }
        }
    }

    async fn fetch_config(&self) -> StoreResult<ConfigProperty> {
        let api = Api::<ConfigMap>::namespaced(self.client.clone(), &self.namespace);
        Ok(api
            .get_opt(CONFIG_MAP_NAME)
            .await?
            .and_then(|cm| cm.data)
            .map(|data| ConfigProperty::from_data(&data))
            .unwrap_or_default())
    }
}

async fn adopt<K>(api: Api<K>, name: &str, owner: &OwnerReference) -> StoreResult<bool>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    let Some(meta) = api.get_metadata_opt(name).await? else {
        return Ok(false);
    };

    if !meta.owner_references().is_empty() {
        return Ok(false);
    }

    let patch = json!({ "metadata": { "ownerReferences": [owner] } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;

    debug!(name, "Adopted cluster reference");
    Ok(true)
}
