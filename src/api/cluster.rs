use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::cluster_operation::OperationPhase;

/// Cluster describes the hosts and variables used to provision a kubernetes
/// cluster. The controller only reads the spec references; the status is owned
/// by the controller.
#[derive(CustomResource, Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[kube(
    kind = "Cluster",
    group = "kubean.io",
    version = "v1alpha1",
    status = "ClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Inventory of the cluster hosts
    pub hosts_conf_ref: Option<ConfigMapRef>,
    /// Ansible variables applied to every operation
    pub vars_conf_ref: Option<ConfigMapRef>,
    /// Credentials used to reach the hosts
    pub ssh_auth_ref: Option<SecretRef>,
    pub pre_check_ref: Option<ConfigMapRef>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, Eq, JsonSchema)]
pub struct ConfigMapRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, Eq, JsonSchema)]
pub struct SecretRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

/// A namespaced object referenced from the cluster spec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigReference {
    ConfigMap { name: String, namespace: String },
    Secret { name: String, namespace: String },
}

impl ConfigReference {
    pub fn name(&self) -> &str {
        match self {
            Self::ConfigMap { name, .. } | Self::Secret { name, .. } => name,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Self::ConfigMap { namespace, .. } | Self::Secret { namespace, .. } => namespace,
        }
    }

    /// References with an empty name or namespace point nowhere.
    pub fn is_empty(&self) -> bool {
        self.name().is_empty() || self.namespace().is_empty()
    }
}

impl From<&ConfigMapRef> for ConfigReference {
    fn from(r: &ConfigMapRef) -> Self {
        Self::ConfigMap {
            name: r.name.clone(),
            namespace: r.namespace.clone(),
        }
    }
}

impl From<&SecretRef> for ConfigReference {
    fn from(r: &SecretRef) -> Self {
        Self::Secret {
            name: r.name.clone(),
            namespace: r.namespace.clone(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
pub struct ClusterStatus {
    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,
}

/// Outcome of a single ClusterOperation as seen from its cluster.
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    /// Name of the ClusterOperation this condition reports
    pub cluster_ops: String,
    #[serde(
        default,
        deserialize_with = "crate::api::cluster_operation::empty_phase_as_none"
    )]
    pub status: Option<OperationPhase>,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
}

impl Cluster {
    pub fn conditions(&self) -> &[ClusterCondition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    /// All ConfigMaps and Secrets referenced by the spec, in declaration order.
    pub fn config_references(&self) -> Vec<ConfigReference> {
        let config_maps = [
            &self.spec.hosts_conf_ref,
            &self.spec.vars_conf_ref,
            &self.spec.pre_check_ref,
        ]
        .into_iter()
        .flatten()
        .map(ConfigReference::from);

        config_maps
            .chain(self.spec.ssh_auth_ref.iter().map(ConfigReference::from))
            .collect()
    }
}
