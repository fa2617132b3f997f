use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::de::IntoDeserializer;
use serde::{Deserialize, Deserializer, Serialize};

/// Label binding a ClusterOperation to the Cluster it runs against
pub static CLUSTER_LABEL: &str = "clusterName";

/// Annotation carrying the elimination score of a ClusterOperation
pub static ELIMINATE_SCORE_ANNOTATION: &str = "kubean.io/eliminate-score";

/// A single run of an action against a Cluster.
#[derive(CustomResource, Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[kube(
    kind = "ClusterOperation",
    group = "kubean.io",
    version = "v1alpha1",
    status = "ClusterOperationStatus",
    shortname = "clusterops"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOperationSpec {
    /// Name of the target Cluster
    pub cluster: String,
    #[serde(default)]
    pub action_type: ActionType,
    #[serde(default)]
    pub action: String,
    pub image: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Default, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    #[default]
    Playbook,
    Shell,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
pub enum OperationPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Blocked,
    /// Any phase not known to this controller
    #[serde(other)]
    Unknown,
}

/// Reads a phase where an empty string means no phase has been set yet.
pub(crate) fn empty_phase_as_none<'de, D>(deserializer: D) -> Result<Option<OperationPhase>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(phase) if phase.is_empty() => Ok(None),
        Some(phase) => OperationPhase::deserialize(phase.into_deserializer()).map(Some),
    }
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOperationStatus {
    #[serde(default, deserialize_with = "empty_phase_as_none")]
    pub status: Option<OperationPhase>,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
}

impl ClusterOperation {
    /// Name of the Cluster this operation is bound to through its label.
    pub fn cluster_name(&self) -> Option<String> {
        self.labels().get(CLUSTER_LABEL).cloned()
    }

    pub fn phase(&self) -> Option<OperationPhase> {
        self.status.as_ref()?.status
    }

    pub fn is_running(&self) -> bool {
        self.phase() == Some(OperationPhase::Running)
    }
}
