use crate::api::cluster::ClusterCondition;
use crate::api::cluster_operation::ClusterOperation;

use kube::ResourceExt;

/// Two conditions are equal when they report the same operation with the same
/// status and the same start and end times. An unset time only matches an
/// unset time.
pub fn conditions_equal(a: &ClusterCondition, b: &ClusterCondition) -> bool {
    a.cluster_ops == b.cluster_ops
        && a.status == b.status
        && a.start_time == b.start_time
        && a.end_time == b.end_time
}

/// Order-sensitive comparison: reordering the same conditions is a change.
pub fn condition_sequences_equal(a: &[ClusterCondition], b: &[ClusterCondition]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| conditions_equal(a, b))
}

/// The condition an operation contributes to its cluster status.
pub fn condition_for(operation: &ClusterOperation) -> ClusterCondition {
    let status = operation.status.clone().unwrap_or_default();
    ClusterCondition {
        cluster_ops: operation.name_any(),
        status: status.status,
        start_time: status.start_time,
        end_time: status.end_time,
    }
}

/// One condition per operation, keyed by operation name.
///
/// Conditions keep the position of the first operation seen for a key, a later
/// operation with the same key overwrites the value.
pub fn aggregate_conditions<'a>(
    operations: impl IntoIterator<Item = &'a ClusterOperation>,
) -> Vec<ClusterCondition> {
    let mut conditions: Vec<ClusterCondition> = Vec::new();
    for condition in operations.into_iter().map(condition_for) {
        match conditions
            .iter_mut()
            .find(|c| c.cluster_ops == condition.cluster_ops)
        {
            Some(existing) => *existing = condition,
            None => conditions.push(condition),
        }
    }
    conditions
}
