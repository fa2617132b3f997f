use std::cmp::Ordering;

use kube::ResourceExt;
use tracing::{debug, info, warn};

use crate::api::cluster_operation::{ClusterOperation, ELIMINATE_SCORE_ANNOTATION};

use super::store::ClusterStore;
use super::{CleanupError, CleanupResult};

/// Score of operations without a parsable elimination score annotation
pub const DEFAULT_ELIMINATE_SCORE: i64 = 0;

/// Elimination score of an operation. Lower scores are kept longer.
pub fn elimination_score(operation: &ClusterOperation) -> i64 {
    operation
        .annotations()
        .get(ELIMINATE_SCORE_ANNOTATION)
        .and_then(|score| score.trim().parse().ok())
        .unwrap_or(DEFAULT_ELIMINATE_SCORE)
}

/// Total order used for retention: lowest score first, then newest first,
/// then by name. Operations without a creation timestamp sort as the oldest.
pub fn retention_order(a: &ClusterOperation, b: &ClusterOperation) -> Ordering {
    elimination_score(a)
        .cmp(&elimination_score(b))
        .then_with(|| {
            b.metadata
                .creation_timestamp
                .cmp(&a.metadata.creation_timestamp)
        })
        .then_with(|| a.name_any().cmp(&b.name_any()))
}

pub fn sort_for_retention(operations: &mut [ClusterOperation]) {
    operations.sort_by(retention_order);
}

/// Partition of the operations of one cluster.
#[derive(Debug, Default)]
pub struct RetentionPlan {
    /// Running operations, never deleted and not counted against the limit
    pub protected: Vec<ClusterOperation>,
    /// The `keep` best ranked finished operations, in retention order
    pub retained: Vec<ClusterOperation>,
    /// Everything ranked after `retained`
    pub excess: Vec<ClusterOperation>,
}

impl RetentionPlan {
    pub fn has_excess(&self) -> bool {
        !self.excess.is_empty()
    }
}

pub fn plan_retention(operations: Vec<ClusterOperation>, keep: usize) -> RetentionPlan {
    let (protected, mut candidates): (Vec<_>, Vec<_>) =
        operations.into_iter().partition(ClusterOperation::is_running);

    sort_for_retention(&mut candidates);
    let excess = candidates.split_off(keep.min(candidates.len()));

    RetentionPlan {
        protected,
        retained: candidates,
        excess,
    }
}

/// Delete the operations of `cluster` ranked beyond `keep`.
///
/// Returns the number of deleted operations, zero when there was no excess.
/// Every excess operation is attempted even when an earlier delete fails; the
/// first failure is returned along with the number of operations deleted.
pub async fn clean_excess_operations(
    store: &dyn ClusterStore,
    cluster: &str,
    keep: usize,
) -> CleanupResult<usize> {
    let operations = store
        .list_operations(cluster)
        .await
        .map_err(CleanupError::List)?;

    let plan = plan_retention(operations, keep);
    if !plan.has_excess() {
        debug!(
            retained = plan.retained.len(),
            running = plan.protected.len(),
            "No excess cluster operations"
        );
        return Ok(0);
    }

    let mut deleted = 0;
    let mut first_error = None;
    for operation in &plan.excess {
        let name = operation.name_any();
        match store.delete_operation(&name).await {
            Ok(()) => deleted += 1,
            Err(e) => {
                warn!(operation = %name, "Failed to delete cluster operation: {e}");
                first_error.get_or_insert(e);
            }
        }
    }

    info!(
        deleted,
        excess = plan.excess.len(),
        keep,
        "Cleaned excess cluster operations"
    );

    match first_error {
        Some(source) => Err(CleanupError::Delete { deleted, source }),
        None => Ok(deleted),
    }
}
