use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Kube error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("Cluster operations list error: {0}")]
    List(#[source] StoreError),

    #[error("Cluster operation delete error after {deleted} deletions: {source}")]
    Delete {
        deleted: usize,
        #[source]
        source: StoreError,
    },
}

pub type CleanupResult<T> = std::result::Result<T, CleanupError>;

#[derive(Error, Debug)]
pub enum StatusSyncError {
    #[error("Cluster operations list error: {0}")]
    List(#[source] StoreError),

    #[error("Cluster status update error: {0}")]
    Update(#[source] StoreError),
}

pub type StatusSyncResult<T> = std::result::Result<T, StatusSyncError>;

pub mod cluster;
pub mod conditions;
pub mod controller;
pub mod retention;
pub mod store;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testing;
