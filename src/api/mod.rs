pub mod cluster;
pub mod cluster_operation;
