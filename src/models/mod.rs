// Type aliases used across models
pub type BrokerId = u32;
pub type TopicName = String;
pub type PartitionId = u32;

// Module declarations
mod broker;
mod topic;
mod cluster;

// Re-exports
pub use broker::Broker;
pub use topic::{TopicPartition, PartitionState};
pub use cluster::{ClusterModel, ReplicaStateView};
