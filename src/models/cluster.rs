use std::collections::HashMap;
use super::{BrokerId, Broker, TopicPartition, PartitionState};

/// Read-only view of replica placement consumed by the planner.
///
/// The planner only ever asks for the assigned and in-sync replicas of a
/// partition, and never holds on to the view past the call it was passed to.
pub trait ReplicaStateView {
    /// Assigned replicas of the partition, leader first
    fn replicas(&self, tp: &TopicPartition) -> Option<&[BrokerId]>;

    /// Replicas currently in the ISR of the partition
    fn in_sync_replicas(&self, tp: &TopicPartition) -> Option<&[BrokerId]>;

    /// Fewer in-sync replicas than assigned ones. Unknown partitions count as healthy.
    fn is_under_replicated(&self, tp: &TopicPartition) -> bool {
        match (self.replicas(tp), self.in_sync_replicas(tp)) {
            (Some(assigned), Some(isr)) => isr.len() < assigned.len(),
            _ => false,
        }
    }
}

/// Snapshot of the Kafka cluster topology relevant to task planning
#[derive(Debug, Clone, Default)]
pub struct ClusterModel {
    pub brokers: HashMap<BrokerId, Broker>,
    pub partitions: HashMap<TopicPartition, PartitionState>,
}

impl ClusterModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_broker(&mut self, broker: Broker) {
        self.brokers.insert(broker.id, broker);
    }

    pub fn alive_brokers(&self) -> impl Iterator<Item = &Broker> {
        self.brokers.values().filter(|b| b.is_alive)
    }

    pub fn add_partition(&mut self, tp: TopicPartition, state: PartitionState) {
        self.partitions.insert(tp, state);
    }

    /// Build a per-broker movement budget: every alive broker may take part in
    /// `per_broker` concurrent replica movements, dead brokers in none.
    pub fn ready_brokers(&self, per_broker: usize) -> HashMap<BrokerId, usize> {
        self.alive_brokers().map(|b| (b.id, per_broker)).collect()
    }
}

impl ReplicaStateView for ClusterModel {
    fn replicas(&self, tp: &TopicPartition) -> Option<&[BrokerId]> {
        self.partitions.get(tp).map(|p| p.replicas.as_slice())
    }

    fn in_sync_replicas(&self, tp: &TopicPartition) -> Option<&[BrokerId]> {
        self.partitions.get(tp).map(|p| p.in_sync_replicas.as_slice())
    }

    fn is_under_replicated(&self, tp: &TopicPartition) -> bool {
        self.partitions
            .get(tp)
            .map_or(false, PartitionState::is_under_replicated)
    }
}
