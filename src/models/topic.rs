use serde::{Deserialize, Serialize};
use std::fmt;
use super::{TopicName, PartitionId, BrokerId};

/// Identifies a partition: topic name plus partition number
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: TopicName,
    pub partition: PartitionId,
}

impl TopicPartition {
    pub fn new(topic: impl Into<TopicName>, partition: PartitionId) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// Replica placement and ISR membership of one partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionState {
    pub replicas: Vec<BrokerId>,
    pub in_sync_replicas: Vec<BrokerId>,
    pub leader: Option<BrokerId>,
}

impl PartitionState {
    /// A partition whose assigned replicas are all in sync, led by the first one
    pub fn fully_in_sync(replicas: Vec<BrokerId>) -> Self {
        Self {
            leader: replicas.first().copied(),
            in_sync_replicas: replicas.clone(),
            replicas,
        }
    }

    pub fn is_under_replicated(&self) -> bool {
        self.in_sync_replicas.len() < self.replicas.len()
    }
}
