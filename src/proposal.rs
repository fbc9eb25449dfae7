use crate::models::*;
use crate::{PlannerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// A proposed relocation of one partition, produced by the optimizer.
///
/// Replica lists are ordered and the first broker is the leader. A proposal
/// whose old and new lists hold the same brokers in a different order only
/// moves leadership; any change to the broker set is a replica movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionProposal {
    pub topic_partition: TopicPartition,
    pub data_to_move_bytes: u64,
    pub old_replicas: Vec<BrokerId>,
    pub new_replicas: Vec<BrokerId>,
}

impl ExecutionProposal {
    pub fn new(
        topic_partition: TopicPartition,
        data_to_move_bytes: u64,
        old_replicas: Vec<BrokerId>,
        new_replicas: Vec<BrokerId>,
    ) -> Self {
        Self {
            topic_partition,
            data_to_move_bytes,
            old_replicas,
            new_replicas,
        }
    }

    pub fn old_leader(&self) -> Option<BrokerId> {
        self.old_replicas.first().copied()
    }

    pub fn new_leader(&self) -> Option<BrokerId> {
        self.new_replicas.first().copied()
    }

    /// Brokers that will receive a new copy of the partition
    pub fn replicas_to_add(&self) -> Vec<BrokerId> {
        self.new_replicas
            .iter()
            .filter(|b| !self.old_replicas.contains(b))
            .copied()
            .collect()
    }

    /// Brokers that will drop their copy of the partition
    pub fn replicas_to_remove(&self) -> Vec<BrokerId> {
        self.old_replicas
            .iter()
            .filter(|b| !self.new_replicas.contains(b))
            .copied()
            .collect()
    }

    /// The broker set changes, so data has to be copied
    pub fn has_replica_action(&self) -> bool {
        let old: HashSet<_> = self.old_replicas.iter().collect();
        let new: HashSet<_> = self.new_replicas.iter().collect();
        old != new
    }

    pub fn has_leader_action(&self) -> bool {
        self.old_leader() != self.new_leader()
    }

    /// Neither the broker set nor the leader changes
    pub fn is_no_op(&self) -> bool {
        !self.has_replica_action() && !self.has_leader_action()
    }

    /// Bytes a replica movement for this proposal transfers; zero for pure
    /// leadership changes.
    pub fn bytes_to_move(&self) -> u64 {
        if self.has_replica_action() {
            self.data_to_move_bytes
        } else {
            0
        }
    }

    /// Sources and destinations of the movement, ascending and deduplicated
    pub fn involved_brokers(&self) -> Vec<BrokerId> {
        self.old_replicas
            .iter()
            .chain(self.new_replicas.iter())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Reject empty replica lists and lists naming a broker twice
    pub fn validate(&self) -> Result<()> {
        for replicas in [&self.old_replicas, &self.new_replicas] {
            if replicas.is_empty() {
                return Err(PlannerError::EmptyReplicaList {
                    partition: self.topic_partition.clone(),
                });
            }
            let mut seen = HashSet::with_capacity(replicas.len());
            for broker in replicas {
                if !seen.insert(*broker) {
                    return Err(PlannerError::DuplicateReplica {
                        partition: self.topic_partition.clone(),
                        broker: *broker,
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for ExecutionProposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:?} -> {:?} ({} bytes)",
            self.topic_partition, self.old_replicas, self.new_replicas, self.bytes_to_move()
        )
    }
}
