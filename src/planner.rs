use crate::config::PlannerConfig;
use crate::models::{BrokerId, ReplicaStateView, TopicPartition};
use crate::proposal::ExecutionProposal;
use crate::strategy::{StrategyChain, StrategyContext, StrategyRegistry};
use crate::task::{ExecutionTask, TaskKind};
use crate::{PlannerError, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turns proposals into tasks and hands them out in safe, capacity-bounded
/// batches.
///
/// Task ids come from a counter owned by the planner. Within one proposal the
/// replica movement always receives its id before the leadership movement.
/// The counter survives [`clear`](Self::clear), so ids are never reused by the
/// same planner.
pub struct ExecutionTaskPlanner {
    next_execution_id: u64,
    leadership_queue: VecDeque<ExecutionTask>,
    replica_tasks: BTreeMap<u64, ExecutionTask>,
    pending_replica_partitions: HashMap<TopicPartition, u64>,
    pending_leadership_partitions: HashSet<TopicPartition>,
    under_replicated: HashSet<TopicPartition>,
    remaining_data_to_move_bytes: u64,
    strategy_chain: StrategyChain,
    leadership_batch_size: usize,
}

impl ExecutionTaskPlanner {
    pub fn new(strategy_chain: StrategyChain) -> Self {
        Self {
            next_execution_id: 0,
            leadership_queue: VecDeque::new(),
            replica_tasks: BTreeMap::new(),
            pending_replica_partitions: HashMap::new(),
            pending_leadership_partitions: HashSet::new(),
            under_replicated: HashSet::new(),
            remaining_data_to_move_bytes: 0,
            strategy_chain,
            leadership_batch_size: PlannerConfig::default().max_leadership_movements_per_batch,
        }
    }

    /// Build a planner from configuration, failing on any unresolvable strategy name
    pub fn from_config(config: &PlannerConfig, registry: &StrategyRegistry) -> Result<Self> {
        config.validate()?;
        let chain = registry.build_chain(config.replica_movement_strategies.as_slice())?;
        let mut planner = Self::new(chain);
        planner.leadership_batch_size = config.max_leadership_movements_per_batch;
        Ok(planner)
    }

    pub fn strategy_chain(&self) -> &StrategyChain {
        &self.strategy_chain
    }

    /// Decompose proposals into tasks and queue them.
    ///
    /// Either every proposal is accepted or none is: an invalid replica list,
    /// a partition appearing twice in `proposals`, a partition that still
    /// has a pending task, or a byte total that does not fit in a `u64`
    /// leaves the planner untouched.
    pub fn add_proposals<C>(&mut self, proposals: Vec<ExecutionProposal>, cluster: &C) -> Result<()>
    where
        C: ReplicaStateView + ?Sized,
    {
        let mut batch_partitions = HashSet::with_capacity(proposals.len());
        for proposal in &proposals {
            if let Err(e) = self.check_proposal(proposal, &mut batch_partitions) {
                warn!(error = %e, "rejecting proposal batch");
                return Err(e);
            }
        }

        let bytes = proposals
            .iter()
            .try_fold(0u64, |total, p| total.checked_add(p.bytes_to_move()));
        let remaining = bytes.and_then(|b| b.checked_add(self.remaining_data_to_move_bytes));
        let (bytes, remaining) = match (bytes, remaining) {
            (Some(bytes), Some(remaining)) => (bytes, remaining),
            _ => {
                let e = PlannerError::DataSizeOverflow;
                warn!(error = %e, "rejecting proposal batch");
                return Err(e);
            }
        };

        let mut replica_count = 0;
        let mut leadership_count = 0;

        for proposal in proposals {
            if proposal.is_no_op() {
                debug!(partition = %proposal.topic_partition, "skipping proposal with no movement");
                continue;
            }

            let proposal = Arc::new(proposal);
            let tp = proposal.topic_partition.clone();

            if proposal.has_replica_action() {
                let task = self.create_task(Arc::clone(&proposal), TaskKind::ReplicaMove);
                if cluster.is_under_replicated(&tp) {
                    self.under_replicated.insert(tp.clone());
                } else {
                    self.under_replicated.remove(&tp);
                }
                self.pending_replica_partitions.insert(tp.clone(), task.id);
                self.replica_tasks.insert(task.id, task);
                replica_count += 1;
            }

            if proposal.has_leader_action() {
                let task = self.create_task(proposal, TaskKind::LeadershipMove);
                self.pending_leadership_partitions.insert(tp);
                self.leadership_queue.push_back(task);
                leadership_count += 1;
            }
        }

        self.remaining_data_to_move_bytes = remaining;

        info!(
            replica_tasks = replica_count,
            leadership_tasks = leadership_count,
            bytes,
            "queued execution tasks"
        );
        Ok(())
    }

    fn check_proposal(
        &self,
        proposal: &ExecutionProposal,
        batch_partitions: &mut HashSet<TopicPartition>,
    ) -> Result<()> {
        proposal.validate()?;
        let tp = &proposal.topic_partition;
        if !batch_partitions.insert(tp.clone()) {
            return Err(PlannerError::DuplicatePartition(tp.clone()));
        }
        if !proposal.is_no_op()
            && (self.pending_replica_partitions.contains_key(tp)
                || self.pending_leadership_partitions.contains(tp))
        {
            return Err(PlannerError::PartitionAlreadyPending(tp.clone()));
        }
        Ok(())
    }

    fn create_task(&mut self, proposal: Arc<ExecutionProposal>, kind: TaskKind) -> ExecutionTask {
        let id = self.next_execution_id;
        self.next_execution_id += 1;
        ExecutionTask::new(id, proposal, kind)
    }

    /// Re-read replication health for partitions that still have a pending
    /// replica movement.
    pub fn refresh_replication_state<C>(&mut self, cluster: &C)
    where
        C: ReplicaStateView + ?Sized,
    {
        self.under_replicated = self
            .pending_replica_partitions
            .keys()
            .filter(|tp| cluster.is_under_replicated(tp))
            .cloned()
            .collect();
        debug!(
            under_replicated = self.under_replicated.len(),
            "refreshed replication state"
        );
    }

    /// Dequeue up to `max_count` leadership movements in submission order.
    ///
    /// A leadership movement whose replica movement sibling is still pending
    /// keeps its place in the queue and is skipped.
    pub fn get_leadership_movement_tasks(&mut self, max_count: usize) -> Vec<ExecutionTask> {
        let mut batch = Vec::with_capacity(max_count.min(self.leadership_queue.len()));
        let mut kept = VecDeque::with_capacity(self.leadership_queue.len());

        while let Some(task) = self.leadership_queue.pop_front() {
            let blocked = self.pending_replica_partitions.contains_key(task.topic_partition());
            if batch.len() < max_count && !blocked {
                self.pending_leadership_partitions.remove(task.topic_partition());
                batch.push(task);
            } else {
                kept.push_back(task);
            }
        }
        self.leadership_queue = kept;

        debug!(
            returned = batch.len(),
            remaining = self.leadership_queue.len(),
            "leadership movement batch"
        );
        batch
    }

    /// Dequeue a leadership batch of the configured size
    pub fn next_leadership_batch(&mut self) -> Vec<ExecutionTask> {
        self.get_leadership_movement_tasks(self.leadership_batch_size)
    }

    /// Admit as many replica movements as broker capacity allows.
    ///
    /// `ready_brokers` is the number of additional movements each broker may
    /// take part in right now; brokers missing from the map have none.
    /// Tasks on `in_flight` partitions are never admitted. Eligible tasks are
    /// ranked by the strategy chain and admitted greedily, each admission
    /// consuming one unit of capacity on every broker the task touches.
    pub fn get_replica_movement_tasks(
        &mut self,
        ready_brokers: &HashMap<BrokerId, usize>,
        in_flight: &HashSet<TopicPartition>,
    ) -> Vec<ExecutionTask> {
        for tp in in_flight {
            if self.pending_replica_partitions.contains_key(tp) {
                warn!(partition = %tp, "executor reports a pending partition as in flight");
            }
        }

        let admitted: Vec<u64> = {
            let ctx = StrategyContext::new(&self.under_replicated);
            let mut candidates: Vec<&ExecutionTask> = self
                .replica_tasks
                .values()
                .filter(|t| !in_flight.contains(t.topic_partition()))
                .filter(|t| has_capacity(ready_brokers, &t.brokers()))
                .collect();
            self.strategy_chain.rank(&mut candidates, &ctx);

            let mut capacity = ready_brokers.clone();
            let mut claimed: HashSet<&TopicPartition> = HashSet::new();
            let mut admitted = Vec::new();

            for task in candidates {
                let brokers = task.brokers();
                if claimed.contains(task.topic_partition()) || !has_capacity(&capacity, &brokers) {
                    continue;
                }
                for broker in &brokers {
                    if let Some(slots) = capacity.get_mut(broker) {
                        *slots -= 1;
                    }
                }
                claimed.insert(task.topic_partition());
                admitted.push(task.id);
            }
            admitted
        };

        let tasks: Vec<ExecutionTask> = admitted
            .into_iter()
            .filter_map(|id| self.take_replica_task(id))
            .collect();

        debug!(
            admitted = tasks.len(),
            remaining = self.replica_tasks.len(),
            remaining_bytes = self.remaining_data_to_move_bytes,
            "replica movement batch"
        );
        tasks
    }

    fn take_replica_task(&mut self, id: u64) -> Option<ExecutionTask> {
        let task = self.replica_tasks.remove(&id)?;
        let tp = task.topic_partition();
        self.pending_replica_partitions.remove(tp);
        self.under_replicated.remove(tp);
        self.remaining_data_to_move_bytes = self
            .remaining_data_to_move_bytes
            .saturating_sub(task.data_to_move_bytes());
        Some(task)
    }

    pub fn remaining_data_to_move_bytes(&self) -> u64 {
        self.remaining_data_to_move_bytes
    }

    /// Pending leadership movements in queue order
    pub fn remaining_leadership_movements(&self) -> Vec<&ExecutionTask> {
        self.leadership_queue.iter().collect()
    }

    /// Pending replica movements in id order
    pub fn remaining_replica_movements(&self) -> Vec<&ExecutionTask> {
        self.replica_tasks.values().collect()
    }

    /// Drop all pending work. Ids handed out later keep increasing.
    pub fn clear(&mut self) {
        let dropped = self.leadership_queue.len() + self.replica_tasks.len();
        self.leadership_queue.clear();
        self.replica_tasks.clear();
        self.pending_replica_partitions.clear();
        self.pending_leadership_partitions.clear();
        self.under_replicated.clear();
        self.remaining_data_to_move_bytes = 0;
        info!(dropped, "cleared pending execution tasks");
    }
}

/// Every broker has at least one free movement slot
fn has_capacity(capacity: &HashMap<BrokerId, usize>, brokers: &[BrokerId]) -> bool {
    brokers
        .iter()
        .all(|b| capacity.get(b).copied().unwrap_or(0) > 0)
}

impl Default for ExecutionTaskPlanner {
    fn default() -> Self {
        Self::new(StrategyChain::default())
    }
}

/// Planner behind a single lock, for hosts that drive it from several threads
#[derive(Clone)]
pub struct SharedTaskPlanner {
    inner: Arc<Mutex<ExecutionTaskPlanner>>,
}

impl SharedTaskPlanner {
    pub fn new(planner: ExecutionTaskPlanner) -> Self {
        Self {
            inner: Arc::new(Mutex::new(planner)),
        }
    }

    pub fn add_proposals<C>(&self, proposals: Vec<ExecutionProposal>, cluster: &C) -> Result<()>
    where
        C: ReplicaStateView + ?Sized,
    {
        self.inner.lock().add_proposals(proposals, cluster)
    }

    pub fn refresh_replication_state<C>(&self, cluster: &C)
    where
        C: ReplicaStateView + ?Sized,
    {
        self.inner.lock().refresh_replication_state(cluster)
    }

    pub fn get_leadership_movement_tasks(&self, max_count: usize) -> Vec<ExecutionTask> {
        self.inner.lock().get_leadership_movement_tasks(max_count)
    }

    pub fn next_leadership_batch(&self) -> Vec<ExecutionTask> {
        self.inner.lock().next_leadership_batch()
    }

    pub fn get_replica_movement_tasks(
        &self,
        ready_brokers: &HashMap<BrokerId, usize>,
        in_flight: &HashSet<TopicPartition>,
    ) -> Vec<ExecutionTask> {
        self.inner
            .lock()
            .get_replica_movement_tasks(ready_brokers, in_flight)
    }

    pub fn remaining_data_to_move_bytes(&self) -> u64 {
        self.inner.lock().remaining_data_to_move_bytes()
    }

    pub fn remaining_leadership_movements(&self) -> usize {
        self.inner.lock().leadership_queue.len()
    }

    pub fn remaining_replica_movements(&self) -> usize {
        self.inner.lock().replica_tasks.len()
    }

    pub fn clear(&self) {
        self.inner.lock().clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClusterModel, PartitionState};
    use crate::strategy::ReplicaMovementStrategy;

    fn proposal(partition: u32, bytes: u64, old: Vec<BrokerId>, new: Vec<BrokerId>) -> ExecutionProposal {
        ExecutionProposal::new(TopicPartition::new("metrics", partition), bytes, old, new)
    }

    fn unlimited(brokers: &[BrokerId]) -> HashMap<BrokerId, usize> {
        brokers.iter().map(|b| (*b, usize::MAX)).collect()
    }

    #[test]
    fn test_replica_move_with_leader_change_gets_two_ids() {
        let mut planner = ExecutionTaskPlanner::default();
        planner
            .add_proposals(vec![proposal(0, 8, vec![0, 2], vec![2, 1])], &ClusterModel::new())
            .unwrap();

        let replica = planner.remaining_replica_movements();
        let leadership = planner.remaining_leadership_movements();
        assert_eq!(replica.len(), 1);
        assert_eq!(leadership.len(), 1);
        assert_eq!(replica[0].id, 0);
        assert_eq!(leadership[0].id, 1);
        assert_eq!(planner.remaining_data_to_move_bytes(), 8);
    }

    #[test]
    fn test_leadership_gated_by_pending_sibling() {
        let mut planner = ExecutionTaskPlanner::default();
        planner
            .add_proposals(
                vec![
                    proposal(0, 8, vec![0, 2], vec![2, 1]),
                    proposal(1, 0, vec![1, 0], vec![0, 1]),
                ],
                &ClusterModel::new(),
            )
            .unwrap();

        // Partition 0's leadership move waits for its replica move
        let batch = planner.get_leadership_movement_tasks(10);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].topic_partition().partition, 1);

        let moved = planner.get_replica_movement_tasks(&unlimited(&[0, 1, 2]), &HashSet::new());
        assert_eq!(moved.len(), 1);

        let batch = planner.get_leadership_movement_tasks(10);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].topic_partition().partition, 0);
        assert!(planner.remaining_leadership_movements().is_empty());
    }

    #[test]
    fn test_rejected_batch_leaves_state_untouched() {
        let mut planner = ExecutionTaskPlanner::default();
        let err = planner
            .add_proposals(
                vec![
                    proposal(0, 8, vec![0, 2], vec![2, 1]),
                    proposal(1, 4, vec![1], vec![]),
                ],
                &ClusterModel::new(),
            )
            .unwrap_err();
        assert!(matches!(err, PlannerError::EmptyReplicaList { .. }));
        assert!(planner.remaining_replica_movements().is_empty());
        assert!(planner.remaining_leadership_movements().is_empty());
        assert_eq!(planner.remaining_data_to_move_bytes(), 0);

        // No id was consumed by the rejected batch
        planner
            .add_proposals(vec![proposal(0, 8, vec![0, 2], vec![2, 1])], &ClusterModel::new())
            .unwrap();
        assert_eq!(planner.remaining_replica_movements()[0].id, 0);
    }

    #[test]
    fn test_pending_partition_cannot_be_resubmitted() {
        let mut planner = ExecutionTaskPlanner::default();
        planner
            .add_proposals(vec![proposal(0, 8, vec![0, 2], vec![2, 1])], &ClusterModel::new())
            .unwrap();
        let err = planner
            .add_proposals(vec![proposal(0, 8, vec![2, 1], vec![1, 3])], &ClusterModel::new())
            .unwrap_err();
        assert!(matches!(err, PlannerError::PartitionAlreadyPending(_)));
    }

    #[test]
    fn test_byte_overflow_rejects_whole_batch() {
        let shared = SharedTaskPlanner::new(ExecutionTaskPlanner::default());
        let err = shared
            .add_proposals(
                vec![
                    proposal(0, u64::MAX, vec![0, 1], vec![1, 2]),
                    proposal(1, 1, vec![0, 1], vec![1, 2]),
                ],
                &ClusterModel::new(),
            )
            .unwrap_err();
        assert!(matches!(err, PlannerError::DataSizeOverflow));
        assert_eq!(shared.remaining_replica_movements(), 0);
        assert_eq!(shared.remaining_leadership_movements(), 0);
        assert_eq!(shared.remaining_data_to_move_bytes(), 0);
    }

    #[test]
    fn test_byte_overflow_against_pending_total() {
        let mut planner = ExecutionTaskPlanner::default();
        planner
            .add_proposals(vec![proposal(0, u64::MAX - 1, vec![0, 1], vec![1, 2])], &ClusterModel::new())
            .unwrap();
        let err = planner
            .add_proposals(vec![proposal(1, 2, vec![0, 1], vec![1, 2])], &ClusterModel::new())
            .unwrap_err();
        assert!(matches!(err, PlannerError::DataSizeOverflow));
        assert_eq!(planner.remaining_replica_movements().len(), 1);
        assert_eq!(planner.remaining_data_to_move_bytes(), u64::MAX - 1);

        // Leadership-only proposals carry no bytes and still fit
        planner
            .add_proposals(vec![proposal(2, u64::MAX, vec![1, 0], vec![0, 1])], &ClusterModel::new())
            .unwrap();
        assert_eq!(planner.remaining_data_to_move_bytes(), u64::MAX - 1);
    }

    #[test]
    fn test_pending_leadership_partition_cannot_be_resubmitted() {
        let mut planner = ExecutionTaskPlanner::default();
        planner
            .add_proposals(vec![proposal(0, 0, vec![1, 0], vec![0, 1])], &ClusterModel::new())
            .unwrap();
        let err = planner
            .add_proposals(vec![proposal(0, 0, vec![1, 0], vec![0, 1])], &ClusterModel::new())
            .unwrap_err();
        assert!(matches!(err, PlannerError::PartitionAlreadyPending(tp) if tp.partition == 0));
        assert_eq!(planner.remaining_leadership_movements().len(), 1);

        // Accepted again once the pending task has been handed out
        assert_eq!(planner.get_leadership_movement_tasks(1).len(), 1);
        planner
            .add_proposals(vec![proposal(0, 0, vec![0, 1], vec![1, 0])], &ClusterModel::new())
            .unwrap();
        assert_eq!(planner.remaining_leadership_movements().len(), 1);
    }

    #[test]
    fn test_zero_leadership_batch_is_empty() {
        let mut planner = ExecutionTaskPlanner::default();
        planner
            .add_proposals(vec![proposal(0, 0, vec![1, 0], vec![0, 1])], &ClusterModel::new())
            .unwrap();
        assert!(planner.get_leadership_movement_tasks(0).is_empty());
        assert_eq!(planner.remaining_leadership_movements().len(), 1);
    }

    #[test]
    fn test_refresh_replication_state_reorders() {
        let chain = StrategyChain::new(vec![ReplicaMovementStrategy::PostponeUnderReplicated]);
        let mut planner = ExecutionTaskPlanner::new(chain);
        let mut cluster = ClusterModel::new();
        cluster.add_partition(
            TopicPartition::new("metrics", 0),
            PartitionState::fully_in_sync(vec![0, 1]),
        );
        cluster.add_partition(
            TopicPartition::new("metrics", 1),
            PartitionState::fully_in_sync(vec![2, 3]),
        );
        planner
            .add_proposals(
                vec![
                    proposal(0, 1, vec![0, 1], vec![0, 4]),
                    proposal(1, 1, vec![2, 3], vec![2, 5]),
                ],
                &cluster,
            )
            .unwrap();

        // Partition 0 falls out of sync before the next tick
        cluster.add_partition(
            TopicPartition::new("metrics", 0),
            PartitionState {
                replicas: vec![0, 1],
                in_sync_replicas: vec![0],
                leader: Some(0),
            },
        );
        planner.refresh_replication_state(&cluster);

        let tasks = planner.get_replica_movement_tasks(&unlimited(&[0, 1, 2, 3, 4, 5]), &HashSet::new());
        let partitions: Vec<u32> = tasks.iter().map(|t| t.topic_partition().partition).collect();
        assert_eq!(partitions, vec![1, 0]);
    }

    #[test]
    fn test_from_config_fails_fast() {
        let config = PlannerConfig::default().with_strategies(["prioritize-large", "nope"]);
        let result = ExecutionTaskPlanner::from_config(&config, &StrategyRegistry::new());
        assert!(matches!(result, Err(PlannerError::UnknownStrategy(_))));
    }

    #[test]
    fn test_next_leadership_batch_uses_configured_size() {
        let config = PlannerConfig::default().with_leadership_batch_size(2);
        let mut planner = ExecutionTaskPlanner::from_config(&config, &StrategyRegistry::new()).unwrap();
        let proposals = (0..5).map(|p| proposal(p, 0, vec![1, 0], vec![0, 1])).collect();
        planner.add_proposals(proposals, &ClusterModel::new()).unwrap();

        assert_eq!(planner.next_leadership_batch().len(), 2);
        assert_eq!(planner.next_leadership_batch().len(), 2);
        assert_eq!(planner.next_leadership_batch().len(), 1);
        assert!(planner.next_leadership_batch().is_empty());
    }

    #[test]
    fn test_shared_planner_across_threads() {
        let shared = SharedTaskPlanner::new(ExecutionTaskPlanner::default());
        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let planner = shared.clone();
                std::thread::spawn(move || {
                    let proposals = (0..10)
                        .map(|p| proposal(t * 10 + p, 1, vec![0, 1], vec![1, 2]))
                        .collect();
                    planner.add_proposals(proposals, &ClusterModel::new()).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(shared.remaining_replica_movements(), 40);
        assert_eq!(shared.remaining_leadership_movements(), 40);
        assert_eq!(shared.remaining_data_to_move_bytes(), 40);
        shared.clear();
        assert_eq!(shared.remaining_replica_movements(), 0);
    }
}
