use crate::models::{BrokerId, TopicPartition};
use crate::proposal::ExecutionProposal;
use crate::{PlannerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What a task asks the executor to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// Elect a different leader within an unchanged replica set
    LeadershipMove,
    /// Change the set of brokers hosting the partition
    ReplicaMove,
}

/// Lifecycle of a task. The planner only ever holds `Pending` tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    InProgress,
    Completed,
    Aborted,
    Dead,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Pending => "PENDING",
            TaskState::InProgress => "IN_PROGRESS",
            TaskState::Completed => "COMPLETED",
            TaskState::Aborted => "ABORTED",
            TaskState::Dead => "DEAD",
        };
        f.write_str(name)
    }
}

/// A schedulable unit of work derived from an [`ExecutionProposal`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTask {
    pub id: u64,
    pub proposal: Arc<ExecutionProposal>,
    pub kind: TaskKind,
    pub state: TaskState,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ExecutionTask {
    pub fn new(id: u64, proposal: Arc<ExecutionProposal>, kind: TaskKind) -> Self {
        Self {
            id,
            proposal,
            kind,
            state: TaskState::Pending,
            start_time: None,
            end_time: None,
        }
    }

    pub fn topic_partition(&self) -> &TopicPartition {
        &self.proposal.topic_partition
    }

    /// Bytes this task transfers; leadership moves transfer nothing
    pub fn data_to_move_bytes(&self) -> u64 {
        match self.kind {
            TaskKind::ReplicaMove => self.proposal.bytes_to_move(),
            TaskKind::LeadershipMove => 0,
        }
    }

    /// Brokers that take part in the task as a source or a destination
    pub fn brokers(&self) -> Vec<BrokerId> {
        match self.kind {
            TaskKind::ReplicaMove => self.proposal.involved_brokers(),
            TaskKind::LeadershipMove => {
                let mut brokers: Vec<BrokerId> = self
                    .proposal
                    .old_leader()
                    .into_iter()
                    .chain(self.proposal.new_leader())
                    .collect();
                brokers.dedup();
                brokers
            }
        }
    }

    /// Pending -> InProgress
    pub fn in_progress(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(TaskState::Pending, TaskState::InProgress)?;
        self.start_time = Some(now);
        Ok(())
    }

    /// InProgress -> Completed
    pub fn completed(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.finish(TaskState::Completed, now)
    }

    /// InProgress -> Aborted
    pub fn aborted(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.finish(TaskState::Aborted, now)
    }

    /// InProgress -> Dead, e.g. a broker in the task went offline
    pub fn kill(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.finish(TaskState::Dead, now)
    }

    fn finish(&mut self, to: TaskState, now: DateTime<Utc>) -> Result<()> {
        self.transition(TaskState::InProgress, to)?;
        self.end_time = Some(now);
        Ok(())
    }

    fn transition(&mut self, expected: TaskState, to: TaskState) -> Result<()> {
        if self.state != expected {
            return Err(PlannerError::InvalidStateTransition {
                id: self.id,
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

impl fmt::Display for ExecutionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "task {} [{:?}, {}] {}",
            self.id, self.kind, self.state, self.proposal
        )
    }
}
