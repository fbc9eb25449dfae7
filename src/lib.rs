// Kafka Execution Task Planner
// Decides which partition relocations an executor runs next, in what order
// and how many at a time.

pub mod models;
pub mod proposal;
pub mod task;
pub mod strategy;
pub mod planner;
pub mod config;

pub use models::{Broker, BrokerId, ClusterModel, PartitionState, ReplicaStateView, TopicPartition};
pub use proposal::ExecutionProposal;
pub use task::{ExecutionTask, TaskKind, TaskState};
pub use strategy::{
    ReplicaMovementStrategy, StrategyChain, StrategyContext, StrategyRegistry, TaskComparator,
};
pub use planner::{ExecutionTaskPlanner, SharedTaskPlanner};
pub use config::PlannerConfig;

pub type Result<T> = std::result::Result<T, PlannerError>;

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("Proposal for {partition} has an empty replica list")]
    EmptyReplicaList { partition: TopicPartition },

    #[error("Proposal for {partition} lists broker {broker} more than once")]
    DuplicateReplica {
        partition: TopicPartition,
        broker: BrokerId,
    },

    #[error("Partition {0} appears more than once in the same submission")]
    DuplicatePartition(TopicPartition),

    #[error("Partition {0} already has a pending task")]
    PartitionAlreadyPending(TopicPartition),

    #[error("Total data to move exceeds the representable byte count")]
    DataSizeOverflow,

    #[error("Unknown replica movement strategy: {0}")]
    UnknownStrategy(String),

    #[error("Task {id} cannot move from {from} to {to}")]
    InvalidStateTransition {
        id: u64,
        from: TaskState,
        to: TaskState,
    },

    #[error("Invalid planner configuration: {0}")]
    InvalidConfig(String),
}
