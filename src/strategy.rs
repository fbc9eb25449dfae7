//! Ordering policies for pending replica movements.
//!
//! A [`StrategyChain`] lists strategies in priority order. The first strategy
//! that tells two tasks apart decides their order; when every strategy ties,
//! the lower task id goes first.

use crate::models::TopicPartition;
use crate::task::ExecutionTask;
use crate::{PlannerError, Result};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Replication health known to the planner when a chain is evaluated
pub struct StrategyContext<'a> {
    under_replicated: &'a HashSet<TopicPartition>,
}

impl<'a> StrategyContext<'a> {
    pub fn new(under_replicated: &'a HashSet<TopicPartition>) -> Self {
        Self { under_replicated }
    }

    pub fn is_under_replicated(&self, tp: &TopicPartition) -> bool {
        self.under_replicated.contains(tp)
    }
}

/// Host-provided ordering that can be registered next to the built-ins
pub trait TaskComparator: Send + Sync {
    /// Name used to refer to this comparator in configuration
    fn name(&self) -> &str;

    /// `Ordering::Equal` hands the decision to the next strategy in the chain
    fn compare(&self, a: &ExecutionTask, b: &ExecutionTask, ctx: &StrategyContext<'_>) -> Ordering;
}

#[derive(Clone)]
pub enum ReplicaMovementStrategy {
    /// Submission order (ascending task id)
    Base,
    /// Fully in-sync partitions before under-replicated ones
    PostponeUnderReplicated,
    /// Most data first
    PrioritizeLarge,
    /// Least data first
    PrioritizeSmall,
    Custom(Arc<dyn TaskComparator>),
}

impl ReplicaMovementStrategy {
    /// Resolve a built-in by its short name or its class-style name. A
    /// dotted prefix (`com.example.BaseReplicaMovementStrategy`) is ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let simple = name.rsplit('.').next().unwrap_or(name);
        match simple {
            "base" | "BaseReplicaMovementStrategy" => Some(Self::Base),
            "postpone-under-replicated" | "PostponeUrpReplicaMovementStrategy" => {
                Some(Self::PostponeUnderReplicated)
            }
            "prioritize-large" | "PrioritizeLargeReplicaMovementStrategy" => {
                Some(Self::PrioritizeLarge)
            }
            "prioritize-small" | "PrioritizeSmallReplicaMovementStrategy" => {
                Some(Self::PrioritizeSmall)
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Base => "base",
            Self::PostponeUnderReplicated => "postpone-under-replicated",
            Self::PrioritizeLarge => "prioritize-large",
            Self::PrioritizeSmall => "prioritize-small",
            Self::Custom(comparator) => comparator.name(),
        }
    }

    pub fn compare(&self, a: &ExecutionTask, b: &ExecutionTask, ctx: &StrategyContext<'_>) -> Ordering {
        match self {
            Self::Base => a.id.cmp(&b.id),
            Self::PostponeUnderReplicated => {
                // false sorts before true, so healthy partitions lead
                let a_urp = ctx.is_under_replicated(a.topic_partition());
                let b_urp = ctx.is_under_replicated(b.topic_partition());
                a_urp.cmp(&b_urp)
            }
            Self::PrioritizeLarge => b.data_to_move_bytes().cmp(&a.data_to_move_bytes()),
            Self::PrioritizeSmall => a.data_to_move_bytes().cmp(&b.data_to_move_bytes()),
            Self::Custom(comparator) => comparator.compare(a, b, ctx),
        }
    }
}

impl fmt::Debug for ReplicaMovementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strategies in priority order, with task id as the final tie-breaker
#[derive(Debug, Clone)]
pub struct StrategyChain {
    strategies: Vec<ReplicaMovementStrategy>,
}

impl StrategyChain {
    /// An empty list behaves as `[Base]`
    pub fn new(strategies: Vec<ReplicaMovementStrategy>) -> Self {
        if strategies.is_empty() {
            return Self::default();
        }
        Self { strategies }
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn compare(&self, a: &ExecutionTask, b: &ExecutionTask, ctx: &StrategyContext<'_>) -> Ordering {
        self.strategies
            .iter()
            .map(|s| s.compare(a, b, ctx))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }

    /// Sort tasks into admission order
    pub fn rank(&self, tasks: &mut [&ExecutionTask], ctx: &StrategyContext<'_>) {
        tasks.sort_by(|a, b| self.compare(a, b, ctx));
    }
}

impl Default for StrategyChain {
    fn default() -> Self {
        Self {
            strategies: vec![ReplicaMovementStrategy::Base],
        }
    }
}

/// Resolves configured strategy names to strategies
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    custom: HashMap<String, Arc<dyn TaskComparator>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a host-specific comparator available under its own name.
    /// Built-in names always take precedence.
    pub fn register(&mut self, comparator: Arc<dyn TaskComparator>) {
        self.custom.insert(comparator.name().to_string(), comparator);
    }

    pub fn resolve(&self, name: &str) -> Result<ReplicaMovementStrategy> {
        ReplicaMovementStrategy::from_name(name)
            .or_else(|| {
                self.custom
                    .get(name)
                    .map(|c| ReplicaMovementStrategy::Custom(Arc::clone(c)))
            })
            .ok_or_else(|| PlannerError::UnknownStrategy(name.to_string()))
    }

    /// Resolve every name or fail on the first unknown one
    pub fn build_chain<S: AsRef<str>>(&self, names: &[S]) -> Result<StrategyChain> {
        let strategies = names
            .iter()
            .map(|n| self.resolve(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(StrategyChain::new(strategies))
    }
}
