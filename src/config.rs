use crate::{PlannerError, Result};
use serde::{Deserialize, Serialize};

/// Settings that shape how the planner orders and batches movements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Replica movement strategies in priority order; empty means submission order
    pub replica_movement_strategies: Vec<String>,

    /// Leadership movements handed out per batch
    pub max_leadership_movements_per_batch: usize,

    /// Concurrent replica movements a live broker may take part in
    pub max_partition_movements_per_broker: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            replica_movement_strategies: Vec::new(),
            max_leadership_movements_per_batch: 1000,
            max_partition_movements_per_broker: 5,
        }
    }
}

impl PlannerConfig {
    /// Move healthy partitions first, larger ones ahead of smaller ones
    pub fn postpone_under_replicated() -> Self {
        Self {
            replica_movement_strategies: vec![
                "postpone-under-replicated".to_string(),
                "prioritize-large".to_string(),
            ],
            ..Default::default()
        }
    }

    pub fn with_strategies<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.replica_movement_strategies = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_leadership_batch_size(mut self, size: usize) -> Self {
        self.max_leadership_movements_per_batch = size;
        self
    }

    pub fn with_movements_per_broker(mut self, movements: usize) -> Self {
        self.max_partition_movements_per_broker = movements;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_leadership_movements_per_batch == 0 {
            return Err(PlannerError::InvalidConfig(
                "max_leadership_movements_per_batch must be greater than 0".to_string(),
            ));
        }
        if self.max_partition_movements_per_broker == 0 {
            return Err(PlannerError::InvalidConfig(
                "max_partition_movements_per_broker must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
